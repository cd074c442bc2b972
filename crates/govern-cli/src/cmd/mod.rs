pub mod config;
pub mod deps;
pub mod drift;
pub mod route;

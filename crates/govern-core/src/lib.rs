pub mod config;
pub mod deps;
pub mod drift;
pub mod error;
pub mod io;
pub mod paths;
pub mod router;
pub mod store;
pub mod types;

pub use error::{GovernError, Result};

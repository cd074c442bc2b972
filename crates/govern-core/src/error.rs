use thiserror::Error;

#[derive(Debug, Error)]
pub enum GovernError {
    #[error("missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store request failed: {0}")]
    Store(String),

    #[error("store returned {status}: {body}")]
    StoreStatus { status: u16, body: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl GovernError {
    /// Errors caused by the environment or configuration rather than by the
    /// scanned tree or the store. The drift CLI maps these to exit code 2.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            GovernError::MissingEnv(_)
                | GovernError::InvalidConfig(_)
                | GovernError::InvalidPattern { .. }
                | GovernError::Yaml(_)
        )
    }
}

impl From<reqwest::Error> for GovernError {
    fn from(e: reqwest::Error) -> Self {
        GovernError::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GovernError>;

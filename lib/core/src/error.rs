use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// No viable classification path (neither a trained model nor a reference dataset).
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid value for feature {feature}: {value}")]
    InvalidFeature { feature: &'static str, value: f64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid feature model, weight table or pipeline setting.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single pair (or record) could not be turned into an output document.
    #[error("Record serialization error: {0}")]
    RecordSerialization(String),

    #[error("Invalid value for feature '{feature}': {reason}")]
    InvalidFeatureValue { feature: String, reason: String },

    #[error("Relation not found: {0}")]
    RelationNotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub fn invalid_value(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidFeatureValue {
            feature: feature.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("TLE directory not found: {0}")]
    DirectoryNotFound(String),
    #[error("TLE file read error: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Invalid orbital elements for {satellite}: {message}")]
    InvalidElements { satellite: String, message: String },
    #[error("No orbital elements for satellite {0}")]
    ElementsNotFound(u32),
    #[error("Propagation failed for {satellite}: {message}")]
    Propagation { satellite: String, message: String },
    #[error("Invalid station location: {0}")]
    InvalidLocation(String),
}

impl PredictError {
    pub fn invalid_elements(satellite: impl Into<String>, message: impl ToString) -> Self {
        PredictError::InvalidElements {
            satellite: satellite.into(),
            message: message.to_string(),
        }
    }

    pub fn propagation(satellite: impl Into<String>, message: impl ToString) -> Self {
        PredictError::Propagation {
            satellite: satellite.into(),
            message: message.to_string(),
        }
    }
}

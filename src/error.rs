use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// The request payload could not be parsed. Nothing has been rendered.
    #[error("invalid report payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid language table: {0}")]
    InvalidLanguageTable(String),

    #[error("invalid font: {0}")]
    InvalidFont(String),

    #[error("failed to serialize pdf: {0}")]
    Serialize(String),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl ReportError {
    /// Client errors are caused by the caller's input; everything else is a
    /// failure on the rendering side.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ReportError::InvalidPayload(_))
    }
}

impl From<toml::de::Error> for ReportError {
    fn from(e: toml::de::Error) -> Self {
        ReportError::InvalidConfiguration(e.to_string())
    }
}

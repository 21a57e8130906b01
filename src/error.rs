use thiserror::Error;

/// Crate-level error.
///
/// Only two families are fatal to a run: structural input errors (the report
/// is missing columns or is not a readable spreadsheet) and transport failures
/// talking to the text-generation service. Malformed service output and corrupt
/// catalog rows never surface here; they are recovered where they occur.
#[derive(Error, Debug)]
pub enum RcaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("report must contain columns {required:?}; missing {missing:?}")]
    MissingColumns {
        required: Vec<String>,
        missing: Vec<String>,
    },

    #[error("{0} not set. Export it or pass via environment.")]
    MissingApiKey(&'static str),

    #[error("transport error calling text-generation service: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{provider} API error (HTTP {status}): {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{0} returned no text content")]
    EmptyResponse(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl RcaError {
    /// True for failures of the text-generation boundary itself, as opposed
    /// to local I/O or input problems.
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            RcaError::Transport(_)
                | RcaError::Api { .. }
                | RcaError::EmptyResponse(_)
                | RcaError::MissingApiKey(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RcaError>;

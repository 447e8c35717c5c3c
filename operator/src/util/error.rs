use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("malformed document at {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("invalid user input: {0}")]
    UserInput(String),

    #[error("postgres pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("timestamp parse error: {0}")]
    Chrono(#[from] chrono::ParseError),

    #[error("duration out of range: {0}")]
    OutOfRange(#[from] chrono::OutOfRangeError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duration parse error: {0}")]
    ParseDuration(#[from] parse_duration::parse::Error),
}

impl Error {
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True when the wrapped kube error is a 404 ("not found") rather than a real failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Kube(kube::Error::Api(resp)) if resp.code == 404
        )
    }

    /// True when the wrapped kube error is a 409 ("already exists") conflict, which §7 of
    /// `SPEC_FULL.md` treats as success for create operations.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Error::Kube(kube::Error::Api(resp)) if resp.code == 409
        )
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PresenceError {
    #[error("invalid scope: {0}")]
    InvalidScope(String),
    #[error("invalid role: {0}")]
    InvalidRole(String),
    #[error("storage unavailable: select a workspace first")]
    StorageUnavailable,
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

impl PresenceError {
    /// Stable error code reported on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidScope(_) => "invalid_scope",
            Self::InvalidRole(_) => "invalid_role",
            Self::StorageUnavailable => "storage_unavailable",
            Self::Query(_) => "db_query_failed",
        }
    }
}

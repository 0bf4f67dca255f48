/// Typed error hierarchy for console operations.
/// Classifies failures as client-reportable (validation, missing entity)
/// or internal (store, object storage, anything unexpected).
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConsoleError {
    // Client-reportable: the message goes back verbatim
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),

    // Internal: logged with context, surfaced as a generic message
    #[error("store error: {0}")]
    Store(String),
    #[error("object storage error: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConsoleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// True when the error carries a message safe to echo to the client.
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound(_))
    }

    /// The message sent in an `error` response. Internal errors collapse to
    /// a generic phrase built from the failed action; details stay in logs.
    pub fn client_message(&self, action: &str) -> String {
        if self.is_client_fault() {
            self.to_string()
        } else {
            format!("Failed to {action}")
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Store(_) => "store",
            Self::Storage(_) => "storage",
            Self::Internal(_) => "internal",
        }
    }
}

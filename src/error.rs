use thiserror::Error;

pub type Result<T> = std::result::Result<T, BoardhubError>;

#[derive(Debug, Error)]
pub enum BoardhubError {
    #[error("Authentication required")]
    Unauthenticated,

    /// Absent, or owned by someone else. Both read the same from outside.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Board not loaded")]
    BoardNotLoaded,

    #[error("Sync worker stopped for board {0}")]
    SyncStopped(String),
}

/// Outward error classes shared by client and server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthenticated,
    NotFound,
    Validation,
    Conflict,
    TransientIo,
}

impl BoardhubError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::NotFound { .. } | Self::BoardNotLoaded => ErrorKind::NotFound,
            Self::Validation(_) | Self::InvalidId(_) | Self::ConfigError(_) => {
                ErrorKind::Validation
            }
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::StorageError(_)
            | Self::TransportError(_)
            | Self::IoError(_)
            | Self::SerializationError(_)
            | Self::SyncStopped(_) => ErrorKind::TransientIo,
        }
    }

    /// Whether the failure came from I/O rather than from the request itself.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientIo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            BoardhubError::Unauthenticated.kind(),
            ErrorKind::Unauthenticated
        );
        assert_eq!(
            BoardhubError::not_found("Board", "abc").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            BoardhubError::Validation("empty".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            BoardhubError::Conflict("slug".into()).kind(),
            ErrorKind::Conflict
        );
        assert!(BoardhubError::StorageError("disk".into()).is_transient());
        assert!(!BoardhubError::Validation("x".into()).is_transient());
    }

    #[test]
    fn test_not_found_message() {
        let err = BoardhubError::not_found("Card", "42");
        assert_eq!(err.to_string(), "Card not found: 42");
    }
}

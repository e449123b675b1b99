//! Server-side operations over the persistence collaborator.

use crate::{
    domain::UserId,
    error::{BoardhubError, Result},
};

pub mod ordering;
pub mod share;

pub use ordering::{CardMove, CardUpdate, OrderingService, RepairReport};
pub use share::{RandomSlugGenerator, ShareInfo, ShareService, SlugGenerator};

/// Identity of whoever issued a request, as resolved by the auth layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    User(UserId),
}

impl Caller {
    /// Returns the user id, or `Unauthenticated` for anonymous callers
    pub fn require(&self) -> Result<&UserId> {
        match self {
            Self::User(id) => Ok(id),
            Self::Anonymous => Err(BoardhubError::Unauthenticated),
        }
    }
}

impl From<Option<UserId>> for Caller {
    fn from(value: Option<UserId>) -> Self {
        value.map_or(Self::Anonymous, Self::User)
    }
}

impl From<UserId> for Caller {
    fn from(value: UserId) -> Self {
        Self::User(value)
    }
}

/// Rewrites a missing link anywhere in an ownership chain as "`entity` not found".
pub(crate) fn collapse_not_found(
    err: BoardhubError,
    entity: &'static str,
    id: impl ToString,
) -> BoardhubError {
    match err {
        BoardhubError::NotFound { .. } => BoardhubError::not_found(entity, id),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_anonymous_caller_is_unauthenticated() {
        let err = Caller::Anonymous.require().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);

        let user = UserId::new();
        assert_eq!(Caller::from(Some(user)).require().unwrap(), &user);
        assert_eq!(Caller::from(None), Caller::Anonymous);
    }

    #[test]
    fn test_collapse_keeps_transient_errors() {
        let err = collapse_not_found(BoardhubError::StorageError("down".into()), "Card", "1");
        assert!(err.is_transient());

        let err = collapse_not_found(BoardhubError::not_found("List", "9"), "Card", "1");
        assert_eq!(err.to_string(), "Card not found: 1");
    }
}

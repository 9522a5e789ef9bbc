use thiserror::Error;

/// Error taxonomy shared by the REST boundary and the gateway. Validation
/// and authorization failures are normal branches recovered at the boundary;
/// only `Unavailable` represents a downstream fault, and its message never
/// carries internal detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("invalid or expired token")]
    InvalidToken,

    #[error("user not authenticated")]
    Unauthenticated,

    #[error("not allowed to access this message")]
    Forbidden,

    #[error("receiver id is required")]
    MissingReceiver,

    #[error("message content or attachment is required")]
    EmptyContent,

    #[error("message not found")]
    NotFound,

    #[error("service temporarily unavailable")]
    Unavailable,
}

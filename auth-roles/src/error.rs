use membership_engine::MembershipError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Store(#[from] MembershipError),
}

pub type Result<T> = std::result::Result<T, AuthError>;

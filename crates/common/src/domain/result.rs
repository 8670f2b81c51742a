use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Pricing oracle unavailable: {0}")]
    PricingUnavailable(String),

    #[error("Pricing oracle did not respond within {0}ms")]
    PricingTimeout(u64),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

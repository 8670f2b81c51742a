use crate::domain::DomainError;
use tonic::Status;

/// Convert domain error to gRPC Status
pub fn domain_error_to_status(error: DomainError) -> Status {
    match error {
        DomainError::Unauthenticated(msg) => Status::unauthenticated(msg),

        DomainError::ValidationError(msg) | DomainError::DecodeError(msg) => {
            Status::invalid_argument(msg)
        }

        DomainError::PricingUnavailable(msg) => Status::unavailable(msg),

        err @ DomainError::PricingTimeout(_) => Status::deadline_exceeded(err.to_string()),

        DomainError::RepositoryError(err) => Status::internal(format!("Internal error: {}", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_status_codes() {
        let cases = [
            (DomainError::Unauthenticated("missing x-api-token".into()), Code::Unauthenticated),
            (DomainError::ValidationError("latitude".into()), Code::InvalidArgument),
            (DomainError::DecodeError("bad json".into()), Code::InvalidArgument),
            (DomainError::PricingUnavailable("503".into()), Code::Unavailable),
            (DomainError::PricingTimeout(5000), Code::DeadlineExceeded),
            (DomainError::RepositoryError(anyhow::anyhow!("down")), Code::Internal),
        ];

        for (error, code) in cases {
            assert_eq!(domain_error_to_status(error).code(), code);
        }
    }

    #[test]
    fn test_unauthenticated_keeps_message() {
        let status = domain_error_to_status(DomainError::Unauthenticated(
            "invalid x-api-token".to_string(),
        ));
        assert_eq!(status.message(), "invalid x-api-token");
    }
}

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Order not found")]
    OrderNotFound,
    #[error("Order with this id is already stored")]
    DuplicateOrder,
    #[error("Order already exists")]
    OrderAlreadyExists,
    #[error("Order is already issued to the client")]
    OrderAlreadyIssued,
    #[error("Storage time has expired")]
    StorageExpired,
    #[error("Storage time has not expired yet")]
    StorageNotExpired,
    #[error("Return window has expired")]
    ReturnTimeExpired,
    #[error("Unsupported action: {0}")]
    InvalidAction(String),
    #[error("Weight exceeds the package limit")]
    WeightTooHeavy,
    #[error("Unknown package type: {0}")]
    InvalidPackage(String),
    // File-import codes. Kept in the code table for clients; this service
    // has no file backend that raises them.
    #[error("Import failed: {0}")]
    ImportFailed(String),
    #[error("Open failed: {0}")]
    OpenFailed(String),
    #[error("Read failed: {0}")]
    ReadFailed(String),
    #[error("JSON error: {0}")]
    JsonFailed(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Stable, transport-independent code clients can match on.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::ValidationFailed(_) => "VALIDATION_FAILED",
            DomainError::InvalidInput(_) => "INVALID_INPUT",
            DomainError::OrderNotFound => "ORDER_NOT_FOUND",
            DomainError::DuplicateOrder => "DUPLICATE_ORDER",
            DomainError::OrderAlreadyExists => "ORDER_ALREADY_EXISTS",
            DomainError::OrderAlreadyIssued => "ORDER_ALREADY_ISSUED",
            DomainError::StorageExpired => "STORAGE_EXPIRED",
            DomainError::StorageNotExpired => "STORAGE_NOT_EXPIRED",
            DomainError::ReturnTimeExpired => "RETURN_TIME_EXPIRED",
            DomainError::InvalidAction(_) => "INVALID_ACTION",
            DomainError::WeightTooHeavy => "WEIGHT_TOO_HEAVY",
            DomainError::InvalidPackage(_) => "INVALID_PACKAGE",
            DomainError::ImportFailed(_) => "IMPORT_FAILED",
            DomainError::OpenFailed(_) => "OPEN_FAILED",
            DomainError::ReadFailed(_) => "READ_FILE_ERROR",
            DomainError::JsonFailed(_) => "JSON_FAILED",
            DomainError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::JsonFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(DomainError::WeightTooHeavy.code(), "WEIGHT_TOO_HEAVY");
        assert_eq!(DomainError::OrderNotFound.code(), "ORDER_NOT_FOUND");
        assert_eq!(
            DomainError::ValidationFailed("x".into()).code(),
            "VALIDATION_FAILED"
        );
        assert_eq!(DomainError::ReadFailed("x".into()).code(), "READ_FILE_ERROR");
        assert_eq!(DomainError::Internal("x".into()).code(), "INTERNAL_ERROR");
    }

    #[test]
    fn json_error_maps_to_json_failed() {
        let err = serde_json::from_str::<u64>("nope").unwrap_err();
        let domain: DomainError = err.into();
        assert_eq!(domain.code(), "JSON_FAILED");
    }
}

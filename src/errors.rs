use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use thiserror::Error;

use crate::domain::errors::DomainError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Domain(e) => e.code(),
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        let AppError::Domain(e) = self else {
            return StatusCode::INTERNAL_SERVER_ERROR;
        };
        match e {
            DomainError::ValidationFailed(_)
            | DomainError::InvalidInput(_)
            | DomainError::InvalidPackage(_)
            | DomainError::WeightTooHeavy
            | DomainError::InvalidAction(_) => StatusCode::BAD_REQUEST,
            DomainError::OrderNotFound => StatusCode::NOT_FOUND,
            DomainError::DuplicateOrder | DomainError::OrderAlreadyExists => StatusCode::CONFLICT,
            DomainError::OrderAlreadyIssued
            | DomainError::StorageExpired
            | DomainError::StorageNotExpired
            | DomainError::ReturnTimeExpired => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::ImportFailed(_)
            | DomainError::OpenFailed(_)
            | DomainError::ReadFailed(_)
            | DomainError::JsonFailed(_)
            | DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status).json(serde_json::json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        }))
    }
}

use std::io::Error as IoError;

use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use super::middleware::ResponseSummary;
use crate::crypto::VerificationError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
}

/// Rejections of the command endpoint, each mapped to its own status.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error("could not parse form data: {0}")]
    BadRequest(String),
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),
}

impl CommandError {
    fn message(&self) -> String {
        match self {
            CommandError::Verification(VerificationError::MethodNotAllowed(method)) => {
                format!("Method not allowed: {method}")
            }
            CommandError::Verification(VerificationError::Expired) => "Unauthorised: expired".into(),
            CommandError::Verification(e) => format!("Unauthorised: {e}"),
            CommandError::BadRequest(_) => "Bad request: could not parse form data".into(),
            CommandError::BodyTooLarge(limit) => format!("Bad request: body exceeds {limit} bytes"),
        }
    }
}

impl ResponseError for CommandError {
    fn status_code(&self) -> StatusCode {
        match self {
            CommandError::Verification(VerificationError::MethodNotAllowed(_)) => {
                StatusCode::METHOD_NOT_ALLOWED
            }
            CommandError::Verification(_) => StatusCode::UNAUTHORIZED,
            CommandError::BadRequest(_) | CommandError::BodyTooLarge(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = self.message();
        let mut response = HttpResponse::build(self.status_code())
            .insert_header(ContentType::plaintext())
            .body(message.clone());
        response.extensions_mut().insert(ResponseSummary(message));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let method = CommandError::from(VerificationError::MethodNotAllowed("GET".into()));
        assert_eq!(method.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(method.message(), "Method not allowed: GET");

        for e in [
            VerificationError::MissingTimestamp,
            VerificationError::MalformedTimestamp,
            VerificationError::Expired,
            VerificationError::MissingSignature,
            VerificationError::MalformedSignature,
            VerificationError::InvalidSignature,
        ] {
            assert_eq!(CommandError::from(e).status_code(), StatusCode::UNAUTHORIZED);
        }

        let bad = CommandError::BadRequest("not utf-8".into());
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);

        let oversize = CommandError::BodyTooLarge(1024);
        assert_eq!(oversize.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(oversize.message(), "Bad request: body exceeds 1024 bytes");
    }

    #[test]
    fn test_messages() {
        assert_eq!(CommandError::from(VerificationError::Expired).message(), "Unauthorised: expired");
        assert_eq!(
            CommandError::from(VerificationError::InvalidSignature).message(),
            "Unauthorised: invalid signature"
        );
    }
}

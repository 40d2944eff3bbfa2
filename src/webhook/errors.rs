use super::{receiver::MalformedPayload, security::SignatureError};
use derive_more::{Display, Error};
use ntex::{http, web};

/// Reasons a delivery is refused before any action runs.
///
/// Downstream failures never show up here, they are reported per action in
/// the summary instead.
#[derive(Debug, Display, Error)]
pub enum WebhookError {
    #[display("unsupported event type: {_0}")]
    UnsupportedEventType(#[error(not(source))] String),
    #[display("invalid signature: {_0}")]
    InvalidSignature(#[error(source)] SignatureError),
    #[display("malformed payload: {_0}")]
    MalformedPayload(#[error(source)] MalformedPayload),
}

impl WebhookError {
    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            WebhookError::UnsupportedEventType(_) => "unsupported_event_type",
            WebhookError::InvalidSignature(_) => "invalid_signature",
            WebhookError::MalformedPayload(_) => "malformed_payload",
        }
    }
}

impl web::error::WebResponseError for WebhookError {
    fn error_response(&self, _: &web::HttpRequest) -> web::HttpResponse {
        web::HttpResponse::build(self.status_code()).json(&serde_json::json!({
            "error": self.to_string()
        }))
    }

    fn status_code(&self) -> http::StatusCode {
        match *self {
            WebhookError::UnsupportedEventType(_) => http::StatusCode::NOT_FOUND,
            WebhookError::InvalidSignature(_) => http::StatusCode::UNAUTHORIZED,
            WebhookError::MalformedPayload(_) => http::StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntex::web::error::WebResponseError;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            WebhookError::UnsupportedEventType("call.parked".into()).status_code(),
            http::StatusCode::NOT_FOUND
        );
        assert_eq!(
            WebhookError::InvalidSignature(SignatureError::Mismatch).status_code(),
            http::StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebhookError::MalformedPayload(MalformedPayload::NotAnObject("an array"))
                .status_code(),
            http::StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_display_names_the_cause() {
        let err = WebhookError::MalformedPayload(MalformedPayload::NotAnObject("a string"));
        assert_eq!(
            err.to_string(),
            "malformed payload: body must be a JSON object, got a string"
        );
    }
}

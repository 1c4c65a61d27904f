use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Response {
    create_error(StatusCode::BAD_REQUEST, code, message)
}

pub fn internal_error(code: impl Into<String>, message: impl Into<String>) -> Response {
    create_error(StatusCode::INTERNAL_SERVER_ERROR, code, message)
}

pub fn create_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "message": message.into(),
                "type": status_code_to_str(status),
                "code": code.into(),
            }
        })),
    )
        .into_response()
}

fn status_code_to_str(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("unknown_status_code")
        .to_ascii_lowercase()
        .replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_strings() {
        assert_eq!(status_code_to_str(StatusCode::BAD_REQUEST), "bad_request");
        assert_eq!(
            status_code_to_str(StatusCode::INTERNAL_SERVER_ERROR),
            "internal_server_error"
        );
    }

    #[test]
    fn test_bad_request_status() {
        let response = bad_request("missing_instruction", "Instruction is required");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

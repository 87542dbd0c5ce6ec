use application::{ApplicationError, BlobStoreError, CredentialError, PaymentInstructions};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{DomainError, RepositoryError};
use serde::Serialize;

/// 错误响应体，形如 `{code, error, details?}`。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: &'static str,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_payment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_details: Option<PaymentInstructions>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                error: message.into(),
                details: None,
                requires_payment: None,
                account_details: None,
            },
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.body.details = Some(details.into());
        self
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    fn payment_required(instructions: PaymentInstructions, message: String) -> Self {
        let mut error = Self::new(StatusCode::FORBIDDEN, "PAYMENT_REQUIRED", message);
        error.body.requires_payment = Some(true);
        error.body.account_details = Some(instructions);
        error
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.body.code
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        let message = error.to_string();
        match error {
            DomainError::InvalidArgument { field, .. } => {
                ApiError::bad_request(message).with_details(field)
            }
            DomainError::PaymentInvalid => {
                ApiError::new(StatusCode::BAD_REQUEST, "PAYMENT_INVALID", message)
            }
            DomainError::UserNotFound => {
                ApiError::new(StatusCode::NOT_FOUND, "USER_NOT_FOUND", "User not found")
            }
            DomainError::PostNotFound => {
                ApiError::new(StatusCode::NOT_FOUND, "POST_NOT_FOUND", "Post not found")
            }
            DomainError::ChatNotFound => {
                ApiError::new(StatusCode::NOT_FOUND, "CHAT_NOT_FOUND", "Chat not found")
            }
            DomainError::PaymentNotFound => {
                ApiError::new(StatusCode::NOT_FOUND, "PAYMENT_NOT_FOUND", "Payment not found")
            }
            DomainError::PostNotActive => {
                ApiError::new(StatusCode::CONFLICT, "POST_NOT_ACTIVE", "Post not available")
            }
            DomainError::PaymentAlreadyDecided { .. } => {
                ApiError::new(StatusCode::CONFLICT, "PAYMENT_ALREADY_DECIDED", message)
            }
            DomainError::EmailTaken => {
                ApiError::new(StatusCode::CONFLICT, "EMAIL_TAKEN", message).with_details("email")
            }
            DomainError::PhoneTaken => {
                ApiError::new(StatusCode::CONFLICT, "PHONE_TAKEN", message).with_details("phone")
            }
            DomainError::FederatedIdTaken => {
                ApiError::new(StatusCode::CONFLICT, "FEDERATED_ID_TAKEN", message)
            }
            DomainError::NotChatParticipant => {
                ApiError::new(StatusCode::FORBIDDEN, "NOT_CHAT_PARTICIPANT", message)
            }
            DomainError::OperationNotAllowed => {
                ApiError::new(StatusCode::FORBIDDEN, "OPERATION_NOT_ALLOWED", message)
            }
            DomainError::PaymentPending => {
                ApiError::new(StatusCode::FORBIDDEN, "PAYMENT_PENDING", message)
            }
        }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;

        let message = error.to_string();
        match error {
            AppErr::Domain(err) => err.into(),
            AppErr::Repository(repo_err) => match repo_err {
                RepositoryError::NotFound => ApiError::new(
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "requested resource not found",
                ),
                RepositoryError::Conflict { constraint } => {
                    ApiError::new(StatusCode::CONFLICT, "CONFLICT", "resource already exists")
                        .with_details(constraint)
                }
                other => {
                    tracing::error!(error = %other, "持久层调用失败");
                    ApiError::internal_server_error("Server error").with_details(other.to_string())
                }
            },
            AppErr::Credential(CredentialError::Rejected(reason)) => {
                ApiError::unauthorized("Invalid credential").with_details(reason)
            }
            AppErr::Credential(err) => {
                tracing::error!(error = %err, "凭证服务不可用");
                ApiError::internal_server_error("Authentication service unavailable")
                    .with_details(err.to_string())
            }
            AppErr::Blob(BlobStoreError::TooLarge { limit }) => {
                ApiError::bad_request("File too large").with_details(format!("limit {limit} bytes"))
            }
            AppErr::Blob(err) => {
                tracing::error!(error = %err, "保存上传文件失败");
                ApiError::internal_server_error("Failed to store upload")
            }
            AppErr::Infrastructure(message) => {
                tracing::error!(error = %message, "基础设施错误");
                ApiError::internal_server_error("Server error")
            }
            AppErr::Authentication => ApiError::unauthorized("Invalid credentials"),
            AppErr::Authorization => ApiError::forbidden("Admin access required"),
            AppErr::PaymentRequired(instructions) => {
                ApiError::payment_required(instructions, message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_error_carries_account_details() {
        let error = ApiError::from(ApplicationError::PaymentRequired(PaymentInstructions {
            bank: "Test Bank".to_string(),
            account_number: "0001112223".to_string(),
            account_name: "Meetup Ltd".to_string(),
            reference: "ACCEPT-1".to_string(),
        }));

        assert_eq!(error.status(), StatusCode::FORBIDDEN);
        let body = serde_json::to_value(&error.body).unwrap();
        assert_eq!(body["requiresPayment"], true);
        assert_eq!(body["accountDetails"]["accountNumber"], "0001112223");
        assert_eq!(
            body["error"],
            "You can only accept up to 5 requests. Pay to unlock more."
        );
    }

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (
                ApiError::from(DomainError::invalid_argument("text", "cannot be empty")),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::from(ApplicationError::Authentication), StatusCode::UNAUTHORIZED),
            (ApiError::from(DomainError::NotChatParticipant), StatusCode::FORBIDDEN),
            (ApiError::from(DomainError::ChatNotFound), StatusCode::NOT_FOUND),
            (ApiError::from(DomainError::EmailTaken), StatusCode::CONFLICT),
            (ApiError::from(DomainError::PostNotActive), StatusCode::CONFLICT),
            (ApiError::from(DomainError::PaymentPending), StatusCode::FORBIDDEN),
            (
                ApiError::from(ApplicationError::from(RepositoryError::Timeout)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status, "{:?}", error.code());
        }
    }
}

//! 请求体与路径参数的提取辅助，失败时统一返回 `{code, error}` 形式的错误。

use std::str::FromStr;

use axum::extract::{rejection::JsonRejection, FromRequest};
use domain::DomainError;
use validator::Validate;

use crate::error::ApiError;

/// 与 `axum::Json` 相同，但解析失败时返回 400 与统一的错误体。
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request("Invalid request body").with_details(rejection.body_text())
    }
}

/// 解析路径中的实体 id。
pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(ApiError::from)
}

pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), ApiError> {
    payload.validate().map_err(|errors| {
        let field_errors = errors.field_errors();
        let mut fields: Vec<String> = field_errors.keys().map(|key| key.to_string()).collect();
        fields.sort();

        let message = field_errors
            .values()
            .flat_map(|errs| errs.iter())
            .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| "Invalid request body".to_string());

        ApiError::bad_request(message).with_details(fields.join(","))
    })
}

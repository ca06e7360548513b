use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use crate::shared::services::AppState;
use serde_json::json;

/// 사용자 ID 헤더 (앞단 게이트웨이에서 인증 후 전달)
/// Header carrying the already-authenticated user id
pub const USER_ID_HEADER: &str = "X-User-Id";

/// 인증된 사용자 정보
/// Authenticated user information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: u64,
}

/// AuthenticatedUser를 Axum Extractor로 구현
///
/// 인증 자체는 이 서버의 범위 밖입니다.
/// 앞단에서 검증된 사용자 ID를 `X-User-Id` 헤더로 받습니다.
#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = (StatusCode, axum::Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // 1. 헤더 추출
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    axum::Json(json!({ "error": "Missing X-User-Id header" })),
                )
            })?
            .to_str()
            .map_err(|_| {
                (
                    StatusCode::UNAUTHORIZED,
                    axum::Json(json!({ "error": "Invalid X-User-Id header" })),
                )
            })?;

        // 2. 숫자 ID 파싱
        let user_id = raw.trim().parse::<u64>().map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({ "error": "X-User-Id must be a numeric user id" })),
            )
        })?;

        Ok(AuthenticatedUser { user_id })
    }
}

use crate::domains::market::models::Balance;
use crate::shared::middleware::auth::AuthenticatedUser;
use crate::shared::services::AppState;
use axum::{extract::State, http::StatusCode, Json};

/// 내 잔고 조회 핸들러
/// Get my balance handler
///
/// 처음 조회하는 사용자는 기본 잔고가 반환됩니다.
#[utoipa::path(
    get,
    path = "/api/market/balance",
    responses(
        (status = 200, description = "Balance of the caller", body = Balance),
        (status = 401, description = "Missing user identity")
    ),
    tag = "Market Balance",
    security(
        ("UserId" = [])
    )
)]
pub async fn get_balance(
    State(app_state): State<AppState>,
    AuthenticatedUser { user_id }: AuthenticatedUser,
) -> Result<Json<Balance>, (StatusCode, Json<serde_json::Value>)> {
    let balance = app_state
        .market_state
        .balance_service
        .get_balance(user_id)
        .await?;

    Ok(Json(balance))
}

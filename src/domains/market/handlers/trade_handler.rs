use crate::domains::market::models::TradeLeg;
use crate::shared::middleware::auth::AuthenticatedUser;
use crate::shared::services::AppState;
use axum::{extract::State, http::StatusCode, Json};

/// 내 체결 내역 핸들러
/// List my trade legs handler (newest first)
#[utoipa::path(
    get,
    path = "/api/market/transactions",
    responses(
        (status = 200, description = "Trade legs of the caller", body = [TradeLeg]),
        (status = 401, description = "Missing user identity")
    ),
    tag = "Market Transactions",
    security(
        ("UserId" = [])
    )
)]
pub async fn list_transactions(
    State(app_state): State<AppState>,
    AuthenticatedUser { user_id }: AuthenticatedUser,
) -> Result<Json<Vec<TradeLeg>>, (StatusCode, Json<serde_json::Value>)> {
    let trades = app_state
        .market_state
        .trade_service
        .list_trades(user_id)
        .await?;

    Ok(Json(trades))
}

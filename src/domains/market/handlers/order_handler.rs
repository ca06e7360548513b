use crate::domains::market::models::{
    AmendOrderRequest, Order, OrderFilter, PlaceOrderRequest, PlacedOrder,
};
use crate::shared::middleware::auth::AuthenticatedUser;
use crate::shared::services::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

// =====================================================
// Order Handler
// =====================================================
// 역할: 주문 관련 HTTP API 엔드포인트
//
// 처리 흐름:
// HTTP Request → Handler → OrderService → Engine / Store → Response
// 에러는 MarketError → (StatusCode, Json) 변환을 그대로 사용합니다.
// =====================================================

type ApiError = (StatusCode, Json<serde_json::Value>);

/// 주문 생성 핸들러
/// Place order handler
///
/// 매도 주문은 호가창에 등록되고, 매수 주문은 즉시 매칭된 결과와 함께 반환됩니다.
///
/// # Response
/// - 201: 주문 생성 (체결 결과 포함)
/// - 400: 잘못된 요청 또는 잔고 부족
/// - 401: X-User-Id 없음
/// - 409: 동시성 충돌 (재시도 가능)
/// - 500: 저장소 오류
#[utoipa::path(
    post,
    path = "/api/market/orders",
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = PlacedOrder),
        (status = 400, description = "Invalid amount/price or insufficient balance"),
        (status = 401, description = "Missing user identity"),
        (status = 409, description = "Concurrency conflict, retry"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Market Orders",
    security(
        ("UserId" = [])
    )
)]
pub async fn place_order(
    State(app_state): State<AppState>,
    AuthenticatedUser { user_id }: AuthenticatedUser,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<PlacedOrder>), ApiError> {
    let placed = app_state
        .market_state
        .order_service
        .place_order(user_id, request)
        .await
        ?;

    Ok((StatusCode::CREATED, Json(placed)))
}

/// 내 주문 목록 핸들러
/// List my orders handler (newest first)
#[utoipa::path(
    get,
    path = "/api/market/orders",
    params(OrderFilter),
    responses(
        (status = 200, description = "Orders of the caller", body = [Order]),
        (status = 401, description = "Missing user identity")
    ),
    tag = "Market Orders",
    security(
        ("UserId" = [])
    )
)]
pub async fn list_orders(
    State(app_state): State<AppState>,
    AuthenticatedUser { user_id }: AuthenticatedUser,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = app_state
        .market_state
        .order_service
        .list_orders(user_id, &filter)
        .await
        ?;

    Ok(Json(orders))
}

/// 매도 호가 목록 핸들러 (공개)
/// List resting sell orders handler
///
/// 가격 오름차순, 같은 가격이면 먼저 들어온 주문부터.
/// `type` 파라미터는 무시됩니다.
#[utoipa::path(
    get,
    path = "/api/market/orders/sell",
    params(OrderFilter),
    responses(
        (status = 200, description = "Open sell orders in price-time priority", body = [Order])
    ),
    tag = "Market Orders"
)]
pub async fn list_resting_sells(
    State(app_state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = app_state
        .market_state
        .order_service
        .list_resting_sells(&filter)
        .await
        ?;

    Ok(Json(orders))
}

/// 특정 주문 조회 핸들러
/// Get order by ID handler
///
/// 본인 주문, 또는 다른 사용자의 매도 주문만 조회할 수 있습니다.
#[utoipa::path(
    get,
    path = "/api/market/orders/{order_id}",
    params(
        ("order_id" = u64, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order", body = Order),
        (status = 403, description = "Not your order"),
        (status = 404, description = "Order not found")
    ),
    tag = "Market Orders",
    security(
        ("UserId" = [])
    )
)]
pub async fn get_order(
    State(app_state): State<AppState>,
    AuthenticatedUser { user_id }: AuthenticatedUser,
    Path(order_id): Path<u64>,
) -> Result<Json<Order>, ApiError> {
    let order = app_state
        .market_state
        .order_service
        .get_order(user_id, order_id)
        .await
        ?;

    Ok(Json(order))
}

/// 주문 변경 핸들러
/// Amend order handler
///
/// open 상태 주문의 남은 수량/가격만 변경합니다. 매칭은 다시 일어나지 않습니다.
#[utoipa::path(
    put,
    path = "/api/market/orders/{order_id}",
    params(
        ("order_id" = u64, Path, description = "Order ID to amend")
    ),
    request_body = AmendOrderRequest,
    responses(
        (status = 200, description = "Order amended", body = Order),
        (status = 400, description = "Invalid amendment, insufficient balance or order not open"),
        (status = 403, description = "Not your order"),
        (status = 404, description = "Order not found")
    ),
    tag = "Market Orders",
    security(
        ("UserId" = [])
    )
)]
pub async fn amend_order(
    State(app_state): State<AppState>,
    AuthenticatedUser { user_id }: AuthenticatedUser,
    Path(order_id): Path<u64>,
    Json(request): Json<AmendOrderRequest>,
) -> Result<Json<Order>, ApiError> {
    let order = app_state
        .market_state
        .order_service
        .amend_order(user_id, order_id, request)
        .await
        ?;

    Ok(Json(order))
}

/// 주문 취소 핸들러
/// Cancel order handler
#[utoipa::path(
    delete,
    path = "/api/market/orders/{order_id}",
    params(
        ("order_id" = u64, Path, description = "Order ID to cancel")
    ),
    responses(
        (status = 200, description = "Order canceled", body = Order),
        (status = 400, description = "Order is not open"),
        (status = 403, description = "Not your order"),
        (status = 404, description = "Order not found")
    ),
    tag = "Market Orders",
    security(
        ("UserId" = [])
    )
)]
pub async fn cancel_order(
    State(app_state): State<AppState>,
    AuthenticatedUser { user_id }: AuthenticatedUser,
    Path(order_id): Path<u64>,
) -> Result<Json<Order>, ApiError> {
    let order = app_state
        .market_state
        .order_service
        .cancel_order(user_id, order_id)
        .await
        ?;

    Ok(Json(order))
}

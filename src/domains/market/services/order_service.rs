use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::warn;

use crate::domains::market::engine::{Amendment, Engine, NewOrder};
use crate::domains::market::models::{
    AmendOrderRequest, Balance, BalanceDefaults, Order, OrderFilter, OrderSide, PlaceOrderRequest,
    PlacedOrder,
};
use crate::shared::database::Store;
use crate::shared::errors::MarketError;

/// 주문 서비스
/// Order Service
///
/// 역할:
/// - 주문 생성/취소/변경/조회
/// - 입력 검증, 잔고 사전 확인, 권한 확인
/// - 체결 엔진과 통신
///
/// 처리 흐름:
/// 1. API Handler → OrderService
/// 2. OrderService → 검증 (수량/가격, 잔고)
/// 3. OrderService → Engine (매칭 워커)
/// 4. 조회는 Engine 을 거치지 않고 Store 의 커밋된 데이터를 읽음
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    engine: Arc<dyn Engine>,
    defaults: BalanceDefaults,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, engine: Arc<dyn Engine>, defaults: BalanceDefaults) -> Self {
        Self { store, engine, defaults }
    }

    /// 주문 생성
    /// Place order
    ///
    /// # 처리 과정
    /// 1. 수량/가격 검증 (0 초과)
    /// 2. 잔고 사전 확인 (매수: 돈 ≥ 수량×가격, 매도: 에너지 ≥ 수량)
    /// 3. 엔진에 제출 (매수는 매칭까지 끝난 뒤 반환)
    /// 4. ConcurrencyConflict 면 사전 확인부터 한 번 더 시도
    ///
    /// # Errors
    /// - `Validation`, `InsufficientFunds`, `InsufficientEnergy`: 변경 없음
    /// - `Persistence`: 저장소 오류
    pub async fn place_order(
        &self,
        user_id: u64,
        request: PlaceOrderRequest,
    ) -> Result<PlacedOrder, MarketError> {
        let new_order = NewOrder {
            user_id,
            side: request.order_type,
            amount: request.amount_mwh,
            price: request.price_eur_per_mwh,
        };
        Self::validate(&new_order)?;
        self.check_balance(&new_order).await?;

        match self.engine.place_order(new_order.clone()).await {
            Err(e) if e.is_retryable() => {
                warn!(user_id, error = %e, "order placement conflicted, retrying once");
                self.check_balance(&new_order).await?;
                self.engine.place_order(new_order).await
            }
            result => result,
        }
    }

    /// 주문 취소
    /// Cancel order (owner only, open orders only)
    pub async fn cancel_order(&self, user_id: u64, order_id: u64) -> Result<Order, MarketError> {
        self.engine.cancel_order(order_id, user_id).await
    }

    /// 주문 변경
    /// Amend the open remainder of an order (owner only)
    pub async fn amend_order(
        &self,
        user_id: u64,
        order_id: u64,
        request: AmendOrderRequest,
    ) -> Result<Order, MarketError> {
        let amendment = Amendment {
            amount: request.amount_mwh,
            price: request.price_eur_per_mwh,
        };
        amendment.validate()?;
        self.engine.amend_order(order_id, user_id, amendment).await
    }

    /// 주문 조회
    /// 본인 주문이거나 매도 주문(공개 호가)만 조회 가능
    pub async fn get_order(&self, user_id: u64, order_id: u64) -> Result<Order, MarketError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(MarketError::NotFound { id: order_id })?;

        if order.user_id != user_id && order.side != OrderSide::Sell {
            return Err(MarketError::Unauthorized { order_id, user_id });
        }
        Ok(order)
    }

    /// 사용자 주문 목록 (최신순)
    pub async fn list_orders(&self, user_id: u64, filter: &OrderFilter) -> Result<Vec<Order>, MarketError> {
        Ok(self.store.list_orders_by_user(user_id, filter).await?)
    }

    /// open 매도 주문 목록 (가격 오름차순, 시간 오름차순)
    pub async fn list_resting_sells(&self, filter: &OrderFilter) -> Result<Vec<Order>, MarketError> {
        let filter = OrderFilter {
            side: Some(OrderSide::Sell),
            ..filter.clone()
        };
        Ok(self.store.list_open_sells(&filter).await?)
    }

    fn validate(order: &NewOrder) -> Result<(), MarketError> {
        if order.amount <= Decimal::ZERO {
            return Err(MarketError::Validation("amount_mwh must be greater than 0".to_string()));
        }
        if order.price <= Decimal::ZERO {
            return Err(MarketError::Validation(
                "price_eur_per_mwh must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// 잔고 사전 확인 (커밋된 스냅샷 기준)
    async fn check_balance(&self, order: &NewOrder) -> Result<(), MarketError> {
        let balance = self
            .store
            .get_balance(order.user_id)
            .await?
            .unwrap_or_else(|| Balance::with_defaults(order.user_id, &self.defaults));

        match order.side {
            OrderSide::Buy => {
                let required = order.amount * order.price;
                if balance.money < required {
                    return Err(MarketError::InsufficientFunds {
                        user_id: order.user_id,
                        required,
                        available: balance.money,
                    });
                }
            }
            OrderSide::Sell => {
                if balance.energy < order.amount {
                    return Err(MarketError::InsufficientEnergy {
                        user_id: order.user_id,
                        required: order.amount,
                        available: balance.energy,
                    });
                }
            }
        }
        Ok(())
    }
}

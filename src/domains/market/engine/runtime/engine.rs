// =====================================================
// MatchingEngine - 매칭 엔진 런타임
// =====================================================
// 역할: 매칭 워커의 시작/정지와 명령 전달
//
// 아키텍처:
// API Handler / Service (tokio task, 여러 개)
//     ↓ command_tx.try_send()  (bounded, 가득 차면 ConcurrencyConflict)
// [tokio::sync::mpsc]
//     ↓ recv()
// Matching Worker (tokio task, 하나)
//     ├─ Matcher::plan()
//     ├─ Ledger::settle_trade()   (주문 1건 = 트랜잭션 1개)
//     └─ OrderBook 반영 (커밋 후)
//     ↓ oneshot
// 요청한 task (큐에 들어간 명령은 처리 결과가 나올 때까지 대기)
// =====================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::info;

use crate::domains::market::engine::orderbook::OrderBook;
use crate::domains::market::engine::types::{Amendment, NewOrder, OrderEntry};
use crate::domains::market::engine::Engine;
use crate::domains::market::models::{Order, OrderFilter, PlacedOrder};
use crate::shared::database::Store;
use crate::shared::errors::MarketError;
use crate::shared::utils::clock::{Clock, SystemClock};
use crate::shared::utils::id_generator::IdGenerator;

use super::commands::{EngineCommand, Responder};
use super::config::EngineConfig;
use super::worker::EngineWorker;

/// 매칭 엔진
///
/// `start()` 전에는 모든 명령이 실패합니다.
pub struct MatchingEngine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    /// 워커 명령 채널 (실행 중일 때만 Some)
    command_tx: Mutex<Option<mpsc::Sender<EngineCommand>>>,
    /// 워커 task 핸들 (start/stop 직렬화)
    worker: AsyncMutex<Option<JoinHandle<()>>>,
}

impl MatchingEngine {
    pub fn new(store: Arc<dyn Store>, config: EngineConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    pub fn with_clock(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            store,
            clock,
            config,
            command_tx: Mutex::new(None),
            worker: AsyncMutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.command_tx.lock().is_some()
    }

    /// 명령 전송 후 응답 대기
    async fn dispatch<T>(
        &self,
        build: impl FnOnce(Responder<T>) -> EngineCommand,
    ) -> Result<T, MarketError> {
        let command_tx = self
            .command_tx
            .lock()
            .clone()
            .ok_or_else(|| MarketError::Persistence("matching engine is not running".to_string()))?;

        let (response_tx, response_rx) = oneshot::channel();
        command_tx.try_send(build(response_tx)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                MarketError::ConcurrencyConflict("matching queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                MarketError::Persistence("matching engine stopped".to_string())
            }
        })?;

        // 큐에 들어간 명령은 커밋될 수 있으므로 결과를 끝까지 기다림
        response_rx.await.map_err(|_| {
            MarketError::Persistence("matching worker dropped the request".to_string())
        })?
    }
}

#[async_trait]
impl Engine for MatchingEngine {
    async fn place_order(&self, request: NewOrder) -> Result<PlacedOrder, MarketError> {
        self.dispatch(|response| EngineCommand::PlaceOrder { request, response }).await
    }

    async fn cancel_order(&self, order_id: u64, user_id: u64) -> Result<Order, MarketError> {
        self.dispatch(|response| EngineCommand::CancelOrder { order_id, user_id, response })
            .await
    }

    async fn amend_order(
        &self,
        order_id: u64,
        user_id: u64,
        amendment: Amendment,
    ) -> Result<Order, MarketError> {
        self.dispatch(|response| EngineCommand::AmendOrder {
            order_id,
            user_id,
            amendment,
            response,
        })
        .await
    }

    async fn resting_sells(&self) -> Result<Vec<OrderEntry>, MarketError> {
        self.dispatch(|response| EngineCommand::RestingSells { response }).await
    }

    /// 엔진 시작
    ///
    /// # 처리 과정
    /// 1. 저장소에서 open 매도 주문 로드 → 호가창 구성
    /// 2. 마지막 주문/leg ID 로 ID 생성기 초기화
    /// 3. 워커 task 시작
    async fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            anyhow::bail!("matching engine is already running");
        }

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 1. 호가창 복구
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

        let open_sells = self
            .store
            .list_open_sells(&OrderFilter::default())
            .await
            .context("Failed to load open sell orders")?;
        let mut book = OrderBook::new();
        for order in &open_sells {
            book.insert(OrderEntry::from(order))
                .with_context(|| format!("Failed to restore order {}", order.id))?;
        }

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 2. ID 생성기 초기화
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

        let last_order_id = self.store.max_order_id().await.context("Failed to read last order id")?;
        let last_trade_id = self.store.max_trade_id().await.context("Failed to read last trade id")?;

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // 3. 워커 시작
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

        let (command_tx, command_rx) = mpsc::channel(self.config.queue_capacity);
        let engine_worker = EngineWorker::new(
            Arc::clone(&self.store),
            book,
            Arc::clone(&self.clock),
            IdGenerator::starting_after(last_order_id),
            IdGenerator::starting_after(last_trade_id),
            self.config.clone(),
        );
        *worker = Some(tokio::spawn(engine_worker.run(command_rx)));
        *self.command_tx.lock() = Some(command_tx);

        info!(
            resting = open_sells.len(),
            last_order_id,
            last_trade_id,
            policy = %self.config.unfilled_buy_policy,
            "matching engine started"
        );
        Ok(())
    }

    /// 엔진 정지 (대기 중인 명령은 모두 처리 후 종료)
    async fn stop(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        let Some(handle) = worker.take() else {
            return Ok(());
        };

        // 송신측을 닫으면 워커는 남은 명령을 처리한 뒤 종료
        self.command_tx.lock().take();
        handle.await.context("Matching worker panicked")?;

        info!("matching engine stopped");
        Ok(())
    }
}

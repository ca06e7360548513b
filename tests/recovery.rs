// =====================================================
// 재시작 복구 테스트
// =====================================================
// 목적: 엔진을 새로 시작했을 때 저장소의 open 매도 주문으로
//       호가창이 같은 우선순위로 복구되고, ID 가 이어지는지 확인
// =====================================================

mod common;

use common::*;
use energy_market::domains::market::engine::EngineConfig;
use energy_market::domains::market::models::{MatchOutcome, OrderStatus};

/// 테스트: 재시작 후 호가창 순서와 잔량 복구
#[tokio::test]
async fn test_book_restored_after_restart() {
    let ctx = setup_test().await;

    let early = sell(&ctx, USER_A, 5, 50).await;
    let late = sell(&ctx, USER_C, 5, 50).await;
    let cheap = sell(&ctx, USER_C, 1, 45).await;
    let canceled = sell(&ctx, USER_A, 3, 40).await;
    ctx.orders.cancel_order(USER_A, canceled.order.id).await.unwrap();
    buy(&ctx, USER_B, 3, 50).await;

    let before = resting(&ctx).await;
    teardown_test(&ctx).await;

    let restarted = setup_test_on(ctx.store.clone(), EngineConfig::default()).await;
    let after = resting(&restarted).await;
    assert_eq!(after, before);
    assert_eq!(
        after.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![early.order.id, late.order.id]
    );
    assert_eq!(after[0].remaining_amount, d(3));
    assert!(!after.iter().any(|e| e.id == cheap.order.id || e.id == canceled.order.id));

    // 복구된 호가창으로 계속 매칭 (먼저 들어온 주문 우선)
    let bid = buy(&restarted, USER_B, 4, 50).await;
    assert_eq!(bid.outcome, MatchOutcome::Filled);
    assert_eq!(order(&restarted, early.order.id).await.status, OrderStatus::Completed);
    assert_eq!(order(&restarted, late.order.id).await.remaining_amount, d(4));

    teardown_test(&restarted).await;
}

/// 테스트: 재시작 후 주문/leg ID 가 겹치지 않음
#[tokio::test]
async fn test_ids_continue_after_restart() {
    let ctx = setup_test().await;

    sell(&ctx, USER_A, 5, 50).await;
    let bid = buy(&ctx, USER_B, 2, 50).await;
    let last_leg = ctx.store.all_trades().iter().map(|l| l.id).max().unwrap();
    teardown_test(&ctx).await;

    let restarted = setup_test_on(ctx.store.clone(), EngineConfig::default()).await;
    let next = buy(&restarted, USER_C, 1, 50).await;

    assert!(next.order.id > bid.order.id);
    assert!(next.trades[0].id > last_leg);
    assert_eq!(restarted.store.all_trades().len(), 4);

    teardown_test(&restarted).await;
}

/// 테스트: keep_open 으로 남은 매수는 재시작 후에도 호가창에 들어가지 않음
#[tokio::test]
async fn test_open_buys_are_not_restored_into_book() {
    let ctx = setup_test().await;

    let bid = buy(&ctx, USER_B, 3, 40).await;
    assert_eq!(bid.order.status, OrderStatus::Open);
    teardown_test(&ctx).await;

    let restarted = setup_test_on(ctx.store.clone(), EngineConfig::default()).await;
    assert!(book_ids(&restarted).await.is_empty());
    assert_eq!(order(&restarted, bid.order.id).await.status, OrderStatus::Open);

    teardown_test(&restarted).await;
}

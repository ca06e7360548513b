// =====================================================
// 잔고 / 정산 원자성 테스트
// =====================================================
// 목적:
// - 체결마다 돈과 에너지가 정확히 이동하고 총량이 보존되는지 확인
// - 저장소 장애 시 주문 하나 단위로 전부 반영되거나 전혀 반영되지 않는지 확인
// - 응답 유실 후 재시도가 같은 체결을 두 번 적용하지 않는지 확인
// =====================================================

mod common;

use common::*;
use energy_market::domains::market::engine::{Engine, EngineConfig, NewOrder};
use energy_market::domains::market::models::{MatchOutcome, OrderSide, OrderStatus};
use energy_market::shared::database::Store;
use energy_market::shared::errors::MarketError;

fn totals(ctx: &TestContext) -> (rust_decimal::Decimal, rust_decimal::Decimal) {
    ctx.store
        .all_balances()
        .iter()
        .fold((d(0), d(0)), |(money, energy), b| (money + b.money, energy + b.energy))
}

/// 테스트: 처음 조회하는 사용자는 기본 잔고 (저장되지 않음)
#[tokio::test]
async fn test_default_balance_for_new_user() {
    let ctx = setup_test().await;

    let b = balance(&ctx, 77).await;
    assert_eq!((b.user_id, b.money, b.energy), (77, d(10_000), d(1_000)));
    assert!(ctx.store.all_balances().is_empty());

    teardown_test(&ctx).await;
}

/// 테스트: 여러 체결 후에도 돈/에너지 총량 보존
#[tokio::test]
async fn test_totals_conserved_across_trades() {
    let ctx = setup_test().await;

    sell(&ctx, USER_A, 4, 50).await;
    sell(&ctx, USER_C, 4, 52).await;
    buy(&ctx, USER_B, 6, 55).await;
    sell(&ctx, USER_B, 3, 49).await;
    buy(&ctx, USER_A, 3, 49).await;

    let users = ctx.store.all_balances().len() as i64;
    assert_eq!(totals(&ctx), (d(10_000 * users), d(1_000 * users)));
    assert!(ctx.store.all_balances().iter().all(|b| b.is_non_negative()));

    // 매수 leg 합계 == 매도 leg 합계
    let legs = ctx.store.all_trades();
    let bought: rust_decimal::Decimal = legs.iter().filter(|l| l.side == OrderSide::Buy).map(|l| l.amount).sum();
    let sold: rust_decimal::Decimal = legs.iter().filter(|l| l.side == OrderSide::Sell).map(|l| l.amount).sum();
    assert_eq!(bought, sold);
    assert_eq!(bought, d(9));

    teardown_test(&ctx).await;
}

/// 테스트: 두 번째 체결 기록 중 실패 → 주문 전체 롤백
#[tokio::test]
async fn test_failure_mid_run_rolls_back_everything() {
    let ctx = setup_test().await;

    let first = sell(&ctx, USER_A, 2, 50).await;
    let second = sell(&ctx, USER_C, 2, 51).await;
    let orders_before = ctx.store.all_orders();

    // 첫 체결의 두 leg 는 성공, 두 번째 체결에서 실패
    ctx.store.fail_trade_insert_after(2);
    let err = place(&ctx, USER_B, OrderSide::Buy, 4, 60).await.unwrap_err();
    assert!(matches!(err, MarketError::Persistence(_)));
    ctx.store.clear_faults();

    assert!(ctx.store.all_trades().is_empty());
    assert_eq!(ctx.store.all_orders(), orders_before);
    assert_eq!(balance(&ctx, USER_A).await.money, d(10_000));
    assert_eq!(balance(&ctx, USER_B).await.energy, d(1_000));
    assert_eq!(book_ids(&ctx).await, vec![first.order.id, second.order.id]);

    // 장애가 사라지면 같은 주문이 정상 처리됨
    let bid = buy(&ctx, USER_B, 4, 60).await;
    assert_eq!(bid.outcome, MatchOutcome::Filled);
    assert_eq!(ctx.store.all_trades().len(), 4);

    teardown_test(&ctx).await;
}

/// 테스트: 매도자 에너지가 중간에 부족해지면 전체 중단
#[tokio::test]
async fn test_seller_short_of_energy_aborts_run() {
    let config = EngineConfig::default().with_balance_defaults(d(1_000_000), d(1_000));
    let ctx = setup_test_with(config).await;

    // 각 주문은 따로 보면 가능하지만 합계는 보유 에너지를 넘음
    sell(&ctx, USER_A, 800, 50).await;
    let stale = sell(&ctx, USER_A, 800, 51).await;

    // 800 체결 후 남은 에너지 200 < 두 번째 체결 201
    let err = place(&ctx, USER_B, OrderSide::Buy, 1_001, 60).await.unwrap_err();
    match &err {
        MarketError::ConcurrencyConflict(message) => {
            assert!(message.contains(&stale.order.id.to_string()));
        }
        other => panic!("expected ConcurrencyConflict, got {:?}", other),
    }
    // 매도자 잔고는 매수자에게 노출되지 않음
    assert!(!err.to_string().contains("200"));

    assert!(ctx.store.all_trades().is_empty());
    let a = balance(&ctx, USER_A).await;
    assert_eq!((a.money, a.energy), (d(1_000_000), d(1_000)));
    assert!(ctx.store.all_orders().iter().all(|o| o.side == OrderSide::Sell));
    assert_eq!(book_ids(&ctx).await.len(), 2);

    teardown_test(&ctx).await;
}

/// 테스트: 에너지가 모자란 매도 주문에 닿는 매수는 매번 같은 충돌 에러, 매도자가 취소하면 정상화
#[tokio::test]
async fn test_stale_sell_blocks_buys_until_canceled() {
    let ctx = setup_test().await;

    sell(&ctx, USER_A, 800, 10).await;
    let stale = sell(&ctx, USER_A, 800, 11).await;
    buy(&ctx, USER_B, 800, 10).await;
    // A 의 남은 에너지는 200, 남은 매도 주문은 800
    assert_eq!(balance(&ctx, USER_A).await.energy, d(200));

    for _ in 0..2 {
        let err = place(&ctx, USER_C, OrderSide::Buy, 300, 20).await.unwrap_err();
        assert!(matches!(err, MarketError::ConcurrencyConflict(_)));
        assert!(!err.to_string().contains("200"));
    }
    assert_eq!(book_ids(&ctx).await, vec![stale.order.id]);
    assert_eq!(order(&ctx, stale.order.id).await.status, OrderStatus::Open);
    assert_eq!(ctx.store.all_trades().len(), 2);
    let c = balance(&ctx, USER_C).await;
    assert_eq!((c.money, c.energy), (d(10_000), d(1_000)));

    ctx.orders.cancel_order(USER_A, stale.order.id).await.unwrap();
    sell(&ctx, USER_A, 200, 12).await;

    let bid = buy(&ctx, USER_C, 300, 20).await;
    assert_eq!(bid.outcome, MatchOutcome::PartiallyFilled);
    assert_eq!(balance(&ctx, USER_A).await.energy, d(0));

    teardown_test(&ctx).await;
}

/// 테스트: 커밋이 일시적으로 실패하면 재시도 후 성공
#[tokio::test]
async fn test_transient_commit_failure_is_retried() {
    let ctx = setup_test().await;

    let ask = sell(&ctx, USER_A, 5, 50).await;
    ctx.store.fail_next_commits(1);
    let bid = buy(&ctx, USER_B, 3, 60).await;

    assert_eq!(bid.outcome, MatchOutcome::Filled);
    assert_eq!(ctx.store.all_trades().len(), 2);
    assert_eq!(order(&ctx, ask.order.id).await.remaining_amount, d(2));
    assert_eq!(balance(&ctx, USER_B).await.money, d(9_850));

    teardown_test(&ctx).await;
}

/// 테스트: 커밋은 됐지만 응답이 유실됨 → 재시도가 같은 체결을 다시 적용하지 않음
#[tokio::test]
async fn test_lost_commit_ack_is_not_applied_twice() {
    let ctx = setup_test().await;

    let ask = sell(&ctx, USER_A, 5, 50).await;
    ctx.store.lose_next_commit_acks(1);
    let bid = buy(&ctx, USER_B, 3, 60).await;

    assert_eq!(bid.outcome, MatchOutcome::Filled);
    assert_eq!(bid.trades.len(), 1);
    assert_eq!(bid.order.status, OrderStatus::Completed);

    assert_eq!(ctx.store.all_trades().len(), 2);
    assert_eq!(order(&ctx, ask.order.id).await.remaining_amount, d(2));
    let a = balance(&ctx, USER_A).await;
    assert_eq!((a.money, a.energy), (d(10_150), d(997)));
    let b = balance(&ctx, USER_B).await;
    assert_eq!((b.money, b.energy), (d(9_850), d(1_003)));

    // 호가창도 한 번만 차감됨
    let entries = ctx.engine.resting_sells().await.unwrap();
    assert_eq!(entries[0].remaining_amount, d(2));

    teardown_test(&ctx).await;
}

/// 테스트: 재시도 횟수를 넘는 일시적 실패 → Persistence, 변경 없음
#[tokio::test]
async fn test_retries_exhausted() {
    let ctx = setup_test().await;

    let ask = sell(&ctx, USER_A, 5, 50).await;
    let attempts = ctx.config.max_commit_attempts;
    ctx.store.fail_next_commits(attempts);

    let err = place(&ctx, USER_B, OrderSide::Buy, 3, 60).await.unwrap_err();
    assert!(matches!(err, MarketError::Persistence(_)));
    assert!(ctx.store.all_trades().is_empty());
    assert_eq!(order(&ctx, ask.order.id).await.remaining_amount, d(5));

    teardown_test(&ctx).await;
}

/// 테스트: 치명적 커밋 실패 → 재시도 없이 Persistence
#[tokio::test]
async fn test_fatal_commit_failure() {
    let ctx = setup_test().await;

    ctx.store.fail_next_commits_fatally(1);
    let err = place(&ctx, USER_A, OrderSide::Sell, 5, 50).await.unwrap_err();
    assert!(matches!(err, MarketError::Persistence(_)));
    assert!(ctx.store.all_orders().is_empty());
    assert!(book_ids(&ctx).await.is_empty());

    // 다음 주문은 정상 처리
    let ask = sell(&ctx, USER_A, 5, 50).await;
    assert_eq!(book_ids(&ctx).await, vec![ask.order.id]);
    assert!(ctx.store.get_order(ask.order.id).await.unwrap().is_some());

    teardown_test(&ctx).await;
}

/// 테스트: 엔진을 거치지 않고 잔고가 바뀌면 주문 시점 재확인에서 걸림
#[tokio::test]
async fn test_balance_changed_after_precheck() {
    use energy_market::domains::market::models::Balance;

    let ctx = setup_test().await;
    ctx.store.seed_balance(Balance { user_id: USER_B, money: d(100), energy: d(0) });

    // 서비스의 사전 검사를 건너뛰고 엔진에 바로 제출
    let err = ctx
        .engine
        .place_order(NewOrder { user_id: USER_B, side: OrderSide::Buy, amount: d(3), price: d(50) })
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::ConcurrencyConflict(_)));
    assert!(ctx.store.all_orders().is_empty());

    teardown_test(&ctx).await;
}

// ==========================================
// 订单工作流端到端测试
// ==========================================
// 场景: 订单完成 → 扣减库存 → 库存告警通知；订单取消 → 回补库存
// ==========================================


use test_helpers::{base_time, default_env, order, TestEnv};
use umkm_automation::api::ApiError;
use umkm_automation::domain::{
    NotificationCategory, NotificationPriority, NotificationType, OrderStatus,
    StockTransactionKind,
};
use umkm_automation::repository::AutomationStore;
use umkm_automation::workflow::TriggerOutcome;

fn count_financial_records(env: &TestEnv, reference: &str) -> i64 {
    let conn = env.store.connection();
    let conn = conn.lock().unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM financial_record WHERE reference = ?1",
        [reference],
        |row| row.get(0),
    )
    .unwrap()
}

async fn stock_of(env: &TestEnv, ingredient_id: &str) -> f64 {
    env.store
        .get_ingredient(ingredient_id)
        .await
        .unwrap()
        .unwrap()
        .current_stock
}

#[tokio::test]
async fn test_completed_order_deducts_stock_and_raises_alerts() {
    let env = default_env();
    env.store.upsert_order(&order("o1", "roti", 60, 20)).unwrap();

    let outcome = env.api.complete_order("o1").await.unwrap();
    assert!(matches!(outcome, TriggerOutcome::Enqueued { .. }));
    env.api.wait_idle().await;

    // 面粉 6 kg、糖 3 kg（不足，扣到 0）、蛋 60 个（不足，扣到 0）
    assert!((stock_of(&env, "flour").await - 4.0).abs() < 1e-9);
    assert_eq!(stock_of(&env, "sugar").await, 0.0);
    assert_eq!(stock_of(&env, "eggs").await, 0.0);

    let order = env.store.get_order("o1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);

    let txs = env.store.list_stock_transactions_by_reference("o1").await.unwrap();
    assert_eq!(txs.len(), 3);
    assert!(txs.iter().all(|tx| tx.kind == StockTransactionKind::Usage));
    let sugar_tx = txs.iter().find(|tx| tx.ingredient_id == "sugar").unwrap();
    assert!((sugar_tx.quantity + 2.0).abs() < 1e-9);
    assert_eq!(count_financial_records(&env, "o1"), 1);

    // 三条库存通知：面粉低库存（Warning），糖与蛋断货（Error / High）
    let inventory = env.api.notifications_by_category(NotificationCategory::Inventory);
    assert_eq!(inventory.len(), 3);
    let flour = inventory
        .iter()
        .find(|n| n.data["ingredient_id"] == "flour")
        .unwrap();
    assert_eq!(flour.kind, NotificationType::Warning);
    assert_eq!(flour.priority, NotificationPriority::Medium);
    let sugar = inventory
        .iter()
        .find(|n| n.data["ingredient_id"] == "sugar")
        .unwrap();
    assert_eq!(sugar.kind, NotificationType::Error);
    assert_eq!(sugar.priority, NotificationPriority::High);

    // 通知同时落库
    let stored = env.api.stored_notifications(10).await.unwrap();
    assert_eq!(stored.len(), 3);

    let status = env.api.queue_status();
    assert_eq!(status.failed, 0);
    // order.completed + 3 条库存事件
    assert_eq!(status.processed, 4);
}

#[tokio::test]
async fn test_duplicate_completion_is_ignored() {
    let env = default_env();
    env.store.upsert_order(&order("o1", "roti", 10, 20)).unwrap();

    env.api.complete_order("o1").await.unwrap();
    env.api.complete_order("o1").await.unwrap();
    env.api.wait_idle().await;

    assert!((stock_of(&env, "flour").await - 9.0).abs() < 1e-9);
    assert!((stock_of(&env, "sugar").await - 1.5).abs() < 1e-9);
    assert_eq!(stock_of(&env, "eggs").await, 0.0);
    assert_eq!(count_financial_records(&env, "o1"), 1);
}

#[tokio::test]
async fn test_cancel_restores_deducted_stock() {
    let env = default_env();
    env.store.upsert_order(&order("o1", "roti", 60, 20)).unwrap();

    env.api.complete_order("o1").await.unwrap();
    env.api.wait_idle().await;

    env.api
        .cancel_order("o1", Some("customer request".to_string()))
        .await
        .unwrap();
    env.api.wait_idle().await;

    // 回补的是实际扣减量，而非配方需求量
    assert!((stock_of(&env, "flour").await - 10.0).abs() < 1e-9);
    assert!((stock_of(&env, "sugar").await - 2.0).abs() < 1e-9);
    assert!((stock_of(&env, "eggs").await - 10.0).abs() < 1e-9);
    assert_eq!(count_financial_records(&env, "o1"), 0);

    let order = env.store.get_order("o1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);

    // 再次取消不会重复回补
    env.api.cancel_order("o1", None).await.unwrap();
    env.api.wait_idle().await;
    assert!((stock_of(&env, "flour").await - 10.0).abs() < 1e-9);

    let adjustments = env
        .store
        .list_stock_transactions_by_reference("o1")
        .await
        .unwrap()
        .into_iter()
        .filter(|tx| tx.kind == StockTransactionKind::Adjustment)
        .count();
    assert_eq!(adjustments, 3);
}

#[tokio::test]
async fn test_cancel_before_completion_changes_nothing() {
    let env = default_env();
    env.store.upsert_order(&order("o1", "roti", 60, 20)).unwrap();

    env.api.cancel_order("o1", None).await.unwrap();
    env.api.wait_idle().await;

    assert!((stock_of(&env, "flour").await - 10.0).abs() < 1e-9);
    assert!(env.api.notifications().is_empty());
}

#[tokio::test]
async fn test_unknown_order_rejected() {
    let env = default_env();
    let err = env.api.complete_order("missing").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    assert_eq!(env.api.queue_status().processed, 0);
}

#[tokio::test]
async fn test_missing_recipe_is_skipped() {
    let env = default_env();
    let mut o = order("o2", "unknown-recipe", 5, 20);
    o.items.push(umkm_automation::domain::OrderItem {
        id: "o2-2".to_string(),
        recipe_id: "roti".to_string(),
        quantity: 10,
    });
    env.store.upsert_order(&o).unwrap();

    env.api.complete_order("o2").await.unwrap();
    env.api.wait_idle().await;

    assert!((stock_of(&env, "flour").await - 9.0).abs() < 1e-9);
    assert_eq!(env.api.queue_status().failed, 0);
}

#[tokio::test]
async fn test_failed_settlement_leaves_no_partial_writes() {
    let env = default_env();
    env.store.upsert_order(&order("o1", "roti", 10, 20)).unwrap();
    {
        let conn = env.store.connection();
        let conn = conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_income BEFORE INSERT ON financial_record
             BEGIN SELECT RAISE(ABORT, 'ledger offline'); END;",
        )
        .unwrap();
    }

    env.api.complete_order("o1").await.unwrap();
    env.api.wait_idle().await;

    // 收入写入失败：库存、消耗流水、客户统计全部回滚
    assert_eq!(env.api.queue_status().failed, 1);
    assert!((stock_of(&env, "flour").await - 10.0).abs() < 1e-9);
    assert!(env
        .store
        .list_stock_transactions_by_reference("o1")
        .await
        .unwrap()
        .is_empty());
    assert!(env.store.get_customer_stats("cust-sari").await.unwrap().is_none());

    {
        let conn = env.store.connection();
        let conn = conn.lock().unwrap();
        conn.execute_batch("DROP TRIGGER reject_income;").unwrap();
    }

    // 重试不会被当作重复事件跳过
    env.api.complete_order("o1").await.unwrap();
    env.api.wait_idle().await;
    assert!((stock_of(&env, "flour").await - 9.0).abs() < 1e-9);
    assert_eq!(count_financial_records(&env, "o1"), 1);
}

#[tokio::test]
async fn test_completion_updates_customer_stats() {
    let env = default_env();
    env.store.upsert_order(&order("o1", "roti", 10, 20)).unwrap();
    let mut second = order("o2", "roti", 10, 30);
    second.total_amount = 50_000.0;
    env.store.upsert_order(&second).unwrap();

    env.api.complete_order("o1").await.unwrap();
    env.api.complete_order("o2").await.unwrap();
    // 重复完成不重复计数
    env.api.complete_order("o1").await.unwrap();
    env.api.wait_idle().await;

    let stats = env
        .store
        .get_customer_stats("cust-sari")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.total_orders, 2);
    assert_eq!(stats.total_spent, 200_000.0);
    assert_eq!(stats.average_order_value, 100_000.0);
    assert_eq!(stats.last_order_date, Some(base_time().date()));

    // 无客户的订单不产生统计
    let mut walk_in = order("o3", "roti", 10, 40);
    walk_in.customer_id = None;
    env.store.upsert_order(&walk_in).unwrap();
    env.api.complete_order("o3").await.unwrap();
    env.api.wait_idle().await;
    assert_eq!(
        env.store
            .get_customer_stats("cust-sari")
            .await
            .unwrap()
            .unwrap()
            .total_orders,
        2
    );
}

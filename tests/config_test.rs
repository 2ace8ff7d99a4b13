// ==========================================
// 配置加载集成测试
// ==========================================
// 场景: config_kv 覆写 → AppState 装配 → 引擎使用覆写后的参数
// ==========================================


use test_helpers::create_test_db;
use umkm_automation::app::AppState;
use umkm_automation::config::{config_keys, AutomationConfig, ConfigManager};
use umkm_automation::repository::AutomationStore;

#[tokio::test]
async fn test_overrides_reach_the_api() {
    let (_tmp, db_path) = create_test_db();
    {
        let manager = ConfigManager::new(&db_path).unwrap();
        manager
            .set_global_config_value(config_keys::RECALC_DELAY_SECS, "10")
            .unwrap();
        manager
            .set_global_config_value(config_keys::ORDERING_COST, "75000")
            .unwrap();
        manager
            .set_global_config_value(config_keys::MAX_DAILY_WORKLOAD_HOURS, "not-a-number")
            .unwrap();
    }

    let state = AppState::new(db_path).await.unwrap();
    let config = state.api.config();
    assert_eq!(config.cost.recalc_delay_secs, 10);
    assert_eq!(config.inventory.ordering_cost, 75_000.0);
    // 格式错误回退默认值
    assert_eq!(
        config.production.max_daily_workload_hours,
        AutomationConfig::default().production.max_daily_workload_hours
    );
}

#[tokio::test]
async fn test_invalid_combination_falls_back_to_defaults() {
    let (_tmp, db_path) = create_test_db();
    {
        let manager = ConfigManager::new(&db_path).unwrap();
        manager
            .set_global_config_value(config_keys::WORK_START_HOUR, "22")
            .unwrap();
        manager
            .set_global_config_value(config_keys::WORK_END_HOUR, "8")
            .unwrap();
    }

    let state = AppState::new(db_path).await.unwrap();
    assert_eq!(state.api.config(), &AutomationConfig::default());
}

#[tokio::test]
async fn test_snapshot_round_trip_through_shared_connection() {
    let (_tmp, db_path) = create_test_db();
    let state = AppState::new(db_path).await.unwrap();

    state
        .config_manager
        .set_global_config_value(config_keys::LOW_MARGIN_PERCENT, "30")
        .unwrap();
    let snapshot = state.config_manager.get_config_snapshot().unwrap();
    assert!(snapshot.contains(config_keys::LOW_MARGIN_PERCENT));

    state
        .config_manager
        .set_global_config_value(config_keys::LOW_MARGIN_PERCENT, "40")
        .unwrap();
    state
        .config_manager
        .restore_config_from_snapshot(&snapshot)
        .unwrap();

    let reloaded = state.config_manager.load_automation_config().unwrap();
    assert_eq!(reloaded.notification.low_margin_percent, 30.0);

    // 默认运营成本已写入同一数据库
    let costs = state.store.list_operational_costs().await.unwrap();
    assert!(!costs.is_empty());
}

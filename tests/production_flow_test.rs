// ==========================================
// 生产排程流程测试
// ==========================================
// 场景: 订单 → 排程（工时/时段/阻塞/冲突）→ 任务状态流转 → 完工通知
// ==========================================


use chrono::NaiveTime;
use test_helpers::{base_time, default_env, order};
use umkm_automation::api::ApiError;
use umkm_automation::domain::{
    Ingredient, NotificationCategory, NotificationType, TaskStatus,
};
use umkm_automation::repository::AutomationStore;

fn plenty_of_stock() -> Vec<Ingredient> {
    vec![
        Ingredient::new("flour", "Tepung", "kg", 50.0, 5.0, Some(12_000.0)),
        Ingredient::new("sugar", "Gula", "kg", 20.0, 1.0, Some(15_000.0)),
        Ingredient::new("eggs", "Telur", "butir", 200.0, 0.0, Some(2_000.0)),
    ]
}

#[tokio::test]
async fn test_three_batches_scheduled_from_work_start() {
    let env = default_env();
    let recipes = env.store.list_recipes().await.unwrap();
    let date = base_time().date();
    let orders = vec![order("o1", "roti", 30, 20)];

    let schedule = env
        .api
        .generate_production_schedule(date, &orders, &plenty_of_stock(), &recipes)
        .unwrap();

    assert_eq!(schedule.tasks.len(), 1);
    let task = &schedule.tasks[0];
    assert_eq!(task.batch_count, 3);
    // (30 + 45) / 60 + 2 × 45 × 0.8 / 60
    assert!((task.estimated_duration_hours - 2.45).abs() < 1e-9);
    assert_eq!(task.status, TaskStatus::Planned);
    assert_eq!(
        task.planned_start,
        Some(date.and_time(NaiveTime::from_hms_opt(6, 0, 0).unwrap()))
    );
    assert_eq!(
        task.planned_end,
        Some(date.and_time(NaiveTime::from_hms_opt(8, 27, 0).unwrap()))
    );
    assert!(schedule.conflicts.is_empty());

    // 需求换算为库存单位：30 份 × 100 g = 3 kg
    let flour = task
        .ingredient_requirements
        .iter()
        .find(|r| r.ingredient_id == "flour")
        .unwrap();
    assert!((flour.required - 3.0).abs() < 1e-9);

    assert!(env.api.schedule(date).is_some());
}

#[tokio::test]
async fn test_shortage_blocks_task_and_notifies_conflict() {
    let env = default_env();
    let recipes = env.store.list_recipes().await.unwrap();
    let ingredients = env.store.list_ingredients().await.unwrap();
    let date = base_time().date();
    let orders = vec![order("o1", "roti", 30, 20)];

    // 蛋只有 10 个，需要 30 个
    let schedule = env
        .api
        .generate_production_schedule(date, &orders, &ingredients, &recipes)
        .unwrap();

    let task = &schedule.tasks[0];
    assert_eq!(task.status, TaskStatus::Blocked);
    assert!(task.blocked_reason.is_some());
    assert!(task.planned_start.is_none());

    assert_eq!(schedule.conflicts.len(), 1);
    assert_eq!(schedule.conflicts[0].ingredient_id, "eggs");
    assert_eq!(schedule.conflicts[0].affected_tasks, vec![task.id.clone()]);

    let notifications = env.api.schedule_notifications(&schedule);
    assert!(notifications
        .iter()
        .any(|n| n.kind == NotificationType::Error && n.data["ingredient_id"] == "eggs"));
}

#[tokio::test]
async fn test_task_completion_publishes_batch_notification() {
    let env = default_env();
    let recipes = env.store.list_recipes().await.unwrap();
    let date = base_time().date();
    let orders = vec![order("o1", "roti", 30, 20)];

    let schedule = env
        .api
        .generate_production_schedule(date, &orders, &plenty_of_stock(), &recipes)
        .unwrap();
    let task_id = schedule.tasks[0].id.clone();

    let task = env
        .api
        .update_task_status(date, &task_id, TaskStatus::InProgress)
        .unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);

    env.api
        .update_task_status(date, &task_id, TaskStatus::Completed)
        .unwrap();
    env.api.wait_idle().await;

    // 重复提交 Completed 不再触发事件
    env.api
        .update_task_status(date, &task_id, TaskStatus::Completed)
        .unwrap();
    env.api.wait_idle().await;

    let production = env.api.notifications_by_category(NotificationCategory::Production);
    assert_eq!(production.len(), 1);
    assert_eq!(production[0].kind, NotificationType::Success);
    assert_eq!(env.api.queue_status().processed, 1);

    // Completed 为终态
    let err = env
        .api
        .update_task_status(date, &task_id, TaskStatus::Planned)
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn test_unknown_schedule_or_task_is_not_found() {
    let env = default_env();
    let date = base_time().date();

    let err = env
        .api
        .update_task_status(date, "task_x", TaskStatus::Completed)
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let recipes = env.store.list_recipes().await.unwrap();
    let orders = [order("o1", "roti", 10, 20)];
    env.api
        .generate_production_schedule(date, &orders, &plenty_of_stock(), &recipes)
        .unwrap();
    let err = env
        .api
        .update_task_status(date, "task_x", TaskStatus::Completed)
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_unknown_recipe_is_rejected() {
    let env = default_env();
    let recipes = env.store.list_recipes().await.unwrap();
    let date = base_time().date();

    let result = env.api.generate_production_schedule(
        date,
        &[order("o1", "missing", 10, 20)],
        &plenty_of_stock(),
        &recipes,
    );
    assert!(result.is_err());
}

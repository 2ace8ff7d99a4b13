// ==========================================
// UMKM 餐饮经营自动化 - 自动化 API
// ==========================================
// 职责: 对外统一入口（事件触发、排程、库存分析、HPP、通知）
// 架构: API 层 → Engine 层 / Workflow 层 → AutomationStore
// 说明: 排程结果缓存在内存中，供任务状态更新使用
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::AutomationConfig;
use crate::domain::{
    FinancialMetrics, Ingredient, InventoryAnalysis, InventoryForecast, NotificationCategory,
    NotificationSummary, Order, OrderStatus, PriceTier, ProductionSchedule, ProductionTask,
    PurchaseOrderPlan, Recipe, RecipeCost, SmartNotification, TaskStatus, UsageRecord,
};
use crate::engine::{
    alerts, suggest_selling_prices, BatchRecalcReport, Clock, CostCascade, InventoryAnalyzer,
    NotificationCenter, NotificationSynthesizer, PriceMonitorReport, ProductionScheduler,
};
use crate::repository::AutomationStore;
use crate::workflow::{
    register_default_handlers, HandlerServices, QueueStatus, TriggerOutcome, WorkflowBus,
    WorkflowEvent,
};
use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::instrument;

/// 用量统计窗口（天）
const USAGE_WINDOW_DAYS: i64 = 30;
/// 每日巡检覆盖的交付天数
const REVIEW_HORIZON_DAYS: i64 = 7;

/// 每日巡检结果
#[derive(Debug, Clone, Serialize)]
pub struct DailyReview {
    pub date: NaiveDate,
    pub inventory: Vec<InventoryAnalysis>,
    pub purchase_orders: PurchaseOrderPlan,
    pub schedules: Vec<ProductionSchedule>,
    pub notifications: Vec<SmartNotification>,
}

// ==========================================
// AutomationApi
// ==========================================

pub struct AutomationApi {
    store: Arc<dyn AutomationStore>,
    config: Arc<AutomationConfig>,
    clock: Arc<dyn Clock>,
    bus: WorkflowBus,
    analyzer: Arc<InventoryAnalyzer>,
    scheduler: ProductionScheduler,
    cascade: Arc<CostCascade>,
    synthesizer: NotificationSynthesizer,
    notifications: Arc<NotificationCenter>,
    /// 日期 → 最近一次生成的排程
    schedules: Mutex<HashMap<NaiveDate, ProductionSchedule>>,
}

impl AutomationApi {
    /// 装配引擎与事件总线，并注册默认处理器
    ///
    /// # 参数
    /// - store: 数据存储
    /// - config: 自动化配置
    /// - clock: 时钟（生产环境 SystemClock，测试 ManualClock）
    pub fn new(
        store: Arc<dyn AutomationStore>,
        config: AutomationConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = Arc::new(config);
        let analyzer = Arc::new(InventoryAnalyzer::new(config.inventory.clone()));
        let cascade = Arc::new(CostCascade::new(
            Arc::clone(&store),
            config.cost.clone(),
            Arc::clone(&clock),
        ));
        let notifications = Arc::new(NotificationCenter::new(
            Arc::clone(&store),
            config.notification.log_capacity,
        ));

        let bus = WorkflowBus::with_config(Arc::clone(&clock), &config.bus);
        let services = HandlerServices {
            store: Arc::clone(&store),
            config: Arc::clone(&config),
            analyzer: Arc::clone(&analyzer),
            cascade: Arc::clone(&cascade),
            notifications: Arc::clone(&notifications),
            clock: Arc::clone(&clock),
        };
        register_default_handlers(&bus, &services);

        Self {
            scheduler: ProductionScheduler::new(config.production.clone()),
            synthesizer: NotificationSynthesizer::new(config.notification.clone()),
            store,
            config,
            clock,
            bus,
            analyzer,
            cascade,
            notifications,
            schedules: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    pub fn bus(&self) -> &WorkflowBus {
        &self.bus
    }

    fn schedules(&self) -> MutexGuard<'_, HashMap<NaiveDate, ProductionSchedule>> {
        match self.schedules.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ==========================================
    // 事件
    // ==========================================

    /// 按字符串事件类型触发（未知类型丢弃；载荷非法返回错误）
    pub fn trigger_event(
        &self,
        kind: &str,
        entity_id: &str,
        payload: Value,
    ) -> ApiResult<TriggerOutcome> {
        if entity_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("entity_id 不能为空".to_string()));
        }
        Ok(self.bus.trigger_raw(kind, entity_id, payload)?)
    }

    pub fn trigger(&self, event: WorkflowEvent) -> TriggerOutcome {
        self.bus.trigger(event)
    }

    pub fn queue_status(&self) -> QueueStatus {
        self.bus.queue_status()
    }

    pub async fn wait_idle(&self) {
        self.bus.wait_idle().await
    }

    /// 标记订单完成并触发库存扣减
    #[instrument(skip(self))]
    pub async fn complete_order(&self, order_id: &str) -> ApiResult<TriggerOutcome> {
        self.require_order(order_id).await?;
        self.store
            .update_order_status(order_id, OrderStatus::Completed)
            .await?;
        Ok(self
            .bus
            .trigger(WorkflowEvent::order_completed(order_id, self.clock.now())))
    }

    /// 取消订单并触发库存回补
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: &str,
        reason: Option<String>,
    ) -> ApiResult<TriggerOutcome> {
        self.require_order(order_id).await?;
        self.store
            .update_order_status(order_id, OrderStatus::Cancelled)
            .await?;
        Ok(self
            .bus
            .trigger(WorkflowEvent::order_cancelled(order_id, reason, self.clock.now())))
    }

    async fn require_order(&self, order_id: &str) -> ApiResult<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("订单(id={})不存在", order_id)))
    }

    /// 更新原料单价并触发 HPP 联动
    #[instrument(skip(self))]
    pub async fn update_ingredient_price(
        &self,
        ingredient_id: &str,
        new_price: f64,
    ) -> ApiResult<TriggerOutcome> {
        if new_price < 0.0 || !new_price.is_finite() {
            return Err(ApiError::InvalidInput(format!("单价非法: {}", new_price)));
        }
        let ingredient = self
            .store
            .get_ingredient(ingredient_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("原料(id={})不存在", ingredient_id)))?;
        let old_price = ingredient.price_or_zero();

        self.store
            .update_ingredient_price(ingredient_id, new_price)
            .await?;
        Ok(self.bus.trigger(WorkflowEvent::ingredient_price_changed(
            ingredient_id,
            old_price,
            new_price,
            self.clock.now(),
        )))
    }

    /// 更新运营成本并触发全量 HPP 重算（金额由处理器写入）
    #[instrument(skip(self))]
    pub async fn update_operational_cost(
        &self,
        cost_id: &str,
        new_amount: f64,
    ) -> ApiResult<TriggerOutcome> {
        if new_amount < 0.0 || !new_amount.is_finite() {
            return Err(ApiError::InvalidInput(format!("运营成本金额非法: {}", new_amount)));
        }
        let cost = self
            .store
            .get_operational_cost(cost_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("运营成本项(id={})不存在", cost_id)))?;
        Ok(self.bus.trigger(WorkflowEvent::operational_cost_changed(
            cost_id,
            cost.amount,
            new_amount,
            self.clock.now(),
        )))
    }

    // ==========================================
    // 生产排程
    // ==========================================

    pub fn generate_production_schedule(
        &self,
        date: NaiveDate,
        orders: &[Order],
        ingredients: &[Ingredient],
        recipes: &[Recipe],
    ) -> ApiResult<ProductionSchedule> {
        let schedule =
            self.scheduler
                .generate_schedule(date, orders, ingredients, recipes, self.clock.now())?;
        self.schedules().insert(date, schedule.clone());
        Ok(schedule)
    }

    pub fn generate_production_schedules(
        &self,
        orders: &[Order],
        ingredients: &[Ingredient],
        recipes: &[Recipe],
    ) -> ApiResult<Vec<ProductionSchedule>> {
        let schedules =
            self.scheduler
                .generate_schedules(orders, ingredients, recipes, self.clock.now())?;
        let mut cache = self.schedules();
        for schedule in &schedules {
            cache.insert(schedule.date, schedule.clone());
        }
        Ok(schedules)
    }

    pub fn schedule(&self, date: NaiveDate) -> Option<ProductionSchedule> {
        self.schedules().get(&date).cloned()
    }

    /// 排程通知（满负荷 / 冲突 / 优化）
    pub fn schedule_notifications(&self, schedule: &ProductionSchedule) -> Vec<SmartNotification> {
        alerts::schedule_notifications(
            schedule,
            self.config.production.high_workload_percent,
            self.clock.now(),
        )
    }

    /// 更新任务状态；首次进入 Completed 时触发 production.batch_completed
    #[instrument(skip(self))]
    pub fn update_task_status(
        &self,
        date: NaiveDate,
        task_id: &str,
        status: TaskStatus,
    ) -> ApiResult<ProductionTask> {
        let task = {
            let mut cache = self.schedules();
            let schedule = cache
                .get_mut(&date)
                .ok_or_else(|| ApiError::NotFound(format!("排程(date={})不存在", date)))?;
            let task = schedule
                .find_task_mut(task_id)
                .ok_or_else(|| ApiError::NotFound(format!("生产任务(id={})不存在", task_id)))?;
            let previous = task.transition(status)?;
            if previous == status {
                return Ok(task.clone());
            }
            task.clone()
        };

        tracing::info!(task_id = %task_id, status = %status, "生产任务状态已更新");
        if status == TaskStatus::Completed {
            self.bus.trigger(WorkflowEvent::batch_completed(
                &task.order_id,
                &task.recipe_name,
                task.quantity,
                Some(task.id.clone()),
                self.clock.now(),
            ));
        }
        Ok(task)
    }

    // ==========================================
    // 库存
    // ==========================================

    pub fn analyze_inventory_needs(
        &self,
        ingredients: &[Ingredient],
        monthly_usage: &HashMap<String, f64>,
    ) -> ApiResult<Vec<InventoryAnalysis>> {
        Ok(self.analyzer.analyze(ingredients, monthly_usage)?)
    }

    /// 用库中原料与近 30 天消耗流水做库存分析
    pub async fn analyze_stored_inventory(&self) -> ApiResult<Vec<InventoryAnalysis>> {
        let ingredients = self.store.list_ingredients().await?;
        let since = self.clock.now() - Duration::days(USAGE_WINDOW_DAYS);
        let mut usage = HashMap::with_capacity(ingredients.len());
        for ingredient in &ingredients {
            usage.insert(
                ingredient.id.clone(),
                self.store.usage_since(&ingredient.id, since).await?,
            );
        }
        self.analyze_inventory_needs(&ingredients, &usage)
    }

    pub fn generate_purchase_orders(&self, analyses: &[InventoryAnalysis]) -> PurchaseOrderPlan {
        self.analyzer.generate_purchase_orders(analyses)
    }

    /// 用库中按天汇总的消耗流水预测未来用量
    pub async fn predict_inventory_needs(
        &self,
        forecast_days: u32,
    ) -> ApiResult<Vec<InventoryForecast>> {
        let ingredients = self.store.list_ingredients().await?;
        let since = self.clock.now() - Duration::days(USAGE_WINDOW_DAYS);
        let mut history: HashMap<String, Vec<UsageRecord>> = HashMap::new();
        for ingredient in &ingredients {
            history.insert(
                ingredient.id.clone(),
                self.store.daily_usage_since(&ingredient.id, since).await?,
            );
        }
        Ok(self
            .analyzer
            .predict_needs(&ingredients, &history, forecast_days))
    }

    // ==========================================
    // HPP
    // ==========================================

    pub async fn recalculate_recipe_cost(&self, recipe_id: &str) -> ApiResult<RecipeCost> {
        Ok(self.cascade.recalculate(recipe_id).await?)
    }

    /// 全量重算并发布完成通知
    pub async fn recalculate_all_costs(&self, reason: &str) -> ApiResult<BatchRecalcReport> {
        let report = self.cascade.recalculate_all(reason).await?;
        self.notifications
            .publish(report.notification.clone())
            .await?;
        Ok(report)
    }

    /// 按配方最新 HPP 给出三档建议售价（无缓存结果时先重算）
    pub async fn suggest_selling_prices(&self, recipe_id: &str) -> ApiResult<Vec<PriceTier>> {
        let cost = match self.store.get_recipe_cost(recipe_id).await? {
            Some(cost) => cost,
            None => self.cascade.recalculate(recipe_id).await?,
        };
        Ok(suggest_selling_prices(cost.cost_per_serving))
    }

    pub async fn monitor_ingredient_prices(&self) -> ApiResult<PriceMonitorReport> {
        let ingredients = self.store.list_ingredients().await?;
        Ok(self.cascade.monitor_ingredient_prices(&ingredients))
    }

    // ==========================================
    // 通知
    // ==========================================

    pub fn synthesize_notifications(
        &self,
        analyses: &[InventoryAnalysis],
        orders: &[Order],
        metrics: Option<&FinancialMetrics>,
    ) -> Vec<SmartNotification> {
        self.synthesizer
            .synthesize(analyses, orders, metrics, self.clock.now())
    }

    pub fn notifications(&self) -> Vec<SmartNotification> {
        self.notifications.list()
    }

    pub fn notifications_by_category(
        &self,
        category: NotificationCategory,
    ) -> Vec<SmartNotification> {
        self.notifications.by_category(category)
    }

    pub fn notification_summary(&self) -> NotificationSummary {
        self.notifications.summary()
    }

    pub fn mark_notification_read(&self, notification_id: &str) -> ApiResult<()> {
        if self.notifications.mark_read(notification_id) {
            Ok(())
        } else {
            Err(ApiError::NotFound(format!("通知(id={})不存在", notification_id)))
        }
    }

    pub fn mark_all_notifications_read(&self) -> usize {
        self.notifications.mark_all_read()
    }

    pub async fn stored_notifications(&self, limit: usize) -> ApiResult<Vec<SmartNotification>> {
        Ok(self.store.list_notifications(limit).await?)
    }

    // ==========================================
    // 每日巡检
    // ==========================================

    /// 每日巡检：库存分析 → 采购单 → 未来 7 天排程 → 合成并发布提醒
    #[instrument(skip(self, metrics))]
    pub async fn run_daily_review(
        &self,
        date: NaiveDate,
        metrics: Option<&FinancialMetrics>,
    ) -> ApiResult<DailyReview> {
        let inventory = self.analyze_stored_inventory().await?;
        let purchase_orders = self.generate_purchase_orders(&inventory);

        let from = date.and_time(NaiveTime::MIN);
        let to = from + Duration::days(REVIEW_HORIZON_DAYS);
        let orders = self.store.list_orders_between(from, to).await?;
        let ingredients = self.store.list_ingredients().await?;
        let recipes = self.store.list_recipes().await?;
        let schedules = self.generate_production_schedules(&orders, &ingredients, &recipes)?;

        let mut notifications = self.synthesize_notifications(&inventory, &orders, metrics);
        for schedule in &schedules {
            notifications.extend(self.schedule_notifications(schedule));
        }
        self.notifications
            .publish_all(notifications.iter().cloned())
            .await?;

        tracing::info!(
            date = %date,
            ingredients = inventory.len(),
            purchase_lines = purchase_orders.lines.len(),
            schedules = schedules.len(),
            notifications = notifications.len(),
            "每日巡检完成"
        );

        Ok(DailyReview {
            date,
            inventory,
            purchase_orders,
            schedules,
            notifications,
        })
    }
}

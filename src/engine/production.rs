// ==========================================
// UMKM 餐饮经营自动化 - 生产排程引擎
// ==========================================
// 职责: 订单明细 → 生产任务 → 日内时间槽装箱 → 冲突/优化识别
// 输入: 订单 + 原料快照 + 配方 + 当前时间
// 输出: ProductionSchedule（输入的纯投影，固定输入下结果确定）
// 红线: 不访问数据库；缺失配方/交付时间直接报错，不产出半成品排程
// ==========================================

use crate::config::ProductionConfig;
use crate::domain::{
    convert_quantity, ConflictKind, Ingredient, IngredientRequirement, OptimizationKind, Order,
    OrderItem, ProductionSchedule, ProductionTask, Recipe, ScheduleConflict,
    ScheduleOptimization, TaskPriority, TaskStatus,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::i18n::t_with_args;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{BTreeMap, HashMap};
use tracing::instrument;

/// 交付剩余小时 → 任务优先级
const URGENT_WITHIN_HOURS: f64 = 12.0;
const HIGH_WITHIN_HOURS: f64 = 24.0;
const MEDIUM_WITHIN_HOURS: f64 = 48.0;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;
/// 毫秒向上取整前扣除的浮点误差
const ROUNDING_EPSILON_MS: f64 = 1e-6;

pub fn priority_for(hours_until_delivery: f64) -> TaskPriority {
    if hours_until_delivery <= URGENT_WITHIN_HOURS {
        TaskPriority::Urgent
    } else if hours_until_delivery <= HIGH_WITHIN_HOURS {
        TaskPriority::High
    } else if hours_until_delivery <= MEDIUM_WITHIN_HOURS {
        TaskPriority::Medium
    } else {
        TaskPriority::Low
    }
}

// ==========================================
// ProductionScheduler
// ==========================================
pub struct ProductionScheduler {
    config: ProductionConfig,
}

impl ProductionScheduler {
    pub fn new(config: ProductionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProductionConfig {
        &self.config
    }

    /// 生成单日排程
    ///
    /// # 参数
    /// - `date`: 排程日期
    /// - `orders`: 当日交付的订单（调用方已筛选）
    /// - `ingredients`: 原料快照
    /// - `recipes`: 配方目录
    /// - `now`: 当前时间（用于计算交付紧急度）
    ///
    /// # 返回
    /// - Ok(ProductionSchedule)
    /// - Err: 配方缺失 / 数量为 0 / 份数为 0 / 缺交付时间
    #[instrument(skip(self, orders, ingredients, recipes), fields(date = %date, orders = orders.len()))]
    pub fn generate_schedule(
        &self,
        date: NaiveDate,
        orders: &[Order],
        ingredients: &[Ingredient],
        recipes: &[Recipe],
        now: NaiveDateTime,
    ) -> EngineResult<ProductionSchedule> {
        let ingredient_index: HashMap<&str, &Ingredient> =
            ingredients.iter().map(|i| (i.id.as_str(), i)).collect();
        let recipe_index: HashMap<&str, &Recipe> =
            recipes.iter().map(|r| (r.id.as_str(), r)).collect();

        // 1. 任务构建
        let mut tasks = Vec::new();
        for order in orders {
            for item in &order.items {
                let recipe = recipe_index
                    .get(item.recipe_id.as_str())
                    .copied()
                    .ok_or_else(|| EngineError::RecipeNotFound(item.recipe_id.clone()))?;
                tasks.push(self.build_task(order, item, recipe, &ingredient_index, now)?);
            }
        }

        if tasks.is_empty() {
            tracing::debug!(date = %date, "当日无生产任务，返回空排程");
            return Ok(ProductionSchedule::empty(date));
        }

        // 2. 按优先级稳定排序后装箱
        tasks.sort_by(|a, b| b.priority.cmp(&a.priority));
        self.pack_time_slots(&mut tasks, date);

        // 3. 冲突 / 4. 优化
        let conflicts = Self::find_conflicts(&tasks, &ingredient_index);
        let total_duration_hours: f64 = tasks.iter().map(|t| t.estimated_duration_hours).sum();
        let optimizations = self.find_optimizations(&tasks, total_duration_hours);
        let workload_percent = total_duration_hours / self.config.max_daily_workload_hours * 100.0;

        let mut schedule = ProductionSchedule::empty(date);
        schedule.tasks = tasks;
        schedule.total_duration_hours = total_duration_hours;
        schedule.workload_percent = workload_percent;
        schedule.conflicts = conflicts;
        schedule.optimizations = optimizations;

        tracing::info!(
            date = %date,
            tasks = schedule.tasks.len(),
            blocked = schedule.blocked_count(),
            conflicts = schedule.conflicts.len(),
            workload_percent = %format!("{:.1}", workload_percent),
            "生产排程生成完成"
        );
        Ok(schedule)
    }

    /// 多日排程：筛选待生产订单，按交付日期分组，每天一个排程（日期升序）
    pub fn generate_schedules(
        &self,
        orders: &[Order],
        ingredients: &[Ingredient],
        recipes: &[Recipe],
        now: NaiveDateTime,
    ) -> EngineResult<Vec<ProductionSchedule>> {
        let mut by_date: BTreeMap<NaiveDate, Vec<Order>> = BTreeMap::new();
        for order in orders.iter().filter(|o| o.status.needs_production()) {
            if let Some(delivery_at) = order.delivery_at {
                by_date.entry(delivery_at.date()).or_default().push(order.clone());
            }
        }

        by_date
            .into_iter()
            .map(|(date, day_orders)| {
                self.generate_schedule(date, &day_orders, ingredients, recipes, now)
            })
            .collect()
    }

    // ==========================================
    // 任务构建
    // ==========================================

    /// 工时 = (准备+烹饪)/60 + (批次−1)·烹饪·0.8/60
    pub fn estimate_duration_hours(&self, recipe: &Recipe, batch_count: u32) -> f64 {
        let first_batch = f64::from(recipe.prep_time_minutes + recipe.cook_time_minutes) / 60.0;
        let extra_batches = f64::from(batch_count.saturating_sub(1));
        first_batch
            + extra_batches * f64::from(recipe.cook_time_minutes) * self.config.extra_batch_cook_factor
                / 60.0
    }

    fn build_task(
        &self,
        order: &Order,
        item: &OrderItem,
        recipe: &Recipe,
        ingredient_index: &HashMap<&str, &Ingredient>,
        now: NaiveDateTime,
    ) -> EngineResult<ProductionTask> {
        if item.quantity == 0 {
            return Err(EngineError::invalid(
                "quantity",
                format!("订单 {} 明细 {} 数量为 0", order.id, item.id),
            ));
        }
        if recipe.servings == 0 {
            return Err(EngineError::invalid(
                "servings",
                format!("配方 {} 份数为 0", recipe.id),
            ));
        }
        let hours_until_delivery = order.hours_until_delivery(now).ok_or_else(|| {
            EngineError::invalid("delivery_at", format!("订单 {} 缺少交付时间", order.id))
        })?;

        let batch_count = item.quantity.div_ceil(recipe.servings);
        let requirements = Self::requirements(recipe, item.quantity, ingredient_index);

        let short: Vec<&str> = requirements
            .iter()
            .filter(|r| r.shortage > 0.0)
            .map(|r| r.ingredient_name.as_str())
            .collect();
        let (status, blocked_reason) = if short.is_empty() {
            (TaskStatus::Planned, None)
        } else {
            let names = short.join(", ");
            (
                TaskStatus::Blocked,
                Some(t_with_args("production.blocked_reason", &[("ingredients", &names)])),
            )
        };

        Ok(ProductionTask {
            id: format!("task_{}_{}", order.id, item.id),
            order_id: order.id.clone(),
            order_no: order.order_no.clone(),
            recipe_id: recipe.id.clone(),
            recipe_name: recipe.name.clone(),
            quantity: item.quantity,
            batch_count,
            estimated_duration_hours: self.estimate_duration_hours(recipe, batch_count),
            planned_start: None,
            planned_end: None,
            priority: priority_for(hours_until_delivery),
            status,
            blocked_reason,
            ingredient_requirements: requirements,
        })
    }

    /// 原料需求（换算为原料库存单位）；未知原料按可用量 0 计
    fn requirements(
        recipe: &Recipe,
        order_quantity: u32,
        ingredient_index: &HashMap<&str, &Ingredient>,
    ) -> Vec<IngredientRequirement> {
        recipe
            .ingredients
            .iter()
            .map(|ri| {
                let raw = ri.quantity * f64::from(order_quantity);
                match ingredient_index.get(ri.ingredient_id.as_str()) {
                    Some(ingredient) => {
                        let required = convert_quantity(raw, &ri.unit, &ingredient.unit);
                        IngredientRequirement {
                            ingredient_id: ri.ingredient_id.clone(),
                            ingredient_name: ingredient.name.clone(),
                            required,
                            available: ingredient.current_stock,
                            shortage: (required - ingredient.current_stock).max(0.0),
                            unit: ingredient.unit.clone(),
                        }
                    }
                    None => {
                        tracing::warn!(
                            recipe_id = %recipe.id,
                            ingredient_id = %ri.ingredient_id,
                            "配方引用了未知原料，按库存 0 处理"
                        );
                        IngredientRequirement {
                            ingredient_id: ri.ingredient_id.clone(),
                            ingredient_name: ri.ingredient_id.clone(),
                            required: raw,
                            available: 0.0,
                            shortage: raw.max(0.0),
                            unit: ri.unit.clone(),
                        }
                    }
                }
            })
            .collect()
    }

    // ==========================================
    // 时间槽装箱
    // ==========================================

    fn day_start(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(self.config.work_start_hour))
    }

    fn day_end(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(self.config.work_end_hour))
    }

    /// 单台产线顺序装箱
    ///
    /// 游标从 date 的开工时间开始；剩余工时不足且剩余 > MIN_SLOT，
    /// 或当日已无剩余工时时，游标移到次日开工时间。Blocked 任务不占时间。
    fn pack_time_slots(&self, tasks: &mut [ProductionTask], date: NaiveDate) {
        let mut cursor = self.day_start(date);

        for task in tasks.iter_mut().filter(|t| !t.is_blocked()) {
            let today_start = self.day_start(cursor.date());
            if cursor < today_start {
                cursor = today_start;
            }

            let hours_left =
                (self.day_end(cursor.date()) - cursor).num_milliseconds() as f64 / MILLIS_PER_HOUR;
            let duration = task.estimated_duration_hours;
            if (duration > hours_left && hours_left > self.config.min_slot_hours)
                || hours_left <= 0.0
            {
                cursor = self.day_start(cursor.date() + Duration::days(1));
            }

            let millis = (duration * MILLIS_PER_HOUR - ROUNDING_EPSILON_MS).ceil() as i64;
            let end = cursor + Duration::milliseconds(millis);
            task.planned_start = Some(cursor);
            task.planned_end = Some(end);
            cursor = end;
        }
    }

    // ==========================================
    // 冲突 / 优化
    // ==========================================

    /// 当日按原料汇总需求（含 Blocked 任务），超出库存即冲突
    fn find_conflicts(
        tasks: &[ProductionTask],
        ingredient_index: &HashMap<&str, &Ingredient>,
    ) -> Vec<ScheduleConflict> {
        let mut demand: BTreeMap<&str, (f64, &IngredientRequirement)> = BTreeMap::new();
        for req in tasks.iter().flat_map(|t| &t.ingredient_requirements) {
            demand
                .entry(req.ingredient_id.as_str())
                .and_modify(|(total, _)| *total += req.required)
                .or_insert((req.required, req));
        }

        demand
            .into_iter()
            .filter_map(|(ingredient_id, (required, sample))| {
                let (name, unit, available) = match ingredient_index.get(ingredient_id) {
                    Some(i) => (i.name.clone(), i.unit.clone(), i.current_stock),
                    None => (sample.ingredient_name.clone(), sample.unit.clone(), 0.0),
                };
                if required <= available {
                    return None;
                }

                let affected_tasks = tasks
                    .iter()
                    .filter(|t| {
                        t.ingredient_requirements
                            .iter()
                            .any(|r| r.ingredient_id == ingredient_id)
                    })
                    .map(|t| t.id.clone())
                    .collect();
                let description = t_with_args(
                    "production.conflict_shortage",
                    &[
                        ("name", &name),
                        ("required", &format_amount(required)),
                        ("available", &format_amount(available)),
                        ("unit", &unit),
                    ],
                );

                Some(ScheduleConflict {
                    kind: ConflictKind::IngredientShortage,
                    ingredient_id: ingredient_id.to_string(),
                    ingredient_name: name,
                    description,
                    required,
                    available,
                    unit,
                    affected_tasks,
                })
            })
            .collect()
    }

    fn find_optimizations(
        &self,
        tasks: &[ProductionTask],
        total_duration_hours: f64,
    ) -> Vec<ScheduleOptimization> {
        let mut groups: BTreeMap<&str, Vec<&ProductionTask>> = BTreeMap::new();
        for task in tasks {
            groups.entry(task.recipe_id.as_str()).or_default().push(task);
        }

        let mut optimizations: Vec<ScheduleOptimization> = groups
            .into_iter()
            .filter(|(_, group)| group.len() > 1)
            .map(|(recipe_id, group)| {
                let recipe_name = group[0].recipe_name.as_str();
                let total_quantity: u32 = group.iter().map(|t| t.quantity).sum();
                let separate_hours: f64 = group.iter().map(|t| t.estimated_duration_hours).sum();
                let time_saved_hours = separate_hours * self.config.batch_saving_ratio;
                let saved = format!("{:.1}", time_saved_hours);

                ScheduleOptimization {
                    kind: OptimizationKind::BatchCombination,
                    recipe_id: Some(recipe_id.to_string()),
                    description: t_with_args(
                        "production.batch_combination",
                        &[
                            ("count", &group.len().to_string()),
                            ("recipe", recipe_name),
                            ("quantity", &total_quantity.to_string()),
                        ],
                    ),
                    time_saved_hours,
                    recommendation: t_with_args(
                        "production.batch_recommendation",
                        &[("recipe", recipe_name), ("hours", &saved)],
                    ),
                    affected_tasks: group.iter().map(|t| t.id.clone()).collect(),
                }
            })
            .collect();

        if total_duration_hours > self.config.max_daily_workload_hours {
            let total = format!("{:.1}", total_duration_hours);
            let capacity = format!("{:.0}", self.config.max_daily_workload_hours);
            optimizations.push(ScheduleOptimization {
                kind: OptimizationKind::CapacityOverload,
                recipe_id: None,
                description: t_with_args(
                    "production.capacity_overload",
                    &[("total", &total), ("capacity", &capacity)],
                ),
                time_saved_hours: 0.0,
                recommendation: t_with_args("production.capacity_recommendation", &[]),
                affected_tasks: tasks.iter().map(|t| t.id.clone()).collect(),
            });
        }

        optimizations
    }
}

/// 数量展示：整数不带小数，其余保留两位
fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderStatus, RecipeIngredient};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn recipe(id: &str, prep: u32, cook: u32, servings: u32) -> Recipe {
        Recipe {
            id: id.to_string(),
            name: format!("Resep {}", id),
            servings,
            prep_time_minutes: prep,
            cook_time_minutes: cook,
            selling_price: None,
            ingredients: vec![RecipeIngredient {
                ingredient_id: "ING-FLOUR".to_string(),
                quantity: 100.0,
                unit: "g".to_string(),
            }],
        }
    }

    fn order(id: &str, recipe_id: &str, qty: u32, delivery_in_hours: i64) -> Order {
        Order {
            id: id.to_string(),
            order_no: format!("ORD-{}", id),
            customer_id: None,
            customer_name: None,
            status: OrderStatus::Confirmed,
            delivery_at: Some(now() + Duration::hours(delivery_in_hours)),
            total_amount: 0.0,
            items: vec![OrderItem {
                id: format!("{}-1", id),
                recipe_id: recipe_id.to_string(),
                quantity: qty,
            }],
        }
    }

    fn flour(stock: f64) -> Vec<Ingredient> {
        vec![Ingredient::new("ING-FLOUR", "Tepung", "kg", stock, 1.0, Some(10_000.0))]
    }

    fn scheduler() -> ProductionScheduler {
        ProductionScheduler::new(ProductionConfig::default())
    }

    #[test]
    fn test_three_batch_duration() {
        // 1.25 + 2 × 45 × 0.8 / 60 = 2.45
        let r = recipe("R1", 30, 45, 10);
        assert!((scheduler().estimate_duration_hours(&r, 3) - 2.45).abs() < 1e-9);
        assert!((scheduler().estimate_duration_hours(&r, 1) - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_priority_thresholds() {
        assert_eq!(priority_for(12.0), TaskPriority::Urgent);
        assert_eq!(priority_for(24.0), TaskPriority::High);
        assert_eq!(priority_for(48.0), TaskPriority::Medium);
        assert_eq!(priority_for(48.1), TaskPriority::Low);
    }

    #[test]
    fn test_requirements_converted_to_stock_unit() {
        let orders = [order("O1", "R1", 25, 30)];
        let recipes = [recipe("R1", 30, 45, 10)];
        let s = scheduler()
            .generate_schedule(date(), &orders, &flour(10.0), &recipes, now())
            .unwrap();
        let task = &s.tasks[0];
        assert_eq!(task.batch_count, 3);
        // 100g × 25 = 2.5kg
        assert!((task.ingredient_requirements[0].required - 2.5).abs() < 1e-9);
        assert_eq!(task.status, TaskStatus::Planned);
        assert_eq!(task.planned_start, Some(date().and_hms_opt(6, 0, 0).unwrap()));
        assert_eq!(task.planned_end, Some(date().and_hms_opt(8, 27, 0).unwrap()));
    }

    #[test]
    fn test_shortage_blocks_task_and_reports_conflict() {
        let orders = [order("O1", "R1", 30, 30)];
        let recipes = [recipe("R1", 30, 45, 10)];
        let s = scheduler()
            .generate_schedule(date(), &orders, &flour(1.0), &recipes, now())
            .unwrap();
        assert!(s.tasks[0].is_blocked());
        assert!(s.tasks[0].planned_start.is_none());
        assert_eq!(s.conflicts.len(), 1);
        assert_eq!(s.conflicts[0].affected_tasks, vec!["task_O1_O1-1".to_string()]);
    }

    /// 单个任务库存够用，但当日合计超出库存
    #[test]
    fn test_aggregate_demand_over_stock_is_a_conflict() {
        // 每单 6 份 × 100 g = 0.6 kg，两单合计 1.2 kg > 1 kg
        let orders = vec![order("A", "R1", 6, 30), order("B", "R1", 6, 30)];
        let recipes = [recipe("R1", 30, 45, 10)];
        let s = scheduler()
            .generate_schedule(date(), &orders, &flour(1.0), &recipes, now())
            .unwrap();

        assert!(s.tasks.iter().all(|t| !t.is_blocked()));
        assert_eq!(s.conflicts.len(), 1);
        let conflict = &s.conflicts[0];
        assert_eq!(conflict.ingredient_id, "ING-FLOUR");
        assert!((conflict.required - 1.2).abs() < 1e-9);
        assert_eq!(
            conflict.affected_tasks,
            vec!["task_A_A-1".to_string(), "task_B_B-1".to_string()]
        );
    }

    #[test]
    fn test_aggregate_demand_equal_to_stock_is_not_a_conflict() {
        // 两单合计 10 份 × 100 g = 1 kg，正好用完
        let orders = vec![order("A", "R1", 5, 30), order("B", "R1", 5, 30)];
        let recipes = [recipe("R1", 30, 45, 10)];
        let s = scheduler()
            .generate_schedule(date(), &orders, &flour(1.0), &recipes, now())
            .unwrap();

        assert!(s.tasks.iter().all(|t| !t.is_blocked()));
        assert!(s.conflicts.is_empty());
    }

    #[test]
    fn test_higher_priority_packed_first() {
        let orders = vec![order("LATE", "R1", 5, 60), order("SOON", "R2", 5, 10)];
        let recipes = vec![recipe("R1", 30, 30, 10), recipe("R2", 30, 30, 10)];
        let s = scheduler()
            .generate_schedule(date(), &orders, &flour(100.0), &recipes, now())
            .unwrap();
        assert_eq!(s.tasks[0].order_id, "SOON");
        assert_eq!(s.tasks[0].priority, TaskPriority::Urgent);
        assert_eq!(s.tasks[1].planned_start, s.tasks[0].planned_end);
    }

    #[test]
    fn test_batch_combination_and_overload() {
        // 3 个同配方任务，每个 5 小时 → 总 15h > 12h
        let orders = vec![
            order("A", "R1", 5, 30),
            order("B", "R1", 5, 30),
            order("C", "R1", 5, 30),
        ];
        let s = scheduler()
            .generate_schedule(date(), &orders, &flour(100.0), &[recipe("R1", 60, 240, 10)], now())
            .unwrap();
        assert!((s.total_duration_hours - 15.0).abs() < 1e-9);
        assert!((s.workload_percent - 125.0).abs() < 1e-9);
        let batch = s
            .optimizations
            .iter()
            .find(|o| o.kind == OptimizationKind::BatchCombination)
            .unwrap();
        assert!((batch.time_saved_hours - 4.5).abs() < 1e-9);
        assert!(s.optimizations.iter().any(|o| o.kind == OptimizationKind::CapacityOverload));
        // 第三个任务 16:00 开始时剩余 4h < 5h 且 > 2h → 次日 06:00
        let next_day = date().succ_opt().unwrap().and_hms_opt(6, 0, 0).unwrap();
        assert_eq!(s.tasks[2].planned_start, Some(next_day));
    }

    #[test]
    fn test_input_errors() {
        let sch = scheduler();
        let recipes = [recipe("R1", 30, 45, 10)];
        let stock = flour(10.0);
        let run = |orders: &[Order], recipes: &[Recipe]| {
            sch.generate_schedule(date(), orders, &stock, recipes, now())
        };

        assert!(matches!(
            run(&[order("O1", "R404", 1, 30)], &recipes),
            Err(EngineError::RecipeNotFound(_))
        ));
        assert!(run(&[order("O1", "R1", 0, 30)], &recipes).is_err());
        let mut no_delivery = order("O1", "R1", 1, 30);
        no_delivery.delivery_at = None;
        assert!(run(&[no_delivery], &recipes).is_err());
        assert!(run(&[order("O1", "R0", 1, 30)], &[recipe("R0", 30, 45, 0)]).is_err());
    }

    #[test]
    fn test_empty_and_deterministic() {
        let sch = scheduler();
        let empty = sch.generate_schedule(date(), &[], &flour(1.0), &[], now()).unwrap();
        assert!(empty.tasks.is_empty());
        assert_eq!(empty.workload_percent, 0.0);

        let orders = vec![order("A", "R1", 5, 30), order("B", "R1", 15, 20)];
        let recipes = vec![recipe("R1", 30, 45, 10)];
        let first = sch
            .generate_schedule(date(), &orders, &flour(100.0), &recipes, now())
            .unwrap();
        let second = sch
            .generate_schedule(date(), &orders, &flour(100.0), &recipes, now())
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_generate_schedules_groups_by_delivery_date() {
        let mut pending = order("P", "R1", 1, 30);
        pending.status = OrderStatus::Pending;
        let orders = vec![order("D2", "R1", 1, 50), order("D1", "R1", 1, 30), pending];
        let out = scheduler()
            .generate_schedules(&orders, &flour(100.0), &[recipe("R1", 30, 45, 10)], now())
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[0].date < out[1].date);
        assert_eq!(out[0].tasks[0].order_id, "D1");
    }
}

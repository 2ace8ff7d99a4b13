// ==========================================
// UMKM 餐饮经营自动化 - 自动化参数
// ==========================================
// 职责: 各引擎使用的阈值与常量，按引擎分组
// 说明: 默认值集中在 defaults 模块；可被 config_kv 覆写（见 ConfigManager）
// ==========================================

use serde::{Deserialize, Serialize};

/// 默认参数
pub mod defaults {
    // ===== 库存 / EOQ =====
    /// 每次下单固定成本（运费、行政）
    pub const ORDERING_COST: f64 = 50_000.0;
    /// 年持有成本率
    pub const HOLDING_RATE: f64 = 0.20;
    /// 自动补货覆盖天数（再订货点 = 日均用量 × 天数）
    pub const AUTO_REORDER_DAYS: f64 = 7.0;
    pub const URGENT_DAYS: f64 = 3.0;
    pub const SOON_DAYS: f64 = 7.0;
    pub const FORECAST_MIN_RECORDS: usize = 7;
    pub const FORECAST_WINDOW: usize = 14;

    // ===== 生产排程 =====
    pub const WORK_START_HOUR: u32 = 6;
    pub const WORK_END_HOUR: u32 = 20;
    pub const MAX_DAILY_WORKLOAD_HOURS: f64 = 12.0;
    /// 追加批次按烹饪时间的 80% 计（并行效率）
    pub const EXTRA_BATCH_COOK_FACTOR: f64 = 0.8;
    /// 合批节省比例
    pub const BATCH_SAVING_RATIO: f64 = 0.3;
    /// 剩余工时不足该值时不再顺延到次日
    pub const MIN_SLOT_HOURS: f64 = 2.0;
    pub const HIGH_WORKLOAD_PERCENT: f64 = 90.0;

    // ===== HPP 成本 =====
    pub const LABOR_HOURLY_RATE: f64 = 50_000.0;
    pub const SERVING_NORMALIZATION: f64 = 10.0;
    /// 单配方成本变动超过该百分比视为高影响
    pub const HIGH_IMPACT_PERCENT: f64 = 10.0;
    /// 原料价格变动超过该百分比时追加延迟批量重算
    pub const BATCH_RECALC_PERCENT: f64 = 15.0;
    pub const RECALC_DELAY_SECS: u64 = 5;
    pub const PRICE_HISTORY_LIMIT: usize = 30;
    pub const SIGNIFICANT_PRICE_CHANGE_PERCENT: f64 = 10.0;
    pub const PRICING_REVIEW_PERCENT: f64 = 10.0;

    // ===== 通知 =====
    pub const NOTIFICATION_LOG_CAPACITY: usize = 100;
    pub const MAX_SYNTHESIZED: usize = 20;
    pub const LOW_MARGIN_PERCENT: f64 = 25.0;
    pub const INVENTORY_REVENUE_RATIO: f64 = 0.5;
    pub const URGENT_ORDER_HOURS: f64 = 24.0;

    // ===== 事件总线 =====
    pub const HANDLER_TIMEOUT_SECS: u64 = 30;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryConfig {
    pub ordering_cost: f64,
    pub holding_rate: f64,
    pub auto_reorder_days: f64,
    pub urgent_days: f64,
    pub soon_days: f64,
    pub forecast_min_records: usize,
    pub forecast_window: usize,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            ordering_cost: defaults::ORDERING_COST,
            holding_rate: defaults::HOLDING_RATE,
            auto_reorder_days: defaults::AUTO_REORDER_DAYS,
            urgent_days: defaults::URGENT_DAYS,
            soon_days: defaults::SOON_DAYS,
            forecast_min_records: defaults::FORECAST_MIN_RECORDS,
            forecast_window: defaults::FORECAST_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionConfig {
    pub work_start_hour: u32,
    pub work_end_hour: u32,
    pub max_daily_workload_hours: f64,
    pub extra_batch_cook_factor: f64,
    pub batch_saving_ratio: f64,
    pub min_slot_hours: f64,
    pub high_workload_percent: f64,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            work_start_hour: defaults::WORK_START_HOUR,
            work_end_hour: defaults::WORK_END_HOUR,
            max_daily_workload_hours: defaults::MAX_DAILY_WORKLOAD_HOURS,
            extra_batch_cook_factor: defaults::EXTRA_BATCH_COOK_FACTOR,
            batch_saving_ratio: defaults::BATCH_SAVING_RATIO,
            min_slot_hours: defaults::MIN_SLOT_HOURS,
            high_workload_percent: defaults::HIGH_WORKLOAD_PERCENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostConfig {
    pub labor_hourly_rate: f64,
    pub serving_normalization: f64,
    pub high_impact_percent: f64,
    pub batch_recalc_percent: f64,
    pub recalc_delay_secs: u64,
    pub price_history_limit: usize,
    pub significant_price_change_percent: f64,
    pub pricing_review_percent: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            labor_hourly_rate: defaults::LABOR_HOURLY_RATE,
            serving_normalization: defaults::SERVING_NORMALIZATION,
            high_impact_percent: defaults::HIGH_IMPACT_PERCENT,
            batch_recalc_percent: defaults::BATCH_RECALC_PERCENT,
            recalc_delay_secs: defaults::RECALC_DELAY_SECS,
            price_history_limit: defaults::PRICE_HISTORY_LIMIT,
            significant_price_change_percent: defaults::SIGNIFICANT_PRICE_CHANGE_PERCENT,
            pricing_review_percent: defaults::PRICING_REVIEW_PERCENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub log_capacity: usize,
    pub max_synthesized: usize,
    pub low_margin_percent: f64,
    pub inventory_revenue_ratio: f64,
    pub urgent_order_hours: f64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            log_capacity: defaults::NOTIFICATION_LOG_CAPACITY,
            max_synthesized: defaults::MAX_SYNTHESIZED,
            low_margin_percent: defaults::LOW_MARGIN_PERCENT,
            inventory_revenue_ratio: defaults::INVENTORY_REVENUE_RATIO,
            urgent_order_hours: defaults::URGENT_ORDER_HOURS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    pub handler_timeout_secs: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            handler_timeout_secs: defaults::HANDLER_TIMEOUT_SECS,
        }
    }
}

/// 自动化参数全集
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AutomationConfig {
    pub inventory: InventoryConfig,
    pub production: ProductionConfig,
    pub cost: CostConfig,
    pub notification: NotificationConfig,
    pub bus: BusConfig,
}

impl AutomationConfig {
    /// 基本一致性校验（工作时段、比例范围）
    pub fn validate(&self) -> Result<(), String> {
        let p = &self.production;
        if p.work_start_hour >= p.work_end_hour || p.work_end_hour > 24 {
            return Err(format!(
                "工作时段无效: start={} end={}",
                p.work_start_hour, p.work_end_hour
            ));
        }
        if p.max_daily_workload_hours <= 0.0 {
            return Err("max_daily_workload_hours 必须大于 0".to_string());
        }
        if !(0.0..1.0).contains(&p.batch_saving_ratio) {
            return Err(format!("batch_saving_ratio 超出范围: {}", p.batch_saving_ratio));
        }
        if self.inventory.holding_rate < 0.0 || self.inventory.ordering_cost < 0.0 {
            return Err("EOQ 参数不能为负".to_string());
        }
        if self.cost.serving_normalization <= 0.0 {
            return Err("serving_normalization 必须大于 0".to_string());
        }
        if self.notification.log_capacity == 0 {
            return Err("log_capacity 必须大于 0".to_string());
        }
        Ok(())
    }
}

// ==========================================
// UMKM 餐饮经营自动化 - 库存分析领域模型
// ==========================================
// 职责: 库存分析结果、补货建议、采购单、用量预测
// 说明: 均为派生数据，不落库
// ==========================================

use crate::domain::ingredient::Ingredient;
use crate::domain::types::{ReorderUrgency, StockStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 补货建议
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReorderRecommendation {
    pub should_reorder: bool,
    /// EOQ 建议量（不低于 min_stock）
    pub quantity: f64,
    pub urgency: ReorderUrgency,
    pub estimated_cost: f64,
    /// 再订货点 = 日均用量 × 自动补货天数
    pub reorder_point: f64,
}

/// 单个原料的库存分析
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryAnalysis {
    pub ingredient: Ingredient,
    pub status: StockStatus,
    pub monthly_usage: f64,
    pub daily_usage: f64,
    /// 可用天数；日均用量为 0 时为 +∞（序列化为 null）
    pub days_remaining: f64,
    pub reorder: ReorderRecommendation,
    pub insights: Vec<String>,
}

impl InventoryAnalysis {
    pub fn has_unbounded_supply(&self) -> bool {
        self.days_remaining.is_infinite()
    }
}

// ==========================================
// 采购单
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseOrderLine {
    pub ingredient_id: String,
    pub ingredient_name: String,
    pub unit: String,
    pub quantity: f64,
    pub estimated_cost: f64,
    pub urgency: ReorderUrgency,
    pub days_remaining: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PurchaseOrderSummary {
    pub total_items: usize,
    pub total_cost: f64,
    pub urgent_count: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PurchaseOrderPlan {
    pub lines: Vec<PurchaseOrderLine>,
    pub summary: PurchaseOrderSummary,
}

// ==========================================
// 用量预测
// ==========================================

/// 单日用量记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub date: NaiveDate,
    pub quantity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageTrend {
    Increasing,
    Stable,
    Decreasing,
}

/// 预测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "forecast", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryForecast {
    /// 历史记录不足 7 条
    InsufficientData {
        ingredient_id: String,
        records: usize,
        recommendation: String,
    },
    Projected {
        ingredient_id: String,
        projected_daily_usage: f64,
        projected_total_usage: f64,
        days_of_supply: f64,
        /// 相对变化率（0.1 = +10%）
        trend_ratio: f64,
        trend: UsageTrend,
        recommendation: String,
    },
}

impl InventoryForecast {
    pub fn ingredient_id(&self) -> &str {
        match self {
            InventoryForecast::InsufficientData { ingredient_id, .. }
            | InventoryForecast::Projected { ingredient_id, .. } => ingredient_id,
        }
    }
}

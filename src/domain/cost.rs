// ==========================================
// UMKM 餐饮经营自动化 - 成本领域模型 (HPP)
// ==========================================
// 职责: 运营成本项、配方成本结果、成本变动记录、定价档位
// 红线: total_cost = material_cost + labor_cost + overhead_cost
// ==========================================

use crate::domain::types::{CostCategory, CostImpact, CostPeriod};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// 运营成本项
// ==========================================

/// 运营成本项 (Operational Cost)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalCost {
    pub id: String,
    pub name: String,
    pub category: CostCategory,
    pub amount: f64,
    pub period: CostPeriod,
    pub is_active: bool,
    /// 是否自动分摊到所有配方
    pub auto_allocate: bool,
}

impl OperationalCost {
    /// 是否参与间接费用分摊（人工费单独按工时计）
    pub fn is_allocated_overhead(&self) -> bool {
        self.is_active && self.auto_allocate && self.category != CostCategory::Labor
    }
}

/// 默认运营成本目录（印尼 UMKM 常见口径）
pub fn default_operational_costs() -> Vec<OperationalCost> {
    vec![
        OperationalCost {
            id: "labor_hourly_rate".to_string(),
            name: "Upah Kerja per Jam".to_string(),
            category: CostCategory::Labor,
            amount: 50_000.0,
            period: CostPeriod::Hourly,
            is_active: true,
            auto_allocate: true,
        },
        OperationalCost {
            id: "overhead_electricity".to_string(),
            name: "Listrik".to_string(),
            category: CostCategory::Overhead,
            amount: 2_000.0,
            period: CostPeriod::PerBatch,
            is_active: true,
            auto_allocate: true,
        },
        OperationalCost {
            id: "overhead_gas".to_string(),
            name: "Gas".to_string(),
            category: CostCategory::Overhead,
            amount: 1_500.0,
            period: CostPeriod::PerBatch,
            is_active: true,
            auto_allocate: true,
        },
        OperationalCost {
            id: "overhead_rent".to_string(),
            name: "Sewa Tempat (Alokasi)".to_string(),
            category: CostCategory::Rent,
            amount: 500.0,
            period: CostPeriod::PerBatch,
            is_active: true,
            auto_allocate: true,
        },
    ]
}

// ==========================================
// 配方成本 (HPP)
// ==========================================

/// 配方成本计算结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeCost {
    pub recipe_id: String,
    pub recipe_name: String,
    pub material_cost: f64,
    pub labor_cost: f64,
    pub overhead_cost: f64,
    pub total_cost: f64,
    pub cost_per_serving: f64,
    /// 缺少单价、按 0 计入的原料
    pub missing_prices: Vec<String>,
    pub last_calculated: NaiveDateTime,
}

impl RecipeCost {
    /// 由三个分项构造，总成本与每份成本在此统一计算
    pub fn from_components(
        recipe_id: impl Into<String>,
        recipe_name: impl Into<String>,
        servings: u32,
        material_cost: f64,
        labor_cost: f64,
        overhead_cost: f64,
        missing_prices: Vec<String>,
        last_calculated: NaiveDateTime,
    ) -> Self {
        let total_cost = material_cost + labor_cost + overhead_cost;
        let cost_per_serving = if servings > 0 {
            total_cost / f64::from(servings)
        } else {
            total_cost
        };

        Self {
            recipe_id: recipe_id.into(),
            recipe_name: recipe_name.into(),
            material_cost,
            labor_cost,
            overhead_cost,
            total_cost,
            cost_per_serving,
            missing_prices,
            last_calculated,
        }
    }
}

/// 单个配方的成本变动
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostChange {
    pub recipe_id: String,
    pub recipe_name: String,
    pub old_total: f64,
    pub new_total: f64,
    pub old_per_serving: f64,
    pub new_per_serving: f64,
    pub percent_change: f64,
    pub impact: CostImpact,
}

impl CostChange {
    pub fn between(old: &RecipeCost, new: &RecipeCost) -> Self {
        let per_serving_delta = new.cost_per_serving - old.cost_per_serving;
        Self {
            recipe_id: new.recipe_id.clone(),
            recipe_name: new.recipe_name.clone(),
            old_total: old.total_cost,
            new_total: new.total_cost,
            old_per_serving: old.cost_per_serving,
            new_per_serving: new.cost_per_serving,
            percent_change: percent_change(old.total_cost, new.total_cost),
            impact: impact_of(per_serving_delta),
        }
    }
}

/// 百分比变动 (new-old)/old·100；old 为 0 时返回 0
pub fn percent_change(old: f64, new: f64) -> f64 {
    if old == 0.0 {
        return 0.0;
    }
    (new - old) / old * 100.0
}

/// 按每份成本绝对变动额评估影响等级（> 1000 高，> 500 中）
pub fn impact_of(delta_per_serving: f64) -> CostImpact {
    let abs = delta_per_serving.abs();
    if abs > 1_000.0 {
        CostImpact::High
    } else if abs > 500.0 {
        CostImpact::Medium
    } else {
        CostImpact::Low
    }
}

// ==========================================
// 定价建议 / 价格历史
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingTier {
    Economy,
    Standard,
    Premium,
}

/// 建议售价档位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTier {
    pub tier: PricingTier,
    pub price: f64,
    pub margin_percent: f64,
}

/// 价格历史点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    pub recorded_at: NaiveDateTime,
}

/// 价格巡检发现的显著变动
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChangeSignal {
    pub ingredient_id: String,
    pub ingredient_name: String,
    pub old_price: f64,
    pub new_price: f64,
    pub percent_change: f64,
}

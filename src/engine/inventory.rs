// ==========================================
// UMKM 餐饮经营自动化 - 库存分析引擎
// ==========================================
// 职责: 库存状态分级、EOQ 补货建议、采购单、用量预测
// 输入: 原料快照 + 月度用量（由调用方提供）
// 输出: InventoryAnalysis / PurchaseOrderPlan / InventoryForecast
// 红线: 纯计算，不访问数据库
// ==========================================

use crate::config::InventoryConfig;
use crate::domain::{
    Ingredient, InventoryAnalysis, InventoryForecast, PurchaseOrderLine, PurchaseOrderPlan,
    PurchaseOrderSummary, ReorderRecommendation, ReorderUrgency, StockStatus, UsageRecord,
    UsageTrend,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::i18n::{t, t_with_args};
use std::collections::HashMap;
use tracing::instrument;

/// 月度用量折算日均用量的天数
const DAYS_PER_MONTH: f64 = 30.0;
/// 月度用量价值超过此值视为高价值原料
const HIGH_VALUE_MONTHLY: f64 = 1_000_000.0;
/// 库存超过 min_stock 的倍数时提示可能积压
const OVERSTOCK_INSIGHT_FACTOR: f64 = 5.0;
/// 趋势标签阈值（±10%）
const TREND_LABEL_THRESHOLD: f64 = 0.1;
/// 趋势建议阈值（±20%）
const TREND_ADVICE_THRESHOLD: f64 = 0.2;

/// 库存状态分级（并列时取更紧急的等级）
///
/// # 规则
/// - stock ≤ 0.5·min → Critical
/// - stock ≤ min → Low
/// - stock > 3·min → Overstocked
/// - 其余 → Adequate
/// - min == 0 时: stock ≤ 0 → Critical，否则 Adequate
pub fn classify_status(current_stock: f64, min_stock: f64) -> StockStatus {
    if min_stock <= 0.0 {
        return if current_stock <= 0.0 {
            StockStatus::Critical
        } else {
            StockStatus::Adequate
        };
    }

    if current_stock <= min_stock * 0.5 {
        StockStatus::Critical
    } else if current_stock <= min_stock {
        StockStatus::Low
    } else if current_stock > min_stock * 3.0 {
        StockStatus::Overstocked
    } else {
        StockStatus::Adequate
    }
}

// ==========================================
// InventoryAnalyzer
// ==========================================
pub struct InventoryAnalyzer {
    config: InventoryConfig,
}

impl InventoryAnalyzer {
    pub fn new(config: InventoryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// 批量分析原料库存
    ///
    /// # 参数
    /// - `ingredients`: 原料快照
    /// - `monthly_usage`: ingredient_id → 近 30 天用量（缺省视为 0）
    ///
    /// # 返回
    /// 与输入同序的分析结果；任一原料库存或用量为负时整体拒绝
    #[instrument(skip(self, ingredients, monthly_usage), fields(count = ingredients.len()))]
    pub fn analyze(
        &self,
        ingredients: &[Ingredient],
        monthly_usage: &HashMap<String, f64>,
    ) -> EngineResult<Vec<InventoryAnalysis>> {
        let analyses = ingredients
            .iter()
            .map(|ingredient| {
                let usage = monthly_usage.get(&ingredient.id).copied().unwrap_or(0.0);
                self.analyze_one(ingredient, usage)
            })
            .collect::<EngineResult<Vec<_>>>()?;

        tracing::debug!(
            critical = analyses.iter().filter(|a| a.status == StockStatus::Critical).count(),
            reorder = analyses.iter().filter(|a| a.reorder.should_reorder).count(),
            "库存分析完成"
        );
        Ok(analyses)
    }

    /// 分析单个原料
    pub fn analyze_one(
        &self,
        ingredient: &Ingredient,
        monthly_usage: f64,
    ) -> EngineResult<InventoryAnalysis> {
        Self::validate(ingredient, monthly_usage)?;

        let daily_usage = monthly_usage / DAYS_PER_MONTH;
        let days_remaining = if daily_usage > 0.0 {
            ingredient.current_stock / daily_usage
        } else {
            f64::INFINITY
        };

        let status = classify_status(ingredient.current_stock, ingredient.min_stock);
        let reorder =
            self.recommend_reorder(ingredient, monthly_usage, daily_usage, days_remaining);
        let insights = self.insights(ingredient, monthly_usage, daily_usage, days_remaining);

        Ok(InventoryAnalysis {
            ingredient: ingredient.clone(),
            status,
            monthly_usage,
            daily_usage,
            days_remaining,
            reorder,
            insights,
        })
    }

    fn validate(ingredient: &Ingredient, monthly_usage: f64) -> EngineResult<()> {
        let checks = [
            ("current_stock", ingredient.current_stock),
            ("min_stock", ingredient.min_stock),
            ("monthly_usage", monthly_usage),
        ];
        for (field, value) in checks {
            if value.is_nan() || value < 0.0 {
                return Err(EngineError::invalid(
                    field,
                    format!("原料 {} 的 {} 非法: {}", ingredient.id, field, value),
                ));
            }
        }
        if let Some(price) = ingredient.price_per_unit {
            if price.is_nan() || price < 0.0 {
                return Err(EngineError::invalid(
                    "price_per_unit",
                    format!("原料 {} 的单价非法: {}", ingredient.id, price),
                ));
            }
        }
        Ok(())
    }

    // ==========================================
    // 补货建议
    // ==========================================

    /// 经济订货量（不低于 min_stock）
    ///
    /// EOQ = sqrt(2 · 年用量 · 订货成本 / (单价 · 持有费率))
    pub fn economic_order_quantity(
        &self,
        monthly_usage: f64,
        price_per_unit: Option<f64>,
        min_stock: f64,
    ) -> f64 {
        let holding_cost = match price_per_unit {
            Some(price) => price * self.config.holding_rate,
            None => return min_stock,
        };
        if holding_cost <= 0.0 {
            return min_stock;
        }

        let annual_demand = monthly_usage * 12.0;
        let eoq = (2.0 * annual_demand * self.config.ordering_cost / holding_cost).sqrt();
        eoq.max(min_stock)
    }

    pub fn urgency_for(&self, days_remaining: f64) -> ReorderUrgency {
        if days_remaining <= self.config.urgent_days {
            ReorderUrgency::Urgent
        } else if days_remaining <= self.config.soon_days {
            ReorderUrgency::Soon
        } else {
            ReorderUrgency::Normal
        }
    }

    fn recommend_reorder(
        &self,
        ingredient: &Ingredient,
        monthly_usage: f64,
        daily_usage: f64,
        days_remaining: f64,
    ) -> ReorderRecommendation {
        let reorder_point = daily_usage * self.config.auto_reorder_days;
        let should_reorder = ingredient.current_stock <= reorder_point
            || ingredient.current_stock <= ingredient.min_stock;
        let quantity = self.economic_order_quantity(
            monthly_usage,
            ingredient.price_per_unit,
            ingredient.min_stock,
        );

        ReorderRecommendation {
            should_reorder,
            quantity,
            urgency: self.urgency_for(days_remaining),
            estimated_cost: quantity * ingredient.price_or_zero(),
            reorder_point,
        }
    }

    fn insights(
        &self,
        ingredient: &Ingredient,
        monthly_usage: f64,
        daily_usage: f64,
        days_remaining: f64,
    ) -> Vec<String> {
        let mut insights = Vec::new();

        if days_remaining < self.config.soon_days {
            let days = days_remaining.floor().to_string();
            insights.push(t_with_args("inventory.insight.runs_out", &[("days", &days)]));
        }

        if daily_usage > 0.0 {
            let qty = format!("{:.1}", monthly_usage);
            insights.push(t_with_args(
                "inventory.insight.monthly_usage",
                &[("qty", &qty), ("unit", &ingredient.unit)],
            ));
            if daily_usage > ingredient.min_stock / DAYS_PER_MONTH {
                insights.push(t("inventory.insight.fast_moving"));
            }
        } else {
            insights.push(t("inventory.insight.no_usage"));
        }

        let monthly_value = monthly_usage * ingredient.price_or_zero();
        if monthly_value > HIGH_VALUE_MONTHLY {
            let millions = format!("{:.1}", monthly_value / 1_000_000.0);
            insights.push(t_with_args("inventory.insight.high_value", &[("value", &millions)]));
        }

        if ingredient.min_stock > 0.0
            && ingredient.current_stock > ingredient.min_stock * OVERSTOCK_INSIGHT_FACTOR
        {
            insights.push(t("inventory.insight.overstock"));
        }

        insights
    }

    // ==========================================
    // 采购单
    // ==========================================

    /// 从分析结果生成采购单（仅 should_reorder 的原料）
    ///
    /// 排序: 紧急度降序，其次预估金额降序
    pub fn generate_purchase_orders(&self, analyses: &[InventoryAnalysis]) -> PurchaseOrderPlan {
        let mut lines: Vec<PurchaseOrderLine> = analyses
            .iter()
            .filter(|a| a.reorder.should_reorder)
            .map(|a| PurchaseOrderLine {
                ingredient_id: a.ingredient.id.clone(),
                ingredient_name: a.ingredient.name.clone(),
                unit: a.ingredient.unit.clone(),
                quantity: a.reorder.quantity,
                estimated_cost: a.reorder.estimated_cost,
                urgency: a.reorder.urgency,
                days_remaining: a.days_remaining,
            })
            .collect();

        lines.sort_by(|a, b| {
            b.urgency
                .cmp(&a.urgency)
                .then_with(|| b.estimated_cost.total_cmp(&a.estimated_cost))
        });

        let summary = PurchaseOrderSummary {
            total_items: lines.len(),
            total_cost: lines.iter().map(|l| l.estimated_cost).sum(),
            urgent_count: lines
                .iter()
                .filter(|l| l.urgency == ReorderUrgency::Urgent)
                .count(),
        };

        tracing::info!(
            total_items = summary.total_items,
            urgent_count = summary.urgent_count,
            total_cost = summary.total_cost,
            "采购单生成完成"
        );
        PurchaseOrderPlan { lines, summary }
    }

    // ==========================================
    // 用量预测
    // ==========================================

    /// 基于日用量历史的需求预测
    ///
    /// # 参数
    /// - `history`: ingredient_id → 日用量记录（顺序不限）
    /// - `forecast_days`: 预测天数
    #[instrument(skip(self, ingredients, history), fields(count = ingredients.len()))]
    pub fn predict_needs(
        &self,
        ingredients: &[Ingredient],
        history: &HashMap<String, Vec<UsageRecord>>,
        forecast_days: u32,
    ) -> Vec<InventoryForecast> {
        ingredients
            .iter()
            .map(|ingredient| {
                let records = history.get(&ingredient.id).map(Vec::as_slice).unwrap_or(&[]);
                self.forecast_one(ingredient, records, forecast_days)
            })
            .collect()
    }

    fn forecast_one(
        &self,
        ingredient: &Ingredient,
        records: &[UsageRecord],
        forecast_days: u32,
    ) -> InventoryForecast {
        if records.len() < self.config.forecast_min_records {
            return InventoryForecast::InsufficientData {
                ingredient_id: ingredient.id.clone(),
                records: records.len(),
                recommendation: t("forecast.insufficient_data"),
            };
        }

        let mut sorted: Vec<&UsageRecord> = records.iter().collect();
        sorted.sort_by_key(|r| r.date);
        let window_start = sorted.len().saturating_sub(self.config.forecast_window);
        let recent: Vec<f64> = sorted[window_start..].iter().map(|r| r.quantity).collect();

        let average = mean(&recent);
        let trend_ratio = trend_of(&recent);
        let projected_daily_usage = average * (1.0 + trend_ratio);
        let projected_total_usage = projected_daily_usage * f64::from(forecast_days);
        let days_of_supply = if projected_daily_usage > 0.0 {
            ingredient.current_stock / projected_daily_usage
        } else {
            f64::INFINITY
        };

        let trend = if trend_ratio > TREND_LABEL_THRESHOLD {
            UsageTrend::Increasing
        } else if trend_ratio < -TREND_LABEL_THRESHOLD {
            UsageTrend::Decreasing
        } else {
            UsageTrend::Stable
        };

        let recommendation =
            forecast_recommendation(ingredient, days_of_supply, projected_total_usage, trend_ratio);

        InventoryForecast::Projected {
            ingredient_id: ingredient.id.clone(),
            projected_daily_usage,
            projected_total_usage,
            days_of_supply,
            trend_ratio,
            trend,
            recommendation,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// (后半段均值 − 前半段均值) / 前半段均值；前半段均值为 0 时趋势为 0
fn trend_of(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let (first, second) = values.split_at(values.len() / 2);
    let first_avg = mean(first);
    if first_avg == 0.0 {
        return 0.0;
    }
    (mean(second) - first_avg) / first_avg
}

fn forecast_recommendation(
    ingredient: &Ingredient,
    days_of_supply: f64,
    projected_total_usage: f64,
    trend_ratio: f64,
) -> String {
    let unit = ingredient.unit.as_str();
    if days_of_supply < 7.0 {
        let qty = (projected_total_usage * 1.5).ceil().to_string();
        return t_with_args("forecast.urgent_reorder", &[("qty", &qty), ("unit", unit)]);
    }
    if days_of_supply < 14.0 {
        let qty = projected_total_usage.ceil().to_string();
        return t_with_args("forecast.schedule_reorder", &[("qty", &qty), ("unit", unit)]);
    }
    if trend_ratio > TREND_ADVICE_THRESHOLD {
        let pct = format!("{:.0}", trend_ratio * 100.0);
        return t_with_args("forecast.usage_increasing", &[("pct", &pct)]);
    }
    if trend_ratio < -TREND_ADVICE_THRESHOLD {
        let pct = format!("{:.0}", trend_ratio * 100.0);
        return t_with_args("forecast.usage_declining", &[("pct", &pct)]);
    }
    if days_of_supply.is_infinite() {
        return t("forecast.adequate_unbounded");
    }
    let days = days_of_supply.floor().to_string();
    t_with_args("forecast.adequate", &[("days", &days)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn analyzer() -> InventoryAnalyzer {
        InventoryAnalyzer::new(InventoryConfig::default())
    }

    fn flour(stock: f64, min: f64, price: Option<f64>) -> Ingredient {
        Ingredient::new("ING-FLOUR", "Tepung Terigu", "kg", stock, min, price)
    }

    #[test]
    fn test_classify_status_thresholds() {
        assert_eq!(classify_status(5.0, 10.0), StockStatus::Critical);
        assert_eq!(classify_status(5.1, 10.0), StockStatus::Low);
        assert_eq!(classify_status(10.0, 10.0), StockStatus::Low);
        assert_eq!(classify_status(30.0, 10.0), StockStatus::Adequate);
        assert_eq!(classify_status(30.1, 10.0), StockStatus::Overstocked);
        assert_eq!(classify_status(0.0, 0.0), StockStatus::Critical);
        assert_eq!(classify_status(100.0, 0.0), StockStatus::Adequate);
    }

    /// 面粉 5 kg / 下限 10 kg：正好处于 0.5·下限，取更紧急的 Critical
    #[test]
    fn test_flour_at_half_min_stock_is_critical() {
        let analysis = analyzer()
            .analyze_one(&flour(5.0, 10.0, Some(10_000.0)), 0.0)
            .unwrap();
        assert_eq!(analysis.status, StockStatus::Critical);
        assert!(analysis.reorder.should_reorder);
    }

    #[test]
    fn test_zero_usage_has_unbounded_supply() {
        let analysis = analyzer().analyze_one(&flour(20.0, 10.0, Some(10_000.0)), 0.0).unwrap();
        assert!(analysis.has_unbounded_supply());
        assert_eq!(analysis.reorder.urgency, ReorderUrgency::Normal);
        assert!(!analysis.reorder.should_reorder);
    }

    #[test]
    fn test_reorder_when_below_min() {
        let analysis = analyzer().analyze_one(&flour(5.0, 10.0, Some(10_000.0)), 60.0).unwrap();
        // 日均 2kg，可用 2.5 天
        assert!((analysis.days_remaining - 2.5).abs() < 1e-9);
        assert_eq!(analysis.reorder.urgency, ReorderUrgency::Urgent);
        assert!(analysis.reorder.should_reorder);
        assert!(analysis.reorder.quantity >= 10.0);
        assert!(
            (analysis.reorder.estimated_cost - analysis.reorder.quantity * 10_000.0).abs() < 1e-6
        );
    }

    #[test]
    fn test_eoq_formula_and_floor() {
        let a = analyzer();
        // sqrt(2 · 1200 · 50000 / (10000 · 0.2)) = sqrt(60000) ≈ 244.95
        let eoq = a.economic_order_quantity(100.0, Some(10_000.0), 10.0);
        assert!((eoq - 60_000f64.sqrt()).abs() < 1e-9);
        assert_eq!(a.economic_order_quantity(0.0, Some(10_000.0), 10.0), 10.0);
        assert_eq!(a.economic_order_quantity(100.0, None, 7.0), 7.0);
        assert_eq!(a.economic_order_quantity(100.0, Some(0.0), 7.0), 7.0);
    }

    #[test]
    fn test_negative_inputs_rejected() {
        let a = analyzer();
        assert!(a.analyze_one(&flour(-1.0, 10.0, None), 0.0).is_err());
        assert!(a.analyze_one(&flour(1.0, 10.0, None), -5.0).is_err());
        assert!(a.analyze_one(&flour(1.0, 10.0, None), f64::NAN).is_err());
    }

    #[test]
    fn test_analyze_preserves_input_order() {
        let ingredients = vec![
            Ingredient::new("B", "Gula", "kg", 1.0, 2.0, None),
            Ingredient::new("A", "Garam", "kg", 1.0, 2.0, None),
        ];
        let out = analyzer().analyze(&ingredients, &HashMap::new()).unwrap();
        assert_eq!(out[0].ingredient.id, "B");
        assert_eq!(out[1].ingredient.id, "A");
    }

    #[test]
    fn test_purchase_orders_sorted_by_urgency_then_cost() {
        let a = analyzer();
        let ingredients = vec![
            Ingredient::new("cheap-urgent", "Garam", "kg", 1.0, 5.0, Some(1_000.0)),
            Ingredient::new("soon", "Gula", "kg", 10.0, 12.0, Some(15_000.0)),
            Ingredient::new("pricey-urgent", "Mentega", "kg", 1.0, 5.0, Some(80_000.0)),
            Ingredient::new("fine", "Telur", "kg", 100.0, 5.0, Some(25_000.0)),
        ];
        let usage = HashMap::from([
            ("cheap-urgent".to_string(), 30.0),
            ("soon".to_string(), 60.0),
            ("pricey-urgent".to_string(), 30.0),
        ]);
        let analyses = a.analyze(&ingredients, &usage).unwrap();
        let plan = a.generate_purchase_orders(&analyses);

        let ids: Vec<&str> = plan.lines.iter().map(|l| l.ingredient_id.as_str()).collect();
        assert_eq!(ids, vec!["pricey-urgent", "cheap-urgent", "soon"]);
        assert_eq!(plan.summary.total_items, 3);
        assert_eq!(plan.summary.urgent_count, 2);
        let total: f64 = plan.lines.iter().map(|l| l.estimated_cost).sum();
        assert!((plan.summary.total_cost - total).abs() < 1e-6);
    }

    #[test]
    fn test_forecast_insufficient_and_trend() {
        let a = analyzer();
        let day = |d: u32| NaiveDate::from_ymd_opt(2026, 3, d).unwrap();
        let ing = flour(100.0, 10.0, Some(10_000.0));

        let short: Vec<UsageRecord> = (1..=6)
            .map(|d| UsageRecord { date: day(d), quantity: 1.0 })
            .collect();
        let history = HashMap::from([(ing.id.clone(), short)]);
        let out = a.predict_needs(std::slice::from_ref(&ing), &history, 30);
        assert!(matches!(out[0], InventoryForecast::InsufficientData { records: 6, .. }));

        // 倒序输入: 前 7 天每天 1，后 7 天每天 2 → 趋势 +100%
        let rising: Vec<UsageRecord> = (1..=14)
            .rev()
            .map(|d| UsageRecord { date: day(d), quantity: if d <= 7 { 1.0 } else { 2.0 } })
            .collect();
        let history = HashMap::from([(ing.id.clone(), rising)]);
        match &a.predict_needs(std::slice::from_ref(&ing), &history, 30)[0] {
            InventoryForecast::Projected { trend_ratio, trend, projected_daily_usage, .. } => {
                assert!((trend_ratio - 1.0).abs() < 1e-9);
                assert_eq!(*trend, UsageTrend::Increasing);
                assert!((projected_daily_usage - 3.0).abs() < 1e-9);
            }
            other => panic!("预期 Projected, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_trend_zero_first_half() {
        assert_eq!(trend_of(&[0.0, 0.0, 3.0, 3.0]), 0.0);
        assert_eq!(trend_of(&[2.0]), 0.0);
    }
}

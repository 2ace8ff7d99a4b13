// ==========================================
// UMKM 餐饮经营自动化 - 智能通知合成引擎
// ==========================================
// 职责: 根据库存分析 / 订单 / 财务指标合成提醒
// 输入: InventoryAnalysis 列表 + 订单 + 可选 FinancialMetrics + now
// 输出: 按优先级降序、时间降序排列的 SmartNotification（截断到上限）
// 红线: 纯计算，不写库
// ==========================================

use crate::config::NotificationConfig;
use crate::domain::{
    FinancialMetrics, InventoryAnalysis, NotificationCategory, NotificationPriority,
    NotificationType, Order, SmartNotification, StockStatus,
};
use crate::engine::alerts::format_rupiah;
use crate::i18n::{t, t_with_args};
use chrono::NaiveDateTime;
use serde_json::json;
use tracing::instrument;

/// 优先级降序，同优先级时间降序（稳定排序）
pub fn sort_by_priority_then_recency(notifications: &mut [SmartNotification]) {
    notifications.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
}

pub struct NotificationSynthesizer {
    config: NotificationConfig,
}

impl NotificationSynthesizer {
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    /// 合成经营提醒
    ///
    /// # 参数
    /// - `analyses`: 库存分析结果
    /// - `orders`: 订单快照
    /// - `metrics`: 财务指标（None 时跳过财务类提醒）
    /// - `now`: 当前时间（同时作为通知时间戳）
    #[instrument(skip_all, fields(analyses = analyses.len(), orders = orders.len()))]
    pub fn synthesize(
        &self,
        analyses: &[InventoryAnalysis],
        orders: &[Order],
        metrics: Option<&FinancialMetrics>,
        now: NaiveDateTime,
    ) -> Vec<SmartNotification> {
        let mut out = Vec::new();

        self.inventory_notifications(analyses, now, &mut out);
        self.order_notifications(orders, now, &mut out);
        if let Some(metrics) = metrics {
            self.financial_notifications(metrics, now, &mut out);
        }

        sort_by_priority_then_recency(&mut out);
        out.truncate(self.config.max_synthesized);

        tracing::debug!(count = out.len(), "通知合成完成");
        out
    }

    // ==========================================
    // 库存
    // ==========================================

    fn inventory_notifications(
        &self,
        analyses: &[InventoryAnalysis],
        now: NaiveDateTime,
        out: &mut Vec<SmartNotification>,
    ) {
        for analysis in analyses.iter().filter(|a| a.status == StockStatus::Critical) {
            let ingredient = &analysis.ingredient;
            out.push(
                SmartNotification::new(
                    NotificationType::Error,
                    NotificationCategory::Inventory,
                    NotificationPriority::High,
                    t("notification.synth.critical_stock.title"),
                    t_with_args(
                        "notification.synth.critical_stock.message",
                        &[
                            ("ingredient", &ingredient.name),
                            ("stock", &format!("{:.1}", ingredient.current_stock)),
                            ("unit", &ingredient.unit),
                        ],
                    ),
                    now,
                )
                .with_data(json!({
                    "ingredient_id": ingredient.id,
                    "reorder": analysis.reorder,
                })),
            );
        }

        let low: Vec<&str> = analyses
            .iter()
            .filter(|a| a.status == StockStatus::Low)
            .map(|a| a.ingredient.id.as_str())
            .collect();
        if !low.is_empty() {
            out.push(
                SmartNotification::new(
                    NotificationType::Warning,
                    NotificationCategory::Inventory,
                    NotificationPriority::Medium,
                    t("notification.synth.low_stock.title"),
                    t_with_args(
                        "notification.synth.low_stock.message",
                        &[("count", &low.len().to_string())],
                    ),
                    now,
                )
                .with_data(json!({ "ingredient_ids": low })),
            );
        }

        let overstocked: Vec<&str> = analyses
            .iter()
            .filter(|a| a.status == StockStatus::Overstocked)
            .map(|a| a.ingredient.id.as_str())
            .collect();
        if !overstocked.is_empty() {
            out.push(
                SmartNotification::new(
                    NotificationType::Info,
                    NotificationCategory::Inventory,
                    NotificationPriority::Low,
                    t("notification.synth.overstock.title"),
                    t_with_args(
                        "notification.synth.overstock.message",
                        &[("count", &overstocked.len().to_string())],
                    ),
                    now,
                )
                .with_data(json!({ "ingredient_ids": overstocked })),
            );
        }
    }

    // ==========================================
    // 订单
    // ==========================================

    fn order_notifications(
        &self,
        orders: &[Order],
        now: NaiveDateTime,
        out: &mut Vec<SmartNotification>,
    ) {
        let mut urgent = Vec::new();
        let mut overdue = Vec::new();
        for order in orders.iter().filter(|o| o.status.is_open()) {
            let Some(hours) = order.hours_until_delivery(now) else {
                continue;
            };
            if hours > 0.0 && hours <= self.config.urgent_order_hours {
                urgent.push(order.id.as_str());
            } else if hours < 0.0 {
                overdue.push(order.id.as_str());
            }
        }

        if !urgent.is_empty() {
            out.push(
                SmartNotification::new(
                    NotificationType::Warning,
                    NotificationCategory::Orders,
                    NotificationPriority::High,
                    t("notification.synth.urgent_orders.title"),
                    t_with_args(
                        "notification.synth.urgent_orders.message",
                        &[("count", &urgent.len().to_string())],
                    ),
                    now,
                )
                .with_data(json!({ "order_ids": urgent })),
            );
        }

        if !overdue.is_empty() {
            out.push(
                SmartNotification::new(
                    NotificationType::Error,
                    NotificationCategory::Orders,
                    NotificationPriority::High,
                    t("notification.synth.overdue_orders.title"),
                    t_with_args(
                        "notification.synth.overdue_orders.message",
                        &[("count", &overdue.len().to_string())],
                    ),
                    now,
                )
                .with_data(json!({ "order_ids": overdue })),
            );
        }
    }

    // ==========================================
    // 财务
    // ==========================================

    fn financial_notifications(
        &self,
        metrics: &FinancialMetrics,
        now: NaiveDateTime,
        out: &mut Vec<SmartNotification>,
    ) {
        if metrics.gross_margin_percent < self.config.low_margin_percent {
            out.push(
                SmartNotification::new(
                    NotificationType::Warning,
                    NotificationCategory::Financial,
                    NotificationPriority::High,
                    t("notification.synth.low_margin.title"),
                    t_with_args(
                        "notification.synth.low_margin.message",
                        &[("pct", &format!("{:.1}", metrics.gross_margin_percent))],
                    ),
                    now,
                )
                .with_data(json!({ "gross_margin_percent": metrics.gross_margin_percent })),
            );
        }

        if metrics.net_profit < 0.0 {
            out.push(
                SmartNotification::new(
                    NotificationType::Error,
                    NotificationCategory::Financial,
                    NotificationPriority::High,
                    t("notification.synth.negative_profit.title"),
                    t_with_args(
                        "notification.synth.negative_profit.message",
                        &[("amount", &format_rupiah(metrics.net_profit.abs()))],
                    ),
                    now,
                )
                .with_data(json!({ "net_profit": metrics.net_profit })),
            );
        }

        if metrics.revenue > 0.0
            && metrics.inventory_value / metrics.revenue > self.config.inventory_revenue_ratio
        {
            out.push(
                SmartNotification::new(
                    NotificationType::Warning,
                    NotificationCategory::Financial,
                    NotificationPriority::Medium,
                    t("notification.synth.inventory_ratio.title"),
                    t("notification.synth.inventory_ratio.message"),
                    now,
                )
                .with_data(json!({
                    "inventory_value": metrics.inventory_value,
                    "revenue": metrics.revenue,
                })),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InventoryConfig;
    use crate::domain::{Ingredient, OrderStatus};
    use crate::engine::inventory::InventoryAnalyzer;
    use chrono::{Duration, NaiveDate};
    use std::collections::HashMap;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn order(id: &str, status: OrderStatus, in_hours: i64) -> Order {
        Order {
            id: id.to_string(),
            order_no: format!("ORD-{}", id),
            customer_id: None,
            customer_name: None,
            status,
            delivery_at: Some(now() + Duration::hours(in_hours)),
            total_amount: 100_000.0,
            items: vec![],
        }
    }

    fn analyses() -> Vec<InventoryAnalysis> {
        let analyzer = InventoryAnalyzer::new(InventoryConfig::default());
        let ingredients = vec![
            Ingredient::new("a", "Tepung", "kg", 1.0, 10.0, Some(10_000.0)), // critical
            Ingredient::new("b", "Gula", "kg", 8.0, 10.0, Some(15_000.0)),   // low
            Ingredient::new("c", "Minyak", "liter", 9.0, 10.0, None),        // low
            Ingredient::new("d", "Garam", "kg", 50.0, 10.0, Some(5_000.0)),  // overstocked
        ];
        analyzer.analyze(&ingredients, &HashMap::new()).unwrap()
    }

    #[test]
    fn test_synthesize_covers_all_rules() {
        let synth = NotificationSynthesizer::new(NotificationConfig::default());
        let orders = vec![
            order("1", OrderStatus::Confirmed, 5),
            order("2", OrderStatus::Pending, -3),
            order("3", OrderStatus::Delivered, -3),
            order("4", OrderStatus::Confirmed, 72),
        ];
        let metrics = FinancialMetrics {
            revenue: 1_000_000.0,
            gross_margin_percent: 18.0,
            net_profit: -250_000.0,
            inventory_value: 600_000.0,
        };

        let out = synth.synthesize(&analyses(), &orders, Some(&metrics), now());

        // critical + low 汇总 + overstock + urgent + overdue + margin + loss + ratio
        assert_eq!(out.len(), 8);
        let priorities: Vec<_> = out.iter().map(|n| n.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(priorities, sorted);
        assert_eq!(out.last().unwrap().priority, NotificationPriority::Low);

        let orders_notes: Vec<_> = out
            .iter()
            .filter(|n| n.category == NotificationCategory::Orders)
            .collect();
        assert_eq!(orders_notes.len(), 2);
    }

    #[test]
    fn test_synthesize_truncates_and_skips_missing_metrics() {
        let config = NotificationConfig {
            max_synthesized: 2,
            ..NotificationConfig::default()
        };
        let synth = NotificationSynthesizer::new(config);
        let out = synth.synthesize(&analyses(), &[], None, now());
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|n| n.category == NotificationCategory::Inventory));
        assert_eq!(out[0].priority, NotificationPriority::High);
    }

    #[test]
    fn test_healthy_inputs_produce_nothing() {
        let synth = NotificationSynthesizer::new(NotificationConfig::default());
        let metrics = FinancialMetrics {
            revenue: 1_000_000.0,
            gross_margin_percent: 40.0,
            net_profit: 100_000.0,
            inventory_value: 100_000.0,
        };
        let orders = [order("1", OrderStatus::Confirmed, 72)];
        let out = synth.synthesize(&[], &orders, Some(&metrics), now());
        assert!(out.is_empty());
    }
}

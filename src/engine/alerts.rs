// ==========================================
// UMKM 餐饮经营自动化 - 通知构建器
// ==========================================
// 职责: 将引擎结果翻译为 SmartNotification（标题/正文走 i18n）
// 说明: 只构建不持久化；持久化由 NotificationCenter 负责
// ==========================================

use crate::domain::{
    CostChange, InventoryAnalysis, NotificationCategory, NotificationPriority, NotificationType,
    ProductionSchedule, ProductionTask, SmartNotification, StockSeverity,
};
use crate::i18n::{t, t_with_args};
use chrono::NaiveDateTime;
use serde_json::json;

/// 印尼盾金额格式: Rp 24.000（千分位为点，取整）
pub fn format_rupiah(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

fn direction_word(delta: f64) -> String {
    if delta > 0.0 {
        t("common.up")
    } else {
        t("common.down")
    }
}

fn pct1(value: f64) -> String {
    format!("{:.1}", value.abs())
}

fn qty1(value: f64) -> String {
    format!("{:.1}", value)
}

// ==========================================
// 成本 (HPP)
// ==========================================

/// 原料调价汇总通知
///
/// 涨价 → Warning，降价 → Info；|变动| > 阈值 → High，否则 Medium
pub fn price_change_summary(
    ingredient_id: &str,
    ingredient_name: &str,
    percent_change: f64,
    affected_recipes: usize,
    high_impact_percent: f64,
    ts: NaiveDateTime,
) -> SmartNotification {
    let kind = if percent_change > 0.0 {
        NotificationType::Warning
    } else {
        NotificationType::Info
    };
    let priority = if percent_change.abs() > high_impact_percent {
        NotificationPriority::High
    } else {
        NotificationPriority::Medium
    };
    let title_key = if percent_change > 0.0 {
        "notification.price_change.title_up"
    } else {
        "notification.price_change.title_down"
    };

    SmartNotification::new(
        kind,
        NotificationCategory::Financial,
        priority,
        t(title_key),
        t_with_args(
            "notification.price_change.message",
            &[
                ("ingredient", ingredient_name),
                ("direction", &direction_word(percent_change)),
                ("pct", &pct1(percent_change)),
                ("count", &affected_recipes.to_string()),
            ],
        ),
        ts,
    )
    .with_data(json!({
        "ingredient_id": ingredient_id,
        "percent_change": percent_change,
        "affected_recipes": affected_recipes,
    }))
}

/// 单个配方 HPP 显著变动
pub fn recipe_cost_changed(change: &CostChange, ts: NaiveDateTime) -> SmartNotification {
    SmartNotification::new(
        NotificationType::Warning,
        NotificationCategory::Financial,
        NotificationPriority::Medium,
        t_with_args("notification.recipe_cost.title", &[("recipe", &change.recipe_name)]),
        t_with_args(
            "notification.recipe_cost.message",
            &[
                ("direction", &direction_word(change.percent_change)),
                ("pct", &pct1(change.percent_change)),
                ("amount", &format_rupiah(change.new_per_serving)),
            ],
        ),
        ts,
    )
    .with_data(json!({
        "recipe_id": change.recipe_id,
        "old_total": change.old_total,
        "new_total": change.new_total,
        "percent_change": change.percent_change,
        "impact": change.impact,
    }))
}

pub fn operational_cost_changed(
    cost_id: &str,
    cost_name: &str,
    old_amount: f64,
    new_amount: f64,
    ts: NaiveDateTime,
) -> SmartNotification {
    SmartNotification::new(
        NotificationType::Info,
        NotificationCategory::Financial,
        NotificationPriority::Medium,
        t("notification.operational_cost.title"),
        t_with_args(
            "notification.operational_cost.message",
            &[
                ("name", cost_name),
                ("old", &format_rupiah(old_amount)),
                ("new", &format_rupiah(new_amount)),
            ],
        ),
        ts,
    )
    .with_data(json!({ "cost_id": cost_id, "old_amount": old_amount, "new_amount": new_amount }))
}

pub fn pricing_review(
    cost_id: &str,
    cost_name: &str,
    percent_change: f64,
    ts: NaiveDateTime,
) -> SmartNotification {
    SmartNotification::new(
        NotificationType::Warning,
        NotificationCategory::Financial,
        NotificationPriority::High,
        t("notification.pricing_review.title"),
        t_with_args(
            "notification.pricing_review.message",
            &[
                ("name", cost_name),
                ("direction", &direction_word(percent_change)),
                ("pct", &pct1(percent_change)),
            ],
        ),
        ts,
    )
    .with_data(json!({ "cost_id": cost_id, "percent_change": percent_change }))
}

pub fn batch_recalculation_completed(
    recalculated: usize,
    failed: usize,
    reason: &str,
    ts: NaiveDateTime,
) -> SmartNotification {
    SmartNotification::new(
        NotificationType::Info,
        NotificationCategory::Financial,
        NotificationPriority::Medium,
        t("notification.batch_recalc.title"),
        t_with_args(
            "notification.batch_recalc.message",
            &[("count", &recalculated.to_string()), ("reason", reason)],
        ),
        ts,
    )
    .with_data(json!({ "recalculated": recalculated, "failed": failed, "reason": reason }))
}

// ==========================================
// 库存
// ==========================================

/// 库存告警（带补货建议）
///
/// 断货 → High/Error；严重不足 → High/Error；偏低 → Medium/Warning
pub fn stock_alert(
    analysis: &InventoryAnalysis,
    severity: StockSeverity,
    out_of_stock: bool,
    ts: NaiveDateTime,
) -> SmartNotification {
    let ingredient = &analysis.ingredient;
    let (kind, priority, title) = if out_of_stock {
        (
            NotificationType::Error,
            NotificationPriority::High,
            t("notification.out_of_stock.title"),
        )
    } else if severity == StockSeverity::Critical {
        (
            NotificationType::Error,
            NotificationPriority::High,
            t("notification.low_stock.title_critical"),
        )
    } else {
        (
            NotificationType::Warning,
            NotificationPriority::Medium,
            t("notification.low_stock.title"),
        )
    };

    let qty = qty1(analysis.reorder.quantity);
    let message = if out_of_stock {
        t_with_args(
            "notification.out_of_stock.message",
            &[("ingredient", &ingredient.name), ("qty", &qty), ("unit", &ingredient.unit)],
        )
    } else {
        t_with_args(
            "notification.low_stock.message",
            &[
                ("ingredient", &ingredient.name),
                ("stock", &qty1(ingredient.current_stock)),
                ("min", &qty1(ingredient.min_stock)),
                ("qty", &qty),
                ("unit", &ingredient.unit),
            ],
        )
    };

    SmartNotification::new(kind, NotificationCategory::Inventory, priority, title, message, ts)
        .with_data(json!({
            "ingredient_id": ingredient.id,
            "status": analysis.status,
            "reorder": analysis.reorder,
        }))
}

// ==========================================
// 生产
// ==========================================

pub fn batch_completed(
    order_id: &str,
    recipe_name: &str,
    quantity: u32,
    ts: NaiveDateTime,
) -> SmartNotification {
    SmartNotification::new(
        NotificationType::Success,
        NotificationCategory::Production,
        NotificationPriority::Low,
        t("notification.batch_completed.title"),
        t_with_args(
            "notification.batch_completed.message",
            &[("recipe", recipe_name), ("qty", &quantity.to_string())],
        ),
        ts,
    )
    .with_data(json!({ "order_id": order_id }))
}

pub fn task_completed(task: &ProductionTask, ts: NaiveDateTime) -> SmartNotification {
    batch_completed(&task.order_id, &task.recipe_name, task.quantity, ts)
}

/// 排程相关通知：满负荷 / 每条冲突 / 优化汇总
pub fn schedule_notifications(
    schedule: &ProductionSchedule,
    high_workload_percent: f64,
    ts: NaiveDateTime,
) -> Vec<SmartNotification> {
    let mut out = Vec::new();
    let date = schedule.date.to_string();

    if schedule.workload_percent > high_workload_percent {
        out.push(
            SmartNotification::new(
                NotificationType::Warning,
                NotificationCategory::Production,
                NotificationPriority::High,
                t("notification.schedule.full.title"),
                t_with_args(
                    "notification.schedule.full.message",
                    &[("date", &date), ("pct", &format!("{:.0}", schedule.workload_percent))],
                ),
                ts,
            )
            .with_data(json!({ "schedule_id": schedule.id })),
        );
    }

    for conflict in &schedule.conflicts {
        out.push(
            SmartNotification::new(
                NotificationType::Error,
                NotificationCategory::Production,
                NotificationPriority::High,
                t("notification.schedule.conflict.title"),
                conflict.description.clone(),
                ts,
            )
            .with_data(json!({
                "schedule_id": schedule.id,
                "ingredient_id": conflict.ingredient_id,
                "affected_tasks": conflict.affected_tasks,
            })),
        );
    }

    if !schedule.optimizations.is_empty() {
        let saved: f64 = schedule.optimizations.iter().map(|o| o.time_saved_hours).sum();
        out.push(
            SmartNotification::new(
                NotificationType::Info,
                NotificationCategory::Production,
                NotificationPriority::Medium,
                t("notification.schedule.optimization.title"),
                t_with_args(
                    "notification.schedule.optimization.message",
                    &[
                        ("count", &schedule.optimizations.len().to_string()),
                        ("hours", &format!("{:.1}", saved)),
                    ],
                ),
                ts,
            )
            .with_data(json!({ "schedule_id": schedule.id, "time_saved_hours": saved })),
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_rupiah() {
        assert_eq!(format_rupiah(24_000.0), "Rp 24.000");
        assert_eq!(format_rupiah(1_234_567.4), "Rp 1.234.567");
        assert_eq!(format_rupiah(500.0), "Rp 500");
        assert_eq!(format_rupiah(-1_500.0), "-Rp 1.500");
        assert_eq!(format_rupiah(0.0), "Rp 0");
    }

    #[test]
    fn test_price_change_summary_priority() {
        let ts = chrono::NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let up = price_change_summary("ING-1", "Tepung", 20.0, 2, 10.0, ts);
        assert_eq!(up.kind, NotificationType::Warning);
        assert_eq!(up.priority, NotificationPriority::High);

        let down = price_change_summary("ING-1", "Tepung", -5.0, 2, 10.0, ts);
        assert_eq!(down.kind, NotificationType::Info);
        assert_eq!(down.priority, NotificationPriority::Medium);
    }
}

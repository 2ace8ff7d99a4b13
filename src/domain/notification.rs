// ==========================================
// UMKM 餐饮经营自动化 - 智能通知领域模型
// ==========================================

use crate::domain::types::{NotificationCategory, NotificationPriority, NotificationType};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// 智能通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartNotification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub category: NotificationCategory,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    /// 附加数据（相关实体 ID 等）
    pub data: serde_json::Value,
    pub timestamp: NaiveDateTime,
    pub is_read: bool,
}

impl SmartNotification {
    pub fn new(
        kind: NotificationType,
        category: NotificationCategory,
        priority: NotificationPriority,
        title: impl Into<String>,
        message: impl Into<String>,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            id: format!("notif_{}", Uuid::new_v4()),
            kind,
            category,
            priority,
            title: title.into(),
            message: message.into(),
            data: serde_json::Value::Null,
            timestamp,
            is_read: false,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// 经营财务指标（通知合成输入）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub revenue: f64,
    /// 毛利率（百分比，25 表示 25%）
    pub gross_margin_percent: f64,
    pub net_profit: f64,
    pub inventory_value: f64,
}

/// 通知汇总
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NotificationSummary {
    pub total: usize,
    pub unread: usize,
    pub high_priority_unread: usize,
    pub by_category: BTreeMap<NotificationCategory, usize>,
}

// ==========================================
// UMKM 餐饮经营自动化 - 领域类型定义
// ==========================================
// 职责: 状态/优先级/分类枚举及其稳定字符串表示
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 枚举字符串解析失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("无法解析 {type_name}: '{value}'")]
pub struct ParseEnumError {
    pub type_name: &'static str,
    pub value: String,
}

/// 为枚举生成 as_str / Display / FromStr
///
/// 数据库与事件载荷都使用同一套字符串，解析时大小写不敏感
macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// 稳定字符串标识
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_uppercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    _ => Err(ParseEnumError {
                        type_name: stringify!($ty),
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

// ==========================================
// 订单状态 (Order Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,    // 待确认
    Confirmed,  // 已确认
    InProgress, // 生产中
    Ready,      // 待交付
    Delivered,  // 已送达
    Completed,  // 已完成
    Cancelled,  // 已取消
}

string_enum!(OrderStatus {
    Pending => "PENDING",
    Confirmed => "CONFIRMED",
    InProgress => "IN_PROGRESS",
    Ready => "READY",
    Delivered => "DELIVERED",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

impl OrderStatus {
    /// 是否需要进入生产排程（已确认/生产中）
    pub fn needs_production(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::InProgress)
    }

    /// 是否仍待交付（用于紧急/逾期订单提醒）
    pub fn is_open(&self) -> bool {
        !matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Completed | OrderStatus::Cancelled
        )
    }
}

// ==========================================
// 库存状态 (Stock Status)
// ==========================================
// 顺序: Critical < Low < Adequate < Overstocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    Critical,    // 严重不足
    Low,         // 偏低
    Adequate,    // 充足
    Overstocked, // 积压
}

string_enum!(StockStatus {
    Critical => "CRITICAL",
    Low => "LOW",
    Adequate => "ADEQUATE",
    Overstocked => "OVERSTOCKED",
});

// ==========================================
// 补货紧急度 (Reorder Urgency)
// ==========================================
// 顺序: Normal < Soon < Urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReorderUrgency {
    Normal,
    Soon,
    Urgent,
}

string_enum!(ReorderUrgency {
    Normal => "NORMAL",
    Soon => "SOON",
    Urgent => "URGENT",
});

// ==========================================
// 库存告警级别 (Stock Alert Severity)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockSeverity {
    Warning,
    Critical,
}

string_enum!(StockSeverity {
    Warning => "WARNING",
    Critical => "CRITICAL",
});

// ==========================================
// 生产任务优先级 (Task Priority)
// ==========================================
// 顺序: Low < Medium < High < Urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

string_enum!(TaskPriority {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Urgent => "URGENT",
});

// ==========================================
// 生产任务状态 (Task Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Planned,    // 已排程
    InProgress, // 生产中
    Completed,  // 已完成
    Blocked,    // 原料不足阻断
}

string_enum!(TaskStatus {
    Planned => "PLANNED",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Blocked => "BLOCKED",
});

// ==========================================
// 通知类型 / 分类 / 优先级
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Info,
    Warning,
    Error,
    Success,
}

string_enum!(NotificationType {
    Info => "INFO",
    Warning => "WARNING",
    Error => "ERROR",
    Success => "SUCCESS",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    Inventory,
    Production,
    Financial,
    Orders,
}

string_enum!(NotificationCategory {
    Inventory => "INVENTORY",
    Production => "PRODUCTION",
    Financial => "FINANCIAL",
    Orders => "ORDERS",
});

// 顺序: Low < Medium < High
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
}

string_enum!(NotificationPriority {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
});

// ==========================================
// 运营成本 (Operational Cost)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostCategory {
    Labor,
    Overhead,
    Utility,
    Rent,
    Depreciation,
}

string_enum!(CostCategory {
    Labor => "LABOR",
    Overhead => "OVERHEAD",
    Utility => "UTILITY",
    Rent => "RENT",
    Depreciation => "DEPRECIATION",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostPeriod {
    Hourly,
    Daily,
    Monthly,
    PerBatch,
}

string_enum!(CostPeriod {
    Hourly => "HOURLY",
    Daily => "DAILY",
    Monthly => "MONTHLY",
    PerBatch => "PER_BATCH",
});

/// HPP 变动影响等级（按每份成本的绝对变动额）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostImpact {
    Low,
    Medium,
    High,
}

string_enum!(CostImpact {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
});

// ==========================================
// 库存流水 / 财务流水
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockTransactionKind {
    Purchase,   // 采购入库
    Usage,      // 生产消耗
    Adjustment, // 人工/取消订单调整
}

string_enum!(StockTransactionKind {
    Purchase => "PURCHASE",
    Usage => "USAGE",
    Adjustment => "ADJUSTMENT",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinancialRecordKind {
    Income,
    Expense,
}

string_enum!(FinancialRecordKind {
    Income => "INCOME",
    Expense => "EXPENSE",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_strings() {
        assert_eq!(OrderStatus::InProgress.as_str(), "IN_PROGRESS");
        assert_eq!("in_progress".parse::<OrderStatus>().unwrap(), OrderStatus::InProgress);
        assert_eq!("PER_BATCH".parse::<CostPeriod>().unwrap(), CostPeriod::PerBatch);
        assert_eq!(TaskStatus::Blocked.to_string(), "BLOCKED");
    }

    #[test]
    fn test_parse_unknown_value() {
        let err = "SHIPPED".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.type_name, "OrderStatus");
        assert_eq!(err.value, "SHIPPED");
    }

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::Urgent > TaskPriority::High);
        assert!(NotificationPriority::High > NotificationPriority::Medium);
        assert!(ReorderUrgency::Urgent > ReorderUrgency::Soon);
        assert!(StockStatus::Critical < StockStatus::Low);
    }

    #[test]
    fn test_order_status_helpers() {
        assert!(OrderStatus::Confirmed.needs_production());
        assert!(!OrderStatus::Pending.needs_production());
        assert!(OrderStatus::Ready.is_open());
        assert!(!OrderStatus::Cancelled.is_open());
    }
}

// ==========================================
// UMKM 餐饮经营自动化 - 订单领域模型
// ==========================================

use crate::domain::types::OrderStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 订单明细行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub recipe_id: String,
    /// 订购份数
    pub quantity: u32,
}

/// 客户订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub order_no: String,
    /// 关联客户（有则在订单完成时更新客户统计）
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub status: OrderStatus,
    /// 交付时间（本地时间）
    pub delivery_at: Option<NaiveDateTime>,
    pub total_amount: f64,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// 距离交付的小时数（可为负：已逾期）
    pub fn hours_until_delivery(&self, now: NaiveDateTime) -> Option<f64> {
        self.delivery_at
            .map(|at| (at - now).num_milliseconds() as f64 / 3_600_000.0)
    }
}

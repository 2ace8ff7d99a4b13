// ==========================================
// UMKM 餐饮经营自动化 - 流水记录
// ==========================================
// 职责: 库存流水与财务流水（由订单工作流写入）
// ==========================================

use crate::domain::types::{FinancialRecordKind, StockTransactionKind};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 库存流水（quantity 带符号：消耗为负，回补为正）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: String,
    pub ingredient_id: String,
    pub quantity: f64,
    pub kind: StockTransactionKind,
    /// 关联单据（订单号等）
    pub reference: String,
    pub unit_price: Option<f64>,
    pub occurred_at: NaiveDateTime,
}

impl StockTransaction {
    pub fn new(
        ingredient_id: impl Into<String>,
        quantity: f64,
        kind: StockTransactionKind,
        reference: impl Into<String>,
        unit_price: Option<f64>,
        occurred_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ingredient_id: ingredient_id.into(),
            quantity,
            kind,
            reference: reference.into(),
            unit_price,
            occurred_at,
        }
    }
}

/// 财务流水
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub id: String,
    pub kind: FinancialRecordKind,
    pub category: String,
    pub amount: f64,
    pub reference: String,
    pub description: String,
    pub record_date: NaiveDate,
}

impl FinancialRecord {
    /// 订单收入
    pub fn order_income(order_id: &str, order_no: &str, amount: f64, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: FinancialRecordKind::Income,
            category: "Revenue".to_string(),
            amount,
            reference: order_id.to_string(),
            description: format!("Order {}", order_no),
            record_date: date,
        }
    }
}

/// 订单完成的落账内容（仓储层在同一事务内写入）
///
/// - `usages`: 每种原料一条消耗流水，quantity 为负的实际扣减量
/// - `income`: 订单收入
/// - `customer_id`: 有则同时更新客户统计
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCompletion {
    pub order_id: String,
    pub usages: Vec<StockTransaction>,
    pub income: FinancialRecord,
    pub customer_id: Option<String>,
}

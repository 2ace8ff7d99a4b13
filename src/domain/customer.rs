// ==========================================
// UMKM 餐饮经营自动化 - 客户统计
// ==========================================
// 职责: 客户累计下单次数/金额/客单价/最近下单日期（订单完成时更新）
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerStats {
    pub customer_id: String,
    pub total_orders: u32,
    pub total_spent: f64,
    pub average_order_value: f64,
    pub last_order_date: Option<NaiveDate>,
}

impl CustomerStats {
    pub fn new(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            total_orders: 0,
            total_spent: 0.0,
            average_order_value: 0.0,
            last_order_date: None,
        }
    }

    /// 计入一笔已完成订单
    pub fn record_order(&mut self, amount: f64, date: NaiveDate) {
        self.total_orders += 1;
        self.total_spent += amount;
        self.average_order_value = self.total_spent / f64::from(self.total_orders);
        self.last_order_date = Some(date);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_follows_totals() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let mut stats = CustomerStats::new("C1");
        stats.record_order(100_000.0, day);
        stats.record_order(50_000.0, day.succ_opt().unwrap());

        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.total_spent, 150_000.0);
        assert_eq!(stats.average_order_value, 75_000.0);
        assert_eq!(stats.last_order_date, day.succ_opt());
    }
}

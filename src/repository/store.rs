// ==========================================
// UMKM 餐饮经营自动化 - 数据存储 Trait
// ==========================================
// 职责: 定义自动化核心依赖的数据访问接口（依赖倒置）
// 说明: 引擎与工作流只依赖此 trait；SqliteStore 为默认实现
// ==========================================

use crate::domain::{
    CustomerStats, FinancialRecord, Ingredient, Order, OperationalCost, OrderCompletion,
    OrderStatus, Recipe, RecipeCost, SmartNotification, StockTransaction, UsageRecord,
};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use chrono::NaiveDateTime;

/// 自动化数据存储
#[async_trait]
pub trait AutomationStore: Send + Sync {
    // ===== 原料 =====

    async fn get_ingredient(&self, ingredient_id: &str) -> RepositoryResult<Option<Ingredient>>;

    async fn list_ingredients(&self) -> RepositoryResult<Vec<Ingredient>>;

    async fn update_ingredient_price(
        &self,
        ingredient_id: &str,
        new_price: f64,
    ) -> RepositoryResult<()>;

    // ===== 配方 =====

    /// 读取配方及其用料
    async fn get_recipe(&self, recipe_id: &str) -> RepositoryResult<Option<Recipe>>;

    async fn list_recipes(&self) -> RepositoryResult<Vec<Recipe>>;

    async fn list_recipes_using_ingredient(
        &self,
        ingredient_id: &str,
    ) -> RepositoryResult<Vec<Recipe>>;

    // ===== 运营成本 =====

    async fn list_operational_costs(&self) -> RepositoryResult<Vec<OperationalCost>>;

    async fn get_operational_cost(&self, cost_id: &str)
        -> RepositoryResult<Option<OperationalCost>>;

    async fn update_operational_cost_amount(
        &self,
        cost_id: &str,
        amount: f64,
    ) -> RepositoryResult<()>;

    // ===== 订单 =====

    async fn get_order(&self, order_id: &str) -> RepositoryResult<Option<Order>>;

    /// 交付时间落在 [from, to) 的订单
    async fn list_orders_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> RepositoryResult<Vec<Order>>;

    async fn update_order_status(&self, order_id: &str, status: OrderStatus)
        -> RepositoryResult<()>;

    // ===== 成本结果 =====

    async fn save_recipe_cost(&self, cost: &RecipeCost) -> RepositoryResult<()>;

    async fn get_recipe_cost(&self, recipe_id: &str) -> RepositoryResult<Option<RecipeCost>>;

    // ===== 通知 =====

    async fn save_notification(&self, notification: &SmartNotification) -> RepositoryResult<()>;

    /// 最新的通知在前
    async fn list_notifications(&self, limit: usize) -> RepositoryResult<Vec<SmartNotification>>;

    // ===== 流水 =====

    async fn record_stock_transaction(&self, tx: &StockTransaction) -> RepositoryResult<()>;

    async fn list_stock_transactions_by_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Vec<StockTransaction>>;

    /// 订单完成落账：扣减库存（不低于 0）+ 消耗流水 + 收入 + 客户统计，单事务
    ///
    /// # 返回
    /// - Ok(true): 已写入
    /// - Ok(false): 该订单已有消耗流水或财务流水，未做任何写入
    /// - Err: 任一步失败，整体回滚
    async fn apply_order_completion(&self, completion: &OrderCompletion)
        -> RepositoryResult<bool>;

    /// 订单取消回补：按调整流水加回库存 + 删除该订单的财务流水，单事务
    ///
    /// # 返回
    /// - Ok(Some(n)): 已回补，n 为删除的财务流水条数
    /// - Ok(None): 该订单已回补过，未做任何写入
    async fn apply_order_cancellation(
        &self,
        order_id: &str,
        restocks: &[StockTransaction],
    ) -> RepositoryResult<Option<usize>>;

    async fn list_financial_records_by_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Vec<FinancialRecord>>;

    // ===== 客户 =====

    async fn get_customer_stats(&self, customer_id: &str)
        -> RepositoryResult<Option<CustomerStats>>;

    /// since 之后的累计消耗量（USAGE 流水的绝对值之和）
    async fn usage_since(&self, ingredient_id: &str, since: NaiveDateTime)
        -> RepositoryResult<f64>;

    /// since 之后按天汇总的消耗量（日期升序）
    async fn daily_usage_since(
        &self,
        ingredient_id: &str,
        since: NaiveDateTime,
    ) -> RepositoryResult<Vec<UsageRecord>>;
}

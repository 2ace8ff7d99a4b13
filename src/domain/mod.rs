// ==========================================
// UMKM 餐饮经营自动化 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、纯业务规则
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod cost;
pub mod customer;
pub mod ingredient;
pub mod inventory;
pub mod ledger;
pub mod notification;
pub mod order;
pub mod production;
pub mod recipe;
pub mod types;

// 重导出核心类型
pub use cost::{
    default_operational_costs, percent_change, CostChange, OperationalCost, PriceChangeSignal,
    PricePoint, PriceTier, PricingTier, RecipeCost,
};
pub use customer::CustomerStats;
pub use ingredient::{convert_quantity, Ingredient};
pub use inventory::{
    InventoryAnalysis, InventoryForecast, PurchaseOrderLine, PurchaseOrderPlan,
    PurchaseOrderSummary, ReorderRecommendation, UsageRecord, UsageTrend,
};
pub use ledger::{FinancialRecord, OrderCompletion, StockTransaction};
pub use notification::{FinancialMetrics, NotificationSummary, SmartNotification};
pub use order::{Order, OrderItem};
pub use production::{
    ConflictKind, IngredientRequirement, InvalidTaskTransition, OptimizationKind,
    ProductionSchedule, ProductionTask, ScheduleConflict, ScheduleOptimization,
};
pub use recipe::{Recipe, RecipeIngredient};
pub use types::{
    CostCategory, CostImpact, CostPeriod, FinancialRecordKind, NotificationCategory,
    NotificationPriority, NotificationType, OrderStatus, ParseEnumError, ReorderUrgency,
    StockSeverity, StockStatus, StockTransactionKind, TaskPriority, TaskStatus,
};

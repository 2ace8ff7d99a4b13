// ==========================================
// UMKM 餐饮经营自动化 - 引擎层
// ==========================================
// 职责: 库存分析、生产排程、HPP 成本联动、通知合成
// 红线: 引擎不拼 SQL；数据访问一律经 AutomationStore
// ==========================================

pub mod alerts;
pub mod clock;
pub mod cost;
pub mod error;
pub mod inventory;
pub mod notification;
pub mod notification_log;
pub mod price_history;
pub mod production;

// 重导出核心引擎
pub use clock::{Clock, ManualClock, SystemClock};
pub use cost::{
    compute_recipe_cost, suggest_selling_prices, BatchRecalcReport, CostCascade,
    OperationalCostReport, PriceChangeReport, PriceMonitorReport,
};
pub use error::{EngineError, EngineResult};
pub use inventory::{classify_status, InventoryAnalyzer};
pub use notification::NotificationSynthesizer;
pub use notification_log::{NotificationCenter, NotificationLog};
pub use price_history::PriceHistoryCache;
pub use production::{priority_for, ProductionScheduler};

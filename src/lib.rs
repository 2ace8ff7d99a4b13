// ==========================================
// UMKM 餐饮经营自动化 - 核心库
// ==========================================
// 组成: 工作流事件总线 / 生产排程 / 库存补货分析 / HPP 成本联动 / 智能通知
// 技术栈: Rust + tokio + SQLite
// 系统定位: 经营辅助（所有建议由经营者最终确认）
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "id");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 工作流层 - 事件总线与处理器
pub mod workflow;

// 配置层 - 自动化参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{
    Ingredient, InventoryAnalysis, Order, ProductionSchedule, ProductionTask, Recipe, RecipeCost,
    SmartNotification,
};

// 引擎
pub use engine::{
    CostCascade, InventoryAnalyzer, NotificationSynthesizer, ProductionScheduler,
};

// 工作流
pub use workflow::{WorkflowBus, WorkflowEvent, WorkflowEventKind};

// API
pub use api::{ApiError, AutomationApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "UMKM 餐饮经营自动化";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

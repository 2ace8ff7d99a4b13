// ==========================================
// UMKM 餐饮经营自动化 - 配置层
// ==========================================
// 职责: 自动化参数定义与 config_kv 覆写
// 存储: config_kv 表
// ==========================================

pub mod automation_config;
pub mod config_manager;

// 重导出
pub use automation_config::{
    defaults, AutomationConfig, BusConfig, CostConfig, InventoryConfig, NotificationConfig,
    ProductionConfig,
};
pub use config_manager::{config_keys, ConfigManager};

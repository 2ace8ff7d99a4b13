// ==========================================
// UMKM 餐饮经营自动化 - 应用层
// ==========================================
// 职责: 装配数据库、配置与 API，供入口程序使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};

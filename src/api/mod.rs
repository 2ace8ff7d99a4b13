// ==========================================
// UMKM 餐饮经营自动化 - API 层
// ==========================================
// 职责: 提供业务 API 接口，供命令行 / 宿主应用调用
// ==========================================

pub mod automation_api;
pub mod error;

// 重导出核心类型
pub use automation_api::{AutomationApi, DailyReview};
pub use error::{ApiError, ApiResult};

// ==========================================
// UMKM 餐饮经营自动化 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 输入缺失/非法一律在引擎入口拒绝，不产出半成品结果
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("配方不存在: {0}")]
    RecipeNotFound(String),

    #[error("原料不存在: {0}")]
    IngredientNotFound(String),

    #[error("运营成本项不存在: {0}")]
    OperationalCostNotFound(String),

    #[error("订单不存在: {0}")]
    OrderNotFound(String),

    #[error("无效输入 (field={field}): {message}")]
    InvalidInput { field: String, message: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

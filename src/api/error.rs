// ==========================================
// UMKM 餐饮经营自动化 - API 层错误类型
// ==========================================
// 职责: 定义 API 层错误类型，把仓储/引擎/工作流错误转换为对外可读的错误消息
// ==========================================

use crate::domain::InvalidTaskTransition;
use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use crate::workflow::error::WorkflowError;
use thiserror::Error;

/// API 层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("事件触发失败: {0}")]
    EventRejected(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::ConstraintViolation { constraint, message } => {
                ApiError::InvalidInput(format!("数据约束违反({}): {}", constraint, message))
            }
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::RecipeNotFound(id) => ApiError::NotFound(format!("配方(id={})不存在", id)),
            EngineError::IngredientNotFound(id) => {
                ApiError::NotFound(format!("原料(id={})不存在", id))
            }
            EngineError::OperationalCostNotFound(id) => {
                ApiError::NotFound(format!("运营成本项(id={})不存在", id))
            }
            EngineError::OrderNotFound(id) => ApiError::NotFound(format!("订单(id={})不存在", id)),
            EngineError::InvalidInput { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            EngineError::Repository(err) => ApiError::from(err),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::EventRejected(err.to_string())
    }
}

impl From<InvalidTaskTransition> for ApiError {
    fn from(err: InvalidTaskTransition) -> Self {
        ApiError::InvalidStateTransition {
            from: err.from.to_string(),
            to: err.to.to_string(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;

    #[test]
    fn test_engine_errors_map_to_api_errors() {
        let err: ApiError = EngineError::RecipeNotFound("R-1".to_string()).into();
        assert!(matches!(err, ApiError::NotFound(ref msg) if msg.contains("R-1")));

        let err: ApiError = EngineError::invalid("quantity", "必须大于 0").into();
        assert!(matches!(err, ApiError::InvalidInput(_)));

        let err: ApiError = EngineError::Repository(RepositoryError::LockError("x".into())).into();
        assert!(matches!(err, ApiError::DatabaseConnectionError(_)));
    }

    #[test]
    fn test_transition_error_keeps_states() {
        let err: ApiError = InvalidTaskTransition {
            from: TaskStatus::Completed,
            to: TaskStatus::Planned,
        }
        .into();
        match err {
            ApiError::InvalidStateTransition { from, to } => {
                assert_eq!(from, "COMPLETED");
                assert_eq!(to, "PLANNED");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}

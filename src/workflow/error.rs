// ==========================================
// UMKM 餐饮经营自动化 - 工作流层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: WorkflowError 在触发时同步返回；HandlerError 由总线捕获并记录，不向外传播
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 事件触发错误
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("未知事件类型: {0}")]
    UnknownEventKind(String),

    #[error("事件载荷格式错误 (kind={kind}): {message}")]
    InvalidPayload { kind: String, message: String },
}

/// 事件处理器错误
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("处理器超时 ({secs}s)")]
    Timeout { secs: u64 },

    #[error("处理器 panic: {0}")]
    Panicked(String),

    #[error("事件与处理器不匹配: {0}")]
    UnexpectedPayload(String),
}

pub type HandlerResult<T> = Result<T, HandlerError>;

// ==========================================
// UMKM 餐饮经营自动化 - 工作流层
// ==========================================
// 职责: 事件词表、事件总线、默认事件处理器
// 红线: 总线只负责排队与分派；业务规则在引擎层
// ==========================================

pub mod bus;
pub mod delay_queue;
pub mod error;
pub mod event;
pub mod handler;
pub mod handlers;

pub use bus::{QueueStatus, TriggerOutcome, WorkflowBus};
pub use error::{HandlerError, HandlerResult, WorkflowError};
pub use event::{EventPayload, WorkflowEvent, WorkflowEventKind};
pub use handler::{HandlerContext, HandlerOutcome, WorkflowHandler};
pub use handlers::{register_default_handlers, HandlerServices};

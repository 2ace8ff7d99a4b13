// ==========================================
// UMKM 餐饮经营自动化 - 事件处理器接口
// ==========================================
// 职责: 定义 WorkflowHandler trait 与处理上下文
// 说明: 处理器通过 HandlerContext 访问总线，后续事件追加到同一队列尾部
// ==========================================

use crate::workflow::bus::WorkflowBus;
use crate::workflow::error::HandlerResult;
use crate::workflow::event::WorkflowEvent;
use async_trait::async_trait;

/// 处理上下文
#[derive(Clone)]
pub struct HandlerContext {
    pub bus: WorkflowBus,
}

/// 处理结果统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerOutcome {
    pub notifications_published: usize,
    pub events_triggered: usize,
}

impl HandlerOutcome {
    pub fn notifications(count: usize) -> Self {
        Self {
            notifications_published: count,
            events_triggered: 0,
        }
    }
}

/// 工作流事件处理器
#[async_trait]
pub trait WorkflowHandler: Send + Sync {
    /// 处理器名称（日志用）
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        event: &WorkflowEvent,
        ctx: &HandlerContext,
    ) -> HandlerResult<HandlerOutcome>;
}

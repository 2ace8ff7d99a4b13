// ==========================================
// UMKM 餐饮经营自动化 - 生产事件处理器
// ==========================================

use crate::engine::alerts;
use crate::workflow::error::{HandlerError, HandlerResult};
use crate::workflow::event::{EventPayload, WorkflowEvent};
use crate::workflow::handler::{HandlerContext, HandlerOutcome, WorkflowHandler};
use crate::workflow::handlers::HandlerServices;
use async_trait::async_trait;

/// production.batch_completed → 生产完成通知
pub struct BatchCompletedHandler {
    services: HandlerServices,
}

impl BatchCompletedHandler {
    pub fn new(services: HandlerServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl WorkflowHandler for BatchCompletedHandler {
    fn name(&self) -> &'static str {
        "batch_completed"
    }

    async fn handle(
        &self,
        event: &WorkflowEvent,
        _ctx: &HandlerContext,
    ) -> HandlerResult<HandlerOutcome> {
        let EventPayload::BatchCompleted(payload) = &event.payload else {
            return Err(HandlerError::UnexpectedPayload(event.kind().to_string()));
        };

        let notification = alerts::batch_completed(
            &payload.order_id,
            &payload.recipe_name,
            payload.quantity,
            self.services.clock.now(),
        );
        self.services.notifications.publish(notification).await?;

        tracing::info!(
            order_id = %payload.order_id,
            task_id = payload.task_id.as_deref().unwrap_or(""),
            recipe = %payload.recipe_name,
            quantity = payload.quantity,
            "生产完成通知已发布"
        );
        Ok(HandlerOutcome::notifications(1))
    }
}

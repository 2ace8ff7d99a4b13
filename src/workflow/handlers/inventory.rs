// ==========================================
// UMKM 餐饮经营自动化 - 库存告警处理器
// ==========================================
// inventory.low_stock / inventory.out_of_stock:
// 用近 30 天用量分析该原料，发布带补货建议的通知
// ==========================================

use crate::engine::alerts;
use crate::engine::error::EngineError;
use crate::workflow::error::{HandlerError, HandlerResult};
use crate::workflow::event::{EventPayload, WorkflowEvent};
use crate::workflow::handler::{HandlerContext, HandlerOutcome, WorkflowHandler};
use crate::workflow::handlers::HandlerServices;
use async_trait::async_trait;
use chrono::Duration;

/// 用量统计窗口（天）
const USAGE_WINDOW_DAYS: i64 = 30;

pub struct StockAlertHandler {
    services: HandlerServices,
}

impl StockAlertHandler {
    pub fn new(services: HandlerServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl WorkflowHandler for StockAlertHandler {
    fn name(&self) -> &'static str {
        "stock_alert"
    }

    async fn handle(
        &self,
        event: &WorkflowEvent,
        _ctx: &HandlerContext,
    ) -> HandlerResult<HandlerOutcome> {
        let (payload, out_of_stock) = match &event.payload {
            EventPayload::LowStock(p) => (p, false),
            EventPayload::OutOfStock(p) => (p, true),
            _ => return Err(HandlerError::UnexpectedPayload(event.kind().to_string())),
        };
        let store = &self.services.store;
        let now = self.services.clock.now();

        let ingredient = store
            .get_ingredient(&payload.ingredient_id)
            .await?
            .ok_or_else(|| EngineError::IngredientNotFound(payload.ingredient_id.clone()))?;

        let since = now - Duration::days(USAGE_WINDOW_DAYS);
        let monthly_usage = store.usage_since(&ingredient.id, since).await?;
        let analysis = self.services.analyzer.analyze_one(&ingredient, monthly_usage)?;

        let notification = alerts::stock_alert(&analysis, payload.severity, out_of_stock, now);
        self.services.notifications.publish(notification).await?;

        tracing::info!(
            ingredient_id = %ingredient.id,
            current_stock = ingredient.current_stock,
            out_of_stock,
            reorder_quantity = analysis.reorder.quantity,
            "库存告警已发布"
        );
        Ok(HandlerOutcome::notifications(1))
    }
}

// ==========================================
// UMKM 餐饮经营自动化 - HPP 联动事件处理器
// ==========================================
// ingredient.price_changed   → 原料调价联动；必要时登记延迟批量重算
// operational_cost.changed   → 运营成本联动（全量重算）
// hpp.recalculation_needed   → 批量重算 + 完成通知
// ==========================================

use crate::workflow::error::{HandlerError, HandlerResult};
use crate::workflow::event::{EventPayload, WorkflowEvent};
use crate::workflow::handler::{HandlerContext, HandlerOutcome, WorkflowHandler};
use crate::workflow::handlers::HandlerServices;
use async_trait::async_trait;
use std::time::Duration;

// ==========================================
// ingredient.price_changed
// ==========================================

pub struct PriceChangedHandler {
    services: HandlerServices,
}

impl PriceChangedHandler {
    pub fn new(services: HandlerServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl WorkflowHandler for PriceChangedHandler {
    fn name(&self) -> &'static str {
        "ingredient_price_changed"
    }

    async fn handle(
        &self,
        event: &WorkflowEvent,
        ctx: &HandlerContext,
    ) -> HandlerResult<HandlerOutcome> {
        let EventPayload::IngredientPriceChanged(payload) = &event.payload else {
            return Err(HandlerError::UnexpectedPayload(event.kind().to_string()));
        };

        let report = self
            .services
            .cascade
            .on_ingredient_price_changed(
                &payload.ingredient_id,
                payload.old_price,
                payload.new_price,
            )
            .await?;

        let published = self
            .services
            .notifications
            .publish_all(report.notifications)
            .await?;
        let mut outcome = HandlerOutcome::notifications(published);

        if let Some(recipe_ids) = report.recalculation_recipe_ids {
            let delay = Duration::from_secs(self.services.config.cost.recalc_delay_secs);
            let follow_up = WorkflowEvent::recalculation_needed(
                Some(recipe_ids),
                format!("ingredient_price:{}", payload.ingredient_id),
                self.services.clock.now(),
            );
            ctx.bus.trigger_after(follow_up, delay);
            outcome.events_triggered += 1;
        }
        Ok(outcome)
    }
}

// ==========================================
// operational_cost.changed
// ==========================================

pub struct OperationalCostChangedHandler {
    services: HandlerServices,
}

impl OperationalCostChangedHandler {
    pub fn new(services: HandlerServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl WorkflowHandler for OperationalCostChangedHandler {
    fn name(&self) -> &'static str {
        "operational_cost_changed"
    }

    async fn handle(
        &self,
        event: &WorkflowEvent,
        _ctx: &HandlerContext,
    ) -> HandlerResult<HandlerOutcome> {
        let EventPayload::OperationalCostChanged(payload) = &event.payload else {
            return Err(HandlerError::UnexpectedPayload(event.kind().to_string()));
        };

        let report = self
            .services
            .cascade
            .on_operational_cost_changed(&payload.cost_id, payload.old_amount, payload.new_amount)
            .await?;

        let published = self
            .services
            .notifications
            .publish_all(report.notifications)
            .await?;
        Ok(HandlerOutcome::notifications(published))
    }
}

// ==========================================
// hpp.recalculation_needed
// ==========================================

pub struct RecalculationHandler {
    services: HandlerServices,
}

impl RecalculationHandler {
    pub fn new(services: HandlerServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl WorkflowHandler for RecalculationHandler {
    fn name(&self) -> &'static str {
        "hpp_recalculation"
    }

    async fn handle(
        &self,
        event: &WorkflowEvent,
        _ctx: &HandlerContext,
    ) -> HandlerResult<HandlerOutcome> {
        let EventPayload::RecalculationNeeded(payload) = &event.payload else {
            return Err(HandlerError::UnexpectedPayload(event.kind().to_string()));
        };

        let report = self
            .services
            .cascade
            .recalculate_batch(payload.recipe_ids.as_deref(), &payload.reason)
            .await?;

        self.services
            .notifications
            .publish(report.notification)
            .await?;
        Ok(HandlerOutcome::notifications(1))
    }
}

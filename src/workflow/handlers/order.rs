// ==========================================
// UMKM 餐饮经营自动化 - 订单事件处理器
// ==========================================
// order.completed: 汇总原料需求 → 单事务落账（扣库存/消耗流水/收入/客户统计）→ 触发库存告警
// order.cancelled: 按消耗流水生成调整流水 → 单事务回补库存并删除收入流水
// 说明: 以订单 ID 为流水 reference，重复事件不会重复扣减/回补
// ==========================================

use crate::domain::{
    convert_quantity, FinancialRecord, Ingredient, OrderCompletion, StockSeverity,
    StockTransaction, StockTransactionKind,
};
use crate::engine::error::EngineError;
use crate::workflow::error::{HandlerError, HandlerResult};
use crate::workflow::event::{EventPayload, WorkflowEvent};
use crate::workflow::handler::{HandlerContext, HandlerOutcome, WorkflowHandler};
use crate::workflow::handlers::HandlerServices;
use async_trait::async_trait;
use std::collections::BTreeMap;

// ==========================================
// order.completed
// ==========================================

pub struct OrderCompletedHandler {
    services: HandlerServices,
}

impl OrderCompletedHandler {
    pub fn new(services: HandlerServices) -> Self {
        Self { services }
    }

    /// 汇总订单对每种原料的需求（已换算到原料库存单位）
    async fn demand_by_ingredient(
        &self,
        order: &crate::domain::Order,
    ) -> HandlerResult<BTreeMap<String, (Ingredient, f64)>> {
        let store = &self.services.store;
        let mut demand: BTreeMap<String, (Ingredient, f64)> = BTreeMap::new();

        for item in &order.items {
            let Some(recipe) = store.get_recipe(&item.recipe_id).await? else {
                tracing::warn!(
                    order_id = %order.id,
                    recipe_id = %item.recipe_id,
                    "订单明细引用的配方不存在，跳过扣减"
                );
                continue;
            };

            for ri in &recipe.ingredients {
                let ingredient = match demand.get(&ri.ingredient_id) {
                    Some((ingredient, _)) => ingredient.clone(),
                    None => match store.get_ingredient(&ri.ingredient_id).await? {
                        Some(ingredient) => ingredient,
                        None => {
                            tracing::warn!(
                                recipe_id = %recipe.id,
                                ingredient_id = %ri.ingredient_id,
                                "配方引用的原料不存在，跳过扣减"
                            );
                            continue;
                        }
                    },
                };
                let quantity = convert_quantity(
                    ri.quantity * f64::from(item.quantity),
                    &ri.unit,
                    &ingredient.unit,
                );
                demand
                    .entry(ri.ingredient_id.clone())
                    .or_insert((ingredient, 0.0))
                    .1 += quantity;
            }
        }
        Ok(demand)
    }
}

#[async_trait]
impl WorkflowHandler for OrderCompletedHandler {
    fn name(&self) -> &'static str {
        "order_completed"
    }

    async fn handle(
        &self,
        event: &WorkflowEvent,
        ctx: &HandlerContext,
    ) -> HandlerResult<HandlerOutcome> {
        let EventPayload::OrderCompleted(payload) = &event.payload else {
            return Err(HandlerError::UnexpectedPayload(event.kind().to_string()));
        };
        let store = &self.services.store;
        let now = self.services.clock.now();

        let order = store
            .get_order(&payload.order_id)
            .await?
            .ok_or_else(|| EngineError::OrderNotFound(payload.order_id.clone()))?;

        let demand = self.demand_by_ingredient(&order).await?;
        let mut usages = Vec::with_capacity(demand.len());
        let mut stock_after = Vec::with_capacity(demand.len());
        for (ingredient, required) in demand.into_values() {
            let new_stock = (ingredient.current_stock - required).max(0.0);
            let deducted = ingredient.current_stock - new_stock;
            if deducted < required {
                tracing::warn!(
                    order_id = %order.id,
                    ingredient_id = %ingredient.id,
                    required,
                    deducted,
                    "库存不足，扣减至 0"
                );
            }
            usages.push(StockTransaction::new(
                ingredient.id.clone(),
                -deducted,
                StockTransactionKind::Usage,
                order.id.clone(),
                ingredient.price_per_unit,
                now,
            ));
            stock_after.push((ingredient, new_stock));
        }

        let completion = OrderCompletion {
            order_id: order.id.clone(),
            usages,
            income: FinancialRecord::order_income(
                &order.id,
                &order.order_no,
                order.total_amount,
                now.date(),
            ),
            customer_id: order.customer_id.clone(),
        };
        if !store.apply_order_completion(&completion).await? {
            tracing::warn!(order_id = %order.id, "订单已落账，忽略重复事件");
            return Ok(HandlerOutcome::default());
        }

        let mut outcome = HandlerOutcome::default();
        for (ingredient, new_stock) in stock_after {
            let hits_zero = new_stock <= 0.0;
            let below_min = ingredient.min_stock > 0.0 && new_stock <= ingredient.min_stock;
            if !(hits_zero || below_min) {
                continue;
            }
            let severity = if new_stock <= ingredient.min_stock * 0.5 {
                StockSeverity::Critical
            } else {
                StockSeverity::Warning
            };
            ctx.bus.trigger(WorkflowEvent::stock_alert(
                &ingredient.id,
                new_stock,
                ingredient.min_stock,
                severity,
                now,
            ));
            outcome.events_triggered += 1;
        }

        tracing::info!(
            order_id = %order.id,
            order_no = %order.order_no,
            customer_id = order.customer_id.as_deref().unwrap_or(""),
            stock_alerts = outcome.events_triggered,
            "订单完成：库存已扣减，收入与客户统计已入账"
        );
        Ok(outcome)
    }
}

// ==========================================
// order.cancelled
// ==========================================

pub struct OrderCancelledHandler {
    services: HandlerServices,
}

impl OrderCancelledHandler {
    pub fn new(services: HandlerServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl WorkflowHandler for OrderCancelledHandler {
    fn name(&self) -> &'static str {
        "order_cancelled"
    }

    async fn handle(
        &self,
        event: &WorkflowEvent,
        _ctx: &HandlerContext,
    ) -> HandlerResult<HandlerOutcome> {
        let EventPayload::OrderCancelled(payload) = &event.payload else {
            return Err(HandlerError::UnexpectedPayload(event.kind().to_string()));
        };
        let store = &self.services.store;
        let now = self.services.clock.now();
        let order_id = payload.order_id.as_str();

        let mut restocks = Vec::new();
        for usage in store
            .list_stock_transactions_by_reference(order_id)
            .await?
            .into_iter()
            .filter(|tx| tx.kind == StockTransactionKind::Usage)
        {
            if store.get_ingredient(&usage.ingredient_id).await?.is_none() {
                tracing::warn!(ingredient_id = %usage.ingredient_id, "回补时原料已不存在，跳过");
                continue;
            }
            restocks.push(StockTransaction::new(
                usage.ingredient_id.clone(),
                usage.quantity.abs(),
                StockTransactionKind::Adjustment,
                order_id,
                usage.unit_price,
                now,
            ));
        }

        let Some(removed) = store.apply_order_cancellation(order_id, &restocks).await? else {
            tracing::warn!(order_id = %order_id, "订单库存已回补过，忽略重复事件");
            return Ok(HandlerOutcome::default());
        };

        tracing::info!(
            order_id = %order_id,
            reason = payload.reason.as_deref().unwrap_or(""),
            restored_ingredients = restocks.len(),
            removed_financial_records = removed,
            "订单取消：库存已回补"
        );
        Ok(HandlerOutcome::default())
    }
}

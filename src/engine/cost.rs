// ==========================================
// UMKM 餐饮经营自动化 - HPP 成本联动引擎
// ==========================================
// 职责: 配方成本计算、原料调价/运营成本变动的联动重算、定价建议、价格巡检
// 输入: AutomationStore（配方/原料/运营成本）+ CostConfig
// 输出: RecipeCost（已持久化）+ 变动报告 + 待发布通知
// 红线: 通知只构建不发布；延迟批量重算只返回请求，由事件总线调度
// ==========================================

use crate::config::CostConfig;
use crate::domain::{
    convert_quantity, percent_change, CostCategory, CostChange, Ingredient, OperationalCost,
    PriceChangeSignal, PricePoint, PriceTier, PricingTier, Recipe, RecipeCost, SmartNotification,
};
use crate::engine::alerts;
use crate::engine::clock::Clock;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::price_history::PriceHistoryCache;
use crate::repository::AutomationStore;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

// ==========================================
// 报告类型
// ==========================================

/// 原料调价联动结果
#[derive(Debug, Clone, Serialize)]
pub struct PriceChangeReport {
    pub ingredient_id: String,
    pub ingredient_name: String,
    pub percent_change: f64,
    pub changes: Vec<CostChange>,
    pub notifications: Vec<SmartNotification>,
    /// Some 表示需要延迟批量重算的配方
    pub recalculation_recipe_ids: Option<Vec<String>>,
}

/// 运营成本变动联动结果
#[derive(Debug, Clone, Serialize)]
pub struct OperationalCostReport {
    pub cost_id: String,
    pub percent_change: f64,
    pub recalculated: usize,
    pub failed: Vec<String>,
    pub notifications: Vec<SmartNotification>,
}

/// 批量重算结果
#[derive(Debug, Clone, Serialize)]
pub struct BatchRecalcReport {
    pub costs: Vec<RecipeCost>,
    pub failed: Vec<String>,
    pub notification: SmartNotification,
}

/// 价格巡检结果
#[derive(Debug, Clone, Serialize)]
pub struct PriceMonitorReport {
    pub monitored: usize,
    pub significant_changes: Vec<PriceChangeSignal>,
    pub checked_at: NaiveDateTime,
}

// ==========================================
// 纯计算
// ==========================================

/// 计算单个配方成本（不访问存储）
///
/// # 参数
/// - `ingredients`: ingredient_id → 原料
/// - `costs`: 运营成本目录
/// - `price_override`: (ingredient_id, 价格)，用于调价前后对比
pub fn compute_recipe_cost(
    recipe: &Recipe,
    ingredients: &HashMap<String, Ingredient>,
    costs: &[OperationalCost],
    config: &CostConfig,
    price_override: Option<(&str, f64)>,
    now: NaiveDateTime,
) -> RecipeCost {
    let mut material = 0.0;
    let mut missing_prices = Vec::new();

    for ri in &recipe.ingredients {
        let Some(ingredient) = ingredients.get(&ri.ingredient_id) else {
            tracing::warn!(
                recipe_id = %recipe.id,
                ingredient_id = %ri.ingredient_id,
                "配方引用了未知原料，材料成本按 0 计"
            );
            missing_prices.push(ri.ingredient_id.clone());
            continue;
        };

        let price = match price_override {
            Some((id, price)) if id == ingredient.id => Some(price),
            _ => ingredient.price_per_unit,
        };
        let quantity = convert_quantity(ri.quantity, &ri.unit, &ingredient.unit);

        match price {
            Some(price) => material += quantity * price,
            None => {
                tracing::warn!(
                    recipe_id = %recipe.id,
                    ingredient_id = %ingredient.id,
                    "原料缺少单价，材料成本按 0 计"
                );
                missing_prices.push(ingredient.id.clone());
            }
        }
    }

    let hours = recipe.total_hours();
    let labor_rate = costs
        .iter()
        .find(|c| c.is_active && c.category == CostCategory::Labor)
        .map(|c| c.amount)
        .unwrap_or(config.labor_hourly_rate);
    let labor = hours * labor_rate;

    let overhead_rate: f64 = costs
        .iter()
        .filter(|c| c.is_allocated_overhead())
        .map(|c| c.amount)
        .sum();
    let overhead =
        overhead_rate * hours * (f64::from(recipe.servings) / config.serving_normalization);

    RecipeCost::from_components(
        recipe.id.clone(),
        recipe.name.clone(),
        recipe.servings,
        material,
        labor,
        overhead,
        missing_prices,
        now,
    )
}

/// 三档建议售价
///
/// - economy: ×1.3 向上取整到 500
/// - standard: ×1.6 向上取整到 500
/// - premium: ×2.0 向上取整到 1000
pub fn suggest_selling_prices(cost_per_serving: f64) -> Vec<PriceTier> {
    let round_up = |value: f64, step: f64| (value / step).ceil() * step;
    vec![
        PriceTier {
            tier: PricingTier::Economy,
            price: round_up(cost_per_serving * 1.3, 500.0),
            margin_percent: 30.0,
        },
        PriceTier {
            tier: PricingTier::Standard,
            price: round_up(cost_per_serving * 1.6, 500.0),
            margin_percent: 60.0,
        },
        PriceTier {
            tier: PricingTier::Premium,
            price: round_up(cost_per_serving * 2.0, 1_000.0),
            margin_percent: 100.0,
        },
    ]
}

// ==========================================
// CostCascade
// ==========================================
pub struct CostCascade {
    store: Arc<dyn AutomationStore>,
    config: CostConfig,
    price_history: PriceHistoryCache,
    clock: Arc<dyn Clock>,
}

impl CostCascade {
    pub fn new(store: Arc<dyn AutomationStore>, config: CostConfig, clock: Arc<dyn Clock>) -> Self {
        let price_history = PriceHistoryCache::new(config.price_history_limit);
        Self {
            store,
            config,
            price_history,
            clock,
        }
    }

    pub fn config(&self) -> &CostConfig {
        &self.config
    }

    async fn ingredient_index(&self) -> EngineResult<HashMap<String, Ingredient>> {
        Ok(self
            .store
            .list_ingredients()
            .await?
            .into_iter()
            .map(|i| (i.id.clone(), i))
            .collect())
    }

    /// 重算单个配方并持久化
    #[instrument(skip(self))]
    pub async fn recalculate(&self, recipe_id: &str) -> EngineResult<RecipeCost> {
        let recipe = self
            .store
            .get_recipe(recipe_id)
            .await?
            .ok_or_else(|| EngineError::RecipeNotFound(recipe_id.to_string()))?;
        let ingredients = self.ingredient_index().await?;
        let costs = self.store.list_operational_costs().await?;

        let cost = compute_recipe_cost(
            &recipe,
            &ingredients,
            &costs,
            &self.config,
            None,
            self.clock.now(),
        );
        self.store.save_recipe_cost(&cost).await?;

        tracing::debug!(
            recipe_id = %cost.recipe_id,
            total_cost = cost.total_cost,
            cost_per_serving = cost.cost_per_serving,
            "配方成本已重算"
        );
        Ok(cost)
    }

    /// 原料调价联动
    ///
    /// # 流程
    /// 1. 记录价格历史
    /// 2. 找出使用该原料的配方
    /// 3. 按调价前/后价格分别计算，持久化新成本
    /// 4. 汇总通知 + 高影响配方通知
    /// 5. 变动幅度超过批量阈值时，返回延迟重算请求
    #[instrument(skip(self), fields(ingredient_id = %ingredient_id))]
    pub async fn on_ingredient_price_changed(
        &self,
        ingredient_id: &str,
        old_price: f64,
        new_price: f64,
    ) -> EngineResult<PriceChangeReport> {
        if old_price < 0.0 || new_price < 0.0 || !old_price.is_finite() || !new_price.is_finite() {
            return Err(EngineError::invalid("price", "价格必须为非负有限数"));
        }

        let now = self.clock.now();
        let mut ingredients = self.ingredient_index().await?;
        let ingredient_name = match ingredients.get_mut(ingredient_id) {
            Some(ingredient) => {
                if ingredient.price_per_unit != Some(new_price) {
                    self.store
                        .update_ingredient_price(ingredient_id, new_price)
                        .await?;
                    ingredient.price_per_unit = Some(new_price);
                }
                ingredient.name.clone()
            }
            None => return Err(EngineError::IngredientNotFound(ingredient_id.to_string())),
        };

        self.price_history.record(ingredient_id, new_price, now);

        let recipes = self.store.list_recipes_using_ingredient(ingredient_id).await?;
        let costs = self.store.list_operational_costs().await?;
        let pct = percent_change(old_price, new_price);

        let mut changes = Vec::with_capacity(recipes.len());
        for recipe in &recipes {
            let old_cost = compute_recipe_cost(
                recipe,
                &ingredients,
                &costs,
                &self.config,
                Some((ingredient_id, old_price)),
                now,
            );
            let new_cost = compute_recipe_cost(
                recipe,
                &ingredients,
                &costs,
                &self.config,
                Some((ingredient_id, new_price)),
                now,
            );
            self.store.save_recipe_cost(&new_cost).await?;
            changes.push(CostChange::between(&old_cost, &new_cost));
        }

        let mut notifications = Vec::new();
        if !changes.is_empty() {
            notifications.push(alerts::price_change_summary(
                ingredient_id,
                &ingredient_name,
                pct,
                changes.len(),
                self.config.high_impact_percent,
                now,
            ));
            notifications.extend(
                changes
                    .iter()
                    .filter(|c| c.percent_change.abs() > self.config.high_impact_percent)
                    .map(|c| alerts::recipe_cost_changed(c, now)),
            );
        }

        let recalculation_recipe_ids =
            if pct.abs() > self.config.batch_recalc_percent && !changes.is_empty() {
                Some(changes.iter().map(|c| c.recipe_id.clone()).collect())
            } else {
                None
            };

        tracing::info!(
            ingredient_id = %ingredient_id,
            old_price,
            new_price,
            percent_change = %format!("{:.2}", pct),
            affected_recipes = changes.len(),
            batch_recalc = recalculation_recipe_ids.is_some(),
            "原料调价联动完成"
        );

        Ok(PriceChangeReport {
            ingredient_id: ingredient_id.to_string(),
            ingredient_name,
            percent_change: pct,
            changes,
            notifications,
            recalculation_recipe_ids,
        })
    }

    /// 运营成本变动联动（总是重算全部配方）
    #[instrument(skip(self), fields(cost_id = %cost_id))]
    pub async fn on_operational_cost_changed(
        &self,
        cost_id: &str,
        old_amount: f64,
        new_amount: f64,
    ) -> EngineResult<OperationalCostReport> {
        if new_amount < 0.0 || !new_amount.is_finite() {
            return Err(EngineError::invalid("amount", "运营成本必须为非负有限数"));
        }

        let cost = self
            .store
            .get_operational_cost(cost_id)
            .await?
            .ok_or_else(|| EngineError::OperationalCostNotFound(cost_id.to_string()))?;

        self.store
            .update_operational_cost_amount(cost_id, new_amount)
            .await?;

        let reason = format!("operational_cost:{}", cost_id);
        let batch = self.recalculate_batch(None, &reason).await?;

        let now = self.clock.now();
        let pct = percent_change(old_amount, new_amount);
        let mut notifications = vec![alerts::operational_cost_changed(
            cost_id, &cost.name, old_amount, new_amount, now,
        )];
        if pct.abs() > self.config.pricing_review_percent {
            notifications.push(alerts::pricing_review(cost_id, &cost.name, pct, now));
        }

        tracing::info!(
            cost_id = %cost_id,
            old_amount,
            new_amount,
            recalculated = batch.costs.len(),
            failed = batch.failed.len(),
            "运营成本联动完成"
        );

        Ok(OperationalCostReport {
            cost_id: cost_id.to_string(),
            percent_change: pct,
            recalculated: batch.costs.len(),
            failed: batch.failed,
            notifications,
        })
    }

    /// 批量重算
    ///
    /// # 参数
    /// - `recipe_ids`: None 表示全部配方
    /// - `reason`: 触发原因（写入通知）
    ///
    /// # 返回
    /// 单个配方失败只记录并跳过
    #[instrument(skip(self, recipe_ids))]
    pub async fn recalculate_batch(
        &self,
        recipe_ids: Option<&[String]>,
        reason: &str,
    ) -> EngineResult<BatchRecalcReport> {
        let ids: Vec<String> = match recipe_ids {
            Some(ids) => ids.to_vec(),
            None => self
                .store
                .list_recipes()
                .await?
                .into_iter()
                .map(|r| r.id)
                .collect(),
        };

        let mut costs = Vec::with_capacity(ids.len());
        let mut failed = Vec::new();
        for id in &ids {
            match self.recalculate(id).await {
                Ok(cost) => costs.push(cost),
                Err(e) => {
                    tracing::warn!(recipe_id = %id, error = %e, "批量重算: 配方重算失败，已跳过");
                    failed.push(id.clone());
                }
            }
        }

        let notification = alerts::batch_recalculation_completed(
            costs.len(),
            failed.len(),
            reason,
            self.clock.now(),
        );

        tracing::info!(
            reason = %reason,
            recalculated = costs.len(),
            failed = failed.len(),
            "批量重算完成"
        );

        Ok(BatchRecalcReport {
            costs,
            failed,
            notification,
        })
    }

    pub async fn recalculate_all(&self, reason: &str) -> EngineResult<BatchRecalcReport> {
        self.recalculate_batch(None, reason).await
    }

    /// 价格巡检：与上次记录的价格比较，超过阈值的列为显著变动
    ///
    /// 没有单价的原料不参与巡检
    #[instrument(skip(self, ingredients), fields(count = ingredients.len()))]
    pub fn monitor_ingredient_prices(&self, ingredients: &[Ingredient]) -> PriceMonitorReport {
        let now = self.clock.now();
        let mut monitored = 0;
        let mut significant_changes = Vec::new();

        for ingredient in ingredients {
            let Some(price) = ingredient.price_per_unit else {
                continue;
            };
            monitored += 1;

            if let Some(last) = self.price_history.latest(&ingredient.id) {
                let pct = percent_change(last.price, price);
                if pct.abs() > self.config.significant_price_change_percent {
                    significant_changes.push(PriceChangeSignal {
                        ingredient_id: ingredient.id.clone(),
                        ingredient_name: ingredient.name.clone(),
                        old_price: last.price,
                        new_price: price,
                        percent_change: pct,
                    });
                }
            }
            self.price_history.record(&ingredient.id, price, now);
        }

        if !significant_changes.is_empty() {
            tracing::info!(
                significant = significant_changes.len(),
                "价格巡检发现显著变动"
            );
        }

        PriceMonitorReport {
            monitored,
            significant_changes,
            checked_at: now,
        }
    }

    pub fn price_history(&self, ingredient_id: &str) -> Vec<PricePoint> {
        self.price_history.history(ingredient_id)
    }
}

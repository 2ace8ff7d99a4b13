// ==========================================
// UMKM 餐饮经营自动化 - 工作流事件
// ==========================================
// 职责: 事件类型词表 + 强类型载荷
// 说明: 对外的字符串词表稳定不变；内部一律用 EventPayload 分派
// ==========================================

use crate::domain::StockSeverity;
use crate::workflow::error::WorkflowError;
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ==========================================
// 事件类型
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowEventKind {
    OrderCompleted,
    OrderCancelled,
    InventoryLowStock,
    InventoryOutOfStock,
    ProductionBatchCompleted,
    IngredientPriceChanged,
    OperationalCostChanged,
    HppRecalculationNeeded,
}

impl WorkflowEventKind {
    pub const ALL: [WorkflowEventKind; 8] = [
        WorkflowEventKind::OrderCompleted,
        WorkflowEventKind::OrderCancelled,
        WorkflowEventKind::InventoryLowStock,
        WorkflowEventKind::InventoryOutOfStock,
        WorkflowEventKind::ProductionBatchCompleted,
        WorkflowEventKind::IngredientPriceChanged,
        WorkflowEventKind::OperationalCostChanged,
        WorkflowEventKind::HppRecalculationNeeded,
    ];

    /// 稳定字符串标识
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowEventKind::OrderCompleted => "order.completed",
            WorkflowEventKind::OrderCancelled => "order.cancelled",
            WorkflowEventKind::InventoryLowStock => "inventory.low_stock",
            WorkflowEventKind::InventoryOutOfStock => "inventory.out_of_stock",
            WorkflowEventKind::ProductionBatchCompleted => "production.batch_completed",
            WorkflowEventKind::IngredientPriceChanged => "ingredient.price_changed",
            WorkflowEventKind::OperationalCostChanged => "operational_cost.changed",
            WorkflowEventKind::HppRecalculationNeeded => "hpp.recalculation_needed",
        }
    }
}

impl fmt::Display for WorkflowEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowEventKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| WorkflowError::UnknownEventKind(s.to_string()))
    }
}

// ==========================================
// 事件载荷
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCompletedPayload {
    pub order_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledPayload {
    pub order_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// 低库存 / 断货告警载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAlertPayload {
    pub ingredient_id: String,
    pub current_stock: f64,
    pub min_stock: f64,
    pub severity: StockSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCompletedPayload {
    pub order_id: String,
    pub recipe_name: String,
    pub quantity: u32,
    #[serde(default)]
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChangedPayload {
    pub ingredient_id: String,
    pub old_price: f64,
    pub new_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalCostChangedPayload {
    pub cost_id: String,
    pub old_amount: f64,
    pub new_amount: f64,
}

/// 批量重算请求；recipe_ids 为 None 表示全部配方
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecalculationPayload {
    #[serde(default)]
    pub recipe_ids: Option<Vec<String>>,
    pub reason: String,
}

/// 强类型事件载荷（事件类型由变体决定）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    OrderCompleted(OrderCompletedPayload),
    OrderCancelled(OrderCancelledPayload),
    LowStock(StockAlertPayload),
    OutOfStock(StockAlertPayload),
    BatchCompleted(BatchCompletedPayload),
    IngredientPriceChanged(PriceChangedPayload),
    OperationalCostChanged(OperationalCostChangedPayload),
    RecalculationNeeded(RecalculationPayload),
}

impl EventPayload {
    pub fn kind(&self) -> WorkflowEventKind {
        match self {
            EventPayload::OrderCompleted(_) => WorkflowEventKind::OrderCompleted,
            EventPayload::OrderCancelled(_) => WorkflowEventKind::OrderCancelled,
            EventPayload::LowStock(_) => WorkflowEventKind::InventoryLowStock,
            EventPayload::OutOfStock(_) => WorkflowEventKind::InventoryOutOfStock,
            EventPayload::BatchCompleted(_) => WorkflowEventKind::ProductionBatchCompleted,
            EventPayload::IngredientPriceChanged(_) => WorkflowEventKind::IngredientPriceChanged,
            EventPayload::OperationalCostChanged(_) => WorkflowEventKind::OperationalCostChanged,
            EventPayload::RecalculationNeeded(_) => WorkflowEventKind::HppRecalculationNeeded,
        }
    }

    /// 按字符串事件类型解析 JSON 载荷
    ///
    /// 载荷缺少实体主键字段时用 entity_id 补齐
    pub fn from_json(
        kind: WorkflowEventKind,
        entity_id: &str,
        payload: Value,
    ) -> Result<Self, WorkflowError> {
        let payload = match kind {
            WorkflowEventKind::OrderCompleted => EventPayload::OrderCompleted(parse(
                kind,
                with_entity_id(payload, "order_id", entity_id),
            )?),
            WorkflowEventKind::OrderCancelled => EventPayload::OrderCancelled(parse(
                kind,
                with_entity_id(payload, "order_id", entity_id),
            )?),
            WorkflowEventKind::InventoryLowStock => EventPayload::LowStock(parse(
                kind,
                with_entity_id(payload, "ingredient_id", entity_id),
            )?),
            WorkflowEventKind::InventoryOutOfStock => EventPayload::OutOfStock(parse(
                kind,
                with_default(
                    with_entity_id(payload, "ingredient_id", entity_id),
                    "severity",
                    Value::String(StockSeverity::Critical.as_str().to_string()),
                ),
            )?),
            WorkflowEventKind::ProductionBatchCompleted => EventPayload::BatchCompleted(parse(
                kind,
                with_entity_id(payload, "order_id", entity_id),
            )?),
            WorkflowEventKind::IngredientPriceChanged => EventPayload::IngredientPriceChanged(
                parse(kind, with_entity_id(payload, "ingredient_id", entity_id))?,
            ),
            WorkflowEventKind::OperationalCostChanged => EventPayload::OperationalCostChanged(
                parse(kind, with_entity_id(payload, "cost_id", entity_id))?,
            ),
            WorkflowEventKind::HppRecalculationNeeded => {
                EventPayload::RecalculationNeeded(parse(kind, payload)?)
            }
        };
        Ok(payload)
    }
}

fn with_entity_id(payload: Value, field: &str, entity_id: &str) -> Value {
    with_default(payload, field, Value::String(entity_id.to_string()))
}

fn with_default(payload: Value, field: &str, value: Value) -> Value {
    match payload {
        Value::Object(mut map) => {
            map.entry(field.to_string()).or_insert(value);
            Value::Object(map)
        }
        Value::Null => {
            let mut map = serde_json::Map::new();
            map.insert(field.to_string(), value);
            Value::Object(map)
        }
        other => other,
    }
}

fn parse<T: DeserializeOwned>(kind: WorkflowEventKind, payload: Value) -> Result<T, WorkflowError> {
    serde_json::from_value(payload).map_err(|e| WorkflowError::InvalidPayload {
        kind: kind.as_str().to_string(),
        message: e.to_string(),
    })
}

// ==========================================
// 工作流事件
// ==========================================

/// 工作流事件（入队后不可变，消费一次即丢弃）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub id: String,
    pub entity_id: String,
    pub payload: EventPayload,
    pub occurred_at: NaiveDateTime,
}

impl WorkflowEvent {
    pub fn new(
        entity_id: impl Into<String>,
        payload: EventPayload,
        occurred_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: format!("evt_{}", Uuid::new_v4()),
            entity_id: entity_id.into(),
            payload,
            occurred_at,
        }
    }

    pub fn kind(&self) -> WorkflowEventKind {
        self.payload.kind()
    }

    /// 由字符串事件类型 + JSON 载荷构造
    pub fn from_raw(
        kind: &str,
        entity_id: &str,
        payload: Value,
        occurred_at: NaiveDateTime,
    ) -> Result<Self, WorkflowError> {
        let kind: WorkflowEventKind = kind.parse()?;
        let payload = EventPayload::from_json(kind, entity_id, payload)?;
        Ok(Self::new(entity_id, payload, occurred_at))
    }

    // ===== 便捷构造 =====

    pub fn order_completed(order_id: &str, at: NaiveDateTime) -> Self {
        Self::new(
            order_id,
            EventPayload::OrderCompleted(OrderCompletedPayload {
                order_id: order_id.to_string(),
            }),
            at,
        )
    }

    pub fn order_cancelled(order_id: &str, reason: Option<String>, at: NaiveDateTime) -> Self {
        Self::new(
            order_id,
            EventPayload::OrderCancelled(OrderCancelledPayload {
                order_id: order_id.to_string(),
                reason,
            }),
            at,
        )
    }

    pub fn ingredient_price_changed(
        ingredient_id: &str,
        old_price: f64,
        new_price: f64,
        at: NaiveDateTime,
    ) -> Self {
        Self::new(
            ingredient_id,
            EventPayload::IngredientPriceChanged(PriceChangedPayload {
                ingredient_id: ingredient_id.to_string(),
                old_price,
                new_price,
            }),
            at,
        )
    }

    pub fn operational_cost_changed(
        cost_id: &str,
        old_amount: f64,
        new_amount: f64,
        at: NaiveDateTime,
    ) -> Self {
        Self::new(
            cost_id,
            EventPayload::OperationalCostChanged(OperationalCostChangedPayload {
                cost_id: cost_id.to_string(),
                old_amount,
                new_amount,
            }),
            at,
        )
    }

    pub fn recalculation_needed(
        recipe_ids: Option<Vec<String>>,
        reason: impl Into<String>,
        at: NaiveDateTime,
    ) -> Self {
        Self::new(
            "hpp",
            EventPayload::RecalculationNeeded(RecalculationPayload {
                recipe_ids,
                reason: reason.into(),
            }),
            at,
        )
    }

    pub fn batch_completed(
        order_id: &str,
        recipe_name: &str,
        quantity: u32,
        task_id: Option<String>,
        at: NaiveDateTime,
    ) -> Self {
        Self::new(
            order_id,
            EventPayload::BatchCompleted(BatchCompletedPayload {
                order_id: order_id.to_string(),
                recipe_name: recipe_name.to_string(),
                quantity,
                task_id,
            }),
            at,
        )
    }

    /// 库存告警：断货走 out_of_stock，其余走 low_stock
    pub fn stock_alert(
        ingredient_id: &str,
        current_stock: f64,
        min_stock: f64,
        severity: StockSeverity,
        at: NaiveDateTime,
    ) -> Self {
        let payload = StockAlertPayload {
            ingredient_id: ingredient_id.to_string(),
            current_stock,
            min_stock,
            severity,
        };
        let payload = if current_stock <= 0.0 {
            EventPayload::OutOfStock(payload)
        } else {
            EventPayload::LowStock(payload)
        };
        Self::new(ingredient_id, payload, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_kind_vocabulary_is_stable() {
        for kind in WorkflowEventKind::ALL {
            assert_eq!(kind.as_str().parse::<WorkflowEventKind>().unwrap(), kind);
        }
        assert!(matches!(
            "order.shipped".parse::<WorkflowEventKind>(),
            Err(WorkflowError::UnknownEventKind(_))
        ));
    }

    #[test]
    fn test_from_raw_fills_entity_id() {
        let event = WorkflowEvent::from_raw("order.completed", "ORD-1", Value::Null, at()).unwrap();
        assert_eq!(
            event.payload,
            EventPayload::OrderCompleted(OrderCompletedPayload {
                order_id: "ORD-1".to_string()
            })
        );

        let event = WorkflowEvent::from_raw(
            "inventory.out_of_stock",
            "flour",
            json!({ "current_stock": 0.0, "min_stock": 10.0 }),
            at(),
        )
        .unwrap();
        assert_eq!(event.kind(), WorkflowEventKind::InventoryOutOfStock);
        match event.payload {
            EventPayload::OutOfStock(p) => {
                assert_eq!(p.ingredient_id, "flour");
                assert_eq!(p.severity, StockSeverity::Critical);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_from_raw_rejects_malformed_payload() {
        let err = WorkflowEvent::from_raw(
            "ingredient.price_changed",
            "flour",
            json!({ "old_price": "mahal" }),
            at(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidPayload { .. }));
    }

    #[test]
    fn test_stock_alert_routing() {
        let low = WorkflowEvent::stock_alert("flour", 3.0, 10.0, StockSeverity::Critical, at());
        assert_eq!(low.kind(), WorkflowEventKind::InventoryLowStock);
        let out = WorkflowEvent::stock_alert("flour", 0.0, 10.0, StockSeverity::Critical, at());
        assert_eq!(out.kind(), WorkflowEventKind::InventoryOutOfStock);
    }
}

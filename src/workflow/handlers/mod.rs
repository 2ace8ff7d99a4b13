// ==========================================
// UMKM 餐饮经营自动化 - 默认事件处理器
// ==========================================
// 职责: 把工作流事件接到各引擎上（订单扣减/回滚、库存告警、生产完成、HPP 联动）
// 说明: 所有通知同时写入存储与内存通知日志（经 NotificationCenter）
// ==========================================

pub mod cost;
pub mod inventory;
pub mod order;
pub mod production;

use crate::config::AutomationConfig;
use crate::engine::{Clock, CostCascade, InventoryAnalyzer, NotificationCenter};
use crate::repository::AutomationStore;
use crate::workflow::bus::WorkflowBus;
use crate::workflow::event::WorkflowEventKind;
use std::sync::Arc;

pub use cost::{OperationalCostChangedHandler, PriceChangedHandler, RecalculationHandler};
pub use inventory::StockAlertHandler;
pub use order::{OrderCancelledHandler, OrderCompletedHandler};
pub use production::BatchCompletedHandler;

/// 处理器共享的服务
#[derive(Clone)]
pub struct HandlerServices {
    pub store: Arc<dyn AutomationStore>,
    pub config: Arc<AutomationConfig>,
    pub analyzer: Arc<InventoryAnalyzer>,
    pub cascade: Arc<CostCascade>,
    pub notifications: Arc<NotificationCenter>,
    pub clock: Arc<dyn Clock>,
}

/// 注册全部默认处理器
pub fn register_default_handlers(bus: &WorkflowBus, services: &HandlerServices) {
    bus.register(
        WorkflowEventKind::OrderCompleted,
        Arc::new(OrderCompletedHandler::new(services.clone())),
    );
    bus.register(
        WorkflowEventKind::OrderCancelled,
        Arc::new(OrderCancelledHandler::new(services.clone())),
    );

    let stock_alerts = Arc::new(StockAlertHandler::new(services.clone()));
    bus.register(WorkflowEventKind::InventoryLowStock, stock_alerts.clone());
    bus.register(WorkflowEventKind::InventoryOutOfStock, stock_alerts);

    bus.register(
        WorkflowEventKind::ProductionBatchCompleted,
        Arc::new(BatchCompletedHandler::new(services.clone())),
    );
    bus.register(
        WorkflowEventKind::IngredientPriceChanged,
        Arc::new(PriceChangedHandler::new(services.clone())),
    );
    bus.register(
        WorkflowEventKind::OperationalCostChanged,
        Arc::new(OperationalCostChangedHandler::new(services.clone())),
    );
    bus.register(
        WorkflowEventKind::HppRecalculationNeeded,
        Arc::new(RecalculationHandler::new(services.clone())),
    );

    tracing::info!(handlers = bus.registered_kinds().len(), "默认事件处理器已注册");
}

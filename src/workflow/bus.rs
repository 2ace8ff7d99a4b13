// ==========================================
// UMKM 餐饮经营自动化 - 工作流事件总线
// ==========================================
// 职责: FIFO 事件队列 + 延迟队列 + 单消费者排空循环
// 状态: Idle → Draining → Idle
// 红线: 同一总线上处理器严格串行；处理器失败/超时/panic 只记录，不中断循环
// ==========================================

use crate::config::BusConfig;
use crate::engine::clock::Clock;
use crate::workflow::delay_queue::DelayQueue;
use crate::workflow::error::{HandlerError, WorkflowError};
use crate::workflow::event::{WorkflowEvent, WorkflowEventKind};
use crate::workflow::handler::{HandlerContext, WorkflowHandler};
use chrono::{Duration as ChronoDuration, NaiveDateTime};
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::Instrument;

// ==========================================
// 对外类型
// ==========================================

/// 触发结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// 已进入主队列（position 从 1 开始）
    Enqueued { position: usize },
    /// 已进入延迟队列
    Scheduled { due_at: NaiveDateTime },
    /// 未知事件类型，已丢弃
    Dropped { kind: String },
}

/// 队列状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QueueStatus {
    pub queue_length: usize,
    pub delayed_length: usize,
    pub is_processing: bool,
    pub processed: u64,
    pub failed: u64,
    pub dropped: u64,
}

// ==========================================
// 内部状态
// ==========================================

#[derive(Default)]
struct BusState {
    queue: VecDeque<WorkflowEvent>,
    delayed: DelayQueue,
    is_processing: bool,
    processed: u64,
    failed: u64,
    dropped: u64,
}

enum DrainStep {
    Run(WorkflowEvent),
    Sleep(NaiveDateTime),
    Idle,
}

struct BusInner {
    state: Mutex<BusState>,
    handlers: RwLock<HashMap<WorkflowEventKind, Arc<dyn WorkflowHandler>>>,
    clock: Arc<dyn Clock>,
    handler_timeout: Duration,
    /// 新事件入队时唤醒正在等待延迟事件的排空循环
    wakeup: Notify,
    idle: Notify,
}

impl BusInner {
    fn state(&self) -> MutexGuard<'_, BusState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn drain(self: Arc<Self>) {
        tracing::debug!("事件总线开始排空");
        loop {
            let step = {
                let mut state = self.state();
                let now = self.clock.now();
                for event in state.delayed.pop_due(now) {
                    state.queue.push_back(event);
                }
                if let Some(event) = state.queue.pop_front() {
                    DrainStep::Run(event)
                } else if let Some(deadline) = state.delayed.next_deadline() {
                    DrainStep::Sleep(deadline)
                } else {
                    state.is_processing = false;
                    DrainStep::Idle
                }
            };

            match step {
                DrainStep::Run(event) => Arc::clone(&self).dispatch(event).await,
                DrainStep::Sleep(deadline) => {
                    tokio::select! {
                        _ = self.clock.sleep_until(deadline) => {}
                        _ = self.wakeup.notified() => {}
                    }
                }
                DrainStep::Idle => {
                    self.idle.notify_waiters();
                    tracing::debug!("事件总线回到空闲");
                    break;
                }
            }
        }
    }

    async fn dispatch(self: Arc<Self>, event: WorkflowEvent) {
        let kind = event.kind();
        let handler = match self.handlers.read() {
            Ok(handlers) => handlers.get(&kind).cloned(),
            Err(poisoned) => poisoned.into_inner().get(&kind).cloned(),
        };

        let Some(handler) = handler else {
            tracing::warn!(
                kind = %kind,
                entity_id = %event.entity_id,
                event_id = %event.id,
                "事件类型未注册处理器，已丢弃"
            );
            self.state().dropped += 1;
            return;
        };

        let ctx = HandlerContext {
            bus: WorkflowBus {
                inner: Arc::clone(&self),
            },
        };
        let span = tracing::info_span!(
            "workflow_event",
            kind = %kind,
            entity_id = %event.entity_id,
            event_id = %event.id,
            handler = handler.name()
        );

        let guarded = AssertUnwindSafe(handler.handle(&event, &ctx)).catch_unwind();
        let result = match tokio::time::timeout(self.handler_timeout, guarded)
            .instrument(span)
            .await
        {
            Err(_) => Err(HandlerError::Timeout {
                secs: self.handler_timeout.as_secs(),
            }),
            Ok(Err(panic)) => Err(HandlerError::Panicked(panic_message(panic.as_ref()))),
            Ok(Ok(result)) => result,
        };

        match result {
            Ok(outcome) => {
                self.state().processed += 1;
                tracing::debug!(
                    kind = %kind,
                    event_id = %event.id,
                    notifications = outcome.notifications_published,
                    follow_ups = outcome.events_triggered,
                    "事件处理完成"
                );
            }
            Err(e) => {
                self.state().failed += 1;
                tracing::error!(
                    kind = %kind,
                    entity_id = %event.entity_id,
                    event_id = %event.id,
                    error = %e,
                    "事件处理失败，已丢弃"
                );
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ==========================================
// WorkflowBus
// ==========================================

/// 工作流事件总线（克隆共享同一队列）
#[derive(Clone)]
pub struct WorkflowBus {
    inner: Arc<BusInner>,
}

impl WorkflowBus {
    pub fn new(clock: Arc<dyn Clock>, handler_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(BusInner {
                state: Mutex::new(BusState::default()),
                handlers: RwLock::new(HashMap::new()),
                clock,
                handler_timeout,
                wakeup: Notify::new(),
                idle: Notify::new(),
            }),
        }
    }

    pub fn with_config(clock: Arc<dyn Clock>, config: &BusConfig) -> Self {
        Self::new(clock, Duration::from_secs(config.handler_timeout_secs))
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }

    /// 注册处理器（同一类型重复注册时覆盖）
    pub fn register(&self, kind: WorkflowEventKind, handler: Arc<dyn WorkflowHandler>) {
        tracing::debug!(kind = %kind, handler = handler.name(), "注册事件处理器");
        match self.inner.handlers.write() {
            Ok(mut handlers) => {
                handlers.insert(kind, handler);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(kind, handler);
            }
        }
    }

    pub fn registered_kinds(&self) -> Vec<WorkflowEventKind> {
        let handlers = match self.inner.handlers.read() {
            Ok(handlers) => handlers,
            Err(poisoned) => poisoned.into_inner(),
        };
        WorkflowEventKind::ALL
            .iter()
            .copied()
            .filter(|k| handlers.contains_key(k))
            .collect()
    }

    /// 入队；空闲时启动排空循环，入队后立即返回
    pub fn trigger(&self, event: WorkflowEvent) -> TriggerOutcome {
        let kind = event.kind();
        let entity_id = event.entity_id.clone();
        let event_id = event.id.clone();

        let (position, start) = {
            let mut state = self.inner.state();
            state.queue.push_back(event);
            let start = !state.is_processing;
            state.is_processing = true;
            (state.queue.len(), start)
        };

        tracing::debug!(
            kind = %kind,
            entity_id = %entity_id,
            event_id = %event_id,
            position,
            "事件已入队"
        );

        if start {
            self.spawn_drain();
        } else {
            self.inner.wakeup.notify_one();
        }
        TriggerOutcome::Enqueued { position }
    }

    /// 延迟入队：到期后追加到主队列尾部
    pub fn trigger_after(&self, event: WorkflowEvent, delay: Duration) -> TriggerOutcome {
        let now = self.inner.clock.now();
        let due_at = ChronoDuration::from_std(delay)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(NaiveDateTime::MAX);

        tracing::debug!(
            kind = %event.kind(),
            entity_id = %event.entity_id,
            event_id = %event.id,
            due_at = %due_at,
            "延迟事件已登记"
        );

        let start = {
            let mut state = self.inner.state();
            state.delayed.push(event, due_at);
            let start = !state.is_processing;
            state.is_processing = true;
            start
        };

        if start {
            self.spawn_drain();
        } else {
            self.inner.wakeup.notify_one();
        }
        TriggerOutcome::Scheduled { due_at }
    }

    /// 按字符串事件类型触发
    ///
    /// # 返回
    /// - 未知类型: Ok(Dropped)，只记录日志
    /// - 已知类型但载荷非法: Err(InvalidPayload)
    pub fn trigger_raw(
        &self,
        kind: &str,
        entity_id: &str,
        payload: Value,
    ) -> Result<TriggerOutcome, WorkflowError> {
        match WorkflowEvent::from_raw(kind, entity_id, payload, self.inner.clock.now()) {
            Ok(event) => Ok(self.trigger(event)),
            Err(WorkflowError::UnknownEventKind(kind)) => {
                tracing::warn!(kind = %kind, entity_id = %entity_id, "未知事件类型，已丢弃");
                self.inner.state().dropped += 1;
                Ok(TriggerOutcome::Dropped { kind })
            }
            Err(e) => Err(e),
        }
    }

    pub fn queue_status(&self) -> QueueStatus {
        let state = self.inner.state();
        QueueStatus {
            queue_length: state.queue.len(),
            delayed_length: state.delayed.len(),
            is_processing: state.is_processing,
            processed: state.processed,
            failed: state.failed,
            dropped: state.dropped,
        }
    }

    /// 等待总线回到 Idle（含延迟事件处理完毕）
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            let busy = self.inner.state().is_processing;
            if !busy {
                return;
            }
            notified.await;
        }
    }

    fn spawn_drain(&self) {
        match Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(inner.drain());
            }
            Err(_) => {
                // 没有运行时：事件留在队列中，下次在运行时内触发时一并处理
                tracing::warn!("当前线程没有 tokio 运行时，事件暂存队列");
                self.inner.state().is_processing = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clock::ManualClock;
    use crate::workflow::error::HandlerResult;
    use crate::workflow::handler::HandlerOutcome;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::json;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    /// 记录处理顺序；order.completed 额外追加一个 order.cancelled
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WorkflowHandler for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn handle(
            &self,
            event: &WorkflowEvent,
            ctx: &HandlerContext,
        ) -> HandlerResult<HandlerOutcome> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:{}", event.kind(), event.entity_id));
            if event.kind() == WorkflowEventKind::OrderCompleted {
                ctx.bus
                    .trigger(WorkflowEvent::order_cancelled(&event.entity_id, None, t0()));
            }
            Ok(HandlerOutcome::default())
        }
    }

    struct Failing;

    #[async_trait]
    impl WorkflowHandler for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle(
            &self,
            event: &WorkflowEvent,
            _: &HandlerContext,
        ) -> HandlerResult<HandlerOutcome> {
            if event.entity_id == "panic" {
                panic!("boom");
            }
            if event.entity_id == "slow" {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Err(HandlerError::UnexpectedPayload(event.entity_id.clone()))
        }
    }

    fn bus_with_recorder() -> (WorkflowBus, Arc<Recorder>) {
        let bus = WorkflowBus::new(Arc::new(ManualClock::new(t0())), Duration::from_millis(200));
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        bus.register(WorkflowEventKind::OrderCompleted, recorder.clone());
        bus.register(WorkflowEventKind::OrderCancelled, recorder.clone());
        (bus, recorder)
    }

    #[tokio::test]
    async fn test_fifo_with_follow_up_at_tail() {
        let (bus, recorder) = bus_with_recorder();

        assert_eq!(
            bus.trigger(WorkflowEvent::order_completed("A", t0())),
            TriggerOutcome::Enqueued { position: 1 }
        );
        bus.trigger(WorkflowEvent::order_cancelled("B", None, t0()));
        bus.wait_idle().await;

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec!["order.completed:A", "order.cancelled:B", "order.cancelled:A"]
        );
        let status = bus.queue_status();
        assert_eq!(status.processed, 3);
        assert_eq!(status.queue_length, 0);
        assert!(!status.is_processing);
    }

    #[tokio::test]
    async fn test_unknown_and_unhandled_kinds_are_dropped() {
        let (bus, _) = bus_with_recorder();

        let outcome = bus.trigger_raw("order.shipped", "X", Value::Null).unwrap();
        assert_eq!(
            outcome,
            TriggerOutcome::Dropped {
                kind: "order.shipped".to_string()
            }
        );

        // 已知类型但未注册处理器
        bus.trigger_raw("hpp.recalculation_needed", "hpp", json!({ "reason": "test" }))
            .unwrap();
        bus.wait_idle().await;
        assert_eq!(bus.queue_status().dropped, 2);

        assert!(matches!(
            bus.trigger_raw("ingredient.price_changed", "flour", json!({ "new_price": 1 })),
            Err(WorkflowError::InvalidPayload { .. })
        ));
    }

    #[tokio::test]
    async fn test_handler_failures_do_not_stop_the_loop() {
        let (bus, recorder) = bus_with_recorder();
        bus.register(WorkflowEventKind::IngredientPriceChanged, Arc::new(Failing));

        for id in ["err", "panic", "slow"] {
            bus.trigger(WorkflowEvent::ingredient_price_changed(id, 1.0, 2.0, t0()));
        }
        bus.trigger(WorkflowEvent::order_cancelled("after", None, t0()));
        bus.wait_idle().await;

        let status = bus.queue_status();
        assert_eq!(status.failed, 3);
        assert_eq!(status.processed, 1);
        assert_eq!(
            recorder.seen.lock().unwrap().clone(),
            vec!["order.cancelled:after"]
        );
    }

    #[tokio::test]
    async fn test_delayed_event_runs_after_deadline() {
        let clock = Arc::new(ManualClock::new(t0()));
        let bus = WorkflowBus::new(clock.clone(), Duration::from_secs(1));
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        bus.register(WorkflowEventKind::OrderCancelled, recorder.clone());

        let outcome = bus.trigger_after(
            WorkflowEvent::order_cancelled("late", None, t0()),
            Duration::from_secs(5),
        );
        assert_eq!(
            outcome,
            TriggerOutcome::Scheduled {
                due_at: t0() + ChronoDuration::seconds(5)
            }
        );
        bus.trigger(WorkflowEvent::order_cancelled("now", None, t0()));
        bus.wait_idle().await;

        assert_eq!(
            recorder.seen.lock().unwrap().clone(),
            vec!["order.cancelled:now", "order.cancelled:late"]
        );
        assert!(clock.now() >= t0() + ChronoDuration::seconds(5));
        assert_eq!(bus.queue_status().delayed_length, 0);
    }
}

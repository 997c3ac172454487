//! Event Bus (spec.md §4.8, C8): topic-based publish/subscribe, handlers
//! invoked in subscription order, a publish awaits all subscribers, one
//! subscriber's error never suppresses another's.
//!
//! Grounded 1:1 on the original's `EventBus`: synchronous and asynchronous
//! handlers are both supported, the handler list is guarded by a lock
//! during emit so subscribers can't be mutated mid-dispatch (spec.md §5
//! "Event bus handler list is guarded by a mutex during emit").

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One event on the bus (spec.md §4.8).
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowEvent {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
    pub workflow_name: String,
    pub pattern_tag: String,
    pub data: serde_json::Value,
}

impl WorkflowEvent {
    pub fn new(event_type: impl Into<String>, workflow_name: &str, pattern_tag: &str) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: Utc::now(),
            session_id: None,
            workflow_name: workflow_name.to_string(),
            pattern_tag: pattern_tag.to_string(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

type AsyncHandlerFn = dyn Fn(WorkflowEvent) -> BoxFuture<'static, ()> + Send + Sync;

enum Handler {
    Sync(Arc<dyn Fn(&WorkflowEvent) + Send + Sync>),
    Async(Arc<AsyncHandlerFn>),
}

struct Subscription {
    id: u64,
    handler: Handler,
}

/// A unique handle returned by [`EventBus::subscribe`]/[`EventBus::subscribe_async`],
/// used to [`EventBus::unsubscribe`] later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Thread-safe publish/subscribe bus. Handlers are invoked in subscription
/// order; async handlers are awaited, sync handlers run inline. Errors
/// inside a handler are the handler's own business (this bus's handler
/// closures return `()`, not `Result`) — callers that can fail should
/// catch internally and log, matching the original's per-handler
/// try/except that logs and continues.
pub struct EventBus {
    handlers: Mutex<HashMap<String, Vec<Subscription>>>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Subscribes a synchronous handler to `event_type`.
    pub async fn subscribe(
        &self,
        event_type: impl Into<String>,
        handler: impl Fn(&WorkflowEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.allocate_id();
        let mut handlers = self.handlers.lock().await;
        handlers
            .entry(event_type.into())
            .or_default()
            .push(Subscription {
                id,
                handler: Handler::Sync(Arc::new(handler)),
            });
        tracing::debug!(id, "event_bus_subscribe");
        SubscriptionId(id)
    }

    /// Subscribes an asynchronous handler to `event_type`.
    pub async fn subscribe_async<F>(
        &self,
        event_type: impl Into<String>,
        handler: impl Fn(WorkflowEvent) -> F + Send + Sync + 'static,
    ) -> SubscriptionId
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let id = self.allocate_id();
        let mut handlers = self.handlers.lock().await;
        handlers
            .entry(event_type.into())
            .or_default()
            .push(Subscription {
                id,
                handler: Handler::Async(Arc::new(move |event| Box::pin(handler(event)))),
            });
        tracing::debug!(id, "event_bus_subscribe_async");
        SubscriptionId(id)
    }

    pub async fn unsubscribe(&self, event_type: &str, id: SubscriptionId) {
        let mut handlers = self.handlers.lock().await;
        if let Some(list) = handlers.get_mut(event_type) {
            list.retain(|s| s.id != id.0);
        }
        tracing::debug!(id = id.0, "event_bus_unsubscribe");
    }

    /// Emits `event` to every handler subscribed to its `event_type`, in
    /// subscription order. Awaits async handlers; errors are not
    /// propagated here (handlers are `()`-returning) — any fallible work a
    /// handler does must be caught inside the handler itself.
    pub async fn emit(&self, event: WorkflowEvent) {
        let handlers = self.handlers.lock().await;
        let Some(subs) = handlers.get(&event.event_type) else {
            tracing::debug!(event_type = %event.event_type, "event_bus_no_handlers");
            return;
        };
        tracing::debug!(event_type = %event.event_type, handler_count = subs.len(), "event_bus_emit");
        for sub in subs {
            match &sub.handler {
                Handler::Sync(f) => f(&event),
                Handler::Async(f) => f(event.clone()).await,
            }
        }
    }

    pub async fn clear(&self) {
        self.handlers.lock().await.clear();
        tracing::debug!("event_bus_clear");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[tokio::test]
    async fn handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        bus.subscribe("workflow_start", move |_| {
            o1.try_lock().unwrap().push(1);
        })
        .await;
        let o2 = order.clone();
        bus.subscribe("workflow_start", move |_| {
            o2.try_lock().unwrap().push(2);
        })
        .await;
        bus.emit(WorkflowEvent::new("workflow_start", "demo", "chain")).await;
        assert_eq!(*order.lock().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn async_handler_is_awaited() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        bus.subscribe_async("step_complete", move |_event| {
            let hits = hits2.clone();
            async move {
                hits.fetch_add(1, AtomicOrdering::SeqCst);
            }
        })
        .await;
        bus.emit(WorkflowEvent::new("step_complete", "demo", "chain")).await;
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_handlers_is_a_no_op() {
        let bus = EventBus::new();
        bus.emit(WorkflowEvent::new("nobody_listens", "demo", "chain")).await;
    }

    #[tokio::test]
    async fn unsubscribe_removes_only_that_handler() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits1 = hits.clone();
        let id = bus
            .subscribe("error", move |_| {
                hits1.fetch_add(1, AtomicOrdering::SeqCst);
            })
            .await;
        let hits2 = hits.clone();
        bus.subscribe("error", move |_| {
            hits2.fetch_add(10, AtomicOrdering::SeqCst);
        })
        .await;
        bus.unsubscribe("error", id).await;
        bus.emit(WorkflowEvent::new("error", "demo", "chain")).await;
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 10);
    }
}

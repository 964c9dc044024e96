//! Event Bridge
//!
//! Native threads push events in, the scripting context runs the callbacks.
//! Delivery is a channel send; lookup and invocation happen on the context.

use serde_json::Value;

use super::protocol::NativeEvent;
use crate::core::DispatchResult;
use crate::engine::EventSink;
use crate::scripting::{ExecutionContext, ScriptHost};

const TARGET: &str = "viro_bridge::events";

pub struct EventBridge<H> {
    context: ExecutionContext<H>,
}

impl<H> Clone for EventBridge<H> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<H: ScriptHost> EventBridge<H> {
    pub fn new(context: ExecutionContext<H>) -> Self {
        Self { context }
    }

    /// Queue an event for `callback_id`, reporting whether the context took it
    pub fn try_deliver(&self, callback_id: &str, payload: Value) -> DispatchResult<()> {
        let callback_id = callback_id.to_string();
        self.context.post(move |host: &mut H| {
            host.dispatch_event(&callback_id, payload);
        })
    }

    /// Queue an event; if the context is gone the event is dropped with a warning
    pub fn deliver_event(&self, callback_id: &str, payload: Value) {
        if let Err(err) = self.try_deliver(callback_id, payload) {
            tracing::warn!(
                target: TARGET,
                "Dropping event for callback {}: {}",
                callback_id,
                err
            );
        }
    }

    pub fn deliver_native(&self, callback_id: &str, event: &NativeEvent) {
        self.deliver_event(callback_id, event.to_payload());
    }

    pub fn is_available(&self) -> bool {
        self.context.is_available()
    }
}

impl<H: ScriptHost> EventSink for EventBridge<H> {
    fn deliver_event(&self, callback_id: &str, payload: Value) {
        EventBridge::deliver_event(self, callback_id, payload);
    }
}

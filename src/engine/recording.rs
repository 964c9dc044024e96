//! In-memory engine that records every call it receives.
//!
//! Used by the test suites and by hosts that want to inspect what the bridge
//! forwarded without a real renderer behind it.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use super::{EventSink, NativeEngine, PlaneDetection};
use crate::config::EngineOptions;
use crate::scene::Props;

/// One forwarded engine call
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Initialize(EngineOptions),
    Materialize {
        node_id: String,
        node_type: String,
        props: Props,
    },
    Update {
        node_id: String,
        delta: Props,
    },
    Destroy(String),
    Reparent {
        child_id: String,
        parent_id: String,
    },
    Detach {
        child_id: String,
        parent_id: String,
    },
    Subscribe {
        node_id: String,
        event_name: String,
        callback_id: String,
    },
    Unsubscribe {
        node_id: String,
        event_name: String,
        callback_id: String,
    },
    CreateMaterial {
        name: String,
        properties: Props,
    },
    UpdateMaterial {
        name: String,
        properties: Props,
    },
    CreateAnimation {
        name: String,
        properties: Props,
    },
    ExecuteAnimation {
        node_id: String,
        animation_name: String,
        options: Props,
    },
    PlaneDetection(PlaneDetection),
    ImageTargets(Props),
}

#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<EngineCall>>,
    sink: Mutex<Option<Arc<dyn EventSink>>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every call so far, oldest first.
    pub fn calls(&self) -> Vec<EngineCall> {
        lock(&self.calls).clone()
    }

    /// Returns and forgets the calls recorded so far.
    pub fn take_calls(&self) -> Vec<EngineCall> {
        std::mem::take(&mut *lock(&self.calls))
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.sink).is_some()
    }

    /// Emit an event as the engine would from its own thread.
    ///
    /// Returns `false` when no sink is attached.
    pub fn emit(&self, callback_id: &str, payload: Value) -> bool {
        let sink = lock(&self.sink).clone();
        match sink {
            Some(sink) => {
                sink.deliver_event(callback_id, payload);
                true
            }
            None => false,
        }
    }

    fn record(&self, call: EngineCall) {
        lock(&self.calls).push(call);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl NativeEngine for RecordingEngine {
    fn attach(&self, events: Arc<dyn EventSink>) {
        *lock(&self.sink) = Some(events);
    }

    fn detach(&self) {
        *lock(&self.sink) = None;
    }

    fn initialize(&self, options: &EngineOptions) {
        self.record(EngineCall::Initialize(options.clone()));
    }

    fn materialize_node(&self, node_id: &str, node_type: &str, props: &Props) {
        self.record(EngineCall::Materialize {
            node_id: node_id.to_string(),
            node_type: node_type.to_string(),
            props: props.clone(),
        });
    }

    fn update_node(&self, node_id: &str, delta: &Props) {
        self.record(EngineCall::Update {
            node_id: node_id.to_string(),
            delta: delta.clone(),
        });
    }

    fn destroy_node(&self, node_id: &str) {
        self.record(EngineCall::Destroy(node_id.to_string()));
    }

    fn reparent_node(&self, child_id: &str, new_parent_id: &str) {
        self.record(EngineCall::Reparent {
            child_id: child_id.to_string(),
            parent_id: new_parent_id.to_string(),
        });
    }

    fn detach_node(&self, child_id: &str, old_parent_id: &str) {
        self.record(EngineCall::Detach {
            child_id: child_id.to_string(),
            parent_id: old_parent_id.to_string(),
        });
    }

    fn subscribe_event(&self, node_id: &str, event_name: &str, callback_id: &str) {
        self.record(EngineCall::Subscribe {
            node_id: node_id.to_string(),
            event_name: event_name.to_string(),
            callback_id: callback_id.to_string(),
        });
    }

    fn unsubscribe_event(&self, node_id: &str, event_name: &str, callback_id: &str) {
        self.record(EngineCall::Unsubscribe {
            node_id: node_id.to_string(),
            event_name: event_name.to_string(),
            callback_id: callback_id.to_string(),
        });
    }

    fn create_material(&self, name: &str, properties: &Props) {
        self.record(EngineCall::CreateMaterial {
            name: name.to_string(),
            properties: properties.clone(),
        });
    }

    fn update_material(&self, name: &str, properties: &Props) {
        self.record(EngineCall::UpdateMaterial {
            name: name.to_string(),
            properties: properties.clone(),
        });
    }

    fn create_animation(&self, name: &str, properties: &Props) {
        self.record(EngineCall::CreateAnimation {
            name: name.to_string(),
            properties: properties.clone(),
        });
    }

    fn execute_animation(&self, node_id: &str, animation_name: &str, options: &Props) {
        self.record(EngineCall::ExecuteAnimation {
            node_id: node_id.to_string(),
            animation_name: animation_name.to_string(),
            options: options.clone(),
        });
    }

    fn set_plane_detection(&self, detection: PlaneDetection) {
        self.record(EngineCall::PlaneDetection(detection));
    }

    fn set_image_targets(&self, targets: &Props) {
        self.record(EngineCall::ImageTargets(targets.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct CountingSink(Mutex<Vec<(String, Value)>>);

    impl EventSink for CountingSink {
        fn deliver_event(&self, callback_id: &str, payload: Value) {
            self.0.lock().unwrap().push((callback_id.to_string(), payload));
        }
    }

    #[test]
    fn test_records_in_order() {
        let engine = RecordingEngine::new();
        engine.materialize_node("n1", "box", &Props::new());
        engine.destroy_node("n1");

        let calls = engine.take_calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(&calls[0], EngineCall::Materialize { node_id, .. } if node_id == "n1"));
        assert_eq!(calls[1], EngineCall::Destroy("n1".to_string()));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_emit_requires_attach() {
        let engine = RecordingEngine::new();
        assert!(!engine.emit("cb", json!({})));

        let sink = Arc::new(CountingSink(Mutex::new(Vec::new())));
        engine.attach(sink.clone());
        assert!(engine.is_attached());
        assert!(engine.emit("cb", json!({"x": 1})));
        assert_eq!(sink.0.lock().unwrap().len(), 1);

        engine.detach();
        assert!(!engine.emit("cb", json!({})));
    }
}

//! Native engine interface
//!
//! The rendering/AR-tracking engine is an external collaborator. The bridge
//! only talks to it through [`NativeEngine`] (commands out) and hands it an
//! [`EventSink`] (events back in). Every engine call is fire-and-forget from
//! the bridge's point of view: no command waits for a render-thread round trip.

pub mod recording;
pub mod tracing_engine;

pub use recording::{EngineCall, RecordingEngine};
pub use tracing_engine::TracingEngine;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::EngineOptions;
use crate::scene::Props;

/// Entry point the engine uses to push events toward the scripting side.
///
/// Implementations must never run scripting code inline; see
/// [`crate::bindings::EventBridge`].
pub trait EventSink: Send + Sync {
    fn deliver_event(&self, callback_id: &str, payload: serde_json::Value);
}

/// AR plane detection toggles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaneDetection {
    pub horizontal: bool,
    pub vertical: bool,
}

/// Operations the bridge forwards to the native engine.
///
/// Only the five node operations are mandatory; everything else defaults to
/// a no-op so minimal engines stay small.
pub trait NativeEngine: Send + Sync {
    /// Called when the host attaches the bridge.
    fn attach(&self, events: Arc<dyn EventSink>) {
        let _ = events;
    }

    /// Called when the host detaches the bridge. The sink handed to
    /// [`NativeEngine::attach`] drops everything from now on.
    fn detach(&self) {}

    /// Engine start-up. Failures are reported through the event channel.
    fn initialize(&self, options: &EngineOptions) {
        let _ = options;
    }

    fn materialize_node(&self, node_id: &str, node_type: &str, props: &Props);

    fn update_node(&self, node_id: &str, delta: &Props);

    fn destroy_node(&self, node_id: &str);

    fn reparent_node(&self, child_id: &str, new_parent_id: &str);

    fn detach_node(&self, child_id: &str, old_parent_id: &str);

    /// Start emitting `event_name` events of `node_id` under `callback_id`.
    fn subscribe_event(&self, node_id: &str, event_name: &str, callback_id: &str) {
        let _ = (node_id, event_name, callback_id);
    }

    fn unsubscribe_event(&self, node_id: &str, event_name: &str, callback_id: &str) {
        let _ = (node_id, event_name, callback_id);
    }

    fn create_material(&self, name: &str, properties: &Props) {
        let _ = (name, properties);
    }

    fn update_material(&self, name: &str, properties: &Props) {
        let _ = (name, properties);
    }

    fn create_animation(&self, name: &str, properties: &Props) {
        let _ = (name, properties);
    }

    fn execute_animation(&self, node_id: &str, animation_name: &str, options: &Props) {
        let _ = (node_id, animation_name, options);
    }

    fn set_plane_detection(&self, detection: PlaneDetection) {
        let _ = detection;
    }

    fn set_image_targets(&self, targets: &Props) {
        let _ = targets;
    }
}

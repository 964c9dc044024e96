//! Engine stand-in that logs every forwarded call.
//!
//! Backs the `viro-bridge` binary so scripts can be exercised without a
//! renderer attached.

use std::sync::{Arc, Mutex};

use super::{EventSink, NativeEngine, PlaneDetection};
use crate::config::EngineOptions;
use crate::scene::Props;

const TARGET: &str = "viro_bridge::engine";

#[derive(Default)]
pub struct TracingEngine {
    sink: Mutex<Option<Arc<dyn EventSink>>>,
}

impl TracingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn sink(&self) -> Option<Arc<dyn EventSink>> {
        self.sink.lock().ok().and_then(|sink| sink.clone())
    }
}

impl NativeEngine for TracingEngine {
    fn attach(&self, events: Arc<dyn EventSink>) {
        tracing::info!(target: TARGET, "attached");
        if let Ok(mut sink) = self.sink.lock() {
            *sink = Some(events);
        }
    }

    fn detach(&self) {
        tracing::info!(target: TARGET, "detached");
        if let Ok(mut sink) = self.sink.lock() {
            *sink = None;
        }
    }

    fn initialize(&self, options: &EngineOptions) {
        tracing::info!(
            target: TARGET,
            "initialize ar={} alignment={:?} debug={} key_set={}",
            options.ar_enabled,
            options.world_alignment,
            options.debug,
            options.api_key.is_some()
        );
    }

    fn materialize_node(&self, node_id: &str, node_type: &str, props: &Props) {
        tracing::info!(target: TARGET, "materialize {} ({}) {:?}", node_id, node_type, props);
    }

    fn update_node(&self, node_id: &str, delta: &Props) {
        tracing::info!(target: TARGET, "update {} {:?}", node_id, delta);
    }

    fn destroy_node(&self, node_id: &str) {
        tracing::info!(target: TARGET, "destroy {}", node_id);
    }

    fn reparent_node(&self, child_id: &str, new_parent_id: &str) {
        tracing::info!(target: TARGET, "reparent {} -> {}", child_id, new_parent_id);
    }

    fn detach_node(&self, child_id: &str, old_parent_id: &str) {
        tracing::info!(target: TARGET, "detach {} from {}", child_id, old_parent_id);
    }

    fn subscribe_event(&self, node_id: &str, event_name: &str, callback_id: &str) {
        tracing::info!(target: TARGET, "subscribe {}.{} as {}", node_id, event_name, callback_id);
        // Mirrors the container's `onInitialized` notification for scene nodes.
        if event_name == "onInitialized" {
            if let Some(sink) = self.sink() {
                sink.deliver_event(callback_id, serde_json::json!({ "success": true }));
            }
        }
    }

    fn unsubscribe_event(&self, node_id: &str, event_name: &str, callback_id: &str) {
        tracing::info!(target: TARGET, "unsubscribe {}.{} ({})", node_id, event_name, callback_id);
    }

    fn create_material(&self, name: &str, properties: &Props) {
        tracing::info!(target: TARGET, "material {} {:?}", name, properties);
    }

    fn update_material(&self, name: &str, properties: &Props) {
        tracing::info!(target: TARGET, "material update {} {:?}", name, properties);
    }

    fn create_animation(&self, name: &str, properties: &Props) {
        tracing::info!(target: TARGET, "animation {} {:?}", name, properties);
    }

    fn execute_animation(&self, node_id: &str, animation_name: &str, options: &Props) {
        tracing::info!(target: TARGET, "run {} on {} {:?}", animation_name, node_id, options);
    }

    fn set_plane_detection(&self, detection: PlaneDetection) {
        tracing::info!(
            target: TARGET,
            "plane detection horizontal={} vertical={}",
            detection.horizontal,
            detection.vertical
        );
    }

    fn set_image_targets(&self, targets: &Props) {
        tracing::info!(target: TARGET, "image targets {:?}", targets.keys().collect::<Vec<_>>());
    }
}

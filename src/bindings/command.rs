//! Command Bridge
//!
//! Executes validated [`BridgeCommand`]s against the node registry, the
//! callback registry and the native engine. One instance lives inside each
//! scripting host, on the scripting context thread.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{self, Ready};

use super::protocol::{BridgeCommand, ScriptArg};
use crate::config::EngineOptions;
use crate::core::{BridgeError, BridgeResult};
use crate::engine::{NativeEngine, PlaneDetection};
use crate::scene::{NodeRegistry, Props};
use crate::scripting::CallbackRegistry;

const TARGET: &str = "viro_bridge::commands";

/// Everything a host needs to build its [`CommandBridge`].
///
/// Crosses into the scripting thread, so it only carries `Send` state.
#[derive(Clone)]
pub struct BridgeParts {
    pub nodes: Arc<NodeRegistry>,
    pub engine_options: EngineOptions,
    /// Set once the owning bridge detaches
    pub closed: Arc<AtomicBool>,
}

impl BridgeParts {
    pub fn new(nodes: Arc<NodeRegistry>, engine_options: EngineOptions) -> Self {
        Self {
            nodes,
            engine_options,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Deferred result of `initialize`. Always resolves to `true`; engine
/// start-up failures arrive as events.
#[derive(Debug)]
pub struct Readiness(Ready<bool>);

impl Readiness {
    fn ready() -> Self {
        Self(future::ready(true))
    }
}

impl Future for Readiness {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        Pin::new(&mut self.get_mut().0).poll(cx)
    }
}

/// What a command hands back to the script
#[derive(Debug)]
pub enum CommandOutput {
    None,
    Readiness(Readiness),
}

pub struct CommandBridge<F> {
    nodes: Arc<NodeRegistry>,
    callbacks: CallbackRegistry<F>,
    engine_options: EngineOptions,
    closed: Arc<AtomicBool>,
}

impl<F: Clone> CommandBridge<F> {
    pub fn new(parts: BridgeParts) -> Self {
        Self {
            nodes: parts.nodes,
            callbacks: CallbackRegistry::new(),
            engine_options: parts.engine_options,
            closed: parts.closed,
        }
    }

    pub fn nodes(&self) -> &Arc<NodeRegistry> {
        &self.nodes
    }

    pub fn callbacks(&self) -> &CallbackRegistry<F> {
        &self.callbacks
    }

    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        self.nodes.engine()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> BridgeResult<()> {
        if self.is_closed() {
            Err(BridgeError::Unavailable)
        } else {
            Ok(())
        }
    }

    /// Decode and execute a call by its script-visible name
    pub fn call(&self, name: &str, args: Vec<ScriptArg<F>>) -> BridgeResult<CommandOutput> {
        self.ensure_open()?;
        let command = BridgeCommand::decode(name, args)?;
        self.execute(command)
    }

    pub fn execute(&self, command: BridgeCommand<F>) -> BridgeResult<CommandOutput> {
        self.ensure_open()?;
        tracing::trace!(target: TARGET, "{}", command.name());

        match command {
            BridgeCommand::CreateNode {
                node_id,
                node_type,
                props,
            } => self.nodes.create_node(&node_id, &node_type, props)?,
            BridgeCommand::UpdateNode { node_id, props } => self.nodes.update_node(&node_id, props)?,
            BridgeCommand::DeleteNode { node_id } => self.nodes.delete_node(&node_id)?,
            BridgeCommand::AddChild { parent_id, child_id } => self.nodes.add_child(&parent_id, &child_id)?,
            BridgeCommand::RemoveChild { parent_id, child_id } => {
                self.nodes.remove_child(&parent_id, &child_id)?
            }
            BridgeCommand::RegisterEventCallback {
                node_id,
                event_name,
                callback_id,
            } => self.register_event_callback(&node_id, &event_name, &callback_id),
            BridgeCommand::UnregisterEventCallback {
                node_id,
                event_name,
                callback_id,
            } => self.unregister_event_callback(&node_id, &event_name, &callback_id),
            BridgeCommand::RegisterCallable {
                callback_id,
                callable,
            } => self.register_callable(&callback_id, callable),
            BridgeCommand::Initialize { api_key } => {
                return Ok(CommandOutput::Readiness(self.initialize(&api_key)));
            }
            BridgeCommand::CreateMaterial { name, properties } => {
                self.engine().create_material(&name, &properties)
            }
            BridgeCommand::UpdateMaterial { name, properties } => {
                self.engine().update_material(&name, &properties)
            }
            BridgeCommand::CreateAnimation { name, properties } => {
                self.engine().create_animation(&name, &properties)
            }
            BridgeCommand::ExecuteAnimation {
                node_id,
                animation_name,
                options,
            } => self.execute_animation(&node_id, &animation_name, &options)?,
            BridgeCommand::SetPlaneDetection(detection) => self.set_plane_detection(detection),
            BridgeCommand::SetImageTargets(targets) => self.engine().set_image_targets(&targets),
        }
        Ok(CommandOutput::None)
    }

    /// Record the node/event association and subscribe the engine
    pub fn register_event_callback(&self, node_id: &str, event_name: &str, callback_id: &str) {
        self.callbacks.associate(callback_id, node_id, event_name);
        self.engine().subscribe_event(node_id, event_name, callback_id);
    }

    pub fn register_callable(&self, callback_id: &str, callable: F) {
        self.callbacks.attach_callable(callback_id, callable);
    }

    /// Fail-soft: unknown ids are ignored, the engine is told regardless
    pub fn unregister_event_callback(&self, node_id: &str, event_name: &str, callback_id: &str) {
        self.callbacks.unregister(callback_id, node_id, event_name);
        self.engine().unsubscribe_event(node_id, event_name, callback_id);
    }

    pub fn initialize(&self, api_key: &str) -> Readiness {
        let options = self.engine_options.with_api_key(api_key);
        tracing::info!(
            target: TARGET,
            "Initializing engine (debug: {}, ar: {}, alignment: {:?})",
            options.debug,
            options.ar_enabled,
            options.world_alignment
        );
        self.engine().initialize(&options);
        Readiness::ready()
    }

    pub fn execute_animation(&self, node_id: &str, animation_name: &str, options: &Props) -> BridgeResult<()> {
        if !self.nodes.contains(node_id) {
            return Err(BridgeError::NotFound(node_id.to_string()));
        }
        self.engine().execute_animation(node_id, animation_name, options);
        Ok(())
    }

    pub fn set_plane_detection(&self, detection: PlaneDetection) {
        tracing::debug!(
            target: TARGET,
            "Plane detection: horizontal={}, vertical={}",
            detection.horizontal,
            detection.vertical
        );
        self.engine().set_plane_detection(detection);
    }
}

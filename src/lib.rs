//! # Viro Bridge
//!
//! Bridge between a scripting runtime and a native AR/3D rendering engine.
//!
//! Scripts drive a retained scene graph of string-identified nodes through a
//! fixed command surface (`createViroNode`, `addViroNodeChild`, ...). The
//! engine pushes events back from its own threads; the bridge marshals them
//! onto the single scripting context and invokes the callable registered
//! under the event's callback id.
//!
//! ## Architecture
//!
//! ```text
//!   script thread                         native threads
//!  ┌──────────────────────────┐         ┌───────────────────┐
//!  │ JsHost / NativeHost      │         │ NativeEngine      │
//!  │   CommandBridge ─────────┼────────>│  materialize/...  │
//!  │   CallbackRegistry       │         │                   │
//!  │        ^                 │         │  EventSink        │
//!  │        │ FIFO task queue │<────────┼─ EventBridge      │
//!  └────────┴─────────────────┘         └───────────────────┘
//!               NodeRegistry (Arc, RwLock) shared by both
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use viro_bridge::{BridgeConfig, TracingEngine, ViroBridge};
//!
//! let mut bridge = ViroBridge::javascript(BridgeConfig::default(), Arc::new(TracingEngine::new()));
//! bridge.attach()?;
//! bridge.run(|host| host.execute_script(r#"NativeViro.createViroNode("n1", "box", {})"#))??;
//! bridge.detach();
//! ```
//!
//! ## Modules
//!
//! - [`core`]: errors and logging
//! - [`config`]: configuration loading
//! - [`engine`]: native engine interface
//! - [`scene`]: node registry
//! - [`scripting`]: execution context, callback registry, Rust host
//! - [`bindings`]: command protocol, command/event bridges, JavaScript host
//! - [`bridge`]: attach/detach lifecycle

/// Errors and logging
pub mod core;
/// Configuration system
pub mod config;
/// Native engine interface
pub mod engine;
/// Scene graph node registry
pub mod scene;
/// Scripting execution context
pub mod scripting;
/// Command/event protocol and language bindings
pub mod bindings;
/// Host lifecycle
pub mod bridge;

pub use bindings::{BridgeCommand, CommandBridge, CommandOutput, EventBridge, JsHost, NativeEvent, Readiness, ScriptArg};
pub use bridge::{HostLifecycle, ViroBridge};
pub use config::BridgeConfig;
pub use core::{BridgeError, BridgeResult};
pub use engine::{EventSink, NativeEngine, RecordingEngine, TracingEngine};
pub use scene::{NodeRegistry, Props};
pub use scripting::{NativeHost, ScriptHost, TeardownPolicy, TeardownReport};

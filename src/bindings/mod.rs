//! Language Binding Layer
//!
//! One command/event protocol shared by every scripting host.
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Scripting Hosts                          │
//! │  ┌──────────────┐                 ┌──────────────┐          │
//! │  │ JS (QuickJS) │                 │ Rust closures│          │
//! │  └──────┬───────┘                 └──────┬───────┘          │
//! │         │        ScriptArg<F>            │                  │
//! │         v                                v                  │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │        Command table + decode (protocol)            │   │
//! │  └───────────────────────┬─────────────────────────────┘   │
//! │                          v                                  │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │  CommandBridge: NodeRegistry, CallbackRegistry,     │   │
//! │  │                 NativeEngine                        │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! │                                                             │
//! │  NativeEngine ──> EventBridge ──> execution context ──>    │
//! │                                   CallbackRegistry lookup   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod command;
pub mod events;
pub mod js;
pub mod protocol;

pub use command::{BridgeParts, CommandBridge, CommandOutput, Readiness};
pub use events::EventBridge;
pub use js::{JsCallback, JsHost};
pub use protocol::*;

//! Script Command/Event Protocol
//!
//! The language-agnostic contract between a scripting host and the bridge.
//! A binding adapter converts its runtime's arguments into [`ScriptArg`]s and
//! hands them to [`BridgeCommand::decode`], which checks the fixed command
//! table (arity first, then types) before anything touches a registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::ArgumentError;
use crate::engine::PlaneDetection;
use crate::scene::Props;

/// One argument coming from a scripting host.
///
/// `F` is the host's callable type; everything else travels as JSON.
#[derive(Debug, Clone)]
pub enum ScriptArg<F> {
    Value(Value),
    Callable(F),
}

impl<F> From<Value> for ScriptArg<F> {
    fn from(value: Value) -> Self {
        ScriptArg::Value(value)
    }
}

impl<F> From<&str> for ScriptArg<F> {
    fn from(value: &str) -> Self {
        ScriptArg::Value(Value::String(value.to_string()))
    }
}

/// Which operation a table entry maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    CreateNode,
    UpdateNode,
    DeleteNode,
    AddChild,
    RemoveChild,
    RegisterEventCallback,
    UnregisterEventCallback,
    Initialize,
    RegisterCallable,
    CreateMaterial,
    UpdateMaterial,
    CreateAnimation,
    ExecuteAnimation,
    SetPlaneDetection,
    SetImageTargets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub arity: usize,
    pub kind: CommandKind,
}

const fn spec(name: &'static str, arity: usize, kind: CommandKind) -> CommandSpec {
    CommandSpec { name, arity, kind }
}

/// Script-visible command table
pub const COMMANDS: &[CommandSpec] = &[
    spec("createViroNode", 3, CommandKind::CreateNode),
    spec("updateViroNode", 2, CommandKind::UpdateNode),
    spec("deleteViroNode", 1, CommandKind::DeleteNode),
    spec("addViroNodeChild", 2, CommandKind::AddChild),
    spec("removeViroNodeChild", 2, CommandKind::RemoveChild),
    spec("registerEventCallback", 3, CommandKind::RegisterEventCallback),
    spec("unregisterEventCallback", 3, CommandKind::UnregisterEventCallback),
    spec("initialize", 1, CommandKind::Initialize),
    spec("registerViroEventCallback", 2, CommandKind::RegisterCallable),
    spec("createViroMaterial", 2, CommandKind::CreateMaterial),
    spec("updateViroMaterial", 2, CommandKind::UpdateMaterial),
    spec("createViroAnimation", 2, CommandKind::CreateAnimation),
    spec("executeViroAnimation", 3, CommandKind::ExecuteAnimation),
    spec("setViroARPlaneDetection", 1, CommandKind::SetPlaneDetection),
    spec("setViroARImageTargets", 1, CommandKind::SetImageTargets),
];

pub fn command_spec(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

/// A fully validated command
#[derive(Debug, Clone)]
pub enum BridgeCommand<F> {
    // Scene graph
    CreateNode {
        node_id: String,
        node_type: String,
        props: Props,
    },
    UpdateNode {
        node_id: String,
        props: Props,
    },
    DeleteNode {
        node_id: String,
    },
    AddChild {
        parent_id: String,
        child_id: String,
    },
    RemoveChild {
        parent_id: String,
        child_id: String,
    },

    // Events
    RegisterEventCallback {
        node_id: String,
        event_name: String,
        callback_id: String,
    },
    UnregisterEventCallback {
        node_id: String,
        event_name: String,
        callback_id: String,
    },
    RegisterCallable {
        callback_id: String,
        callable: F,
    },

    // Engine
    Initialize {
        api_key: String,
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

    // AR
    SetPlaneDetection(PlaneDetection),
    SetImageTargets(Props),
}

impl<F> BridgeCommand<F> {
    /// Validate a named call against the command table.
    ///
    /// Extra trailing arguments are ignored, as script callers expect.
    pub fn decode(name: &str, args: Vec<ScriptArg<F>>) -> Result<Self, ArgumentError> {
        let spec = command_spec(name).ok_or_else(|| ArgumentError::UnknownCommand(name.to_string()))?;
        if args.len() < spec.arity {
            return Err(ArgumentError::Arity {
                command: spec.name,
                expected: spec.arity,
                actual: args.len(),
            });
        }

        let mut args = Args::new(spec.name, args);
        let command = match spec.kind {
            CommandKind::CreateNode => BridgeCommand::CreateNode {
                node_id: args.string(0)?,
                node_type: args.string(1)?,
                props: args.object(2)?,
            },
            CommandKind::UpdateNode => BridgeCommand::UpdateNode {
                node_id: args.string(0)?,
                props: args.object(1)?,
            },
            CommandKind::DeleteNode => BridgeCommand::DeleteNode {
                node_id: args.string(0)?,
            },
            CommandKind::AddChild => BridgeCommand::AddChild {
                parent_id: args.string(0)?,
                child_id: args.string(1)?,
            },
            CommandKind::RemoveChild => BridgeCommand::RemoveChild {
                parent_id: args.string(0)?,
                child_id: args.string(1)?,
            },
            CommandKind::RegisterEventCallback => BridgeCommand::RegisterEventCallback {
                node_id: args.string(0)?,
                event_name: args.string(1)?,
                callback_id: args.string(2)?,
            },
            CommandKind::UnregisterEventCallback => BridgeCommand::UnregisterEventCallback {
                node_id: args.string(0)?,
                event_name: args.string(1)?,
                callback_id: args.string(2)?,
            },
            CommandKind::Initialize => BridgeCommand::Initialize {
                api_key: args.string(0)?,
            },
            CommandKind::RegisterCallable => BridgeCommand::RegisterCallable {
                callback_id: args.string(0)?,
                callable: args.callable(1)?,
            },
            CommandKind::CreateMaterial => BridgeCommand::CreateMaterial {
                name: args.string(0)?,
                properties: args.object(1)?,
            },
            CommandKind::UpdateMaterial => BridgeCommand::UpdateMaterial {
                name: args.string(0)?,
                properties: args.object(1)?,
            },
            CommandKind::CreateAnimation => BridgeCommand::CreateAnimation {
                name: args.string(0)?,
                properties: args.object(1)?,
            },
            CommandKind::ExecuteAnimation => BridgeCommand::ExecuteAnimation {
                node_id: args.string(0)?,
                animation_name: args.string(1)?,
                options: args.object(2)?,
            },
            CommandKind::SetPlaneDetection => BridgeCommand::SetPlaneDetection(args.plane_detection(0)?),
            CommandKind::SetImageTargets => BridgeCommand::SetImageTargets(args.object(0)?),
        };
        Ok(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            BridgeCommand::CreateNode { .. } => "createViroNode",
            BridgeCommand::UpdateNode { .. } => "updateViroNode",
            BridgeCommand::DeleteNode { .. } => "deleteViroNode",
            BridgeCommand::AddChild { .. } => "addViroNodeChild",
            BridgeCommand::RemoveChild { .. } => "removeViroNodeChild",
            BridgeCommand::RegisterEventCallback { .. } => "registerEventCallback",
            BridgeCommand::UnregisterEventCallback { .. } => "unregisterEventCallback",
            BridgeCommand::RegisterCallable { .. } => "registerViroEventCallback",
            BridgeCommand::Initialize { .. } => "initialize",
            BridgeCommand::CreateMaterial { .. } => "createViroMaterial",
            BridgeCommand::UpdateMaterial { .. } => "updateViroMaterial",
            BridgeCommand::CreateAnimation { .. } => "createViroAnimation",
            BridgeCommand::ExecuteAnimation { .. } => "executeViroAnimation",
            BridgeCommand::SetPlaneDetection(_) => "setViroARPlaneDetection",
            BridgeCommand::SetImageTargets(_) => "setViroARImageTargets",
        }
    }
}

struct Args<F> {
    command: &'static str,
    slots: Vec<Option<ScriptArg<F>>>,
}

impl<F> Args<F> {
    fn new(command: &'static str, args: Vec<ScriptArg<F>>) -> Self {
        Self {
            command,
            slots: args.into_iter().map(Some).collect(),
        }
    }

    fn mismatch(&self, index: usize, expected: &'static str) -> ArgumentError {
        ArgumentError::Type {
            command: self.command,
            index,
            expected,
        }
    }

    fn take(&mut self, index: usize) -> Option<ScriptArg<F>> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    fn string(&mut self, index: usize) -> Result<String, ArgumentError> {
        match self.take(index) {
            Some(ScriptArg::Value(Value::String(value))) => Ok(value),
            _ => Err(self.mismatch(index, "a string")),
        }
    }

    fn object(&mut self, index: usize) -> Result<Props, ArgumentError> {
        match self.take(index) {
            Some(ScriptArg::Value(Value::Object(map))) => Ok(map),
            _ => Err(self.mismatch(index, "an object")),
        }
    }

    fn callable(&mut self, index: usize) -> Result<F, ArgumentError> {
        match self.take(index) {
            Some(ScriptArg::Callable(callable)) => Ok(callable),
            _ => Err(self.mismatch(index, "a function")),
        }
    }

    fn plane_detection(&mut self, index: usize) -> Result<PlaneDetection, ArgumentError> {
        let config = self.object(index)?;
        let flag = |key: &str| match config.get(key) {
            None => Ok(false),
            Some(Value::Bool(value)) => Ok(*value),
            Some(_) => Err(self.mismatch(index, "an object with boolean horizontal/vertical")),
        };
        Ok(PlaneDetection {
            horizontal: flag("horizontal")?,
            vertical: flag("vertical")?,
        })
    }
}

/// AR tracking quality reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackingState {
    Unavailable,
    Limited,
    Normal,
}

/// Node interaction events a script can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionKind {
    Hover,
    Click,
    ClickState,
    Touch,
    Scroll,
    Swipe,
    Drag,
    Pinch,
    Rotate,
    Fuse,
    Collision,
    TransformUpdate,
}

/// Typed events emitted by the native engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NativeEvent {
    Initialized {
        success: bool,
    },
    #[serde(rename_all = "camelCase")]
    TrackingUpdated {
        state: TrackingState,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    CameraTransformUpdated {
        position: [f32; 3],
        rotation: [f32; 3],
        forward: [f32; 3],
        up: [f32; 3],
    },
    ArSessionFailed {
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    Node {
        node_id: String,
        kind: InteractionKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        position: Option<[f32; 3]>,
        #[serde(skip_serializing_if = "Option::is_none")]
        state: Option<i32>,
    },
}

impl NativeEvent {
    /// JSON payload handed to the script callback
    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

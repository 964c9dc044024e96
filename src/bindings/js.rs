//! JavaScript host using rquickjs
//!
//! Installs the script-visible surface into a QuickJS context:
//!
//! - `NativeViro.<command>(...)` for every command except
//!   `registerViroEventCallback`
//! - `registerViroEventCallback(callbackId, fn)`
//! - `handleViroEvent(callbackId, payload)`
//! - `console.log/info/warn/error` forwarded to `tracing`
//!
//! The runtime is not `Send`; a `JsHost` is built and dropped on the
//! scripting context thread (see [`crate::scripting::Dispatcher`]).

use std::rc::Rc;

use futures::FutureExt;
use rquickjs::prelude::Rest;
use rquickjs::{Context, Ctx, Exception, Function, Object, Persistent, Runtime, Value};

use super::command::{BridgeParts, CommandBridge, CommandOutput};
use super::protocol::{CommandKind, ScriptArg, COMMANDS};
use crate::core::{BridgeError, BridgeResult};
use crate::scripting::ScriptHost;

const TARGET: &str = "viro_bridge::js";
const CONSOLE_TARGET: &str = "script.console";

/// A JS function kept alive outside of a `Ctx` scope
pub type JsCallback = Persistent<Function<'static>>;

pub struct JsHost {
    bridge: Rc<CommandBridge<JsCallback>>,
    context: Context,
    runtime: Runtime,
}

impl JsHost {
    pub fn new(parts: BridgeParts) -> BridgeResult<Self> {
        let runtime = Runtime::new().map_err(|e| BridgeError::Startup(e.to_string()))?;
        let context = Context::full(&runtime).map_err(|e| BridgeError::Startup(e.to_string()))?;
        let bridge = Rc::new(CommandBridge::new(parts));

        context
            .with(|ctx| install(&ctx, &bridge))
            .map_err(|e| BridgeError::Startup(e.to_string()))?;

        tracing::debug!(target: TARGET, "JavaScript host ready");
        Ok(Self {
            bridge,
            context,
            runtime,
        })
    }

    /// Evaluate a script for its side effects
    pub fn execute_script(&self, code: &str) -> BridgeResult<()> {
        let result = self
            .context
            .with(|ctx| ctx.eval::<(), _>(code).map_err(|e| describe(&ctx, e)));
        self.run_pending_jobs();
        result.map_err(BridgeError::Script)
    }

    /// Evaluate an expression and return its JSON value (`undefined` → `null`)
    pub fn eval_json(&self, code: &str) -> BridgeResult<serde_json::Value> {
        let result = self.context.with(|ctx| -> Result<Option<String>, String> {
            let value: Value = ctx.eval(code).map_err(|e| describe(&ctx, e))?;
            match ctx.json_stringify(value).map_err(|e| describe(&ctx, e))? {
                Some(json) => json.to_string().map(Some).map_err(|e| describe(&ctx, e)),
                None => Ok(None),
            }
        });
        self.run_pending_jobs();

        match result.map_err(BridgeError::Script)? {
            Some(json) => serde_json::from_str(&json).map_err(|e| BridgeError::Script(e.to_string())),
            None => Ok(serde_json::Value::Null),
        }
    }

    /// Run queued promise reactions until the job queue is empty
    pub fn run_pending_jobs(&self) {
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(_) => {
                    tracing::warn!(target: TARGET, "A pending promise job threw");
                }
            }
        }
    }
}

impl ScriptHost for JsHost {
    type Callable = JsCallback;

    fn bridge(&self) -> &CommandBridge<JsCallback> {
        &self.bridge
    }

    fn invoke(&mut self, callback_id: &str, callable: JsCallback, payload: serde_json::Value) -> BridgeResult<()> {
        let json = serde_json::to_string(&payload).map_err(|e| BridgeError::Script(e.to_string()))?;
        let result = self.context.with(|ctx| {
            let call = || -> rquickjs::Result<()> {
                let function = callable.restore(&ctx)?;
                let argument = ctx.json_parse(json)?;
                function.call::<_, Value>((argument,))?;
                Ok(())
            };
            call().map_err(|e| describe(&ctx, e))
        });
        self.run_pending_jobs();
        result.map_err(|message| BridgeError::Script(format!("callback {}: {}", callback_id, message)))
    }
}

impl Drop for JsHost {
    fn drop(&mut self) {
        // Persistent handles must be released while the runtime is still alive
        self.bridge.callbacks().clear();
    }
}

fn install<'js>(ctx: &Ctx<'js>, bridge: &Rc<CommandBridge<JsCallback>>) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    let native = Object::new(ctx.clone())?;
    for spec in COMMANDS {
        if spec.kind == CommandKind::RegisterCallable {
            globals.set(spec.name, command_function(ctx, bridge, spec.name)?)?;
        } else {
            native.set(spec.name, command_function(ctx, bridge, spec.name)?)?;
        }
    }
    globals.set("NativeViro", native)?;

    let events = Rc::clone(bridge);
    globals.set(
        "handleViroEvent",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<()> {
                handle_event(&ctx, &events, args.0)
            },
        )?,
    )?;

    install_console(ctx)
}

fn command_function<'js>(
    ctx: &Ctx<'js>,
    bridge: &Rc<CommandBridge<JsCallback>>,
    name: &'static str,
) -> rquickjs::Result<Function<'js>> {
    let bridge = Rc::clone(bridge);
    Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
            run_command(&ctx, &bridge, name, args.0)
        },
    )
}

fn run_command<'js>(
    ctx: &Ctx<'js>,
    bridge: &CommandBridge<JsCallback>,
    name: &'static str,
    args: Vec<Value<'js>>,
) -> rquickjs::Result<Value<'js>> {
    let args = args
        .into_iter()
        .map(|value| to_script_arg(ctx, value))
        .collect::<rquickjs::Result<Vec<_>>>()?;

    match bridge.call(name, args) {
        Ok(CommandOutput::None) => Ok(Value::new_undefined(ctx.clone())),
        Ok(CommandOutput::Readiness(readiness)) => {
            let ready = readiness.now_or_never().unwrap_or(false);
            // 用运行时内建的 Promise，不经过脚本可改写的全局
            let (promise, resolve, _reject) = ctx.promise()?;
            resolve.call::<_, ()>((ready,))?;
            Ok(promise.into_value())
        }
        Err(err) => {
            tracing::debug!(target: TARGET, "{} failed: {}", name, err);
            Err(throw(ctx, &err))
        }
    }
}

fn to_script_arg<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<ScriptArg<JsCallback>> {
    if let Some(function) = value.as_function() {
        return Ok(ScriptArg::Callable(Persistent::save(ctx, function.clone())));
    }
    if value.is_undefined() {
        return Ok(ScriptArg::Value(serde_json::Value::Null));
    }
    let json = match ctx.json_stringify(value)? {
        Some(json) => json.to_string()?,
        None => return Ok(ScriptArg::Value(serde_json::Value::Null)),
    };
    let value = serde_json::from_str(&json).map_err(|e| Exception::throw_type(ctx, &e.to_string()))?;
    Ok(ScriptArg::Value(value))
}

/// `handleViroEvent(callbackId, payload)`: ignores short calls and unknown ids
fn handle_event<'js>(
    ctx: &Ctx<'js>,
    bridge: &CommandBridge<JsCallback>,
    args: Vec<Value<'js>>,
) -> rquickjs::Result<()> {
    let mut args = args.into_iter();
    let (Some(id), Some(payload)) = (args.next(), args.next()) else {
        return Ok(());
    };
    let Some(id) = id.as_string() else {
        return Ok(());
    };
    let callback_id = id.to_string()?;

    let outcome = bridge.callbacks().dispatch(&callback_id, payload, |callable, payload| -> rquickjs::Result<()> {
        let function = callable.restore(ctx)?;
        function.call::<_, Value>((payload,))?;
        Ok(())
    });
    outcome.unwrap_or(Ok(()))
}

fn install_console<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;
    console.set(
        "log",
        Function::new(ctx.clone(), |args: Rest<String>| {
            tracing::info!(target: CONSOLE_TARGET, "{}", args.0.join(" "));
        })?,
    )?;
    console.set(
        "info",
        Function::new(ctx.clone(), |args: Rest<String>| {
            tracing::info!(target: CONSOLE_TARGET, "{}", args.0.join(" "));
        })?,
    )?;
    console.set(
        "warn",
        Function::new(ctx.clone(), |args: Rest<String>| {
            tracing::warn!(target: CONSOLE_TARGET, "{}", args.0.join(" "));
        })?,
    )?;
    console.set(
        "error",
        Function::new(ctx.clone(), |args: Rest<String>| {
            tracing::error!(target: CONSOLE_TARGET, "{}", args.0.join(" "));
        })?,
    )?;
    ctx.globals().set("console", console)
}

fn throw(ctx: &Ctx<'_>, err: &BridgeError) -> rquickjs::Error {
    let message = err.to_string();
    if err.is_argument_error() {
        Exception::throw_type(ctx, &message)
    } else {
        Exception::throw_message(ctx, &message)
    }
}

/// Turn a failed evaluation into a readable message, consuming the pending exception
fn describe(ctx: &Ctx<'_>, err: rquickjs::Error) -> String {
    if !matches!(err, rquickjs::Error::Exception) {
        return err.to_string();
    }
    let exception = ctx.catch();
    if let Some(message) = exception
        .as_object()
        .and_then(|object| object.get::<_, String>("message").ok())
    {
        return message;
    }
    if let Some(text) = exception.as_string().and_then(|text| text.to_string().ok()) {
        return text;
    }
    "uncaught exception".to_string()
}

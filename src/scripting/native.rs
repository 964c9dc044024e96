//! Rust闭包宿主
//!
//! 不嵌入任何脚本运行时，回调就是普通的 Rust 闭包。用于测试、基准和
//! 由 Rust 直接驱动场景的宿主程序。

use std::sync::Arc;

use serde_json::Value;

use crate::bindings::{BridgeParts, CommandBridge, CommandOutput, ScriptArg};
use crate::core::BridgeResult;

use super::ScriptHost;

/// Rust 侧事件回调
pub type NativeCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// 把闭包包装成 [`NativeCallback`]
pub fn callback<F>(f: F) -> NativeCallback
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Arc::new(f)
}

pub struct NativeHost {
    bridge: CommandBridge<NativeCallback>,
}

impl NativeHost {
    pub fn new(parts: BridgeParts) -> Self {
        Self {
            bridge: CommandBridge::new(parts),
        }
    }

    /// 按名称执行命令，参数约定与脚本侧一致
    pub fn call(&self, name: &str, args: Vec<ScriptArg<NativeCallback>>) -> BridgeResult<CommandOutput> {
        self.bridge.call(name, args)
    }
}

impl ScriptHost for NativeHost {
    type Callable = NativeCallback;

    fn bridge(&self) -> &CommandBridge<NativeCallback> {
        &self.bridge
    }

    fn invoke(&mut self, _callback_id: &str, callable: NativeCallback, payload: Value) -> BridgeResult<()> {
        callable(&payload);
        Ok(())
    }
}

//! 脚本执行上下文
//!
//! - [`context`]：单线程执行上下文与调度器
//! - [`callbacks`]：回调ID到脚本可调用对象的映射
//! - [`native`]：以 Rust 闭包作为回调的宿主
//!
//! JavaScript 宿主见 [`crate::bindings::js`]。

pub mod callbacks;
pub mod context;
pub mod native;

pub use callbacks::{CallbackEntry, CallbackRegistry};
pub use context::{Dispatcher, ExecutionContext, Task, TeardownPolicy, TeardownReport};
pub use native::{callback, NativeCallback, NativeHost};

use serde_json::Value;

use crate::bindings::CommandBridge;
use crate::core::BridgeResult;

/// 运行在执行上下文线程上的脚本宿主
pub trait ScriptHost: 'static {
    /// 该宿主的回调值类型
    type Callable: Clone;

    fn bridge(&self) -> &CommandBridge<Self::Callable>;

    /// 用事件负载调用回调
    fn invoke(&mut self, callback_id: &str, callable: Self::Callable, payload: Value) -> BridgeResult<()>;

    /// 按ID分发事件；ID未注册时丢弃负载并返回 `false`
    fn dispatch_event(&mut self, callback_id: &str, payload: Value) -> bool {
        let Some(callable) = self.bridge().callbacks().lookup(callback_id) else {
            tracing::trace!(
                target: "viro_bridge::events",
                "No callback registered for {}, dropping event",
                callback_id
            );
            return false;
        };
        if let Err(err) = self.invoke(callback_id, callable, payload) {
            tracing::warn!(
                target: "viro_bridge::events",
                "Callback {} failed: {}",
                callback_id,
                err
            );
        }
        true
    }
}

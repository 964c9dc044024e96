//! 桥接宿主生命周期
//!
//! `ViroBridge` 把配置、原生引擎、节点注册表和脚本宿主工厂组装在一起：
//! attach 时启动执行上下文并把 `EventBridge` 交给引擎；detach 时停止接受命令、
//! 断开引擎、按配置的策略拆除执行上下文并清空节点表。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::bindings::{BridgeParts, EventBridge, JsHost};
use crate::config::BridgeConfig;
use crate::core::{BridgeError, BridgeResult};
use crate::engine::NativeEngine;
use crate::scene::NodeRegistry;
use crate::scripting::{Dispatcher, ExecutionContext, NativeHost, ScriptHost, TeardownReport};

const TARGET: &str = "viro_bridge::bridge";

/// 宿主工厂：在脚本线程上构造宿主
pub type HostFactory<H> = dyn Fn(BridgeParts) -> BridgeResult<H> + Send + Sync;

/// 宿主容器的挂载/卸载钩子
pub trait HostLifecycle {
    fn on_attach(&mut self) -> BridgeResult<()>;
    fn on_detach(&mut self) -> TeardownReport;
}

struct Running<H: ScriptHost> {
    dispatcher: Dispatcher<H>,
    closed: Arc<AtomicBool>,
}

pub struct ViroBridge<H: ScriptHost> {
    config: BridgeConfig,
    engine: Arc<dyn NativeEngine>,
    nodes: Arc<NodeRegistry>,
    factory: Arc<HostFactory<H>>,
    running: Option<Running<H>>,
}

impl<H: ScriptHost> ViroBridge<H> {
    pub fn new<F>(config: BridgeConfig, engine: Arc<dyn NativeEngine>, factory: F) -> Self
    where
        F: Fn(BridgeParts) -> BridgeResult<H> + Send + Sync + 'static,
    {
        let nodes = Arc::new(NodeRegistry::new(Arc::clone(&engine)));
        Self {
            config,
            engine,
            nodes,
            factory: Arc::new(factory),
            running: None,
        }
    }

    /// 启动执行上下文并挂载引擎；已挂载时什么也不做
    pub fn attach(&mut self) -> BridgeResult<()> {
        if self.running.is_some() {
            return Ok(());
        }

        let parts = BridgeParts::new(Arc::clone(&self.nodes), self.config.engine.clone());
        let closed = Arc::clone(&parts.closed);
        let factory = Arc::clone(&self.factory);
        let dispatcher = Dispatcher::spawn(&self.config.dispatcher.thread_name, move || factory(parts))?;

        self.engine.attach(Arc::new(EventBridge::new(dispatcher.context())));
        self.running = Some(Running { dispatcher, closed });

        tracing::info!(
            target: TARGET,
            "Bridge attached (script thread '{}')",
            self.config.dispatcher.thread_name
        );
        Ok(())
    }

    /// 卸载：之后的命令返回 `Unavailable`，事件被丢弃
    pub fn detach(&mut self) -> TeardownReport {
        let Some(running) = self.running.take() else {
            return TeardownReport::default();
        };

        running.closed.store(true, Ordering::Release);
        self.engine.detach();
        let report = running.dispatcher.shutdown(self.config.dispatcher.teardown);
        let cleared = self.nodes.clear();

        tracing::info!(
            target: TARGET,
            "Bridge detached ({:?}): {} tasks executed, {} dropped, {} nodes cleared",
            self.config.dispatcher.teardown,
            report.executed,
            report.dropped,
            cleared
        );
        report
    }

    pub fn is_attached(&self) -> bool {
        self.running.is_some()
    }

    pub fn context(&self) -> Option<ExecutionContext<H>> {
        self.running.as_ref().map(|running| running.dispatcher.context())
    }

    pub fn event_bridge(&self) -> Option<EventBridge<H>> {
        self.context().map(EventBridge::new)
    }

    /// 在脚本线程上运行闭包并等待结果
    pub fn run<R, F>(&self, f: F) -> BridgeResult<R>
    where
        F: FnOnce(&mut H) -> R + Send + 'static,
        R: Send + 'static,
    {
        let context = self.context().ok_or(BridgeError::Unavailable)?;
        Ok(context.call(f)?)
    }

    pub fn nodes(&self) -> &Arc<NodeRegistry> {
        &self.nodes
    }

    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.engine
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

impl ViroBridge<NativeHost> {
    /// 以 Rust 闭包为回调的桥
    pub fn native(config: BridgeConfig, engine: Arc<dyn NativeEngine>) -> Self {
        Self::new(config, engine, |parts| Ok(NativeHost::new(parts)))
    }
}

impl ViroBridge<JsHost> {
    /// 以 QuickJS 为脚本运行时的桥
    pub fn javascript(config: BridgeConfig, engine: Arc<dyn NativeEngine>) -> Self {
        Self::new(config, engine, JsHost::new)
    }
}

impl<H: ScriptHost> HostLifecycle for ViroBridge<H> {
    fn on_attach(&mut self) -> BridgeResult<()> {
        self.attach()
    }

    fn on_detach(&mut self) -> TeardownReport {
        self.detach()
    }
}

impl<H: ScriptHost> Drop for ViroBridge<H> {
    fn drop(&mut self) {
        self.detach();
    }
}

//! 执行上下文调度器
//!
//! 脚本运行时只能在自己的线程上运行。`Dispatcher` 启动这个线程并在线程内
//! 构造宿主 `H`（宿主永远不离开该线程），其他线程通过 `ExecutionContext`
//! 投递任务。队列是无界 MPSC 通道，投递顺序即执行顺序。
//!
//! 拆除：`close` 之后新的投递立即被拒绝（`DispatchError::Unavailable`）；
//! `TeardownPolicy::Drain` 执行完所有已接受的任务，`TeardownPolicy::Drop`
//! 丢弃所有尚未开始的任务。正在执行的任务总会执行完。
//!
//! 投递的状态检查与入队在 `state` 读锁下完成，`close` 在写锁下切换状态并
//! 放入关闭标记，所以每个被接受的任务都排在标记之前，要么执行要么计入丢弃。

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::core::{BridgeError, BridgeResult, DispatchError, DispatchResult};

const TARGET: &str = "viro_bridge::dispatcher";

const RUNNING: u8 = 0;
const DRAINING: u8 = 1;
const DROPPING: u8 = 2;

/// 拆除时如何处理已排队的任务
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeardownPolicy {
    /// 执行所有已接受的任务后退出
    Drain,
    /// 丢弃所有尚未开始的任务
    Drop,
}

/// 拆除统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub executed: u64,
    pub dropped: u64,
    pub panicked: u64,
}

/// 在脚本线程上执行的任务
pub type Task<H> = Box<dyn FnOnce(&mut H) + Send + 'static>;

enum Message<H> {
    Task(Task<H>),
    Shutdown,
}

struct Shared {
    state: RwLock<u8>,
    thread_id: OnceLock<ThreadId>,
    executed: AtomicU64,
    dropped: AtomicU64,
    panicked: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: RwLock::new(RUNNING),
            thread_id: OnceLock::new(),
            executed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
        }
    }

    fn state(&self) -> u8 {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self) -> TeardownReport {
        TeardownReport {
            executed: self.executed.load(Ordering::Acquire),
            dropped: self.dropped.load(Ordering::Acquire),
            panicked: self.panicked.load(Ordering::Acquire),
        }
    }
}

/// 脚本执行上下文句柄
///
/// 可以自由克隆并跨线程传递；不拥有宿主。
pub struct ExecutionContext<H> {
    sender: Sender<Message<H>>,
    shared: Arc<Shared>,
}

impl<H> Clone for ExecutionContext<H> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<H: 'static> ExecutionContext<H> {
    /// 投递任务，不等待执行
    pub fn post<F>(&self, task: F) -> DispatchResult<()>
    where
        F: FnOnce(&mut H) + Send + 'static,
    {
        let state = self.shared.state.read().unwrap_or_else(PoisonError::into_inner);
        if *state != RUNNING {
            return Err(DispatchError::Unavailable);
        }
        // 无界通道，持锁发送不会阻塞
        self.sender
            .send(Message::Task(Box::new(task)))
            .map_err(|_| DispatchError::Unavailable)
    }

    /// 在上下文上运行闭包并等待结果
    ///
    /// 在上下文自身线程上调用会返回 `Reentrant`（否则会自锁）。
    pub fn call<R, F>(&self, f: F) -> DispatchResult<R>
    where
        F: FnOnce(&mut H) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Err(DispatchError::Reentrant);
        }
        let (reply_tx, reply_rx) = bounded(1);
        self.post(move |host| {
            let _ = reply_tx.send(f(host));
        })?;
        // 任务被丢弃或panic时发送端被释放，recv 随之失败
        reply_rx.recv().map_err(|_| DispatchError::Unavailable)
    }

    /// 当前线程是否就是脚本线程
    pub fn is_current(&self) -> bool {
        self.shared.thread_id.get() == Some(&thread::current().id())
    }

    pub fn is_available(&self) -> bool {
        self.shared.state() == RUNNING
    }

    /// 排队中尚未执行的消息数
    pub fn pending(&self) -> usize {
        self.sender.len()
    }
}

/// 拥有脚本线程的调度器
pub struct Dispatcher<H: 'static> {
    context: ExecutionContext<H>,
    handle: Option<JoinHandle<()>>,
}

impl<H: 'static> Dispatcher<H> {
    /// 启动脚本线程并在其中构造宿主
    ///
    /// 宿主构造失败时线程退出并返回错误。
    pub fn spawn<F>(thread_name: &str, factory: F) -> BridgeResult<Self>
    where
        F: FnOnce() -> BridgeResult<H> + Send + 'static,
    {
        let (sender, receiver) = unbounded::<Message<H>>();
        let shared = Arc::new(Shared::new());
        let (ready_tx, ready_rx) = bounded::<BridgeResult<()>>(1);

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || {
                let _ = thread_shared.thread_id.set(thread::current().id());
                let host = match factory() {
                    Ok(host) => {
                        let _ = ready_tx.send(Ok(()));
                        host
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                run_loop(host, receiver, &thread_shared);
            })
            .map_err(|e| BridgeError::Startup(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = handle.join();
                return Err(err);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(BridgeError::Startup(
                    "script thread exited during startup".to_string(),
                ));
            }
        }

        tracing::debug!(target: TARGET, "Script context '{}' started", thread_name);
        Ok(Self {
            context: ExecutionContext { sender, shared },
            handle: Some(handle),
        })
    }

    pub fn context(&self) -> ExecutionContext<H> {
        self.context.clone()
    }

    /// 停止接受新任务（不阻塞）
    ///
    /// 可以从 `Drain` 升级为 `Drop`，反之不行。
    pub fn close(&self, policy: TeardownPolicy) {
        let next = match policy {
            TeardownPolicy::Drain => DRAINING,
            TeardownPolicy::Drop => DROPPING,
        };
        let mut state = self.context.shared.state.write().unwrap_or_else(PoisonError::into_inner);
        let previous = *state;
        *state = previous.max(next);
        if previous == RUNNING {
            let _ = self.context.sender.send(Message::Shutdown);
            drop(state);
            tracing::debug!(
                target: TARGET,
                "Closing script context ({:?}, {} queued)",
                policy,
                self.context.pending()
            );
        }
    }

    /// 等待脚本线程退出
    pub fn join(mut self) -> TeardownReport {
        self.finish()
    }

    /// `close` + `join`
    pub fn shutdown(self, policy: TeardownPolicy) -> TeardownReport {
        self.close(policy);
        self.join()
    }

    fn finish(&mut self) -> TeardownReport {
        self.close(TeardownPolicy::Drain);
        if let Some(handle) = self.handle.take() {
            if self.context.is_current() {
                // 在脚本线程内拆除：不能 join 自己，线程会在当前任务返回后退出
                tracing::debug!(target: TARGET, "Teardown requested from the script thread; not joining");
            } else if handle.join().is_err() {
                tracing::error!(target: TARGET, "Script thread terminated abnormally");
            }
        }
        let report = self.context.shared.report();
        tracing::debug!(
            target: TARGET,
            "Script context stopped: {} executed, {} dropped, {} panicked",
            report.executed,
            report.dropped,
            report.panicked
        );
        report
    }
}

impl<H: 'static> Drop for Dispatcher<H> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.finish();
        }
    }
}

fn run_loop<H>(mut host: H, receiver: Receiver<Message<H>>, shared: &Shared) {
    for message in receiver.iter() {
        match message {
            Message::Task(task) => run_task(&mut host, task, shared),
            Message::Shutdown => break,
        }
    }

    // 宿主必须在自己的线程上释放
    drop(host);
}

fn run_task<H>(host: &mut H, task: Task<H>, shared: &Shared) {
    if shared.state() == DROPPING {
        shared.dropped.fetch_add(1, Ordering::AcqRel);
        return;
    }

    match catch_unwind(AssertUnwindSafe(|| task(host))) {
        Ok(()) => {
            shared.executed.fetch_add(1, Ordering::AcqRel);
        }
        Err(_) => {
            shared.panicked.fetch_add(1, Ordering::AcqRel);
            tracing::error!(target: TARGET, "A task panicked on the script context; continuing");
        }
    }
}

//! 统一错误处理模块
//!
//! 桥接层范围内的错误类型定义
//!
//! ## 错误类型分层
//!
//! - **参数错误** (`ArgumentError`): 命令边界上的参数个数/类型错误，在任何副作用之前拒绝
//! - **语义错误** (`BridgeError::DuplicateId` 等): 节点表的业务规则
//! - **调度错误** (`DispatchError`): 执行上下文不可用
//!
//! 幂等的拆除操作（删除不存在的节点、注销不存在的回调、移除不存在的父子边）
//! 不是错误，直接返回 `Ok(())`。

use thiserror::Error;

/// 桥接层核心错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Argument error: {0}")]
    Argument(#[from] ArgumentError),

    #[error("Node already exists: {0}")]
    DuplicateId(String),

    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Adding '{child}' under '{parent}' would create a cycle")]
    CycleDetected { parent: String, child: String },

    #[error("Bridge is detached and no longer accepts commands")]
    Unavailable,

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Startup error: {0}")]
    Startup(String),
}

impl BridgeError {
    /// 是否属于命令边界上的参数错误
    pub fn is_argument_error(&self) -> bool {
        matches!(self, BridgeError::Argument(_))
    }
}

/// 命令参数错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("{command} requires {expected} arguments, got {actual}")]
    Arity {
        command: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{command}: argument {index} must be {expected}")]
    Type {
        command: &'static str,
        index: usize,
        expected: &'static str,
    },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

/// 执行上下文调度错误
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Execution context is unavailable (torn down)")]
    Unavailable,

    #[error("Blocking call issued from the execution context's own thread")]
    Reentrant,
}

/// 桥接层结果类型别名
pub type BridgeResult<T> = Result<T, BridgeError>;
pub type DispatchResult<T> = Result<T, DispatchError>;

//! 日志系统初始化

use crate::config::LoggingConfig;

/// 初始化日志系统
///
/// 配置tracing日志框架，设置环境变量过滤器。
/// `RUST_LOG` 环境变量优先，否则使用配置中的日志级别。
/// 重复调用是安全的（已安装的订阅者保持不变）。
pub fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.level.as_filter()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_thread_names(true)
        .try_init();

    tracing::info!(target: "viro_bridge", "Logging initialized at {}", config.level.as_filter());
}

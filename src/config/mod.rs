/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量覆盖和验证。
/// 引擎参数（API key、调试开关、世界对齐方式）对桥接层是不透明的，
/// 原样传递给原生引擎。
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::scripting::TeardownPolicy;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 桥接层主配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// 传递给原生引擎的初始化参数
    #[serde(default)]
    pub engine: EngineOptions,

    /// 脚本执行上下文配置
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 根据扩展名加载配置文件（`.json` 走JSON，其余走TOML）
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("VIRO_API_KEY") {
            self.engine.api_key = Some(val);
        }
        if let Ok(val) = env::var("VIRO_DEBUG") {
            self.engine.debug = val.parse().unwrap_or(self.engine.debug);
        }
        if let Ok(val) = env::var("VIRO_AR_ENABLED") {
            self.engine.ar_enabled = val.parse().unwrap_or(self.engine.ar_enabled);
        }
        if let Ok(val) = env::var("VIRO_WORLD_ALIGNMENT") {
            if let Some(alignment) = WorldAlignment::parse(&val) {
                self.engine.world_alignment = alignment;
            }
        }
        if let Ok(val) = env::var("VIRO_TEARDOWN") {
            match val.to_ascii_lowercase().as_str() {
                "drain" => self.dispatcher.teardown = TeardownPolicy::Drain,
                "drop" => self.dispatcher.teardown = TeardownPolicy::Drop,
                _ => {}
            }
        }
        if let Ok(val) = env::var("VIRO_LOG_LEVEL") {
            if let Some(level) = LogLevel::parse(&val) {
                self.logging.level = level;
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.engine.validate()?;
        self.dispatcher.validate()?;
        Ok(())
    }

    /// 用户级配置文件路径
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("viro_bridge").join("config.toml"))
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./viro.toml
    /// 2. ./viro.json
    /// 3. <用户配置目录>/viro_bridge/config.toml
    /// 4. 使用默认配置
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::from_toml_file("viro.toml") {
            tracing::info!(target: "viro_bridge", "Loaded config from viro.toml");
            return config;
        }

        if let Ok(config) = Self::from_json_file("viro.json") {
            tracing::info!(target: "viro_bridge", "Loaded config from viro.json");
            return config;
        }

        if let Some(config_path) = Self::user_config_path() {
            if let Ok(config) = Self::from_toml_file(&config_path) {
                tracing::info!(target: "viro_bridge", "Loaded config from {:?}", config_path);
                return config;
            }
        }

        tracing::info!(target: "viro_bridge", "Using default configuration");
        Self::default()
    }
}

/// 原生引擎初始化参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// API key（`initialize(apiKey)` 会覆盖此值）
    pub api_key: Option<String>,
    /// 引擎调试模式
    pub debug: bool,
    /// 是否启用AR会话
    pub ar_enabled: bool,
    /// AR世界坐标对齐方式
    pub world_alignment: WorldAlignment,
    /// AR相机视频质量
    pub video_quality: VideoQuality,
    /// AR相机自动对焦
    pub autofocus: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            api_key: None,
            debug: false,
            ar_enabled: false,
            world_alignment: WorldAlignment::Gravity,
            video_quality: VideoQuality::High,
            autofocus: true,
        }
    }
}

impl EngineOptions {
    /// 返回替换了API key的副本
    pub fn with_api_key(&self, api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(key) = &self.api_key {
            if key.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "engine.api_key must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// AR世界坐标对齐方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldAlignment {
    /// 重力对齐（默认）
    Gravity,
    /// 重力 + 罗盘朝向
    GravityAndHeading,
    /// 相机对齐
    Camera,
}

impl WorldAlignment {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Gravity" => Some(Self::Gravity),
            "GravityAndHeading" => Some(Self::GravityAndHeading),
            "Camera" => Some(Self::Camera),
            _ => None,
        }
    }
}

/// AR相机视频质量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoQuality {
    High,
    Low,
}

/// 脚本执行上下文配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// 脚本线程名称
    pub thread_name: String,
    /// 拆除时如何处理已排队的任务
    pub teardown: TeardownPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            thread_name: "viro-script".to_string(),
            teardown: TeardownPolicy::Drain,
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.thread_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "dispatcher.thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别（`RUST_LOG` 优先）
    pub level: LogLevel,

    /// 是否输出ANSI颜色
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            ansi: true,
        }
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl LogLevel {
    /// EnvFilter指令
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dispatcher.teardown, TeardownPolicy::Drain);
        assert_eq!(config.engine.world_alignment, WorldAlignment::Gravity);
    }

    #[test]
    fn test_toml_serialization() {
        let config = BridgeConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: BridgeConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml() {
        let config = BridgeConfig::from_toml_str(
            r#"
            [engine]
            api_key = "abc"
            ar_enabled = true
            world_alignment = "GravityAndHeading"

            [dispatcher]
            teardown = "Drop"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.api_key.as_deref(), Some("abc"));
        assert!(config.engine.ar_enabled);
        assert_eq!(config.engine.world_alignment, WorldAlignment::GravityAndHeading);
        assert_eq!(config.dispatcher.teardown, TeardownPolicy::Drop);
        assert_eq!(config.dispatcher.thread_name, "viro-script");
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_json_parsing() {
        let config =
            BridgeConfig::from_json_str(r#"{"engine": {"debug": true}, "logging": {"level": "Warn"}}"#)
                .unwrap();
        assert!(config.engine.debug);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = BridgeConfig::default();
        config.dispatcher.thread_name = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = BridgeConfig::default();
        config.engine.api_key = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            BridgeConfig::from_toml_str("[engine\nbroken"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viro.toml");

        let mut config = BridgeConfig::default();
        config.engine.api_key = Some("key-123".to_string());
        config.save_toml(&path).unwrap();

        let loaded = BridgeConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_with_api_key() {
        let options = EngineOptions {
            ar_enabled: true,
            ..EngineOptions::default()
        };
        let merged = options.with_api_key("k");
        assert_eq!(merged.api_key.as_deref(), Some("k"));
        assert!(merged.ar_enabled);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!(LogLevel::Warn.as_filter(), "warn");
    }
}

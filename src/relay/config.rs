//! Relay configuration / 中继配置

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::config::base::{LogConfig, ServerConfig};

/// Relay command line arguments / 中继命令行参数
#[derive(Parser, Debug, Clone)]
#[command(
    name = "relayd",
    version = "0.1.0",
    about = "relayd - prompt completion relay gateway\nrelayd - 提示补全中继网关",
    long_about = "relayd accepts prompt-completion requests over HTTP, races every configured upstream AI provider, and answers with the first successful completion.\nrelayd通过HTTP接受提示补全请求，对所有已配置的上游AI提供商进行竞速，并以第一个成功的补全作为响应。"
)]
pub struct CliArgs {
    /// Configuration file path / 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path / 配置文件路径"
    )]
    pub config: Option<String>,

    /// HTTP gateway address / HTTP网关地址
    #[arg(
        long,
        value_name = "ADDR",
        help = "HTTP gateway address (e.g., 0.0.0.0:8787) / HTTP网关地址"
    )]
    pub http_addr: Option<String>,

    /// Shared secret for inbound calls / 入站调用的共享密钥
    #[arg(
        long,
        value_name = "SECRET",
        help = "Shared secret callers must present / 调用方必须出示的共享密钥"
    )]
    pub shared_secret: Option<String>,

    /// Per-provider call timeout / 每个提供商的调用超时
    #[arg(
        long,
        value_name = "MS",
        help = "Per-provider call timeout in milliseconds / 每个提供商的调用超时（毫秒）"
    )]
    pub request_timeout_ms: Option<u64>,

    /// Log level / 日志级别
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level (trace, debug, info, warn, error) / 日志级别"
    )]
    pub log_level: Option<String>,
}

/// Relay application configuration / 中继应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Relay service configuration / 中继服务配置
    pub relay: RelayConfig,
}

impl AppConfig {
    /// Load configuration with CLI arguments / 使用CLI参数加载配置
    pub fn load_with_cli(args: &CliArgs) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let mut config = AppConfig::default();

        // Apply environment variables (low priority) / 应用环境变量（较低优先级）
        // Prefix: RELAY_  例如：RELAY_HTTP_ADDR, RELAY_SHARED_SECRET
        if let Ok(v) = std::env::var("RELAY_HTTP_ADDR") {
            if let Ok(a) = v.parse::<std::net::SocketAddr>() {
                config.relay.http.server.addr = a;
            }
        }
        if let Ok(v) = std::env::var("RELAY_SHARED_SECRET") {
            if !v.is_empty() {
                config.relay.shared_secret = v;
            }
        }
        if let Ok(v) = std::env::var("RELAY_REQUEST_TIMEOUT_MS") {
            if let Ok(n) = v.parse::<u64>() {
                config.relay.request_timeout_ms = n;
            }
        }
        if let Ok(v) = std::env::var("RELAY_LOG_LEVEL") {
            if !v.is_empty() {
                config.relay.logging.level = v;
            }
        }
        if let Ok(v) = std::env::var("RELAY_LOG_FORMAT") {
            if !v.is_empty() {
                config.relay.logging.format = v;
            }
        }
        if let Ok(v) = std::env::var("RELAY_LOG_FILE") {
            if !v.is_empty() {
                config.relay.logging.file = Some(v);
            }
        }

        // Try loading from home directory first / 优先从用户主目录加载配置
        // Home path: ~/.relay/config.toml
        // 主目录路径：~/.relay/config.toml
        if args.config.is_none() {
            // Prefer RELAY_HOME if set to avoid interfering with global HOME in tests
            // 若设置了RELAY_HOME则优先使用，避免测试中修改全局HOME产生干扰
            let base_home = std::env::var_os("RELAY_HOME").or_else(|| std::env::var_os("HOME"));
            if let Some(home_dir) = base_home {
                let home_path = std::path::PathBuf::from(home_dir)
                    .join(".relay")
                    .join("config.toml");
                if home_path.exists() {
                    let cfg = std::fs::read_to_string(&home_path)?;
                    match toml::from_str::<AppConfig>(&cfg) {
                        Ok(c) => {
                            config = c;
                        }
                        Err(e) => {
                            tracing::warn!("Failed to parse home config: {}", e);
                            // fall back to defaults / 回退到默认值
                        }
                    }
                }
            }
        }

        // Load from CLI-provided path (highest file priority) / 从命令行提供的路径加载（文件最高优先级）
        if let Some(config_path) = &args.config {
            let config_content = std::fs::read_to_string(config_path)?;
            config = toml::from_str(&config_content)?;
        }

        // Override with CLI arguments / 使用CLI参数覆盖
        if let Some(http_addr) = &args.http_addr {
            config.relay.http.server.addr = http_addr.parse()?;
        }

        if let Some(shared_secret) = &args.shared_secret {
            config.relay.shared_secret = shared_secret.clone();
        }

        if let Some(t) = args.request_timeout_ms {
            config.relay.request_timeout_ms = t;
        }

        if let Some(log_level) = &args.log_level {
            config.relay.logging.level = log_level.clone();
        }

        Ok(config)
    }
}

/// Relay service configuration / 中继服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP gateway configuration / HTTP网关配置
    pub http: HttpConfig,
    /// Logging configuration / 日志配置
    pub logging: LogConfig,
    /// Shared secret inbound callers must present / 入站调用方必须出示的共享密钥
    pub shared_secret: String,
    /// Per-provider call timeout in milliseconds / 每个提供商的调用超时（毫秒）
    pub request_timeout_ms: u64,
    /// Upstream completion providers / 上游补全提供商
    pub providers: Vec<ProviderConfig>,
}

impl RelayConfig {
    /// Fail-closed startup validation / 启动时的失败关闭验证
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.shared_secret.trim().is_empty() {
            anyhow::bail!("shared_secret must be configured (RELAY_SHARED_SECRET)");
        }
        if self.providers.is_empty() {
            anyhow::bail!("at least one completion provider must be configured");
        }
        if self.request_timeout_ms == 0 {
            anyhow::bail!("request_timeout_ms must be greater than zero");
        }
        for p in &self.providers {
            if p.name.trim().is_empty() {
                anyhow::bail!("provider name must not be empty");
            }
            match p.kind.as_str() {
                "openai_chat" | "gemini_generate" => {
                    if p.base_url.trim().is_empty() {
                        anyhow::bail!("provider {} is missing base_url", p.name);
                    }
                    if p.model.trim().is_empty() {
                        anyhow::bail!("provider {} is missing model", p.name);
                    }
                }
                "stub" => {}
                other => anyhow::bail!("provider {} has unknown kind {:?}", p.name, other),
            }
        }
        Ok(())
    }
}

/// One upstream provider entry / 单个上游提供商条目
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: String,
    pub base_url: String,
    /// Name of the environment variable holding the API key
    /// 保存API密钥的环境变量名称
    pub api_key_env: Option<String>,
    pub model: String,
}

/// HTTP gateway configuration / HTTP网关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// HTTP server settings / HTTP服务器设置
    pub server: ServerConfig,
    /// Enable CORS / 启用CORS
    pub cors_enabled: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            logging: LogConfig::default(),
            shared_secret: String::new(),
            request_timeout_ms: 30_000,
            providers: vec![
                ProviderConfig {
                    name: "openai".to_string(),
                    kind: "openai_chat".to_string(),
                    base_url: "https://api.openai.com/v1".to_string(),
                    api_key_env: Some("OPENAI_API_KEY".to_string()),
                    model: "gpt-4o-mini".to_string(),
                },
                ProviderConfig {
                    name: "gemini".to_string(),
                    kind: "gemini_generate".to_string(),
                    base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                    api_key_env: Some("GEMINI_API_KEY".to_string()),
                    model: "gemini-1.5-flash".to_string(),
                },
            ],
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8787".parse().unwrap(),
            },
            cors_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_carry_both_providers() {
        let config = RelayConfig::default();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].kind, "openai_chat");
        assert_eq!(config.providers[1].kind, "gemini_generate");
        assert_eq!(config.request_timeout_ms, 30_000);
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let config = RelayConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("shared_secret"));
    }

    #[test]
    fn test_validate_rejects_unknown_provider_kind() {
        let mut config = RelayConfig {
            shared_secret: "s3cret".to_string(),
            ..Default::default()
        };
        config.providers[0].kind = "smoke_signal".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("smoke_signal"));
    }

    #[test]
    fn test_validate_rejects_empty_provider_list() {
        let config = RelayConfig {
            shared_secret: "s3cret".to_string(),
            providers: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_stub_without_url_or_model() {
        let config = RelayConfig {
            shared_secret: "s3cret".to_string(),
            providers: vec![ProviderConfig {
                name: "local".to_string(),
                kind: "stub".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_toml_file_parses_into_app_config() {
        let toml_str = r#"
            [relay]
            shared_secret = "file-secret"
            request_timeout_ms = 1500

            [relay.http.server]
            addr = "127.0.0.1:9000"

            [[relay.providers]]
            name = "openai"
            kind = "openai_chat"
            base_url = "http://127.0.0.1:1/v1"
            api_key_env = "OPENAI_API_KEY"
            model = "gpt-4o-mini"
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.relay.shared_secret, "file-secret");
        assert_eq!(config.relay.request_timeout_ms, 1500);
        assert_eq!(config.relay.http.server.addr.port(), 9000);
        assert_eq!(config.relay.providers.len(), 1);
    }

    #[test]
    fn test_load_with_cli_file_then_flag_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[relay]\nshared_secret = \"file-secret\"\nrequest_timeout_ms = 1500"
        )
        .unwrap();

        let args = CliArgs {
            config: Some(file.path().to_string_lossy().to_string()),
            http_addr: Some("127.0.0.1:9001".to_string()),
            shared_secret: None,
            request_timeout_ms: Some(2500),
            log_level: None,
        };

        let config = AppConfig::load_with_cli(&args).unwrap();
        assert_eq!(config.relay.shared_secret, "file-secret");
        assert_eq!(config.relay.request_timeout_ms, 2500);
        assert_eq!(config.relay.http.server.addr.port(), 9001);
    }
}

use std::time::Duration;

use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backends: BackendsConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub composite: CompositeConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Address reported as `serviceAddresses.compositeProduct`
    #[serde(default)]
    pub service_address: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4), service_address: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
}

impl BackendConfig {
    fn new(host: &str, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendsConfig {
    #[serde(default = "default_product_backend")]
    pub product: BackendConfig,
    #[serde(default = "default_recommendation_backend")]
    pub recommendation: BackendConfig,
    #[serde(default = "default_review_backend")]
    pub review: BackendConfig,
}

fn default_product_backend() -> BackendConfig { BackendConfig::new("localhost", 7001) }
fn default_recommendation_backend() -> BackendConfig { BackendConfig::new("localhost", 7002) }
fn default_review_backend() -> BackendConfig { BackendConfig::new("localhost", 7003) }

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            product: default_product_backend(),
            recommendation: default_recommendation_backend(),
            review: default_review_backend(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 { 5 }
fn default_request_timeout() -> u64 { 10 }

impl Default for ClientConfig {
    fn default() -> Self {
        Self { connect_timeout_secs: default_connect_timeout(), request_timeout_secs: default_request_timeout() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompositeConfig {
    /// `propagate` | `degrade`
    #[serde(default = "default_sub_resource_policy")]
    pub sub_resource_policy: String,
    #[serde(default = "default_composite_timeout")]
    pub request_timeout_secs: u64,
}

fn default_sub_resource_policy() -> String { "propagate".into() }
fn default_composite_timeout() -> u64 { 30 }

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            sub_resource_policy: default_sub_resource_policy(),
            request_timeout_secs: default_composite_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

fn default_max_attempts() -> u32 { 3 }
fn default_backoff_base() -> u64 { 100 }
fn default_backoff_max() -> u64 { 2000 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
        }
    }
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `config.toml` (or `CONFIG_PATH`); a missing file falls back to defaults.
    /// Environment overrides are applied afterwards, then the result is validated.
    pub fn load_and_validate() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        let mut cfg = if std::path::Path::new(&path).exists() {
            load_from_file(&path)?
        } else {
            AppConfig::default()
        };
        cfg.apply_env_overrides();
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        override_string("SERVER_HOST", &mut self.server.host);
        override_port("SERVER_PORT", &mut self.server.port);
        if let Some(w) = std::env::var("TOKIO_WORKER_THREADS").ok().and_then(|v| v.parse::<usize>().ok()) {
            self.server.worker_threads = Some(w);
        }
        override_string("PRODUCT_SERVICE_HOST", &mut self.backends.product.host);
        override_port("PRODUCT_SERVICE_PORT", &mut self.backends.product.port);
        override_string("RECOMMENDATION_SERVICE_HOST", &mut self.backends.recommendation.host);
        override_port("RECOMMENDATION_SERVICE_PORT", &mut self.backends.recommendation.port);
        override_string("REVIEW_SERVICE_HOST", &mut self.backends.review.host);
        override_port("REVIEW_SERVICE_PORT", &mut self.backends.review.port);
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        // 归一化 server
        self.server.normalize()?;
        // 校验三个后端地址
        for (name, backend) in [
            ("product", &self.backends.product),
            ("recommendation", &self.backends.recommendation),
            ("review", &self.backends.review),
        ] {
            if backend.host.trim().is_empty() {
                return Err(anyhow!("backends.{name}.host 不能为空"));
            }
            if backend.port == 0 {
                return Err(anyhow!("backends.{name}.port 必须在 1..=65535 范围内"));
            }
        }
        if self.client.connect_timeout_secs == 0 || self.client.request_timeout_secs == 0 {
            return Err(anyhow!("client 超时配置必须为正整数秒"));
        }
        if self.composite.request_timeout_secs == 0 {
            return Err(anyhow!("composite.request_timeout_secs 必须为正整数秒"));
        }
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts 必须 >= 1"));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.client.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.client.request_timeout_secs)
    }

    pub fn composite_timeout(&self) -> Duration {
        Duration::from_secs(self.composite.request_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.retry.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.retry.backoff_max_ms)
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port 必须在 1..=65535 范围内"));
        }
        if let Some(w) = self.worker_threads {
            if w == 0 { self.worker_threads = Some(4); }
        } else {
            self.worker_threads = Some(4);
        }
        Ok(())
    }
}

fn override_string(key: &str, target: &mut String) {
    if let Ok(v) = std::env::var(key) {
        if !v.trim().is_empty() {
            *target = v;
        }
    }
}

fn override_port(key: &str, target: &mut u16) {
    if let Some(p) = std::env::var(key).ok().and_then(|v| v.parse::<u16>().ok()) {
        *target = p;
    }
}

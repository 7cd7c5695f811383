use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use config as config_rs;
use model::{InferenceLibrary, LinearLibrary};
use network::{IngestLimits, DEFAULT_MAX_CHUNK_BYTES, DEFAULT_MAX_PAYLOAD_BYTES};

use crate::router::MemberPolicy;

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeConfiguration {
    #[serde(default)]
    pub front: FrontConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrontConfig {
    pub listen_addr: SocketAddr,
    pub max_chunk_bytes: usize,
    pub max_payload_bytes: u64,
    #[serde(default)]
    pub member_policy: MemberPolicy,
}

impl FrontConfig {
    pub fn ingest_limits(&self) -> IngestLimits {
        IngestLimits {
            max_chunk_bytes: self.max_chunk_bytes,
            max_payload_bytes: self.max_payload_bytes,
        }
    }
}

impl Default for FrontConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 50051)),
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            member_policy: MemberPolicy::First,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClusterConfig {
    pub partitions: usize,
    pub replicas: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            partitions: 2,
            replicas: 3,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    #[default]
    Linear,
}

impl LibraryKind {
    pub fn build(self) -> Arc<dyn InferenceLibrary> {
        match self {
            LibraryKind::Linear => Arc::new(LinearLibrary::new()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub library: LibraryKind,
}

impl NodeConfiguration {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let format = if extension(path) == "toml" {
            config_rs::FileFormat::Toml
        } else {
            config_rs::FileFormat::Json
        };

        let cfg = config_rs::Config::builder()
            .add_source(config_rs::File::from(path).format(format))
            .build()
            .with_context(|| format!("failed to load config file: {}", path.display()))?;

        cfg.try_deserialize::<NodeConfiguration>()
            .with_context(|| format!("failed to deserialize config: {}", path.display()))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config parent directory: {}", parent.display())
            })?;
        }

        let out = if extension(path) == "toml" {
            toml::to_string_pretty(self).context("failed to serialize config as toml")?
        } else {
            serde_json::to_string_pretty(self).context("failed to serialize config as json")?
        };

        std::fs::write(path, out)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn merge_with_env(self) -> Self {
        self.merge_with_vars(|key| std::env::var(key).ok())
    }

    /// Applies `CATEGORIZER_*` overrides looked up through `var`. Values that do
    /// not parse are ignored.
    pub fn merge_with_vars<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = var("CATEGORIZER_LISTEN_ADDR").and_then(|v| v.parse().ok()) {
            self.front.listen_addr = addr;
        }
        if let Some(n) = var("CATEGORIZER_MAX_CHUNK_BYTES").and_then(|v| v.parse().ok()) {
            self.front.max_chunk_bytes = n;
        }
        if let Some(n) = var("CATEGORIZER_MAX_PAYLOAD_BYTES").and_then(|v| v.parse().ok()) {
            self.front.max_payload_bytes = n;
        }
        if let Some(policy) = var("CATEGORIZER_MEMBER_POLICY").and_then(|v| v.parse().ok()) {
            self.front.member_policy = policy;
        }
        if let Some(n) = var("CATEGORIZER_PARTITIONS").and_then(|v| v.parse().ok()) {
            self.cluster.partitions = n;
        }
        if let Some(n) = var("CATEGORIZER_REPLICAS").and_then(|v| v.parse().ok()) {
            self.cluster.replicas = n;
        }
        self
    }

    pub fn merge_with_cli(mut self, cli_args: &crate::cli::Cli) -> Self {
        if let crate::cli::Commands::Serve(args) = &cli_args.command {
            if let Some(addr) = args.listen {
                self.front.listen_addr = addr;
            }
            if let Some(n) = args.partitions {
                self.cluster.partitions = n;
            }
            if let Some(n) = args.replicas {
                self.cluster.replicas = n;
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.cluster.partitions == 0 {
            return Err(anyhow!("cluster.partitions: must be > 0"));
        }
        if self.cluster.replicas == 0 {
            return Err(anyhow!("cluster.replicas: must be > 0"));
        }
        if self.front.listen_addr.port() == 0 {
            return Err(anyhow!("front.listen_addr: port must not be 0"));
        }
        if self.front.max_chunk_bytes == 0 {
            return Err(anyhow!("front.max_chunk_bytes: must be > 0"));
        }
        if self.front.max_chunk_bytes as u64 > self.front.max_payload_bytes {
            return Err(anyhow!(
                "front.max_chunk_bytes: must not exceed front.max_payload_bytes"
            ));
        }
        Ok(())
    }

    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("categorizer").join("config.toml")
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

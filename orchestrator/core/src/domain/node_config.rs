// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Hive Configuration Types
//
// Defines the configuration schema for a hive swarm engine instance:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Coordinator tick rate and per-domain concurrency limits
// - Pattern memory tiers, reinforcement rate, ranking weights and dream cycle
// - ANN index construction parameters
// - Event bus history retention

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::domain::routing::DomainName;

pub const API_VERSION: &str = "hive/v1";
pub const KIND: &str = "HiveConfig";

/// Top-level Kubernetes-style configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiveConfigManifest {
    /// API version (must be "hive/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "HiveConfig")
    pub kind: String,

    /// Instance metadata (name, labels)
    pub metadata: ManifestMetadata,

    /// Engine configuration specification
    #[serde(default)]
    pub spec: HiveConfigSpec,
}

pub type HiveConfig = HiveConfigManifest;

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable instance name
    pub name: String,

    /// Optional: Labels for categorization
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

/// Engine configuration specification (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HiveConfigSpec {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub event_bus: EventBusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Dispatch loop period
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Domains served by this coordinator and their concurrency caps.
    /// Tasks routed to a domain missing here fail with a routing error.
    #[serde(default = "default_domains")]
    pub domains: BTreeMap<DomainName, DomainPoolConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainPoolConfig {
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Embedding dimension shared by the ANN index and every stored pattern
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default)]
    pub tiers: TierThresholds,

    /// Fraction of the remaining distance to 0 or 1 covered per reinforcement
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default)]
    pub ranking: RankingWeights,

    #[serde(default)]
    pub consolidation: ConsolidationConfig,

    #[serde(default)]
    pub index: IndexConfig,
}

/// Ascending confidence thresholds. Anything below `silver` is bronze.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub silver: f64,
    pub gold: f64,
    pub platinum: f64,
}

/// Blend weights for pattern relevance ranking
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    pub confidence: f64,
    pub success_rate: f64,
    pub usage: f64,
    pub similarity: f64,
    /// Usage counts at or above this value score the full usage weight
    pub usage_cap: u64,
}

/// Dream cycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_consolidation_interval")]
    pub interval_seconds: u64,

    /// Minimum similarity for two patterns to count as duplicates
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Maximum low-confidence patterns examined per pass
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// HNSW construction and search parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_m")]
    pub m: usize,

    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,

    #[serde(default = "default_ef_search")]
    pub ef_search: usize,

    #[serde(default = "default_max_level")]
    pub max_level: usize,

    /// Fixed seed for reproducible level assignment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfig {
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            domains: default_domains(),
        }
    }
}

impl CoordinatorConfig {
    pub fn max_concurrent(&self, domain: DomainName) -> Option<usize> {
        self.domains.get(&domain).map(|d| d.max_concurrent)
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
            tiers: TierThresholds::default(),
            learning_rate: default_learning_rate(),
            ranking: RankingWeights::default(),
            consolidation: ConsolidationConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            silver: 0.7,
            gold: 0.85,
            platinum: 0.95,
        }
    }
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            confidence: 0.3,
            success_rate: 0.3,
            usage: 0.2,
            similarity: 0.2,
            usage_cap: 100,
        }
    }
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_consolidation_interval(),
            similarity_threshold: default_similarity_threshold(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            m: default_m(),
            ef_construction: default_ef_construction(),
            ef_search: default_ef_search(),
            max_level: default_max_level(),
            seed: None,
        }
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
        }
    }
}

impl Default for HiveConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "hive".to_string(),
                labels: HashMap::new(),
            },
            spec: HiveConfigSpec::default(),
        }
    }
}

impl HiveConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. HIVE_CONFIG_PATH environment variable
    /// 2. ./hive-config.yaml (working directory)
    /// 3. ~/.hive/config.yaml (user home)
    /// 4. /etc/hive/config.yaml (system, Unix) or C:\ProgramData\Hive\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("HIVE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./hive-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".hive").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/hive/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Hive\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load from an explicit path (failing if it is unreadable), else from the
    /// discovered path, else defaults. Environment overrides apply in all cases.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Some(val) = env_number::<u64>("HIVE_TICK_INTERVAL_MS") {
            tracing::info!("Environment override: HIVE_TICK_INTERVAL_MS={}", val);
            self.spec.coordinator.tick_interval_ms = val;
        }

        if let Some(val) = env_number::<usize>("HIVE_MEMORY_DIMENSIONS") {
            tracing::info!("Environment override: HIVE_MEMORY_DIMENSIONS={}", val);
            self.spec.memory.dimensions = val;
        }

        if let Some(val) = env_number::<usize>("HIVE_EVENT_HISTORY") {
            tracing::info!("Environment override: HIVE_EVENT_HISTORY={}", val);
            self.spec.event_bus.max_history = val;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let coordinator = &self.spec.coordinator;
        if coordinator.tick_interval_ms == 0 {
            anyhow::bail!("coordinator.tick_interval_ms must be greater than 0");
        }
        for (domain, pool) in &coordinator.domains {
            if pool.max_concurrent == 0 {
                anyhow::bail!("coordinator.domains.{}.max_concurrent must be greater than 0", domain);
            }
        }

        let memory = &self.spec.memory;
        if memory.dimensions == 0 {
            anyhow::bail!("memory.dimensions must be greater than 0");
        }

        let tiers = &memory.tiers;
        if !(0.0 < tiers.silver && tiers.silver < tiers.gold && tiers.gold < tiers.platinum && tiers.platinum <= 1.0) {
            anyhow::bail!(
                "memory.tiers must be strictly ascending within (0, 1]: silver={}, gold={}, platinum={}",
                tiers.silver,
                tiers.gold,
                tiers.platinum
            );
        }

        if !(memory.learning_rate > 0.0 && memory.learning_rate <= 1.0) {
            anyhow::bail!("memory.learning_rate must be within (0, 1]");
        }

        let ranking = &memory.ranking;
        if [ranking.confidence, ranking.success_rate, ranking.usage, ranking.similarity]
            .iter()
            .any(|w| *w < 0.0)
        {
            anyhow::bail!("memory.ranking weights cannot be negative");
        }
        if ranking.usage_cap == 0 {
            anyhow::bail!("memory.ranking.usage_cap must be greater than 0");
        }

        let consolidation = &memory.consolidation;
        if !(0.0..=1.0).contains(&consolidation.similarity_threshold) {
            anyhow::bail!("memory.consolidation.similarity_threshold must be within [0, 1]");
        }
        if consolidation.batch_size == 0 {
            anyhow::bail!("memory.consolidation.batch_size must be greater than 0");
        }

        let index = &memory.index;
        if index.m < 2 {
            anyhow::bail!("memory.index.m must be at least 2");
        }
        if index.ef_construction == 0 || index.ef_search == 0 {
            anyhow::bail!("memory.index.ef_construction and ef_search must be greater than 0");
        }

        if self.spec.event_bus.max_history == 0 {
            anyhow::bail!("event_bus.max_history must be greater than 0");
        }

        Ok(())
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(val) => Some(val),
        Err(_) => {
            tracing::warn!("Invalid value for {}: '{}'. Ignoring.", name, raw);
            None
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_domains() -> BTreeMap<DomainName, DomainPoolConfig> {
    BTreeMap::from([
        (DomainName::Development, DomainPoolConfig { max_concurrent: 4 }),
        (DomainName::Quality, DomainPoolConfig { max_concurrent: 3 }),
        (DomainName::Security, DomainPoolConfig { max_concurrent: 2 }),
        (DomainName::Learning, DomainPoolConfig { max_concurrent: 2 }),
        (DomainName::Coordination, DomainPoolConfig { max_concurrent: 1 }),
    ])
}

fn default_dimensions() -> usize {
    128
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_true() -> bool {
    true
}

fn default_consolidation_interval() -> u64 {
    3600
}

fn default_similarity_threshold() -> f64 {
    0.9
}

fn default_batch_size() -> usize {
    100
}

fn default_m() -> usize {
    16
}

fn default_ef_construction() -> usize {
    200
}

fn default_ef_search() -> usize {
    50
}

fn default_max_level() -> usize {
    16
}

fn default_max_history() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = HiveConfigManifest::default();
        assert_eq!(manifest.api_version, "hive/v1");
        assert_eq!(manifest.kind, "HiveConfig");
        assert_eq!(manifest.spec.coordinator.domains.len(), 5);
        assert_eq!(manifest.spec.coordinator.max_concurrent(DomainName::Quality), Some(3));
        assert_eq!(manifest.spec.memory.index.m, 16);
        assert_eq!(manifest.spec.event_bus.max_history, 1000);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let yaml = r#"
apiVersion: hive/v1
kind: HiveConfig
metadata:
  name: test-hive
spec:
  coordinator:
    tick_interval_ms: 25
    domains:
      quality:
        max_concurrent: 1
  memory:
    dimensions: 8
    index:
      seed: 7
"#;
        let config = HiveConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(config.metadata.name, "test-hive");
        assert_eq!(config.spec.coordinator.tick_interval_ms, 25);
        assert_eq!(config.spec.coordinator.domains.len(), 1);
        assert_eq!(config.spec.coordinator.max_concurrent(DomainName::Development), None);
        assert_eq!(config.spec.memory.dimensions, 8);
        assert_eq!(config.spec.memory.index.seed, Some(7));
        assert_eq!(config.spec.memory.index.ef_construction, 200);
        assert_eq!(config.spec.memory.tiers.gold, 0.85);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let manifest = HiveConfigManifest::default();
        let yaml = serde_yaml::to_string(&manifest).unwrap();
        let parsed = HiveConfigManifest::from_yaml_str(&yaml).unwrap();

        assert_eq!(parsed.api_version, manifest.api_version);
        assert_eq!(parsed.spec.coordinator.domains, manifest.spec.coordinator.domains);
        assert_eq!(parsed.spec.memory.tiers, manifest.spec.memory.tiers);
    }

    #[test]
    fn test_validation() {
        let mut manifest = HiveConfigManifest::default();
        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "WrongKind".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.memory.tiers.gold = 0.6;
        let err = manifest.validate().unwrap_err();
        assert!(err.to_string().contains("strictly ascending"));
        manifest.spec.memory.tiers = TierThresholds::default();

        manifest.spec.memory.index.m = 1;
        assert!(manifest.validate().is_err());
        manifest.spec.memory.index.m = 16;

        manifest
            .spec
            .coordinator
            .domains
            .insert(DomainName::Security, DomainPoolConfig { max_concurrent: 0 });
        assert!(manifest.validate().is_err());
    }
}

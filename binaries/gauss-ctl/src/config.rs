//! gauss-ctl configuration.
//!
//! Loaded from a TOML file, then overridden by command-line flags. Every
//! section is optional.

use anyhow::Context;
use gauss_orchestrator::settings::{
    CleanupSettings, GaussSettings, OrchestratorSettings, PollingSettings, StorageSettings, WorkloadSettings,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// gauss-ctl configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CtlConfig {
    /// Cluster access.
    pub kubernetes: KubernetesConfig,

    /// Database tooling inside the pods.
    pub gauss: GaussSettings,

    /// StatefulSet template.
    pub workload: WorkloadSettings,

    /// Host-side storage.
    pub storage: StorageSettings,

    /// Polling and retry bounds.
    pub polling: PollingSettings,

    /// Post-failure cleanup.
    pub cleanup: CleanupSettings,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Cluster access configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConfig {
    /// Namespace of the database workloads.
    pub namespace: String,

    /// Kubeconfig file. When it does not exist the client configuration is
    /// inferred from the environment.
    pub kubeconfig: PathBuf,

    /// Kubeconfig context, the current one when unset.
    pub context: Option<String>,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            namespace: OrchestratorSettings::DEFAULT_NAMESPACE.to_string(),
            kubeconfig: PathBuf::from("config"),
            context: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Log format (pretty, json, compact).
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl CtlConfig {
    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: Self = toml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(config)
    }

    /// Merges CLI arguments into the configuration.
    pub fn merge_cli_args(&mut self, args: &super::CliArgs) {
        if let Some(ref namespace) = args.namespace {
            self.kubernetes.namespace = namespace.clone();
        }
        if let Some(ref kubeconfig) = args.kubeconfig {
            self.kubernetes.kubeconfig = kubeconfig.clone();
        }
        if let Some(ref context) = args.context {
            self.kubernetes.context = Some(context.clone());
        }
        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("Invalid log level: {}", self.logging.level);
        }

        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            anyhow::bail!("Invalid log format: {}", self.logging.format);
        }

        self.orchestrator_settings()
            .validate()
            .context("Invalid orchestrator settings")
    }

    /// Returns the settings handed to the orchestrator.
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            namespace: self.kubernetes.namespace.clone(),
            gauss: self.gauss.clone(),
            workload: self.workload.clone(),
            storage: self.storage.clone(),
            polling: self.polling.clone(),
            cleanup: self.cleanup.clone(),
        }
    }
}

//! Orchestrator settings.
//!
//! Every section deserializes with defaults matching a stock openGauss
//! deployment under `/opt/data1/greenopengauss`, so an empty configuration
//! file is valid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{OrchestratorError, Result};

/// Settings consumed by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Namespace of the workload and its pods.
    pub namespace: String,

    /// Database tooling inside the pods.
    pub gauss: GaussSettings,

    /// Workload manifest parameters.
    pub workload: WorkloadSettings,

    /// Host-side storage.
    pub storage: StorageSettings,

    /// Polling and retry bounds.
    pub polling: PollingSettings,

    /// Post-failure cleanup.
    pub cleanup: CleanupSettings,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            namespace: Self::DEFAULT_NAMESPACE.to_string(),
            gauss: GaussSettings::default(),
            workload: WorkloadSettings::default(),
            storage: StorageSettings::default(),
            polling: PollingSettings::default(),
            cleanup: CleanupSettings::default(),
        }
    }
}

impl OrchestratorSettings {
    /// Default namespace.
    pub const DEFAULT_NAMESPACE: &'static str = "manager";

    /// Creates settings with every default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the settings.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(OrchestratorError::configuration("namespace can't be blank"));
        }
        if self.polling.ready_attempts == 0 {
            return Err(OrchestratorError::configuration(
                "polling.ready_attempts must be greater than 0",
            ));
        }
        if self.polling.api_attempts == 0 {
            return Err(OrchestratorError::configuration(
                "polling.api_attempts must be greater than 0",
            ));
        }
        if self.gauss.initial_password.is_empty() {
            return Err(OrchestratorError::configuration(
                "gauss.initial_password can't be empty",
            ));
        }
        if self.workload.image.trim().is_empty() {
            return Err(OrchestratorError::configuration("workload.image can't be blank"));
        }
        Ok(())
    }
}

/// openGauss installation inside the pods.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussSettings {
    /// Installation root, exported to the container as `GAUSS_ROOT`.
    pub root: PathBuf,

    /// Parent of every member data directory.
    pub data_dir: PathBuf,

    /// Path of `gs_ctl`.
    pub gs_ctl: PathBuf,

    /// Path of `gs_initdb`.
    pub gs_initdb: PathBuf,

    /// Path of `gsql`.
    pub gsql: PathBuf,

    /// Shell fragment run before every remote command.
    pub shell_prelude: String,

    /// Node name passed to `gs_initdb`.
    pub node_name: String,

    /// Locale passed to `gs_initdb`.
    pub locale: String,

    /// Initial password of the database owner and of tenant users.
    pub initial_password: String,

    /// Database every tenant connects through.
    pub access_database: String,
}

impl Default for GaussSettings {
    fn default() -> Self {
        let root = PathBuf::from("/opt/data1/greenopengauss");
        let bin = root.join("app").join("bin");
        Self {
            data_dir: root.join("data"),
            gs_ctl: bin.join("gs_ctl"),
            gs_initdb: bin.join("gs_initdb"),
            gsql: bin.join("gsql"),
            root,
            shell_prelude: "source /home/dbuser/.bashrc".to_string(),
            node_name: "sg_node".to_string(),
            locale: "en_US.UTF-8".to_string(),
            initial_password: "Changeme_123".to_string(),
            access_database: "ossdb".to_string(),
        }
    }
}

/// Parameters of the StatefulSet manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadSettings {
    /// Container image.
    pub image: String,

    /// Image pull policy.
    pub image_pull_policy: String,

    /// Value of the `app` label on the selector and pod template.
    pub app_label: String,

    /// Governing service name.
    pub service_name: String,

    /// Node selector of the pod template.
    pub node_selector: BTreeMap<String, String>,

    /// Whether pods use the host network.
    pub host_network: bool,

    /// Pod termination grace period in seconds.
    pub termination_grace_period_secs: i64,

    /// Container command.
    pub command: Vec<String>,

    /// Container arguments.
    pub args: Vec<String>,

    /// Name of the volume claim template.
    pub volume_claim_name: String,

    /// Storage class of the volume claim.
    pub storage_class: String,

    /// Requested storage size.
    pub storage_size: String,

    /// Access mode of the volume claim.
    pub access_mode: String,
}

impl Default for WorkloadSettings {
    fn default() -> Self {
        Self {
            image: "qqq:latest".to_string(),
            image_pull_policy: "Never".to_string(),
            app_label: "gauss".to_string(),
            service_name: "gauss-svc".to_string(),
            node_selector: BTreeMap::from([("cloudsop/agent-type".to_string(), "Base".to_string())]),
            host_network: true,
            termination_grace_period_secs: 10,
            command: vec!["/bin/bash".to_string(), "-c".to_string()],
            args: vec!["source ~/.bashrc && bash ./data/init.sh".to_string()],
            volume_claim_name: "gauss-claim".to_string(),
            storage_class: "local-storage".to_string(),
            storage_size: "10Gi".to_string(),
            access_mode: "ReadWriteMany".to_string(),
        }
    }
}

/// Host-side storage of member data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding one `<instance>-<ordinal>` directory per member.
    pub host_data_root: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            host_data_root: PathBuf::from("/home/dbuser/gaussdata"),
        }
    }
}

/// Polling and retry bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Readiness polls before giving up.
    pub ready_attempts: u32,

    /// Linear backoff step between readiness polls, in milliseconds.
    pub ready_step_ms: u64,

    /// Exec channel poll interval, in milliseconds.
    pub exec_poll_interval_ms: u64,

    /// Attempts per control-plane call.
    pub api_attempts: u32,

    /// Delay between control-plane attempts, in milliseconds.
    pub api_retry_delay_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            ready_attempts: 10,
            ready_step_ms: 1000,
            exec_poll_interval_ms: 1000,
            api_attempts: 5,
            api_retry_delay_ms: 0,
        }
    }
}

impl PollingSettings {
    /// Returns the readiness backoff step as a Duration.
    pub fn ready_step(&self) -> Duration {
        Duration::from_millis(self.ready_step_ms)
    }

    /// Returns the exec poll interval as a Duration.
    pub fn exec_poll_interval(&self) -> Duration {
        Duration::from_millis(self.exec_poll_interval_ms)
    }

    /// Returns the control-plane retry delay as a Duration.
    pub fn api_retry_delay(&self) -> Duration {
        Duration::from_millis(self.api_retry_delay_ms)
    }
}

/// Post-failure cleanup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupSettings {
    /// Delete the workload and member data after a failed create.
    pub rollback_on_failed_create: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = OrchestratorSettings::new();

        assert_eq!(settings.namespace, "manager");
        assert_eq!(
            settings.gauss.gs_ctl,
            PathBuf::from("/opt/data1/greenopengauss/app/bin/gs_ctl")
        );
        assert_eq!(
            settings.gauss.data_dir,
            PathBuf::from("/opt/data1/greenopengauss/data")
        );
        assert_eq!(settings.polling.ready_attempts, 10);
        assert_eq!(settings.polling.api_attempts, 5);
        assert!(!settings.cleanup.rollback_on_failed_create);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut settings = OrchestratorSettings::new();
        settings.polling.ready_attempts = 0;
        assert!(settings.validate().is_err());

        let mut settings = OrchestratorSettings::new();
        settings.namespace = " ".into();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_partial_deserialize() {
        let settings: OrchestratorSettings = serde_json::from_str(
            r#"{"namespace": "db", "polling": {"ready_attempts": 3}}"#,
        )
        .unwrap();

        assert_eq!(settings.namespace, "db");
        assert_eq!(settings.polling.ready_attempts, 3);
        assert_eq!(settings.polling.ready_step_ms, 1000);
        assert_eq!(settings.workload.image, "qqq:latest");
    }
}

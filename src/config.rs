//! Immutable training configuration.
//!
//! Built once at startup, from command line flags or a JSON file, and passed
//! by reference to everything that needs it.

use crate::cluster::{ClusterError, ClusterSpec, JobName, TaskSpec};
use crate::OptimizerKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{field} must be positive")]
    NotPositive { field: &'static str },

    #[error("keep_prob must be in (0, 1], got {0}")]
    InvalidKeepProb(f32),

    #[error("learning_rate must be positive and finite, got {0}")]
    InvalidLearningRate(f32),

    #[error("hidden layer {index} has zero units")]
    EmptyHiddenLayer { index: usize },

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    pub cluster: ClusterSpec,
    pub task: TaskSpec,
    pub optimizer: OptimizerKind,
    pub learning_rate: f32,
    /// Records per training step
    pub batch_size: usize,
    pub epochs: usize,
    /// Cap on steps run by this worker, `None` for no cap
    pub max_iteration: Option<u64>,
    /// Width of the sparse feature space; libsvm index `n` maps to column `n - 1`
    pub num_features: usize,
    pub hidden_units: Vec<usize>,
    pub keep_prob: f32,
    /// Log a step summary every this many local iterations, 0 disables it
    pub log_every: u64,
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            cluster: ClusterSpec::local(),
            task: TaskSpec {
                job_name: JobName::Worker,
                task_index: 0,
                is_chief: false,
            },
            optimizer: OptimizerKind::Sgd,
            learning_rate: 0.01,
            batch_size: 100,
            epochs: 1,
            max_iteration: None,
            num_features: 784,
            hidden_units: vec![1024],
            keep_prob: 0.5,
            log_every: 100,
            seed: None,
        }
    }
}

impl TrainingConfig {
    /// Loads a config from JSON; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("batch_size", self.batch_size),
            ("epochs", self.epochs),
            ("num_features", self.num_features),
        ] {
            if value == 0 {
                return Err(ConfigError::NotPositive { field });
            }
        }

        if !(self.keep_prob > 0.0 && self.keep_prob <= 1.0) {
            return Err(ConfigError::InvalidKeepProb(self.keep_prob));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ConfigError::InvalidLearningRate(self.learning_rate));
        }
        if let Some(index) = self.hidden_units.iter().position(|&units| units == 0) {
            return Err(ConfigError::EmptyHiddenLayer { index });
        }

        self.cluster.validate(&self.task)?;
        Ok(())
    }

    pub fn is_worker(&self) -> bool {
        self.task.job_name == JobName::Worker
    }

    /// Effective iteration cap for this worker
    pub fn max_iteration(&self) -> u64 {
        self.max_iteration.unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = TrainingConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.is_worker());
        assert_eq!(config.max_iteration(), u64::MAX);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = TrainingConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive {
                field: "batch_size"
            })
        ));

        let config = TrainingConfig {
            keep_prob: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidKeepProb(_))
        ));

        let config = TrainingConfig {
            learning_rate: f32::NAN,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLearningRate(_))
        ));

        let config = TrainingConfig {
            hidden_units: vec![16, 0],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyHiddenLayer { index: 1 })
        ));

        let config = TrainingConfig {
            cluster: ClusterSpec::from_lists("", "localhost:2223"),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Cluster(ClusterError::EmptyJob(JobName::Ps)))
        ));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "cluster": {{"ps": ["ps0:2222"], "workers": ["w0:2222", "w1:2222"]}},
                "task": {{"job_name": "worker", "task_index": 1}},
                "optimizer": "adam",
                "batch_size": 12,
                "max_iteration": 50
            }}"#
        )
        .unwrap();

        let config = TrainingConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.optimizer, OptimizerKind::Adam);
        assert_eq!(config.batch_size, 12);
        assert_eq!(config.max_iteration(), 50);
        assert_eq!(config.task.task_index, 1);
        assert!(!config.task.is_chief);
        assert_eq!(config.learning_rate, 0.01);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_task_is_not_chief() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();

        let config = TrainingConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config, TrainingConfig::default());
        assert!(!config.task.is_chief);
    }

    #[test]
    fn test_from_json_file_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            TrainingConfig::from_json_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            TrainingConfig::from_json_file(&missing),
            Err(ConfigError::Read { .. })
        ));
    }
}

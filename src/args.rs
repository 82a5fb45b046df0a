use crate::{ClusterSpec, ConfigError, JobName, OptimizerKind, TaskSpec, TrainingConfig};
use clap::{error::ErrorKind, Parser};
use std::path::PathBuf;

/// Command line arguments for a training task.
///
/// Either pass `--config` with a JSON `TrainingConfig`, or describe the run
/// with the individual flags. When `--config` is given the individual flags
/// are ignored.
#[derive(Parser, Debug)]
#[command(name = "pstrain", version, about = "Train a sparse classifier on libsvm data")]
pub struct Args {
    /// Path to the libsvm training data
    #[arg(long, value_parser = validate_file)]
    pub train_data: PathBuf,

    /// Path to libsvm test data, evaluated after training
    #[arg(long, value_parser = validate_file)]
    pub test_data: Option<PathBuf>,

    /// JSON training config
    #[arg(long, value_parser = validate_file)]
    pub config: Option<PathBuf>,

    /// Comma-separated parameter server addresses
    #[arg(long, default_value = "localhost:2222")]
    pub ps_hosts: String,

    /// Comma-separated worker addresses
    #[arg(long, default_value = "localhost:2223")]
    pub worker_hosts: String,

    #[arg(long, value_enum, default_value_t = JobName::Worker)]
    pub job_name: JobName,

    #[arg(long, default_value_t = 0)]
    pub task_index: usize,

    #[arg(long)]
    pub is_chief: bool,

    #[arg(long, value_enum, default_value_t = OptimizerKind::Sgd)]
    pub optimizer: OptimizerKind,

    #[arg(long, default_value_t = 0.01)]
    pub learning_rate: f32,

    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1)]
    pub epochs: usize,

    /// Stop after this many local steps
    #[arg(long)]
    pub max_iteration: Option<u64>,

    /// Width of the feature space, the largest libsvm index
    #[arg(long, default_value_t = 784)]
    pub num_features: usize,

    /// Comma-separated hidden layer widths
    #[arg(long, value_delimiter = ',', default_values_t = [1024])]
    pub hidden_units: Vec<usize>,

    /// Dropout keep probability during training
    #[arg(long, default_value_t = 0.5)]
    pub keep_prob: f32,

    /// Log every N steps, 0 to disable step logging
    #[arg(long, default_value_t = 100)]
    pub log_every: u64,

    /// Seed for weight initialization, dropout and shuffling
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug)]
pub struct RunArgs {
    pub train_data: PathBuf,
    pub test_data: Option<PathBuf>,
    pub config: TrainingConfig,
}

/// Validates that a path points to an existing file
fn validate_file(path: &str) -> Result<PathBuf, clap::Error> {
    let path = PathBuf::from(path);
    if !path.exists() {
        return Err(clap::Error::raw(
            ErrorKind::InvalidValue,
            format!("File not found: {}", path.display()),
        ));
    }
    if !path.is_file() {
        return Err(clap::Error::raw(
            ErrorKind::InvalidValue,
            format!("Not a file: {}", path.display()),
        ));
    }
    Ok(path)
}

impl Args {
    /// Resolves the training config and validates it
    pub fn into_run_args(self) -> Result<RunArgs, ConfigError> {
        let config = match &self.config {
            Some(path) => TrainingConfig::from_json_file(path)?,
            None => TrainingConfig {
                cluster: ClusterSpec::from_lists(&self.ps_hosts, &self.worker_hosts),
                task: TaskSpec {
                    job_name: self.job_name,
                    task_index: self.task_index,
                    is_chief: self.is_chief,
                },
                optimizer: self.optimizer,
                learning_rate: self.learning_rate,
                batch_size: self.batch_size,
                epochs: self.epochs,
                max_iteration: self.max_iteration,
                num_features: self.num_features,
                hidden_units: self.hidden_units,
                keep_prob: self.keep_prob,
                log_every: self.log_every,
                seed: self.seed,
            },
        };
        config.validate()?;

        Ok(RunArgs {
            train_data: self.train_data,
            test_data: self.test_data,
            config,
        })
    }
}

/// Parses and validates command line arguments
pub fn parse_arguments() -> Result<RunArgs, ConfigError> {
    Args::parse().into_run_args()
}

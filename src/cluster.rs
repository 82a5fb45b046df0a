//! Parameter-server / worker cluster description.
//!
//! The cluster is described by two address lists, one per job, and the task
//! this process plays within it. Nothing here opens a connection; the values
//! are handed to whatever runtime hosts the session.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ClusterError {
    #[error("no {0} addresses configured")]
    EmptyJob(JobName),

    #[error("address `{0}` is not of the form host:port")]
    InvalidAddress(String),

    #[error("task index {index} out of range for job {job} with {count} tasks")]
    TaskIndexOutOfRange {
        job: JobName,
        index: usize,
        count: usize,
    },

    #[error("only a worker task can be chief")]
    ChiefMustBeWorker,
}

/// Role of a task in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobName {
    Ps,
    Worker,
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobName::Ps => f.write_str("ps"),
            JobName::Worker => f.write_str("worker"),
        }
    }
}

/// The task this process runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub job_name: JobName,
    pub task_index: usize,
    /// The chief worker owns initialization and checkpointing
    #[serde(default)]
    pub is_chief: bool,
}

/// Addresses of every parameter server and worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub ps: Vec<String>,
    pub workers: Vec<String>,
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_address(addr: &str) -> Result<(), ClusterError> {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
        _ => Err(ClusterError::InvalidAddress(addr.to_string())),
    }
}

impl ClusterSpec {
    /// Builds a cluster from comma-separated `host:port` lists
    pub fn from_lists(ps_list: &str, worker_list: &str) -> Self {
        ClusterSpec {
            ps: split_list(ps_list),
            workers: split_list(worker_list),
        }
    }

    /// A single local worker and parameter server
    pub fn local() -> Self {
        Self::from_lists("localhost:2222", "localhost:2223")
    }

    pub fn num_ps(&self) -> usize {
        self.ps.len()
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn job_tasks(&self, job: JobName) -> &[String] {
        match job {
            JobName::Ps => &self.ps,
            JobName::Worker => &self.workers,
        }
    }

    /// Checks both jobs are populated with well-formed addresses and that
    /// `task` names an existing task
    pub fn validate(&self, task: &TaskSpec) -> Result<(), ClusterError> {
        for job in [JobName::Ps, JobName::Worker] {
            let tasks = self.job_tasks(job);
            if tasks.is_empty() {
                return Err(ClusterError::EmptyJob(job));
            }
            for addr in tasks {
                validate_address(addr)?;
            }
        }

        let count = self.job_tasks(task.job_name).len();
        if task.task_index >= count {
            return Err(ClusterError::TaskIndexOutOfRange {
                job: task.job_name,
                index: task.task_index,
                count,
            });
        }

        if task.is_chief && task.job_name != JobName::Worker {
            return Err(ClusterError::ChiefMustBeWorker);
        }

        Ok(())
    }

    /// gRPC target of `task`, `None` if the task does not exist
    pub fn target(&self, task: &TaskSpec) -> Option<String> {
        self.job_tasks(task.job_name)
            .get(task.task_index)
            .map(|addr| format!("grpc://{}", addr))
    }
}

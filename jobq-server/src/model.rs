//! The data model shared by every component: the public `JobSpec` request shape, the
//! `WorkloadIdentifier` handle clients carry, and the `JobStatus`/`WorkloadMetadata` response
//! shapes the Coordinator produces.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use image_ref::ImageRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Docker,
    Kueue,
    Rayjob,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Docker => "docker",
            Mode::Kueue => "kueue",
            Mode::Rayjob => "rayjob",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub gpu: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scheduling {
    #[serde(default)]
    pub queue_name: Option<String>,
    #[serde(default)]
    pub priority_class: Option<String>,
}

/// A user-submitted job description. Every field survives validation in `planner::validate`
/// before any Kubernetes object is shaped from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub entrypoint_file: String,
    pub image_ref: String,
    pub mode: Mode,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default)]
    pub scheduling: Scheduling,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub submission_context: serde_json::Value,
}

impl JobSpec {
    pub fn parsed_image_ref(&self) -> Result<ImageRef, image_ref::InvalidImageRef> {
        ImageRef::new(self.image_ref.clone())
    }
}

/// Opaque handle returned by `Submit` and accepted by every subsequent operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadIdentifier {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub namespace: String,
    pub uid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Executing,
    Succeeded,
    Failed,
    Inadmissible,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// The Workload's own `spec` fields, carried through verbatim rather than re-derived.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadSpecSummary {
    pub queue_name: Option<String>,
    pub priority_class_name: Option<String>,
    pub active: Option<bool>,
    pub priority: Option<i32>,
}

/// `JobStatus` plus the full Workload spec/status and derived timestamps/flags. Produced by a
/// pure constructor that fails if `owner_uid` is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadMetadata {
    pub execution_status: JobStatus,
    pub identifier: WorkloadIdentifier,
    pub spec: WorkloadSpecSummary,
    pub cluster_queue: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub submission_timestamp: time::OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_admission_timestamp: Option<time::OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub termination_timestamp: Option<time::OffsetDateTime>,
    pub was_evicted: bool,
    pub was_inadmissible: bool,
    pub has_failed_pods: bool,
    pub conditions: Vec<crate::k8s::types::WorkloadCondition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListWorkloadEntry {
    pub name: String,
    pub identifier: WorkloadIdentifier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<WorkloadMetadata>,
}

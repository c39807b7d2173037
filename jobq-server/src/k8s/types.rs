//! Deserialisation shapes for the Kubernetes/Kueue objects the engine reads and writes:
//! the Kueue `Workload` custom resource, the KubeRay `RayJob` custom resource, and the
//! condition record both of them carry in their status.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single entry of `status.conditions`, shared verbatim by `Workload` and `RayJob`.
///
/// `status` arrives on the wire as the strings `"True"`/`"False"`/`"Unknown"`; it is kept as a
/// tri-state here rather than collapsed to `bool` because the Status Deriver's rules distinguish
/// an explicit `false` from an absent condition, and `Unknown` must not be mistaken for either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadCondition {
    pub r#type: String,
    #[serde(with = "condition_status")]
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_transition_time: Option<time::OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub fn is_true(&self) -> bool {
        matches!(self, ConditionStatus::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self, ConditionStatus::False)
    }
}

mod condition_status {
    use super::ConditionStatus;

    pub fn serialize<S>(status: &ConditionStatus, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(match status {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        })
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<ConditionStatus, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw: String = serde::Deserialize::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "True" => ConditionStatus::True,
            "False" => ConditionStatus::False,
            _ => ConditionStatus::Unknown,
        })
    }
}

/// Kueue's `Workload` custom resource, as defined by
/// https://github.com/kubernetes-sigs/kueue/blob/main/apis/kueue/v1beta1/workload_types.go.
/// Only the fields the engine actually reads are modelled.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "kueue.x-k8s.io",
    version = "v1beta1",
    kind = "Workload",
    plural = "workloads",
    status = "WorkloadStatus",
    namespaced
)]
pub struct WorkloadSpec {
    #[serde(default)]
    pub queue_name: Option<String>,
    #[serde(default)]
    pub priority_class_name: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub priority: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
pub struct WorkloadAdmission {
    #[serde(default)]
    pub cluster_queue: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
pub struct WorkloadStatus {
    #[serde(default)]
    pub conditions: Vec<WorkloadCondition>,
    #[serde(default)]
    pub admission: Option<WorkloadAdmission>,
}

/// KubeRay's `RayJob` custom resource, as defined by
/// https://github.com/ray-project/kuberay/blob/master/docs/reference/api.md#rayjob. The engine
/// only needs enough of the spec to discover the owning cluster name; most of the shape lives in
/// `planner` where manifests are constructed rather than parsed.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "ray.io",
    version = "v1",
    kind = "RayJob",
    plural = "rayjobs",
    status = "RayJobStatus",
    namespaced
)]
#[allow(dead_code)]
pub struct RayJobSpec {
    #[serde(default)]
    pub suspend: Option<bool>,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub entrypoint: Option<String>,
}

#[allow(dead_code)]
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
pub struct RayJobStatus {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub job_status: Option<String>,
    #[serde(default)]
    pub job_deployment_status: Option<String>,
    #[serde(default)]
    pub ray_cluster_name: Option<String>,
}

/// Identifies the owner of a Workload in a form that can be turned back into an API call:
/// the parsed `(group, version)` from its `apiVersion`, the resource `kind`, and its `uid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerHandle {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

impl OwnerHandle {
    /// Parses a single `OwnerReference`, splitting `apiVersion` into `(group, version)`. The core
    /// batch API's Job kind has an empty group and an unqualified `apiVersion` of `v1`.
    pub fn from_owner_reference(owner: &OwnerReference) -> Option<Self> {
        let (group, version) = match owner.api_version.split_once('/') {
            Some((group, version)) => (group.to_string(), version.to_string()),
            None => (String::new(), owner.api_version.clone()),
        };
        Some(OwnerHandle {
            group,
            version,
            kind: owner.kind.clone(),
            name: owner.name.clone(),
            uid: owner.uid.clone(),
        })
    }
}

/// `k8s_openapi`'s `Time` wraps a `chrono::DateTime<Utc>`; the rest of the codebase formats
/// timestamps with the `time` crate, so metadata timestamps are converted once at the boundary.
pub fn metadata_time_to_offset_date_time(
    t: &k8s_openapi::apimachinery::pkg::apis::meta::v1::Time,
) -> time::OffsetDateTime {
    let nanos_since_epoch = t.0.timestamp_nanos_opt().unwrap_or(0);
    time::OffsetDateTime::from_unix_timestamp_nanos(nanos_since_epoch as i128)
        .unwrap_or(time::OffsetDateTime::UNIX_EPOCH)
}

pub const JOB_UID_LABEL: &str = "kueue.x-k8s.io/job-uid";
pub const QUEUE_NAME_LABEL: &str = "kueue.x-k8s.io/queue-name";
pub const PRIORITY_CLASS_LABEL: &str = "kueue.x-k8s.io/priority-class";
pub const RAYJOB_CRD_LABEL: &str = "ray.io/originated-from-crd";
pub const RAYJOB_CR_NAME_LABEL: &str = "ray.io/originated-from-cr-name";

pub type Labels = BTreeMap<String, String>;

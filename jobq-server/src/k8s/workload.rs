//! The Workload Model: the domain object wrapping a decoded Kueue `Workload` payload together
//! with its owning resource. Exposes the derived status/timestamp/flag properties and the
//! owner-kind-specific pod discovery.

use k8s_openapi::api::core::v1::Pod;

use crate::error::{Error, Result};
use crate::k8s::gateway::Gateway;
use crate::k8s::status;
use crate::k8s::types::{
    metadata_time_to_offset_date_time, OwnerHandle, Workload as WorkloadResource, RAYJOB_CRD_LABEL,
    RAYJOB_CR_NAME_LABEL,
};
use crate::model::{JobStatus, WorkloadIdentifier, WorkloadMetadata, WorkloadSpecSummary};

/// Owner-kind strategy for pod discovery, reified as a closed tagged variant rather than a
/// string match scattered across call sites. Adding a new owning-resource kind means adding a
/// variant here and a `discover_pods` arm, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    /// Pods carry `controller-uid = <owner uid>` directly.
    PlainJob,
    /// The KubeRay operator creates an intermediate submission Job labelled
    /// `ray.io/originated-from-crd=RayJob` and `ray.io/originated-from-cr-name=<name>`; its pods
    /// carry `controller-uid` equal to *that* Job's uid, not the RayJob's.
    RayJob,
}

impl OwnerKind {
    pub fn from_kind_str(kind: &str) -> Result<Self> {
        match kind {
            "Job" => Ok(OwnerKind::PlainJob),
            "RayJob" => Ok(OwnerKind::RayJob),
            other => Err(Error::UnsupportedKind(other.to_string())),
        }
    }
}

pub struct Workload {
    resource: WorkloadResource,
    owner: OwnerHandle,
    owner_uid: String,
}

impl Workload {
    /// Validates owner references (exactly one) and caches the parsed owner handle. Fails fast
    /// on the same invariant breaches the Planner and Coordinator rely on never reaching them.
    pub fn from_resource(resource: WorkloadResource) -> Result<Self> {
        let owner_references = resource
            .metadata
            .owner_references
            .as_deref()
            .unwrap_or(&[]);

        let owner_reference = match owner_references {
            [single] => single,
            [] => {
                return Err(Error::InvalidWorkload(
                    "workload has no owner references".to_string(),
                ))
            }
            _ => {
                return Err(Error::InvalidWorkload(
                    "workload has more than one owner reference".to_string(),
                ))
            }
        };

        let owner = OwnerHandle::from_owner_reference(owner_reference).ok_or_else(|| {
            Error::InvalidWorkload("owner reference is missing required fields".to_string())
        })?;
        let owner_uid = owner.uid.clone();

        Ok(Workload {
            resource,
            owner,
            owner_uid,
        })
    }

    pub fn owner_uid(&self) -> &str {
        &self.owner_uid
    }

    pub fn owner(&self) -> &OwnerHandle {
        &self.owner
    }

    pub fn name(&self) -> &str {
        self.resource.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn conditions(&self) -> &[crate::k8s::types::WorkloadCondition] {
        self.resource
            .status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    pub fn execution_status(&self) -> JobStatus {
        status::derive(self.conditions())
    }

    pub fn submission_timestamp(&self) -> Result<time::OffsetDateTime> {
        self.resource
            .metadata
            .creation_timestamp
            .as_ref()
            .map(metadata_time_to_offset_date_time)
            .ok_or_else(|| Error::InvalidWorkload("workload has no creation timestamp".to_string()))
    }

    pub fn identifier(&self, namespace: &str) -> WorkloadIdentifier {
        WorkloadIdentifier {
            group: self.owner.group.clone(),
            version: self.owner.version.clone(),
            kind: self.owner.kind.clone(),
            namespace: namespace.to_string(),
            uid: self.owner_uid.clone(),
        }
    }

    /// Builds the response aggregate. Fails if `owner_uid` is absent, which cannot happen once
    /// `from_resource` has already succeeded, but the constructor stays fallible to keep the
    /// invariant explicit at the type's only public entry point.
    pub fn to_metadata(&self, namespace: &str) -> Result<WorkloadMetadata> {
        let conditions = self.conditions();
        let spec = WorkloadSpecSummary {
            queue_name: self.resource.spec.queue_name.clone(),
            priority_class_name: self.resource.spec.priority_class_name.clone(),
            active: self.resource.spec.active,
            priority: self.resource.spec.priority,
        };
        let cluster_queue = self
            .resource
            .status
            .as_ref()
            .and_then(|s| s.admission.as_ref())
            .and_then(|a| a.cluster_queue.clone());
        Ok(WorkloadMetadata {
            execution_status: self.execution_status(),
            identifier: self.identifier(namespace),
            spec,
            cluster_queue,
            submission_timestamp: self.submission_timestamp()?,
            last_admission_timestamp: status::last_admission_timestamp(conditions),
            termination_timestamp: status::termination_timestamp(conditions),
            was_evicted: status::was_evicted(conditions),
            was_inadmissible: status::was_inadmissible(conditions),
            has_failed_pods: status::has_failed_pods(conditions),
            conditions: conditions.to_vec(),
        })
    }

    /// Discovers every pod backing this workload, dispatching on the owner's kind.
    pub async fn pods(&self, gateway: &Gateway, namespace: &str) -> Result<Vec<Pod>> {
        match OwnerKind::from_kind_str(&self.owner.kind)? {
            OwnerKind::PlainJob => gateway.list_pods_by_controller_uid(namespace, &self.owner_uid).await,
            OwnerKind::RayJob => {
                let selector = format!(
                    "{RAYJOB_CRD_LABEL}=RayJob,{RAYJOB_CR_NAME_LABEL}={}",
                    self.owner.name
                );
                let submission_jobs = gateway.list_jobs_by_label_selector(namespace, &selector).await?;
                let submission_job = match submission_jobs.as_slice() {
                    [single] => single,
                    [] => {
                        return Err(Error::NotFound(format!(
                            "no submission job found for rayjob {}",
                            self.owner.name
                        )))
                    }
                    _ => {
                        return Err(Error::InvalidWorkload(format!(
                            "more than one submission job found for rayjob {}",
                            self.owner.name
                        )))
                    }
                };
                let controller_uid = submission_job
                    .metadata
                    .uid
                    .as_deref()
                    .ok_or_else(|| Error::InvalidWorkload("submission job has no uid".to_string()))?;
                gateway.list_pods_by_controller_uid(namespace, controller_uid).await
            }
        }
    }

    /// Cascades deletion through the owning resource with foreground propagation, so Kubernetes
    /// garbage-collects the Workload and any pods it spawned before the call returns. A
    /// `NotFound` (the owner is already gone) is passed through unchanged; any other failure is
    /// reported as `StopFailed`.
    pub async fn stop(&self, gateway: &Gateway, namespace: &str) -> Result<()> {
        match gateway.delete_owner(namespace, &self.owner).await {
            Ok(()) => Ok(()),
            Err(Error::NotFound(detail)) => Err(Error::NotFound(detail)),
            Err(other) => Err(Error::StopFailed(other.to_string())),
        }
    }
}

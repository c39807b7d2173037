//! The Cluster Gateway: the only component that touches the Kubernetes API directly. Hides the
//! distinction between typed and dynamic clients behind operations that speak in terms of
//! (group, version, kind, name, namespace).

use std::path::Path;

use futures::Stream;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, ListParams, LogParams, Patch, PatchParams,
    PostParams, Preconditions, PropagationPolicy,
};
use kube::{Client, ResourceExt};

use crate::error::{map_log_error, Error, Result};
use crate::k8s::types::{OwnerHandle, Workload, JOB_UID_LABEL};
use crate::model::WorkloadIdentifier;

const IN_CLUSTER_NAMESPACE_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

pub enum Propagation {
    Foreground,
    Background,
    Orphan,
}

impl Propagation {
    fn as_policy(&self) -> PropagationPolicy {
        match self {
            Propagation::Foreground => PropagationPolicy::Foreground,
            Propagation::Background => PropagationPolicy::Background,
            Propagation::Orphan => PropagationPolicy::Orphan,
        }
    }
}

#[derive(Clone)]
pub struct Gateway {
    client: Client,
    namespace_override: Option<String>,
}

impl Gateway {
    pub fn new(client: Client, namespace_override: Option<String>) -> Self {
        Gateway {
            client,
            namespace_override,
        }
    }

    /// Effective namespace for calls that don't carry an explicit one: a per-request override if
    /// configured, else the in-cluster service-account namespace file, else the client's
    /// configured default (derived from the active kubeconfig context).
    pub fn namespace(&self) -> Result<String> {
        if let Some(ns) = &self.namespace_override {
            return Ok(ns.clone());
        }
        if let Ok(contents) = std::fs::read_to_string(Path::new(IN_CLUSTER_NAMESPACE_FILE)) {
            let trimmed = contents.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }
        let default_ns = self.client.default_namespace();
        if default_ns.is_empty() {
            return Err(Error::APIError(
                "no usable namespace: no service-account file and no active kubeconfig context"
                    .to_string(),
            ));
        }
        Ok(default_ns.to_string())
    }

    pub async fn create_batch_job(&self, namespace: &str, manifest: Job) -> Result<WorkloadIdentifier> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        let created = api.create(&PostParams::default(), &manifest).await?;
        Ok(WorkloadIdentifier {
            group: String::new(),
            version: "v1".to_string(),
            kind: "Job".to_string(),
            namespace: namespace.to_string(),
            uid: created.uid().unwrap_or_default(),
        })
    }

    pub async fn create_custom_resource(
        &self,
        namespace: &str,
        resource: &ApiResource,
        manifest: DynamicObject,
    ) -> Result<WorkloadIdentifier> {
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, resource);
        let created = api.create(&PostParams::default(), &manifest).await?;
        Ok(WorkloadIdentifier {
            group: resource.group.clone(),
            version: resource.version.clone(),
            kind: resource.kind.clone(),
            namespace: namespace.to_string(),
            uid: created.uid().unwrap_or_default(),
        })
    }

    pub async fn find_workload_by_owner_uid(&self, uid: &str, namespace: &str) -> Result<Workload> {
        let api: Api<Workload> = Api::namespaced(self.client.clone(), namespace);
        let selector = format!("{JOB_UID_LABEL}={uid}");
        let list = api.list(&ListParams::default().labels(&selector)).await?;
        let workload = list
            .items
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("no workload found for owner uid {uid}")))?;
        if workload.status.is_none() {
            return Err(Error::NotFound(format!("workload for owner uid {uid} has no status")));
        }
        Ok(workload)
    }

    pub async fn list_workloads(&self, namespace: &str) -> Result<Vec<Workload>> {
        let api: Api<Workload> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    /// Resolves an owner reference to the owning resource as a dynamic object. Only `Job` (core
    /// batch API) and `RayJob` (`ray.io/v1`) are registered; any other kind is a structural
    /// inconsistency the Workload Model should never have let through.
    pub async fn resolve_owner(&self, owner: &OwnerHandle, namespace: &str) -> Result<DynamicObject> {
        let resource = owner_api_resource(owner)?;
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &resource);
        api.get(&owner.name).await.map_err(Error::from)
    }

    pub async fn delete_owner(&self, namespace: &str, owner: &OwnerHandle) -> Result<()> {
        self.delete_resource(owner, namespace, Propagation::Foreground).await
    }

    pub async fn delete_resource(
        &self,
        owner: &OwnerHandle,
        namespace: &str,
        propagation: Propagation,
    ) -> Result<()> {
        let resource = owner_api_resource(owner)?;
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &resource);
        let params = DeleteParams {
            propagation_policy: Some(propagation.as_policy()),
            preconditions: Some(Preconditions {
                uid: Some(owner.uid.clone()),
                resource_version: None,
            }),
            ..Default::default()
        };
        api.delete(&owner.name, &params).await?;
        Ok(())
    }

    pub async fn list_pods_by_controller_uid(&self, namespace: &str, uid: &str) -> Result<Vec<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let selector = format!("controller-uid={uid}");
        let list = api.list(&ListParams::default().labels(&selector)).await?;
        Ok(list.items)
    }

    pub async fn list_jobs_by_label_selector(&self, namespace: &str, selector: &str) -> Result<Vec<Job>> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default().labels(selector)).await?;
        Ok(list.items)
    }

    /// Whole log text for a pod, or `PodNotReady` if the API returns 400 (not yet running). This
    /// 400 mapping is specific to the log endpoint; every other call below falls 400s through to
    /// `APIError` via the blanket `From<kube::Error>`.
    pub async fn get_pod_logs(&self, namespace: &str, pod_name: &str, tail: Option<i64>) -> Result<String> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            tail_lines: tail,
            ..Default::default()
        };
        api.logs(pod_name, &params).await.map_err(map_log_error)
    }

    /// A lazy, finite byte-chunk stream that ends when the pod's container terminates.
    pub async fn stream_pod_logs(
        &self,
        namespace: &str,
        pod_name: &str,
        tail: Option<i64>,
    ) -> Result<impl Stream<Item = kube::Result<bytes::Bytes>>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            tail_lines: tail,
            follow: true,
            ..Default::default()
        };
        api.log_stream(pod_name, &params).await.map_err(map_log_error)
    }

    /// Applies a server-side patch, used by `Stop` when a workload's owning resource must be
    /// suspended rather than deleted outright (not on the current lifecycle but kept available
    /// for the same reason the Gateway exposes `CreateCustomResource` generically).
    pub async fn patch_dynamic(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<DynamicObject> {
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, resource);
        api.patch(name, &PatchParams::apply("jobq-server"), &Patch::Merge(patch))
            .await
            .map_err(Error::from)
    }

    pub async fn local_queue_exists(&self, namespace: &str, name: &str) -> Result<bool> {
        let resource = ApiResource {
            group: "kueue.x-k8s.io".to_string(),
            version: "v1beta1".to_string(),
            api_version: "kueue.x-k8s.io/v1beta1".to_string(),
            kind: "LocalQueue".to_string(),
            plural: "localqueues".to_string(),
        };
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &resource);
        resource_exists(&api, name).await
    }

    pub async fn workload_priority_class_exists(&self, name: &str) -> Result<bool> {
        let resource = ApiResource {
            group: "kueue.x-k8s.io".to_string(),
            version: "v1beta1".to_string(),
            api_version: "kueue.x-k8s.io/v1beta1".to_string(),
            kind: "WorkloadPriorityClass".to_string(),
            plural: "workloadpriorityclasses".to_string(),
        };
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);
        resource_exists(&api, name).await
    }
}

async fn resource_exists(api: &Api<DynamicObject>, name: &str) -> Result<bool> {
    match api.get(name).await {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(response)) if response.code == 404 => Ok(false),
        Err(other) => Err(Error::from(other)),
    }
}

fn owner_api_resource(owner: &OwnerHandle) -> Result<ApiResource> {
    match (owner.group.as_str(), owner.kind.as_str()) {
        ("", "Job") => Ok(ApiResource {
            group: String::new(),
            version: owner.version.clone(),
            api_version: owner.version.clone(),
            kind: "Job".to_string(),
            plural: "jobs".to_string(),
        }),
        ("ray.io", "RayJob") => Ok(ApiResource {
            group: "ray.io".to_string(),
            version: owner.version.clone(),
            api_version: format!("ray.io/{}", owner.version),
            kind: "RayJob".to_string(),
            plural: "rayjobs".to_string(),
        }),
        (group, kind) => Err(Error::UnsupportedKind(format!("{group}/{kind}"))),
    }
}

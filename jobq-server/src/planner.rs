//! The Submission Planner: translates a `JobSpec` into the Kubernetes manifest Kueue needs to see
//! in order to queue, admit, preempt, and evict the underlying workload.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;

use crate::bash_escape;
use crate::error::{Error, Result};
use crate::k8s::gateway::Gateway;
use crate::k8s::types::{PRIORITY_CLASS_LABEL, QUEUE_NAME_LABEL};
use crate::labels;
use crate::model::{JobSpec, Mode, Resources};
use crate::name::sanitize_rfc_1123;

pub const SUBMISSION_CONTEXT_ANNOTATION: &str = "x-jobq.io/submission-context";

/// Kubernetes resource-quantity grammar: an unsigned decimal magnitude with an optional SI
/// (`E`/`P`/`T`/`G`/`M`/`k`), binary (`Ei`/`Pi`/.../`Ki`), or milli (`m`) suffix.
static RESOURCE_QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)?([EPTGMK]i?|m)?$").unwrap());

fn is_valid_quantity(value: &str) -> bool {
    RESOURCE_QUANTITY.is_match(value)
}

pub struct PlannedManifest {
    pub manifest: serde_json::Value,
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
}

/// Validates the spec's preconditions against the cluster: referenced queues and priority
/// classes must already exist, and the image reference must parse. Called before any manifest is
/// shaped so a bad submission never reaches the apiserver.
pub async fn validate(spec: &JobSpec, namespace: &str, gateway: &Gateway) -> Result<()> {
    if spec.name.is_empty() {
        return Err(Error::ValidationFailed("name must not be empty".to_string()));
    }

    spec.parsed_image_ref()
        .map_err(|e| Error::ValidationFailed(format!("invalid image_ref: {e}")))?;

    for (key, value) in &spec.labels {
        if !labels::is_valid_label_key(key) {
            return Err(Error::ValidationFailed(format!("invalid label key {key:?}")));
        }
        if !labels::is_valid_label_value(value) {
            return Err(Error::ValidationFailed(format!(
                "label value for {key:?} exceeds 127 characters"
            )));
        }
    }

    if let Some(cpu) = &spec.resources.cpu {
        if !is_valid_quantity(cpu) {
            return Err(Error::ValidationFailed(format!("invalid cpu quantity {cpu:?}")));
        }
    }
    if let Some(memory) = &spec.resources.memory {
        if !is_valid_quantity(memory) {
            return Err(Error::ValidationFailed(format!("invalid memory quantity {memory:?}")));
        }
    }

    if let Some(queue_name) = &spec.scheduling.queue_name {
        if !gateway.local_queue_exists(namespace, queue_name).await? {
            return Err(Error::ValidationFailed(format!(
                "local queue {queue_name:?} does not exist in namespace {namespace:?}"
            )));
        }
    }

    if let Some(priority_class) = &spec.scheduling.priority_class {
        if !gateway.workload_priority_class_exists(priority_class).await? {
            return Err(Error::ValidationFailed(format!(
                "workload priority class {priority_class:?} does not exist"
            )));
        }
    }

    Ok(())
}

fn generate_name(spec: &JobSpec) -> Result<String> {
    sanitize_rfc_1123(&spec.name)
        .map(|label| format!("{label}-"))
        .ok_or_else(|| Error::ValidationFailed(format!("name {:?} has no usable characters", spec.name)))
}

fn labels(spec: &JobSpec) -> serde_json::Value {
    let mut labels = serde_json::Map::new();
    if let Some(queue_name) = &spec.scheduling.queue_name {
        labels.insert(QUEUE_NAME_LABEL.to_string(), queue_name.clone().into());
    }
    if let Some(priority_class) = &spec.scheduling.priority_class {
        labels.insert(PRIORITY_CLASS_LABEL.to_string(), priority_class.clone().into());
    }
    serde_json::Value::Object(labels)
}

fn annotations(spec: &JobSpec) -> serde_json::Value {
    let mut annotations = serde_json::Map::new();
    for (key, value) in &spec.labels {
        annotations.insert(key.clone(), value.clone().into());
    }
    if !matches!(&spec.submission_context, serde_json::Value::Null) {
        let serialized = serde_json::to_string(&spec.submission_context).unwrap_or_default();
        if !serialized.is_empty() && serialized != "null" {
            annotations.insert(SUBMISSION_CONTEXT_ANNOTATION.to_string(), serialized.into());
        }
    }
    serde_json::Value::Object(annotations)
}

fn resource_quantities(resources: &Resources) -> serde_json::Value {
    let mut quantities = serde_json::Map::new();
    if let Some(cpu) = &resources.cpu {
        quantities.insert("cpu".to_string(), cpu.clone().into());
    }
    if let Some(memory) = &resources.memory {
        quantities.insert("memory".to_string(), memory.clone().into());
    }
    if let Some(gpu) = resources.gpu {
        quantities.insert("nvidia.com/gpu".to_string(), gpu.to_string().into());
    }
    serde_json::Value::Object(quantities)
}

/// Shapes a `batch/v1 Job` for `mode = kueue`. `default_parallelism` is the configured fallback
/// for the hard-coded `3` the source carried; see the configuration surface for how it's set.
pub fn plain_job_manifest(spec: &JobSpec, default_parallelism: u32) -> Result<PlannedManifest> {
    let resources = resource_quantities(&spec.resources);
    let manifest = serde_json::json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": {
            "generateName": generate_name(spec)?,
            "labels": labels(spec),
            "annotations": annotations(spec),
        },
        "spec": {
            "suspend": true,
            "parallelism": default_parallelism,
            "backoffLimit": 0,
            "template": {
                "metadata": {
                    "labels": labels(spec),
                    "annotations": annotations(spec),
                },
                "spec": {
                    "restartPolicy": "Never",
                    "containers": [
                        {
                            "name": "workload",
                            "image": spec.image_ref,
                            "imagePullPolicy": "IfNotPresent",
                            "command": ["jobs_execute", spec.entrypoint_file, spec.name],
                            "resources": {
                                "requests": resources,
                                "limits": resources,
                            },
                        }
                    ],
                }
            }
        }
    });

    Ok(PlannedManifest {
        manifest,
        group: "",
        version: "v1",
        kind: "Job",
    })
}

fn random_suffix() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..4)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Shapes a `ray.io/v1 RayJob` for `mode = rayjob`. `ray_version` is auto-detected from the
/// process environment by the caller; detection failure is a `ValidationFailed`, not a panic.
pub fn ray_job_manifest(spec: &JobSpec, ray_version: &str) -> Result<PlannedManifest> {
    let resources = resource_quantities(&spec.resources);
    let entrypoint = bash_escape::quote_join(
        ["jobs_execute", spec.entrypoint_file.as_str(), spec.name.as_str()],
    );
    let job_id = format!("{}-{}", spec.name, random_suffix());
    let runtime_env_yaml = serde_yaml::to_string(&serde_yaml::Mapping::from_iter([(
        serde_yaml::Value::String("working_dir".to_string()),
        serde_yaml::Value::String("/home/ray/app".to_string()),
    )]))
    .map_err(|e| Error::ValidationFailed(format!("failed to render runtimeEnvYAML: {e}")))?;

    let manifest = serde_json::json!({
        "apiVersion": "ray.io/v1",
        "kind": "RayJob",
        "metadata": {
            "generateName": generate_name(spec)?,
            "labels": labels(spec),
            "annotations": annotations(spec),
        },
        "spec": {
            "suspend": true,
            "jobId": job_id,
            "shutdownAfterJobFinishes": true,
            "entrypoint": entrypoint,
            "runtimeEnvYAML": runtime_env_yaml,
            "rayClusterSpec": {
                "rayVersion": ray_version,
                "headGroupSpec": {
                    "rayStartParams": {
                        "dashboard-host": "0.0.0.0",
                        "disable-usage-stats": "true",
                    },
                    "template": {
                        "metadata": {
                            "labels": labels(spec),
                            "annotations": annotations(spec),
                        },
                        "spec": {
                            "containers": [
                                {
                                    "name": "ray-head",
                                    "image": spec.image_ref,
                                    "resources": {
                                        "requests": resources,
                                        "limits": resources,
                                    },
                                }
                            ]
                        }
                    }
                }
            },
            "submitterPodTemplate": {
                "metadata": {
                    "labels": labels(spec),
                    "annotations": annotations(spec),
                },
                "spec": {
                    "restartPolicy": "Never",
                    "containers": [
                        {
                            "name": "ray-job-submitter",
                            "image": spec.image_ref,
                        }
                    ]
                }
            }
        }
    });

    Ok(PlannedManifest {
        manifest,
        group: "ray.io",
        version: "v1",
        kind: "RayJob",
    })
}

pub fn plan(spec: &JobSpec, default_parallelism: u32, ray_version: Option<&str>) -> Result<PlannedManifest> {
    match spec.mode {
        Mode::Docker => Err(Error::BadMode(spec.mode.as_str().to_string())),
        Mode::Kueue => plain_job_manifest(spec, default_parallelism),
        Mode::Rayjob => {
            let ray_version = ray_version
                .ok_or_else(|| Error::ValidationFailed("could not auto-detect a ray version".to_string()))?;
            ray_job_manifest(spec, ray_version)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn spec(mode: Mode) -> JobSpec {
        JobSpec {
            name: "My_Job".to_string(),
            entrypoint_file: "train.py".to_string(),
            image_ref: "alpine:latest".to_string(),
            mode,
            resources: Resources {
                cpu: Some("1".to_string()),
                memory: Some("512Mi".to_string()),
                gpu: None,
            },
            scheduling: Default::default(),
            labels: HashMap::new(),
            submission_context: serde_json::Value::Null,
        }
    }

    #[test]
    fn plain_job_suspends_and_sets_default_parallelism() {
        let planned = plain_job_manifest(&spec(Mode::Kueue), 3).unwrap();
        assert_eq!(planned.manifest["spec"]["suspend"], true);
        assert_eq!(planned.manifest["spec"]["parallelism"], 3);
        assert_eq!(
            planned.manifest["metadata"]["generateName"],
            "my-job-"
        );
    }

    #[test]
    fn accepts_plain_binary_and_milli_quantities() {
        for quantity in ["1", "1.5", "512Mi", "2Gi", "500m", "4k"] {
            assert!(is_valid_quantity(quantity), "expected {quantity:?} to be valid");
        }
    }

    #[test]
    fn rejects_malformed_quantities() {
        for quantity in ["", "Mi", "1 Mi", "1x", "--1"] {
            assert!(!is_valid_quantity(quantity), "expected {quantity:?} to be invalid");
        }
    }

    #[test]
    fn docker_mode_is_rejected() {
        let result = plan(&spec(Mode::Docker), 3, None);
        assert!(matches!(result, Err(Error::BadMode(_))));
    }

    #[test]
    fn rayjob_requires_a_detected_ray_version() {
        let result = plan(&spec(Mode::Rayjob), 3, None);
        assert!(matches!(result, Err(Error::ValidationFailed(_))));
    }

    #[test]
    fn rayjob_shell_quotes_the_entrypoint() {
        let planned = ray_job_manifest(&spec(Mode::Rayjob), "2.9.0").unwrap();
        let entrypoint = planned.manifest["spec"]["entrypoint"].as_str().unwrap();
        assert!(entrypoint.contains("jobs_execute"));
        assert_eq!(planned.manifest["spec"]["rayClusterSpec"]["rayVersion"], "2.9.0");
    }
}

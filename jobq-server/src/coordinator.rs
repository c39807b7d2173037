//! The Lifecycle Coordinator: the public contract (`Submit`/`Status`/`List`/`Logs`/`Stop`).
//! Orchestrates the Planner, Gateway, and Workload Model, and is the single place that
//! translates internal errors into the taxonomy the HTTP layer maps to status codes.

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::k8s::gateway::Gateway;
use crate::k8s::workload::Workload;
use crate::model::{JobSpec, ListWorkloadEntry, WorkloadIdentifier, WorkloadMetadata};
use crate::planner;

pub struct Coordinator {
    gateway: Gateway,
    config: ServerConfig,
}

pub enum LogsOutput {
    Text(String),
    Stream(ReceiverStream<Result<Bytes>>),
}

impl Coordinator {
    pub fn new(gateway: Gateway, config: ServerConfig) -> Self {
        Coordinator { gateway, config }
    }

    pub fn namespace(&self) -> Result<String> {
        self.gateway.namespace()
    }

    pub async fn submit(&self, spec: JobSpec) -> Result<WorkloadIdentifier> {
        let namespace = self.gateway.namespace()?;
        planner::validate(&spec, &namespace, &self.gateway).await?;

        let planned = planner::plan(
            &spec,
            self.config.default_parallelism,
            self.config.resolved_ray_version().as_deref(),
        )?;

        if planned.group.is_empty() {
            let job: k8s_openapi::api::batch::v1::Job = serde_json::from_value(planned.manifest)
                .map_err(|e| Error::ValidationFailed(format!("failed to build job manifest: {e}")))?;
            self.gateway.create_batch_job(&namespace, job).await
        } else {
            let resource = kube::api::ApiResource {
                group: planned.group.to_string(),
                version: planned.version.to_string(),
                api_version: format!("{}/{}", planned.group, planned.version),
                kind: planned.kind.to_string(),
                plural: format!("{}s", planned.kind.to_lowercase()),
            };
            let mut manifest = kube::api::DynamicObject::new("", &resource);
            if let Some(metadata) = planned.manifest.get("metadata") {
                if let Some(generate_name) = metadata.get("generateName").and_then(|v| v.as_str()) {
                    manifest.metadata.generate_name = Some(generate_name.to_string());
                }
                if let Some(labels) = metadata.get("labels") {
                    manifest.metadata.labels = serde_json::from_value(labels.clone()).unwrap_or_default();
                }
                if let Some(annotations) = metadata.get("annotations") {
                    manifest.metadata.annotations =
                        serde_json::from_value(annotations.clone()).unwrap_or_default();
                }
            }
            manifest.data = serde_json::json!({ "spec": planned.manifest["spec"] });
            self.gateway
                .create_custom_resource(&namespace, &resource, manifest)
                .await
        }
    }

    async fn load_workload(&self, id: &WorkloadIdentifier) -> Result<Workload> {
        let resource = self
            .gateway
            .find_workload_by_owner_uid(&id.uid, &id.namespace)
            .await?;
        Workload::from_resource(resource)
    }

    pub async fn status(&self, id: &WorkloadIdentifier) -> Result<WorkloadMetadata> {
        let workload = self.load_workload(id).await?;
        workload.to_metadata(&id.namespace)
    }

    /// Ordering matches whatever the Kubernetes API returns (etcd key order), which is stable
    /// across calls for an unchanged set of workloads.
    pub async fn list(&self, include_metadata: bool) -> Result<Vec<ListWorkloadEntry>> {
        let namespace = self.gateway.namespace()?;
        let resources = self.gateway.list_workloads(&namespace).await?;
        let mut entries = Vec::with_capacity(resources.len());
        for resource in resources {
            let name = resource.metadata.name.clone().unwrap_or_default();
            let workload = match Workload::from_resource(resource) {
                Ok(workload) => workload,
                Err(_) => continue,
            };
            let identifier = workload.identifier(&namespace);
            let metadata = if include_metadata {
                Some(workload.to_metadata(&namespace)?)
            } else {
                None
            };
            entries.push(ListWorkloadEntry {
                name,
                identifier,
                metadata,
            });
        }
        Ok(entries)
    }

    pub async fn logs(&self, id: &WorkloadIdentifier, stream: bool, tail: Option<i64>) -> Result<LogsOutput> {
        let workload = self.load_workload(id).await?;
        let pods = workload.pods(&self.gateway, &id.namespace).await?;
        if pods.is_empty() {
            return Err(Error::NotFound(format!(
                "no pods found for workload owned by {}",
                id.uid
            )));
        }

        if !stream {
            let mut combined = String::new();
            for pod in &pods {
                let name = pod.metadata.name.as_deref().unwrap_or_default();
                let text = self.gateway.get_pod_logs(&id.namespace, name, tail).await?;
                for line in text.lines() {
                    combined.push_str(&format!("[{name}] {line}\n"));
                }
            }
            return Ok(LogsOutput::Text(combined));
        }

        Ok(LogsOutput::Stream(self.multiplex(id.namespace.clone(), pods, tail).await))
    }

    /// Task-group + first-completed log multiplexer: one producer task per pod feeds a bounded
    /// channel, the consumer drains whichever producer has data next. Dropping the returned
    /// stream closes the channel, which makes every producer's next send fail and exit, closing
    /// every underlying pod log stream promptly.
    async fn multiplex(
        &self,
        namespace: String,
        pods: Vec<k8s_openapi::api::core::v1::Pod>,
        tail: Option<i64>,
    ) -> ReceiverStream<Result<Bytes>> {
        let (tx, rx) = mpsc::channel(pods.len().max(1) * 4);

        for pod in pods {
            let name = pod.metadata.name.unwrap_or_default();
            let namespace = namespace.clone();
            let tx = tx.clone();
            let gateway = self.gateway.clone();
            tokio::spawn(async move {
                match gateway.stream_pod_logs(&namespace, &name, tail).await {
                    Ok(stream) => spawn_log_producer(tx, name, stream),
                    Err(error) => {
                        let _ = tx.send(Err(error)).await;
                    }
                }
            });
        }

        ReceiverStream::new(rx)
    }

    pub async fn stop(&self, id: &WorkloadIdentifier) -> Result<()> {
        let workload = self.load_workload(id).await?;
        workload.stop(&self.gateway, &id.namespace).await
    }
}

/// Drains one pod's log stream into the shared channel, prefixing every chunk with its pod name.
/// Kept independent of `Gateway` so it can be driven directly with a fake stream in tests: this
/// is the piece that actually implements interleaving and cancellation, the network open in
/// `multiplex` is just its producer.
fn spawn_log_producer<S>(tx: mpsc::Sender<Result<Bytes>>, pod_name: String, stream: S)
where
    S: futures::Stream<Item = kube::Result<Bytes>> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::pin!(stream);
        while let Some(chunk) = stream.next().await {
            let prefixed = match chunk {
                Ok(bytes) => Ok(prefix_chunk(&pod_name, &bytes)),
                Err(e) => Err(Error::from(e)),
            };
            if tx.send(prefixed).await.is_err() {
                break;
            }
        }
    });
}

fn prefix_chunk(pod_name: &str, chunk: &Bytes) -> Bytes {
    let mut out = Vec::with_capacity(pod_name.len() + 3 + chunk.len());
    out.extend_from_slice(b"[");
    out.extend_from_slice(pod_name.as_bytes());
    out.extend_from_slice(b"] ");
    out.extend_from_slice(chunk);
    Bytes::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_a_chunk_with_its_pod_name() {
        let chunk = Bytes::from_static(b"hello\n");
        assert_eq!(prefix_chunk("worker-0", &chunk).as_ref(), b"[worker-0] hello\n");
    }

    #[test]
    fn preserves_non_utf8_payloads() {
        let chunk = Bytes::from_static(&[0xff, 0xfe]);
        let prefixed = prefix_chunk("p", &chunk);
        assert!(prefixed.ends_with(&[0xff, 0xfe]));
    }

    #[tokio::test]
    async fn multiplex_interleaves_and_prefixes_chunks_from_independent_fake_streams() {
        let (tx, rx) = mpsc::channel::<Result<Bytes>>(8);

        let stream_a = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"one\n")),
            Ok(Bytes::from_static(b"two\n")),
        ]);
        let stream_b = futures::stream::iter(vec![Ok(Bytes::from_static(b"hello\n"))]);

        spawn_log_producer(tx.clone(), "pod-a".to_string(), stream_a);
        spawn_log_producer(tx.clone(), "pod-b".to_string(), stream_b);
        drop(tx);

        let mut received: Vec<Bytes> = ReceiverStream::new(rx)
            .map(|chunk| chunk.expect("fake streams never error"))
            .collect()
            .await;
        received.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));

        assert_eq!(received.len(), 3);
        assert_eq!(received[0].as_ref(), b"[pod-a] one\n");
        assert_eq!(received[1].as_ref(), b"[pod-a] two\n");
        assert_eq!(received[2].as_ref(), b"[pod-b] hello\n");
    }

    #[tokio::test]
    async fn dropping_the_receiver_closes_the_channel_for_every_producer() {
        let (tx, rx) = mpsc::channel::<Result<Bytes>>(1);
        drop(rx);
        assert!(tx.send(Ok(Bytes::from_static(b"x"))).await.is_err());
    }
}

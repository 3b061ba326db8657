use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use k8s_openapi::api::{apps::v1::Deployment, core::v1::Pod};
use kube::{
    api::{ListParams, Patch, PatchParams, PostParams},
    config::{KubeConfigOptions, Kubeconfig},
    core::Selector,
    runtime::{
        events::{Event, EventType, Recorder},
        reflector::{ObjectRef, Store},
    },
    Api, Client, Config, Resource, ResourceExt,
};
use serde_json::json;
use tracing::{info, warn};

use super::error::{Error, Result};
use crate::api::v1::{capacity_target::CapacityTarget, release::Release};

const FIELD_MANAGER: &str = "capacity-controller";

/// Workload (deployment) access on one target cluster.
#[async_trait]
pub trait WorkloadClient: Send + Sync {
    async fn list_deployments(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<Deployment>, kube::Error>;

    /// Sets `spec.replicas` and nothing else.
    async fn patch_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), kube::Error>;
}

/// Pod access on one target cluster.
#[async_trait]
pub trait PodClient: Send + Sync {
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<Pod>, kube::Error>;
}

#[derive(Clone)]
pub struct ClusterClients {
    pub workloads: Arc<dyn WorkloadClient>,
    pub pods: Arc<dyn PodClient>,
}

/// Hands out clients for named target clusters.
pub trait ClusterClientStore: Send + Sync {
    fn get_clients(&self, cluster: &str) -> Result<ClusterClients>;
}

#[async_trait]
pub trait ReleaseStore: Send + Sync {
    async fn get_release(&self, namespace: &str, name: &str)
        -> Result<Option<Release>, kube::Error>;
}

#[async_trait]
pub trait CapacityTargetStore: Send + Sync {
    async fn get(&self, namespace: &str, name: &str)
        -> Result<Option<CapacityTarget>, kube::Error>;

    /// Replaces the status subresource. The object's resourceVersion makes
    /// this a conditional write; a stale version fails with 409.
    async fn update_status(&self, target: &CapacityTarget) -> Result<CapacityTarget, kube::Error>;
}

#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(&self, target: &CapacityTarget, reason: &str, note: String);
}

/// Client for a single cluster, backed by the kube API.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WorkloadClient for KubeClusterClient {
    async fn list_deployments(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<Deployment>, kube::Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default().labels(selector)).await?;
        Ok(list.items)
    }

    async fn patch_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), kube::Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let patch = Patch::Merge(json!({ "spec": { "replicas": replicas } }));
        api.patch(name, &PatchParams::default(), &patch).await?;
        Ok(())
    }
}

#[async_trait]
impl PodClient for KubeClusterClient {
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<Pod>, kube::Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default().labels_from(selector)).await?;
        Ok(list.items)
    }
}

/// One kube client per target cluster, keyed by cluster name.
#[derive(Clone, Default)]
pub struct KubeClusterRegistry {
    clusters: HashMap<String, KubeClusterClient>,
}

impl KubeClusterRegistry {
    /// Builds a client per kubeconfig context. The context name doubles as the
    /// cluster name used in capacity target specs.
    pub async fn from_kubeconfig(kubeconfig: &Kubeconfig, contexts: &[String]) -> anyhow::Result<Self> {
        let mut registry = Self::default();
        for context in contexts {
            let opts = KubeConfigOptions {
                context: Some(context.clone()),
                ..Default::default()
            };
            let config = Config::from_custom_kubeconfig(kubeconfig.clone(), &opts).await?;
            let client = Client::try_from(config)?;
            info!("Registered target cluster {}", context);
            registry.insert(context.clone(), client);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, cluster: String, client: Client) {
        self.clusters.insert(cluster, KubeClusterClient::new(client));
    }
}

impl ClusterClientStore for KubeClusterRegistry {
    fn get_clients(&self, cluster: &str) -> Result<ClusterClients> {
        let client = self
            .clusters
            .get(cluster)
            .ok_or_else(|| Error::UnknownCluster {
                cluster: cluster.to_string(),
            })?;
        Ok(ClusterClients {
            workloads: Arc::new(client.clone()),
            pods: Arc::new(client.clone()),
        })
    }
}

/// Releases served from a reflector cache.
#[async_trait]
impl ReleaseStore for Store<Release> {
    async fn get_release(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Release>, kube::Error> {
        // the cache fills while the controller polls the release watch
        if let Err(e) = self.wait_until_ready().await {
            warn!("Release cache is gone: {}", e);
            return Ok(None);
        }
        let key = ObjectRef::new(name).within(namespace);
        Ok(self.get(&key).map(|release| (*release).clone()))
    }
}

/// Capacity targets on the management cluster.
#[derive(Clone)]
pub struct KubeCapacityTargets {
    client: Client,
}

impl KubeCapacityTargets {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CapacityTargetStore for KubeCapacityTargets {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CapacityTarget>, kube::Error> {
        let api: Api<CapacityTarget> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).await
    }

    async fn update_status(&self, target: &CapacityTarget) -> Result<CapacityTarget, kube::Error> {
        let namespace = target.namespace().unwrap_or("default".to_string());
        let api: Api<CapacityTarget> = Api::namespaced(self.client.clone(), &namespace);
        let body = serde_json::to_vec(target).map_err(kube::Error::SerdeError)?;
        let pp = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        api.replace_status(&target.name_any(), &pp, body).await
    }
}

#[async_trait]
impl EventRecorder for Recorder {
    async fn record(&self, target: &CapacityTarget, reason: &str, note: String) {
        let event = Event {
            type_: EventType::Normal,
            reason: reason.to_string(),
            note: Some(note),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(e) = self.publish(&event, &target.object_ref(&())).await {
            warn!("Unable to publish event for {}: {:?}", target.name_any(), e);
        }
    }
}

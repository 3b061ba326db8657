//! In-memory stand-ins for the management cluster, target clusters and event
//! recorder. Every write is recorded so tests can assert on the exact actions
//! a reconciliation issued.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use k8s_openapi::api::{apps::v1::Deployment, core::v1::Pod};
use kube::{
    core::{ErrorResponse, Selector, SelectorExt},
    ResourceExt,
};

use capacity_controllers::{
    api::v1::{capacity_target::CapacityTarget, release::Release},
    capacity::{
        clients::{
            CapacityTargetStore, ClusterClientStore, ClusterClients, EventRecorder, PodClient,
            ReleaseStore, WorkloadClient,
        },
        Error, Result,
    },
};

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    PatchReplicas {
        namespace: String,
        name: String,
        replicas: i32,
    },
    UpdateStatus(CapacityTarget),
}

pub fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("fake {reason}"),
        reason: reason.to_string(),
        code,
    })
}

fn matches_selector(labels: &BTreeMap<String, String>, selector: &str) -> bool {
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels.get(key).map(String::as_str) == Some(value),
            None => labels.contains_key(term),
        })
}

/// A target cluster holding deployments and pods.
#[derive(Default)]
pub struct FakeCluster {
    pub deployments: Mutex<Vec<Deployment>>,
    pub pods: Vec<Pod>,
    pub actions: Mutex<Vec<Action>>,
    pub fail_deployment_list: bool,
    pub fail_patch: bool,
    pub fail_pod_list: bool,
}

impl FakeCluster {
    pub fn new(deployments: Vec<Deployment>, pods: Vec<Pod>) -> FakeCluster {
        FakeCluster {
            deployments: Mutex::new(deployments),
            pods,
            ..Default::default()
        }
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkloadClient for FakeCluster {
    async fn list_deployments(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<Deployment>, kube::Error> {
        if self.fail_deployment_list {
            return Err(api_error(503, "ServiceUnavailable"));
        }
        Ok(self
            .deployments
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.namespace().as_deref() == Some(namespace))
            .filter(|d| matches_selector(d.labels(), selector))
            .cloned()
            .collect())
    }

    async fn patch_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), kube::Error> {
        if self.fail_patch {
            return Err(api_error(500, "InternalError"));
        }
        self.actions.lock().unwrap().push(Action::PatchReplicas {
            namespace: namespace.to_string(),
            name: name.to_string(),
            replicas,
        });
        let mut deployments = self.deployments.lock().unwrap();
        let deployment = deployments
            .iter_mut()
            .find(|d| d.namespace().as_deref() == Some(namespace) && d.name_any() == name)
            .ok_or_else(|| api_error(404, "NotFound"))?;
        if let Some(spec) = deployment.spec.as_mut() {
            spec.replicas = Some(replicas);
        }
        Ok(())
    }
}

#[async_trait]
impl PodClient for FakeCluster {
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<Pod>, kube::Error> {
        if self.fail_pod_list {
            return Err(api_error(503, "ServiceUnavailable"));
        }
        Ok(self
            .pods
            .iter()
            .filter(|p| p.namespace().as_deref() == Some(namespace))
            .filter(|p| selector.matches(p.labels()))
            .cloned()
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct FakeClusterStore {
    clusters: HashMap<String, Arc<FakeCluster>>,
}

impl FakeClusterStore {
    pub fn insert(&mut self, name: &str, cluster: FakeCluster) -> Arc<FakeCluster> {
        let cluster = Arc::new(cluster);
        self.clusters.insert(name.to_string(), cluster.clone());
        cluster
    }
}

impl ClusterClientStore for FakeClusterStore {
    fn get_clients(&self, cluster: &str) -> Result<ClusterClients> {
        let fake = self
            .clusters
            .get(cluster)
            .ok_or_else(|| Error::UnknownCluster {
                cluster: cluster.to_string(),
            })?;
        Ok(ClusterClients {
            workloads: fake.clone(),
            pods: fake.clone(),
        })
    }
}

/// The management cluster: releases and capacity targets.
#[derive(Default)]
pub struct FakeManagement {
    pub releases: Mutex<Vec<Release>>,
    pub capacity_targets: Mutex<Vec<CapacityTarget>>,
    pub actions: Mutex<Vec<Action>>,
    pub fail_release_get: bool,
    /// Every status update is rejected as stale.
    pub conflict_on_update: bool,
}

impl FakeManagement {
    pub fn add_release(&self, release: Release) {
        self.releases.lock().unwrap().push(release);
    }

    pub fn add_capacity_target(&self, target: CapacityTarget) {
        self.capacity_targets.lock().unwrap().push(target);
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    pub fn stored(&self, name: &str) -> Option<CapacityTarget> {
        self.capacity_targets
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.name_any() == name)
            .cloned()
    }
}

#[async_trait]
impl ReleaseStore for FakeManagement {
    async fn get_release(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Release>, kube::Error> {
        if self.fail_release_get {
            return Err(api_error(500, "InternalError"));
        }
        Ok(self
            .releases
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.namespace().as_deref() == Some(namespace) && r.name_any() == name)
            .cloned())
    }
}

#[async_trait]
impl CapacityTargetStore for FakeManagement {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CapacityTarget>, kube::Error> {
        Ok(self
            .capacity_targets
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.namespace().as_deref() == Some(namespace) && t.name_any() == name)
            .cloned())
    }

    async fn update_status(&self, target: &CapacityTarget) -> Result<CapacityTarget, kube::Error> {
        if self.conflict_on_update {
            return Err(api_error(409, "Conflict"));
        }
        self.actions
            .lock()
            .unwrap()
            .push(Action::UpdateStatus(target.clone()));
        let mut targets = self.capacity_targets.lock().unwrap();
        let stored = targets
            .iter_mut()
            .find(|t| t.namespace() == target.namespace() && t.name_any() == target.name_any())
            .ok_or_else(|| api_error(404, "NotFound"))?;
        if stored.metadata.resource_version != target.metadata.resource_version {
            return Err(api_error(409, "Conflict"));
        }
        let version = stored
            .metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        stored.status = target.status.clone();
        stored.metadata.resource_version = Some((version + 1).to_string());
        Ok(stored.clone())
    }
}

#[derive(Default)]
pub struct RecordingRecorder {
    pub events: Mutex<Vec<(String, String)>>,
}

impl RecordingRecorder {
    pub fn events(&self) -> Vec<(String, String)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventRecorder for RecordingRecorder {
    async fn record(&self, _target: &CapacityTarget, reason: &str, note: String) {
        self.events.lock().unwrap().push((reason.to_string(), note));
    }
}

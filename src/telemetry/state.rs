use chrono::{DateTime, Utc};
use kube::{
    runtime::events::{Recorder, Reporter},
    Client,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::metrics::Metrics;
use crate::capacity::{
    clients::{ClusterClientStore, KubeCapacityTargets, ReleaseStore},
    conditions::TimestampPolicy,
    config::Settings,
    SyncHandler, SyncOutcome,
};

// Context for our reconciler
#[derive(Clone)]
pub struct Context {
    /// Management cluster client
    pub client: Client,
    /// Event recorder
    pub recorder: Recorder,
    /// Capacity reconciliation
    pub handler: SyncHandler,
    pub settings: Settings,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: Arc<Metrics>,
}

/// State shared between the controller and the web server
#[derive(Clone, Default)]
pub struct State {
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: Arc<Metrics>,
}

/// State wrapper around the controller outputs for the web server
impl State {
    /// Metrics getter
    pub fn metrics(&self) -> String {
        let mut buffer = String::new();
        let registry = &*self.metrics.registry;
        if let Err(e) = prometheus_client::encoding::text::encode(&mut buffer, registry) {
            tracing::warn!("Unable to encode metrics: {}", e);
        }
        buffer
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    // Create a Controller Context that can update State
    pub async fn to_context(
        &self,
        client: Client,
        releases: Arc<dyn ReleaseStore>,
        clusters: Arc<dyn ClusterClientStore>,
        settings: Settings,
    ) -> Arc<Context> {
        let recorder = self.diagnostics.read().await.recorder(client.clone());
        let handler = SyncHandler {
            capacity_targets: Arc::new(KubeCapacityTargets::new(client.clone())),
            releases,
            clusters,
            recorder: Arc::new(recorder.clone()),
            timestamps: TimestampPolicy::Keep,
        };
        Arc::new(Context {
            client,
            recorder,
            handler,
            settings,
            metrics: self.metrics.clone(),
            diagnostics: self.diagnostics.clone(),
        })
    }
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    /// Key and outcome of the most recent reconciliation
    pub last_reconciled: Option<String>,
    pub last_outcome: Option<LastOutcome>,
    #[serde(skip)]
    pub reporter: Reporter,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastOutcome {
    pub retry: bool,
    pub patches: usize,
    pub status_written: bool,
}

impl From<&SyncOutcome> for LastOutcome {
    fn from(outcome: &SyncOutcome) -> Self {
        Self {
            retry: outcome.retry,
            patches: outcome.patches,
            status_written: outcome.status_written,
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            last_reconciled: None,
            last_outcome: None,
            reporter: "capacity-controller".into(),
        }
    }
}

impl Diagnostics {
    fn recorder(&self, client: Client) -> Recorder {
        Recorder::new(client, self.reporter.clone())
    }
}

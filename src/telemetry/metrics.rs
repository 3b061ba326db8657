use std::{sync::Arc, time::Instant};

use kube::ResourceExt;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::{Registry, Unit},
};

use crate::{
    api::v1::capacity_target::CapacityTarget,
    capacity::{Error, SyncOutcome},
};

#[derive(Clone)]
pub struct Metrics {
    pub reconcile: ReconcileMetrics,
    pub capacity: CapacityMetrics,
    pub registry: Arc<Registry>,
}

impl Default for Metrics {
    fn default() -> Self {
        let mut registry = Registry::with_prefix("capacity_ctrl");
        let reconcile =
            ReconcileMetrics::default().register(registry.sub_registry_with_prefix("reconcile"));
        let capacity = CapacityMetrics::default().register(&mut registry);
        Self {
            registry: Arc::new(registry),
            reconcile,
            capacity,
        }
    }
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
pub struct ErrorLabels {
    pub instance: String,
    pub error: String,
}

#[derive(Clone)]
pub struct ReconcileMetrics {
    pub runs: Counter,
    pub failures: Family<ErrorLabels, Counter>,
    pub duration: Histogram,
}

impl Default for ReconcileMetrics {
    fn default() -> Self {
        Self {
            runs: Counter::default(),
            failures: Family::<ErrorLabels, Counter>::default(),
            duration: Histogram::new([0.01, 0.1, 0.25, 0.5, 1., 5., 15., 60.].into_iter()),
        }
    }
}

impl ReconcileMetrics {
    pub fn register(self, r: &mut Registry) -> Self {
        r.register_with_unit(
            "duration",
            "reconcile duration",
            Unit::Seconds,
            self.duration.clone(),
        );
        r.register("failures", "reconciliation errors", self.failures.clone());
        r.register("runs", "reconciliations", self.runs.clone());
        self
    }

    pub fn set_failure(&self, target: &CapacityTarget, e: &Error) {
        self.failures
            .get_or_create(&ErrorLabels {
                instance: target.name_any(),
                error: e.metric_label(),
            })
            .inc();
    }

    pub fn count_and_measure(&self) -> ReconcileMeasurer {
        self.runs.inc();
        ReconcileMeasurer {
            start: Instant::now(),
            metric: self.duration.clone(),
        }
    }
}

/// Writes against target clusters and the management cluster.
#[derive(Clone, Default)]
pub struct CapacityMetrics {
    pub deployment_patches: Counter,
    pub status_updates: Counter,
    pub retries: Counter,
}

impl CapacityMetrics {
    pub fn register(self, r: &mut Registry) -> Self {
        r.register(
            "deployment_patches",
            "deployment replica patches issued",
            self.deployment_patches.clone(),
        );
        r.register(
            "status_updates",
            "capacity target status updates issued",
            self.status_updates.clone(),
        );
        r.register(
            "retries",
            "reconciliations that asked to be retried",
            self.retries.clone(),
        );
        self
    }

    pub fn observe(&self, outcome: &SyncOutcome) {
        self.deployment_patches.inc_by(outcome.patches as u64);
        if outcome.status_written {
            self.status_updates.inc();
        }
        if outcome.retry {
            self.retries.inc();
        }
    }
}

/// Records the reconcile duration when dropped.
pub struct ReconcileMeasurer {
    start: Instant,
    metric: Histogram,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric.observe(duration);
    }
}

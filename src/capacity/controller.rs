use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use kube::{
    runtime::{
        controller::Action,
        reflector::{self, ObjectRef},
        watcher, Controller, WatchStreamExt,
    },
    Api, Client, ResourceExt,
};
use tracing::{field, info, instrument, warn, Span};

use super::{clients::ClusterClientStore, config::Settings, release::resolve_release, Error};
use crate::{
    api::v1::{capacity_target::CapacityTarget, release::Release},
    telemetry::{
        state::{Context, LastOutcome, State},
        telemetry,
    },
};

pub async fn run(
    state: State,
    client: Client,
    clusters: Arc<dyn ClusterClientStore>,
    settings: Settings,
) {
    let capacity_targets: Api<CapacityTarget> = Api::all(client.clone());
    let releases: Api<Release> = Api::all(client.clone());

    // one release watch feeds both the cache the handler reads and the controller trigger
    let (release_reader, release_writer) = reflector::store();
    let release_stream = watcher(releases, watcher::Config::default())
        .default_backoff()
        .reflect(release_writer)
        .applied_objects();

    info!("Starting controller");
    let context = state
        .to_context(client, Arc::new(release_reader), clusters, settings)
        .await;
    let controller = Controller::new(capacity_targets, watcher::Config::default());
    let targets = controller.store();
    // a release edit (e.g. its replica budget) re-triggers the capacity targets it owns
    let release_mapper = move |release: Release| targets_of_release(&targets.state(), &release);
    controller
        .watches_stream(release_stream, release_mapper)
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
}

/// Capacity targets in the release's namespace that resolve to it.
fn targets_of_release(
    targets: &[Arc<CapacityTarget>],
    release: &Release,
) -> Vec<ObjectRef<CapacityTarget>> {
    let name = release.name_any();
    let namespace = release.namespace();
    targets
        .iter()
        .filter(|target| {
            target.namespace() == namespace
                && resolve_release(target).as_deref() == Some(name.as_str())
        })
        .map(|target| ObjectRef::from_obj(target.as_ref()))
        .collect()
}

#[instrument(skip(object, ctx), fields(trace_id))]
async fn reconcile(object: Arc<CapacityTarget>, ctx: Arc<Context>) -> Result<Action, Error> {
    let trace_id = telemetry::get_trace_id();
    if trace_id != opentelemetry::trace::TraceId::INVALID {
        Span::current().record("trace_id", field::display(&trace_id));
    }
    let _timer = ctx.metrics.reconcile.count_and_measure();
    ctx.diagnostics.write().await.last_event = Utc::now();
    let name = object.name_any();
    let ns = object.namespace().unwrap_or("default".to_string());
    info!("Processing \"{}\" in {}", name, ns);

    let outcome = ctx.handler.try_sync(&ns, &name).await?;
    ctx.metrics.capacity.observe(&outcome);
    {
        let mut diagnostics = ctx.diagnostics.write().await;
        diagnostics.last_reconciled = Some(format!("{ns}/{name}"));
        diagnostics.last_outcome = Some(LastOutcome::from(&outcome));
    }

    if outcome.retry {
        Ok(Action::requeue(ctx.settings.retry))
    } else {
        Ok(Action::requeue(ctx.settings.resync))
    }
}

fn error_policy(object: Arc<CapacityTarget>, err: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", err);
    ctx.metrics.reconcile.set_failure(&object, err);
    match err {
        // only an edit of the capacity target can fix its spec
        Error::InvalidSpec { .. } => Action::await_change(),
        _ => Action::requeue(ctx.settings.retry),
    }
}

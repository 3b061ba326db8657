use std::sync::Arc;

use actix_web::{
    get, middleware, web::Data, App, HttpRequest, HttpResponse, HttpServer, Responder,
};
use clap::Parser;
use kube::{
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use tracing::info;

use capacity_controllers::capacity::{
    clients::KubeClusterRegistry,
    config::{Cli, Settings},
    controller,
};
use capacity_controllers::telemetry::{state::State, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.json_logs).await;
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let kubeconfig = match &cli.kubeconfig {
        Some(path) => Kubeconfig::read_from(path)?,
        None => Kubeconfig::read()?,
    };
    let management = match &cli.management_context {
        Some(context) => {
            let opts = KubeConfigOptions {
                context: Some(context.clone()),
                ..Default::default()
            };
            Client::try_from(Config::from_custom_kubeconfig(kubeconfig.clone(), &opts).await?)?
        }
        None => Client::try_default().await?,
    };
    let clusters = KubeClusterRegistry::from_kubeconfig(&kubeconfig, &cli.clusters).await?;
    info!("Managing capacity on {} clusters", cli.clusters.len());

    let state = State::default();
    let data = Data::new(state.clone());
    let controller = controller::run(
        state.clone(),
        management,
        Arc::new(clusters),
        Settings::from(&cli),
    );
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(middleware::Logger::default().exclude("/health"))
            .service(index)
            .service(health)
            .service(metrics)
    })
    .workers(5)
    .bind(cli.listen)?
    .shutdown_timeout(5);

    tokio::join!(controller, server.run()).1?;
    Ok(())
}

#[get("/metrics")]
async fn metrics(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let metrics = c.metrics();
    HttpResponse::Ok()
        .content_type("application/openmetrics-text; version=1.0.0; charset=utf-8")
        .body(metrics)
}

#[get("/health")]
async fn health(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

#[get("/")]
async fn index(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let d = c.diagnostics().await;
    HttpResponse::Ok().json(&d)
}

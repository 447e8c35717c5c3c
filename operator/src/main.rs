use clap::Parser;
use kube::Client;
use kube::core::GroupVersionKind;
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

mod cluster;
mod config;
mod events;
mod extractor;
mod naming;
mod reconcile;
mod store;
mod supervisor;
mod util;

use config::Config;
use store::Database;
use supervisor::Supervisor;
use util::colors::FG1_COLOR;

/// Main entrypoint that sets up the environment before running the secondary entrypoint `run`.
#[tokio::main]
async fn main() {
    warden_common::init();

    // Exit the whole process on any thread panic, so the container restarts rather than
    // limping along with a dead task.
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));

    let config = Config::parse();

    let client = Client::try_default()
        .await
        .expect("expected a valid KUBECONFIG environment, or an in-cluster service account");

    let pool = warden_common::postgres::create_pool(&config.postgres).expect("failed to build postgres pool");
    let store = Database::new(pool).await.expect("failed to initialize record store");

    let gvk = GroupVersionKind::gvk(
        &config.custom_resource_group,
        &config.custom_resource_version,
        &config.custom_resource_kind,
    );

    let shutdown = CancellationToken::new();

    #[cfg(feature = "metrics")]
    let metrics = util::metrics::ControllerMetrics::new("warden_operator");
    #[cfg(feature = "metrics")]
    if let Some(metrics_port) = config.metrics_port {
        tokio::spawn(util::metrics::run_server(metrics_port, metrics.clone()));
    }

    run(
        client,
        store,
        config,
        gvk,
        shutdown,
        #[cfg(feature = "metrics")]
        metrics,
    )
    .await;
}

async fn run(
    client: Client,
    store: Database,
    config: Config,
    gvk: GroupVersionKind,
    shutdown: CancellationToken,
    #[cfg(feature = "metrics")] metrics: util::metrics::ControllerMetrics,
) {
    warden_common::signal_ready();

    let supervisor = Supervisor::new(
        client,
        store,
        config.namespace.clone(),
        gvk,
        config.custom_resource_plural.clone(),
        config.update_interval(),
        config.verbose(),
        #[cfg(feature = "metrics")]
        metrics,
    );

    let run_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(supervisor.run(shutdown))
    };

    warden_common::shutdown::shutdown_signal().await;
    println!("{}", "shutting down".color(FG1_COLOR));
    shutdown.cancel();
    let _ = run_handle.await;
}

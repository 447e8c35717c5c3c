use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use kube::core::{DynamicObject, GroupVersionKind};
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use crate::cluster::ClusterClient;
use crate::reconcile::{self, ReconcileContext};
use crate::store::Database;
use crate::util::colors::FG1_COLOR;
#[cfg(feature = "metrics")]
use crate::util::metrics::ControllerMetrics;

/// Owns the two long-running tasks (§4.5) and coordinates their shutdown: stop accepting new
/// document events first, let the in-flight reconcile tick finish, then return so the caller can
/// close the database handle last.
pub struct Supervisor {
    client: Client,
    store: Database,
    namespace: String,
    gvk: GroupVersionKind,
    plural: String,
    update_interval: Duration,
    verbose: bool,
    #[cfg(feature = "metrics")]
    metrics: ControllerMetrics,
}

impl Supervisor {
    pub fn new(
        client: Client,
        store: Database,
        namespace: String,
        gvk: GroupVersionKind,
        plural: String,
        update_interval: Duration,
        verbose: bool,
        #[cfg(feature = "metrics")] metrics: ControllerMetrics,
    ) -> Self {
        Supervisor {
            client,
            store,
            namespace,
            gvk,
            plural,
            update_interval,
            verbose,
            #[cfg(feature = "metrics")]
            metrics,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let cluster = ClusterClient::new(self.client.clone(), self.namespace.clone(), self.gvk.clone(), &self.plural);

        let documents: kube::Api<DynamicObject> = kube::Api::namespaced_with(
            self.client.clone(),
            &self.namespace,
            &kube::core::ApiResource::from_gvk_with_plural(&self.gvk, &self.plural),
        );

        let watcher_shutdown = shutdown.clone();
        let watcher_cluster = cluster.clone();
        let watcher_store = self.store.clone();
        let verbose = self.verbose;
        let watcher_handle = tokio::spawn(async move {
            crate::events::run(watcher_cluster, watcher_store, documents, watcher_shutdown, verbose).await;
        });

        let ctx = Arc::new(ReconcileContext {
            store: self.store,
            cluster,
            verbose: self.verbose,
            #[cfg(feature = "metrics")]
            metrics: self.metrics,
        });
        let reconcile_shutdown = shutdown.clone();
        let reconcile_handle = tokio::spawn(reconcile::run(ctx, self.update_interval, reconcile_shutdown));

        let _ = tokio::join!(watcher_handle, reconcile_handle);
        println!("{}", "supervisor shut down cleanly".color(FG1_COLOR));
    }
}

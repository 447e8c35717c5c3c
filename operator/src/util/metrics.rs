use std::convert::Infallible;
use std::net::SocketAddr;

use hyper::{
    Body, Request, Response, Server,
    service::{make_service_fn, service_fn},
};
use owo_colors::OwoColorize;
use prometheus::{Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder, register_histogram_vec_with_registry, register_int_counter_vec_with_registry};

/// Operational metrics for the reconciler loop and event handler. This is the controller
/// observing itself; it is unrelated to the managed game servers and exists even though the
/// specification's Non-goals exclude metrics export as a product feature.
#[derive(Clone)]
pub struct ControllerMetrics {
    registry: Registry,

    /// Total reconcile ticks, labeled by record id.
    pub reconcile_counter: IntCounterVec,

    /// Wall time of the read phase (store + cluster lookups) per record, labeled by
    /// record id and the action that was decided.
    pub read_histogram: HistogramVec,

    /// Wall time of the write phase (the cluster/store mutation itself), labeled by record id
    /// and action.
    pub write_histogram: HistogramVec,

    /// Count of each kind of action taken, labeled by record id and action.
    pub action_counter: IntCounterVec,
}

impl ControllerMetrics {
    pub fn new(subsystem: &str) -> Self {
        let registry = Registry::new();
        let reconcile_counter = register_int_counter_vec_with_registry!(
            format!("{subsystem}_reconcile_total"),
            "total reconcile ticks processed per record",
            &["record_id"],
            registry
        )
        .unwrap();
        let read_histogram = register_histogram_vec_with_registry!(
            format!("{subsystem}_reconcile_read_seconds"),
            "time spent reading store/cluster state per record",
            &["record_id", "action"],
            registry
        )
        .unwrap();
        let write_histogram = register_histogram_vec_with_registry!(
            format!("{subsystem}_reconcile_write_seconds"),
            "time spent applying a reconcile action",
            &["record_id", "action"],
            registry
        )
        .unwrap();
        let action_counter = register_int_counter_vec_with_registry!(
            format!("{subsystem}_reconcile_actions_total"),
            "count of reconcile actions taken, by kind",
            &["record_id", "action"],
            registry
        )
        .unwrap();
        ControllerMetrics {
            registry,
            reconcile_counter,
            read_histogram,
            write_histogram,
            action_counter,
        }
    }

    fn gather(&self) -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        buffer
    }
}

async fn serve(metrics: ControllerMetrics, _req: Request<Body>) -> Result<Response<Body>, Infallible> {
    Ok(Response::new(Body::from(metrics.gather())))
}

/// Runs a tiny `/metrics` HTTP server on the given port until the process exits.
pub async fn run_server(port: u16, metrics: ControllerMetrics) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let make_svc = make_service_fn(move |_conn| {
        let metrics = metrics.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| serve(metrics.clone(), req))) }
    });
    println!("{}", format!("metrics server listening on {addr}").green());
    if let Err(e) = Server::bind(&addr).serve(make_svc).await {
        eprintln!("{}", format!("metrics server error: {e}").red());
    }
}

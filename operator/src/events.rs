use futures::StreamExt;
use kube::ResourceExt;
use kube::core::DynamicObject;
use kube::runtime::watcher;
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cluster::ClusterClient;
use crate::extractor;
use crate::naming;
use crate::store::Database;
use crate::util::colors::{FG1_COLOR, FG2_COLOR};

/// Reacts to create/delete of custom-resource documents (§4.3). Processes one event at a time;
/// since the whole watch stream is consumed by a single task, events are trivially serialized
/// per document (a stronger guarantee than the specification requires).
pub async fn run(
    cluster: ClusterClient,
    store: Database,
    documents: kube::Api<DynamicObject>,
    shutdown: CancellationToken,
    verbose: bool,
) {
    println!("{}", "starting document watcher".color(FG1_COLOR));
    let mut stream = watcher(documents, watcher::Config::default()).boxed();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                println!("{}", "document watcher stopping".color(FG1_COLOR));
                return;
            }
            next = stream.next() => {
                match next {
                    Some(Ok(event)) => handle_event(&cluster, &store, event, verbose).await,
                    Some(Err(e)) => eprintln!("{}", format!("watch error: {e}").color(FG2_COLOR)),
                    None => return,
                }
            }
        }
    }
}

async fn handle_event(cluster: &ClusterClient, store: &Database, event: watcher::Event<DynamicObject>, verbose: bool) {
    match event {
        // `Apply` fires for both the document's creation and any later update. Workload specs
        // are immutable (§4.3), and `create_workload`/`create_service` already treat a 409 as
        // success, so replaying this on every update is a harmless no-op beyond the round trip.
        watcher::Event::Apply(obj) => {
            if verbose {
                println!("{}", format!("add event: {}", obj.name_any()).color(FG1_COLOR));
            }
            on_add(cluster, store, &obj).await
        }
        watcher::Event::Delete(obj) => {
            if verbose {
                println!("{}", format!("delete event: {}", obj.name_any()).color(FG1_COLOR));
            }
            on_delete(cluster, &obj).await
        }
        watcher::Event::Init | watcher::Event::InitApply(_) | watcher::Event::InitDone => {}
    }
}

/// **on-add**: extract the template; if extraction fails, log and drop. Otherwise create the
/// workload and service, then write the service's assigned node-port back into the record
/// (§2: "the event handler … updates the record store with assigned ports"). Cluster-side and
/// store-side failures are not retried in-line — the reconciler repairs them on its next tick.
async fn on_add(cluster: &ClusterClient, store: &Database, document: &DynamicObject) {
    let Some(spec) = document.data.get("spec") else {
        eprintln!(
            "{}",
            format!("{}: document has no spec, dropping", document.name_any()).color(FG2_COLOR)
        );
        return;
    };
    let template = match extractor::extract(spec) {
        Ok(t) => t,
        Err(e) => {
            eprintln!(
                "{}",
                format!("{}: malformed document: {e}", document.name_any()).color(FG2_COLOR)
            );
            return;
        }
    };
    if let Err(e) = cluster.create_workload(&template).await {
        eprintln!(
            "{}",
            format!("{}: failed to create workload: {e}", naming::name(template.id)).color(FG2_COLOR)
        );
        return;
    }
    let port = match cluster.create_service(template.id).await {
        Ok(port) => port,
        Err(e) => {
            eprintln!(
                "{}",
                format!("{}: failed to create service: {e}", naming::name(template.id)).color(FG2_COLOR)
            );
            return;
        }
    };
    if let Err(e) = store.set_port(template.id, port).await {
        eprintln!(
            "{}",
            format!("{}: failed to write back port: {e}", naming::name(template.id)).color(FG2_COLOR)
        );
        return;
    }
    println!(
        "{}",
        format!("{}: created workload and service (port {port})", naming::name(template.id)).color(FG1_COLOR)
    );
}

/// **on-delete**: the document's *name* carries the record identifier (not `spec.id`, to cover
/// garbage-collected documents where `spec` may be absent), but the workload/service are named
/// by `naming::name(id)`, not the raw identifier — parse it first, then address both resources
/// by the same deterministic name the reconciler's `cleanup_terminal` uses. Missing resources
/// are not errors. A document name that isn't a valid identifier is dropped: there is nothing to
/// clean up under a name this controller never created.
async fn on_delete(cluster: &ClusterClient, document: &DynamicObject) {
    let resource_name = document.name_any();
    let Ok(id) = Uuid::parse_str(&resource_name) else {
        eprintln!(
            "{}",
            format!("{resource_name}: document name is not a valid identifier, dropping").color(FG2_COLOR)
        );
        return;
    };
    let name = naming::name(id);
    if let Err(e) = cluster.delete_workload(&name).await {
        eprintln!("{}", format!("{name}: failed to delete workload: {e}").color(FG2_COLOR));
    }
    if let Err(e) = cluster.delete_service(&name).await {
        eprintln!("{}", format!("{name}: failed to delete service: {e}").color(FG2_COLOR));
    }
}

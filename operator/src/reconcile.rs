use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use owo_colors::OwoColorize;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use warden_types::{GameServerRecord, GameServerStatus};

use crate::cluster::ClusterClient;
use crate::naming;
use crate::store::Database;
use crate::util::colors::{FG1_COLOR, FG2_COLOR};
#[cfg(feature = "metrics")]
use crate::util::metrics::ControllerMetrics;

/// A record is live only when its heartbeat falls within this window of "now" (§3 invariant 5).
/// Not environment-configured — the specification fixes this independently of the tick period.
pub const LIVENESS_WINDOW: chrono::Duration = chrono::Duration::seconds(60);

/// The pure decision this loop makes for one record, given only the status and the presence of
/// its workload/service in the cluster. Factored out so it is unit-testable without either
/// adapter, following the decision-function style this codebase already uses for its other
/// operator's planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// status ∈ {offline, error}: tear down document/workload/service; the record itself is
    /// left untouched as a tombstone.
    CleanupTerminal,
    /// status ∈ {created, starting, online} but the workload has vanished: mark the record
    /// offline and release any lingering service.
    MarkOffline,
    /// status ∈ {created, starting, online}, workload present, service absent: create the
    /// service and write back its node-port.
    CreateService,
    /// Both workload and service already exist; nothing to do.
    NoOp,
}

impl Decision {
    pub fn label(self) -> &'static str {
        match self {
            Decision::CleanupTerminal => "cleanup_terminal",
            Decision::MarkOffline => "mark_offline",
            Decision::CreateService => "create_service",
            Decision::NoOp => "noop",
        }
    }
}

/// Implements the branch of §4.4 step 2. Pure and total.
pub fn decide(status: GameServerStatus, workload_present: bool, service_present: bool) -> Decision {
    if status.is_terminal() {
        return Decision::CleanupTerminal;
    }
    if !workload_present {
        return Decision::MarkOffline;
    }
    if !service_present {
        return Decision::CreateService;
    }
    Decision::NoOp
}

pub struct ReconcileContext {
    pub store: Database,
    pub cluster: ClusterClient,
    /// Mirrors `Config::verbose` (`RUN_MODE != "production"`, §6): emits a per-tick record
    /// count and logs `NoOp` decisions, which are silent otherwise.
    pub verbose: bool,
    #[cfg(feature = "metrics")]
    pub metrics: ControllerMetrics,
}

/// Runs the reconciler loop on a timer until cancelled. Each tick is isolated from the next by
/// `update_interval`; a failure in one record's processing logs and moves to the next record,
/// never aborting the tick (§4.4 failure semantics).
pub async fn run(ctx: Arc<ReconcileContext>, update_interval: Duration, shutdown: CancellationToken) {
    println!("{}", format!("reconciler starting, tick every {update_interval:?}").color(FG1_COLOR));
    let mut interval = tokio::time::interval(update_interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                println!("{}", "reconciler stopping".color(FG1_COLOR));
                return;
            }
            _ = interval.tick() => {
                tick(&ctx).await;
            }
        }
    }
}

async fn tick(ctx: &ReconcileContext) {
    let now = Utc::now();
    let mut records = Vec::new();
    let mut seen: HashSet<Uuid> = HashSet::new();

    match ctx.store.live_online_candidates(now, LIVENESS_WINDOW).await {
        Ok(live) => {
            for r in live {
                if seen.insert(r.id) {
                    records.push(r);
                }
            }
        }
        Err(e) => {
            eprintln!("{}", format!("failed to query live online candidates: {e}").color(FG2_COLOR));
            return;
        }
    }

    match remnant_candidate_ids(ctx).await {
        Ok(ids) => {
            for id in ids {
                if !seen.insert(id) {
                    continue;
                }
                match ctx.store.get_record(id).await {
                    Ok(Some(record)) => records.push(record),
                    Ok(None) => {}
                    Err(e) => eprintln!(
                        "{}",
                        format!("{}: failed to fetch remnant record: {e}", naming::name(id)).color(FG2_COLOR)
                    ),
                }
            }
        }
        Err(e) => eprintln!("{}", format!("failed to scan cluster remnants: {e}").color(FG2_COLOR)),
    }

    if ctx.verbose {
        println!("{}", format!("tick: {} record(s) under consideration", records.len()).color(FG1_COLOR));
    }

    for record in &records {
        #[cfg(feature = "metrics")]
        ctx.metrics
            .reconcile_counter
            .with_label_values(&[&record.id.to_string()])
            .inc();

        process_record(ctx, record).await;
    }
}

/// Lists the cluster's managed workloads/services and reverse-maps their names back to
/// identifiers (§9): this is how offline/error records with lingering cluster remnants are
/// surfaced, since they are excluded from the live-online query by definition.
async fn remnant_candidate_ids(ctx: &ReconcileContext) -> Result<Vec<Uuid>, crate::util::Error> {
    let names = ctx.cluster.list_managed_names().await?;
    Ok(names.into_iter().filter_map(|n| naming::parse_name(&n)).collect())
}

async fn process_record(ctx: &ReconcileContext, record: &GameServerRecord) {
    let name = naming::name(record.id);

    #[cfg(feature = "metrics")]
    let read_start = std::time::Instant::now();

    let workload_present = match ctx.cluster.get_workload(&name).await {
        Ok(w) => w.is_some(),
        Err(e) => {
            eprintln!("{}", format!("{name}: failed to read workload: {e}").color(FG2_COLOR));
            return;
        }
    };
    let service_present = match ctx.cluster.get_service(&name).await {
        Ok(s) => s.is_some(),
        Err(e) => {
            eprintln!("{}", format!("{name}: failed to read service: {e}").color(FG2_COLOR));
            return;
        }
    };

    let decision = decide(record.status, workload_present, service_present);

    #[cfg(feature = "metrics")]
    {
        ctx.metrics
            .read_histogram
            .with_label_values(&[&record.id.to_string(), decision.label()])
            .observe(read_start.elapsed().as_secs_f64());
        ctx.metrics
            .action_counter
            .with_label_values(&[&record.id.to_string(), decision.label()])
            .inc();
    }

    #[cfg(feature = "metrics")]
    let write_timer = (decision != Decision::NoOp).then(|| {
        ctx.metrics
            .write_histogram
            .with_label_values(&[&record.id.to_string(), decision.label()])
            .start_timer()
    });

    match decision {
        Decision::CleanupTerminal => cleanup_terminal(ctx, &name).await,
        Decision::MarkOffline => mark_offline(ctx, record.id, &name).await,
        Decision::CreateService => create_service(ctx, record.id, &name).await,
        Decision::NoOp if ctx.verbose => println!("{}", format!("{name}: converged, nothing to do").color(FG1_COLOR)),
        Decision::NoOp => {}
    }

    #[cfg(feature = "metrics")]
    if let Some(timer) = write_timer {
        timer.observe_duration();
    }
}

async fn cleanup_terminal(ctx: &ReconcileContext, name: &str) {
    if let Err(e) = ctx.cluster.delete_document(name).await {
        eprintln!("{}", format!("{name}: failed to delete document: {e}").color(FG2_COLOR));
    }
    if let Err(e) = ctx.cluster.delete_workload(name).await {
        eprintln!("{}", format!("{name}: failed to delete workload: {e}").color(FG2_COLOR));
    }
    if let Err(e) = ctx.cluster.delete_service(name).await {
        eprintln!("{}", format!("{name}: failed to delete service: {e}").color(FG2_COLOR));
    }
}

async fn mark_offline(ctx: &ReconcileContext, id: Uuid, name: &str) {
    if let Err(e) = ctx.store.mark_offline(id).await {
        eprintln!("{}", format!("{name}: failed to mark offline: {e}").color(FG2_COLOR));
        return;
    }
    if let Err(e) = ctx.cluster.delete_service(name).await {
        eprintln!("{}", format!("{name}: failed to delete lingering service: {e}").color(FG2_COLOR));
    }
    println!("{}", format!("{name}: workload vanished, marked offline").color(FG1_COLOR));
}

async fn create_service(ctx: &ReconcileContext, id: Uuid, name: &str) {
    let port = match ctx.cluster.create_service(id).await {
        Ok(port) => port,
        Err(e) => {
            eprintln!("{}", format!("{name}: failed to create service: {e}").color(FG2_COLOR));
            return;
        }
    };
    if let Err(e) = ctx.store.set_port(id, port).await {
        eprintln!("{}", format!("{name}: failed to write back port: {e}").color(FG2_COLOR));
        return;
    }
    println!("{}", format!("{name}: created service, port {port}").color(FG1_COLOR));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_status_always_cleans_up() {
        for status in [GameServerStatus::Offline, GameServerStatus::Error] {
            assert_eq!(decide(status, true, true), Decision::CleanupTerminal);
            assert_eq!(decide(status, false, false), Decision::CleanupTerminal);
        }
    }

    #[test]
    fn vanished_workload_marks_offline_regardless_of_service() {
        assert_eq!(decide(GameServerStatus::Online, false, true), Decision::MarkOffline);
        assert_eq!(decide(GameServerStatus::Online, false, false), Decision::MarkOffline);
        assert_eq!(decide(GameServerStatus::Created, false, true), Decision::MarkOffline);
    }

    #[test]
    fn missing_service_with_present_workload_creates_service() {
        assert_eq!(decide(GameServerStatus::Online, true, false), Decision::CreateService);
        assert_eq!(decide(GameServerStatus::Starting, true, false), Decision::CreateService);
    }

    #[test]
    fn both_present_is_noop() {
        assert_eq!(decide(GameServerStatus::Online, true, true), Decision::NoOp);
        assert_eq!(decide(GameServerStatus::Created, true, true), Decision::NoOp);
    }

    #[test]
    fn decision_is_idempotent_across_repeated_ticks_with_no_change() {
        // Executing the decision function twice with the same presence snapshot must yield the
        // same decision — the core of the idempotence property in SPEC_FULL.md §8.
        let d1 = decide(GameServerStatus::Online, true, true);
        let d2 = decide(GameServerStatus::Online, true, true);
        assert_eq!(d1, d2);
    }
}

use std::time::Duration;

use clap::Parser;
use warden_common::args::PostgresArgs;

use crate::util;

/// Process configuration, loaded entirely from the environment (12-factor style), matching
/// this codebase's other binaries.
#[derive(Parser, Debug, Clone)]
pub struct Config {
    #[command(flatten)]
    pub postgres: PostgresArgs,

    /// Cluster namespace this controller operates in.
    #[arg(long, env = "NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Non-"production" values enable verbose logging.
    #[arg(long, env = "RUN_MODE", default_value = "production")]
    pub run_mode: String,

    /// Reconcile tick period: a duration string ("90s", "2m") or a bare number of seconds.
    /// Missing, unparseable, or zero clamps to the 60s default.
    #[arg(long, env = "UPDATE_INTERVAL")]
    pub update_interval_raw: Option<String>,

    /// Group/version/kind/plural of the watched custom resource. Kept out of the reconciler's
    /// compiled-in types per `SPEC_FULL.md` §1/§6.
    #[arg(long, env = "CUSTOM_RESOURCE_GROUP", default_value = "veverse.com")]
    pub custom_resource_group: String,

    #[arg(long, env = "CUSTOM_RESOURCE_VERSION", default_value = "v1")]
    pub custom_resource_version: String,

    #[arg(long, env = "CUSTOM_RESOURCE_KIND", default_value = "GameServer")]
    pub custom_resource_kind: String,

    #[arg(long, env = "CUSTOM_RESOURCE_PLURAL", default_value = "gameservers")]
    pub custom_resource_plural: String,

    /// Fallback container image, matching this codebase's other `*_IMAGE`-env-configured
    /// operator. Unused per-record: the workload template always carries the document-supplied
    /// `spec.settings.server.image` (§4.2), so this flag has no effect on any cluster object
    /// this controller creates. Retained only as the image a future downloader/init step would
    /// default to.
    #[arg(long, env = "GAME_SERVER_IMAGE", default_value = "")]
    pub game_server_image: String,

    /// Prometheus metrics server scrape port. Disabled by default.
    #[cfg(feature = "metrics")]
    #[arg(long, env = "METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn update_interval(&self) -> Duration {
        util::parse_update_interval(self.update_interval_raw.as_deref())
    }

    pub fn verbose(&self) -> bool {
        self.run_mode != "production"
    }
}

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row in the record store: the controller's view of one game server.
///
/// Mutated by two writers: the game server itself (status, `updated_at` heartbeat) and this
/// controller (status -> offline, port). There is no compare-and-swap; the last writer wins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameServerRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub public: bool,
    pub release_id: Uuid,
    pub world_id: Uuid,
    pub game_mode_id: Uuid,
    pub region_id: Uuid,
    pub server_type: String,
    pub host: String,
    /// 0 means "unassigned".
    pub port: i32,
    pub max_players: i32,
    pub status: GameServerStatus,
    pub status_message: Option<String>,
}

/// Status ∈ {created, starting, online, offline, error}.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameServerStatus {
    Created,
    Starting,
    Online,
    Offline,
    Error,
}

impl GameServerStatus {
    /// The terminal branch of §4.4: workload/service/document are torn down, the record is
    /// left untouched as a tombstone.
    pub fn is_terminal(self) -> bool {
        matches!(self, GameServerStatus::Offline | GameServerStatus::Error)
    }
}

impl FromStr for GameServerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(GameServerStatus::Created),
            "starting" => Ok(GameServerStatus::Starting),
            "online" => Ok(GameServerStatus::Online),
            "offline" => Ok(GameServerStatus::Offline),
            "error" => Ok(GameServerStatus::Error),
            other => Err(format!("unrecognized game server status {other:?}")),
        }
    }
}

impl fmt::Display for GameServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GameServerStatus::Created => "created",
            GameServerStatus::Starting => "starting",
            GameServerStatus::Online => "online",
            GameServerStatus::Offline => "offline",
            GameServerStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// One `{name, value}` pair contributed either by `spec.env` or by a fixed injected variable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The validated projection of a document's `spec` subtree (§4.2). Produced by the extractor,
/// consumed by the cluster client to render a workload + service pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkloadTemplate {
    pub id: Uuid,
    /// In injection order: `spec.env` entries first, then the fixed `VE_*` variables.
    pub env: Vec<EnvVar>,
    pub image: String,
    pub image_pull_secrets: Vec<String>,
    pub host: String,
}

use std::str::FromStr;

use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use tokio_postgres::Row;
use uuid::Uuid;
use warden_common::postgres::strip_sql_comments;
use warden_types::{GameServerRecord, GameServerStatus};

use crate::util::Error;

mod sql {
    pub const TABLES: &str = include_str!("sql/tables.sql");
    pub const LIVE_ONLINE_CANDIDATES: &str = include_str!("sql/live_online_candidates.sql");
    pub const GET_RECORD: &str = include_str!("sql/get_record.sql");
    pub const MARK_OFFLINE: &str = include_str!("sql/mark_offline.sql");
    pub const SET_PORT: &str = include_str!("sql/set_port.sql");
    pub const TOUCH_ENTITY: &str = include_str!("sql/touch_entity.sql");
}

/// The record store adapter (§10.5). Owns a pooled connection and exposes exactly the
/// query/write surface the reconciler and event handler need.
#[derive(Clone)]
pub struct Database {
    pool: deadpool_postgres::Pool,
}

impl Database {
    pub async fn new(pool: deadpool_postgres::Pool) -> Result<Self, Error> {
        let mut conn = pool.get().await?;
        create_tables(&mut conn).await;
        println!("{}", "record store tables ensured".green());

        conn.prepare_cached(sql::LIVE_ONLINE_CANDIDATES).await?;
        conn.prepare_cached(sql::GET_RECORD).await?;
        conn.prepare_cached(sql::MARK_OFFLINE).await?;
        conn.prepare_cached(sql::SET_PORT).await?;
        conn.prepare_cached(sql::TOUCH_ENTITY).await?;

        Ok(Database { pool })
    }

    /// Records that are "live online candidates": status = online and `updated_at` within
    /// `liveness_window` of `now` (§4.4 step 1).
    pub async fn live_online_candidates(
        &self,
        now: DateTime<Utc>,
        liveness_window: chrono::Duration,
    ) -> Result<Vec<GameServerRecord>, Error> {
        let conn = self.pool.get().await?;
        let stmt = conn.prepare_cached(sql::LIVE_ONLINE_CANDIDATES).await?;
        let cutoff = now - liveness_window;
        let rows = conn.query(&stmt, &[&cutoff]).await?;
        rows.iter().map(row_to_record).collect()
    }

    /// Fetches a record by identifier regardless of status, for the reconciler's remnant scan
    /// (§9): cluster objects are reverse-mapped to an id, then looked up here.
    pub async fn get_record(&self, id: Uuid) -> Result<Option<GameServerRecord>, Error> {
        let conn = self.pool.get().await?;
        let stmt = conn.prepare_cached(sql::GET_RECORD).await?;
        let row = conn.query_opt(&stmt, &[&id]).await?;
        row.as_ref().map(row_to_record).transpose()
    }

    /// Marks a record offline. Not transactional with the entity touch, matching this design's
    /// "every update is a single statement" rule (§5).
    pub async fn mark_offline(&self, id: Uuid) -> Result<(), Error> {
        let conn = self.pool.get().await?;
        let stmt = conn.prepare_cached(sql::MARK_OFFLINE).await?;
        conn.execute(&stmt, &[&id]).await?;
        let touch = conn.prepare_cached(sql::TOUCH_ENTITY).await?;
        conn.execute(&touch, &[&id]).await?;
        Ok(())
    }

    /// Writes back the service's assigned node-port.
    pub async fn set_port(&self, id: Uuid, port: i32) -> Result<(), Error> {
        let conn = self.pool.get().await?;
        let stmt = conn.prepare_cached(sql::SET_PORT).await?;
        conn.execute(&stmt, &[&port, &id]).await?;
        let touch = conn.prepare_cached(sql::TOUCH_ENTITY).await?;
        conn.execute(&touch, &[&id]).await?;
        Ok(())
    }
}

fn row_to_record(row: &Row) -> Result<GameServerRecord, Error> {
    let status_str: String = row.try_get("status")?;
    let status = GameServerStatus::from_str(&status_str)
        .map_err(|reason| Error::malformed("status", reason))?;
    Ok(GameServerRecord {
        id: row.try_get("id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        public: row.try_get("public")?,
        release_id: row.try_get("release_id")?,
        world_id: row.try_get("world_id")?,
        game_mode_id: row.try_get("game_mode_id")?,
        region_id: row.try_get("region_id")?,
        server_type: row.try_get("type")?,
        host: row.try_get("host")?,
        port: row.try_get("port")?,
        max_players: row.try_get("max_players")?,
        status,
        status_message: row.try_get("status_message")?,
    })
}

async fn create_tables(conn: &mut deadpool_postgres::Client) {
    let stmts = strip_sql_comments(sql::TABLES);
    let tx = conn.transaction().await.expect("begin tx");
    for stmt in stmts.split(';') {
        let stmt = stmt.trim();
        if stmt.is_empty() {
            continue;
        }
        if let Err(e) = tx.simple_query(stmt).await {
            panic!("failed to execute statement '{stmt}': {e:?}");
        }
    }
    tx.commit().await.expect("commit tx");
}

// 📜 Run audit log - Append-only event trail in SQLite
//
// One row per event, never updated. A run writes:
// - run_started / run_completed / run_failed (entity_type = "run")
// - one event per diagnostic (entity_type = "identity" when the
//   diagnostic names an identity, otherwise "record")

use crate::report::Diagnostic;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }

    /// Event for one diagnostic, keyed by identity id when there is one
    pub fn from_diagnostic(run_id: &str, diagnostic: &Diagnostic, actor: &str) -> Self {
        let (entity_type, entity_id) = match diagnostic.identity_id {
            Some(id) => ("identity", id.to_string()),
            None => ("record", diagnostic.name.clone()),
        };

        Event::new(
            diagnostic.kind.as_str(),
            entity_type,
            &entity_id,
            serde_json::json!({
                "run_id": run_id,
                "severity": diagnostic.kind.severity(),
                "name": diagnostic.name,
                "term": diagnostic.term,
                "source": diagnostic.source.map(|s| s.code()),
                "message": diagnostic.message,
            }),
            actor,
        )
    }
}

pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open audit database: {:?}", path.as_ref()))?;
        AuditLog::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        AuditLog::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        setup(&conn)?;
        Ok(AuditLog { conn })
    }

    pub fn insert_event(&self, event: &Event) -> Result<()> {
        let data_json = serde_json::to_string(&event.data)?;

        self.conn.execute(
            "INSERT INTO events (
                event_id, timestamp, event_type, entity_type, entity_id, data, actor
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.event_id,
                event.timestamp.to_rfc3339(),
                event.event_type,
                event.entity_type,
                event.entity_id,
                data_json,
                event.actor,
            ],
        )?;

        Ok(())
    }

    /// Record every diagnostic of a run in one transaction
    pub fn record_diagnostics(&mut self, run_id: &str, diagnostics: &[Diagnostic], actor: &str) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO events (
                    event_id, timestamp, event_type, entity_type, entity_id, data, actor
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for diagnostic in diagnostics {
                let event = Event::from_diagnostic(run_id, diagnostic, actor);
                stmt.execute(params![
                    event.event_id,
                    event.timestamp.to_rfc3339(),
                    event.event_type,
                    event.entity_type,
                    event.entity_id,
                    serde_json::to_string(&event.data)?,
                    event.actor,
                ])?;
            }
        }
        tx.commit()?;

        Ok(diagnostics.len())
    }

    /// Events for one entity, oldest first
    pub fn events_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
             FROM events
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY id ASC",
        )?;

        let events = stmt
            .query_map(params![entity_type, entity_id], |row| {
                let timestamp_str: String = row.get(1)?;
                let data_json: String = row.get(5)?;

                Ok(Event {
                    event_id: row.get(0)?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                        .map_err(|_| rusqlite::Error::InvalidQuery)?
                        .with_timezone(&Utc),
                    event_type: row.get(2)?,
                    entity_type: row.get(3)?,
                    entity_id: row.get(4)?,
                    data: serde_json::from_str(&data_json)
                        .map_err(|_| rusqlite::Error::InvalidQuery)?,
                    actor: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }

    pub fn count_events(&self, event_type: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM events WHERE event_type = ?1",
            params![event_type],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn setup(conn: &Connection) -> Result<()> {
    // WAL for crash recovery (in-memory databases ignore it)
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

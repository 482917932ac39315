use crate::record::{AnalysisRecord, AnalysisStatus, DerivedResult, InferenceResult, Principal};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;
use std::sync::Mutex;

/// Contract against the external record store. Every operation is scoped
/// to the requesting principal; a record owned by someone else behaves
/// exactly like a record that does not exist.
pub trait RecordStore: Send + Sync {
    /// Insert a new pending record for an upload.
    fn create(&self, principal: &Principal, image_path: &str) -> Result<AnalysisRecord, StoreError>;

    /// Transition a pending record to `success` with its classification.
    fn complete(
        &self,
        principal: &Principal,
        id: i64,
        outcome: &InferenceResult,
    ) -> Result<AnalysisRecord, StoreError>;

    /// Transition a pending record to `failed`, preserving the reason.
    fn fail(&self, principal: &Principal, id: i64, reason: &str)
        -> Result<AnalysisRecord, StoreError>;

    /// All records for the principal, newest first.
    fn list(&self, principal: &Principal) -> Result<Vec<AnalysisRecord>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("analysis record {0} not found")]
    NotFound(i64),
    #[error("analysis record {0} already reached a terminal state")]
    Conflict(i64),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// SQLite-backed record store.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    pub fn open(db_path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS analyses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                created_at TEXT NOT NULL,
                image_path TEXT NOT NULL,
                status TEXT NOT NULL,
                predicted_label TEXT,
                confidence_score REAL,
                failure_reason TEXT,
                result_json TEXT
            )",
            [],
        )?;
        Ok(())
    }

    fn fetch(
        conn: &Connection,
        principal: &Principal,
        id: i64,
    ) -> Result<AnalysisRecord, StoreError> {
        let record = conn
            .query_row(
                "SELECT id, created_at, image_path, status, predicted_label,
                        confidence_score, failure_reason, result_json
                 FROM analyses WHERE id = ? AND owner = ?",
                params![id, principal.as_str()],
                record_from_row,
            )
            .optional()?;

        record.ok_or(StoreError::NotFound(id))
    }

    /// Pending-state gate shared by `complete` and `fail`: anything other
    /// than an owned pending record refuses the transition.
    fn require_pending(
        conn: &Connection,
        principal: &Principal,
        id: i64,
    ) -> Result<(), StoreError> {
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM analyses WHERE id = ? AND owner = ?",
                params![id, principal.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match status.as_deref() {
            None => Err(StoreError::NotFound(id)),
            Some("pending") => Ok(()),
            Some(_) => Err(StoreError::Conflict(id)),
        }
    }
}

impl RecordStore for SqliteRecordStore {
    fn create(&self, principal: &Principal, image_path: &str) -> Result<AnalysisRecord, StoreError> {
        let conn = self.conn.lock().unwrap();
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO analyses (owner, created_at, image_path, status)
             VALUES (?, ?, ?, ?)",
            params![
                principal.as_str(),
                created_at.to_rfc3339(),
                image_path,
                AnalysisStatus::Pending.as_str()
            ],
        )?;
        let id = conn.last_insert_rowid();
        log::debug!("created pending analysis {id} for {principal}");
        Self::fetch(&conn, principal, id)
    }

    fn complete(
        &self,
        principal: &Principal,
        id: i64,
        outcome: &InferenceResult,
    ) -> Result<AnalysisRecord, StoreError> {
        let conn = self.conn.lock().unwrap();
        Self::require_pending(&conn, principal, id)?;

        let derived = DerivedResult {
            probability: outcome.confidence_score,
            timestamp: Utc::now().to_rfc3339(),
        };
        let result_json = serde_json::to_string(&derived)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        conn.execute(
            "UPDATE analyses
             SET status = ?, predicted_label = ?, confidence_score = ?, result_json = ?
             WHERE id = ? AND owner = ?",
            params![
                AnalysisStatus::Success.as_str(),
                outcome.predicted_label,
                outcome.confidence_score,
                result_json,
                id,
                principal.as_str()
            ],
        )?;
        log::info!(
            "analysis {id} completed: {} ({:.4})",
            outcome.predicted_label,
            outcome.confidence_score
        );
        Self::fetch(&conn, principal, id)
    }

    fn fail(
        &self,
        principal: &Principal,
        id: i64,
        reason: &str,
    ) -> Result<AnalysisRecord, StoreError> {
        let conn = self.conn.lock().unwrap();
        Self::require_pending(&conn, principal, id)?;

        conn.execute(
            "UPDATE analyses SET status = ?, failure_reason = ? WHERE id = ? AND owner = ?",
            params![
                AnalysisStatus::Failed.as_str(),
                reason,
                id,
                principal.as_str()
            ],
        )?;
        log::info!("analysis {id} failed: {reason}");
        Self::fetch(&conn, principal, id)
    }

    fn list(&self, principal: &Principal) -> Result<Vec<AnalysisRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, image_path, status, predicted_label,
                    confidence_score, failure_reason, result_json
             FROM analyses WHERE owner = ?
             ORDER BY created_at DESC, id DESC",
        )?;
        let records = stmt
            .query_map(params![principal.as_str()], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AnalysisRecord> {
    Ok(AnalysisRecord {
        id: row.get(0)?,
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(1)?)
            .unwrap()
            .with_timezone(&Utc),
        image_path: row.get(2)?,
        status: AnalysisStatus::from_str(&row.get::<_, String>(3)?).unwrap(),
        predicted_label: row.get(4)?,
        confidence_score: row.get(5)?,
        failure_reason: row.get(6)?,
        result: row
            .get::<_, Option<String>>(7)?
            .and_then(|json| serde_json::from_str(&json).ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteRecordStore {
        SqliteRecordStore::open_in_memory().unwrap()
    }

    fn outcome() -> InferenceResult {
        InferenceResult {
            predicted_label: "PNEUMONIA".to_string(),
            confidence_score: 0.93,
        }
    }

    #[test]
    fn test_create_starts_pending() {
        let store = store();
        let alice = Principal::new("alice");
        let record = store.create(&alice, "uploads/scan.jpg").unwrap();

        assert_eq!(record.status, AnalysisStatus::Pending);
        assert_eq!(record.image_path, "uploads/scan.jpg");
        assert!(record.predicted_label.is_none());
        assert!(record.confidence_score.is_none());
        assert!(record.result.is_none());
        assert!(record.has_consistent_outcome());
    }

    #[test]
    fn test_complete_sets_label_and_score_together() {
        let store = store();
        let alice = Principal::new("alice");
        let pending = store.create(&alice, "uploads/scan.jpg").unwrap();
        let record = store.complete(&alice, pending.id, &outcome()).unwrap();

        assert_eq!(record.status, AnalysisStatus::Success);
        assert_eq!(record.predicted_label.as_deref(), Some("PNEUMONIA"));
        assert_eq!(record.confidence_score, Some(0.93));
        assert!(record.has_consistent_outcome());

        let derived = record.result.unwrap();
        assert_eq!(derived.probability, 0.93);
    }

    #[test]
    fn test_fail_keeps_reason_and_no_outcome() {
        let store = store();
        let alice = Principal::new("alice");
        let pending = store.create(&alice, "uploads/scan.jpg").unwrap();
        let record = store.fail(&alice, pending.id, "model unavailable").unwrap();

        assert_eq!(record.status, AnalysisStatus::Failed);
        assert_eq!(record.failure_reason.as_deref(), Some("model unavailable"));
        assert!(record.predicted_label.is_none());
        assert!(record.confidence_score.is_none());
    }

    #[test]
    fn test_terminal_records_are_immutable() {
        let store = store();
        let alice = Principal::new("alice");
        let pending = store.create(&alice, "uploads/scan.jpg").unwrap();
        store.complete(&alice, pending.id, &outcome()).unwrap();

        assert_eq!(
            store.complete(&alice, pending.id, &outcome()),
            Err(StoreError::Conflict(pending.id))
        );
        assert_eq!(
            store.fail(&alice, pending.id, "late failure"),
            Err(StoreError::Conflict(pending.id))
        );
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let store = store();
        let alice = Principal::new("alice");
        assert_eq!(
            store.complete(&alice, 999, &outcome()),
            Err(StoreError::NotFound(999))
        );
        assert_eq!(
            store.fail(&alice, 999, "whatever"),
            Err(StoreError::NotFound(999))
        );
    }

    #[test]
    fn test_list_is_newest_first() {
        let store = store();
        let alice = Principal::new("alice");
        let first = store.create(&alice, "uploads/one.jpg").unwrap();
        let second = store.create(&alice, "uploads/two.jpg").unwrap();
        let third = store.create(&alice, "uploads/three.jpg").unwrap();

        let records = store.list(&alice).unwrap();
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);

        for pair in records.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
    }

    #[test]
    fn test_list_never_crosses_principals() {
        let store = store();
        let alice = Principal::new("alice");
        let bob = Principal::new("bob");
        store.create(&alice, "uploads/alice.jpg").unwrap();
        let bobs = store.create(&bob, "uploads/bob.jpg").unwrap();

        let records = store.list(&alice).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records.iter().all(|r| r.image_path == "uploads/alice.jpg"));

        // Another principal's record id behaves as if it does not exist.
        assert_eq!(
            store.complete(&alice, bobs.id, &outcome()),
            Err(StoreError::NotFound(bobs.id))
        );
    }
}

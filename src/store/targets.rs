//! TargetManager - actor that owns the weekly-target table
//!
//! A submission lands as one row per working day. Resubmitting the same
//! representative and week replaces the previous rows in one transaction,
//! so readers never see a half-replaced week.

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, params};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

use super::{StoreError, StoreResponse};
use crate::domain::{DailyTargetRow, WeeklyTargetSet, now_ms};

/// Commands sent to the TargetManager actor
#[derive(Debug)]
enum TargetCommand {
    SubmitWeek {
        set: Box<WeeklyTargetSet>,
        reply: oneshot::Sender<StoreResponse<usize>>,
    },
    GetWeek {
        employee_id: String,
        week_number: u32,
        year: i32,
        reply: oneshot::Sender<StoreResponse<Vec<DailyTargetRow>>>,
    },
    Shutdown,
}

/// Handle to send commands to the TargetManager
#[derive(Clone)]
pub struct TargetManager {
    tx: mpsc::Sender<TargetCommand>,
}

impl TargetManager {
    /// Spawn a new TargetManager actor over a SQLite database
    pub fn spawn(db_path: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(db_path = %db_path.as_ref().display(), "spawn: called");
        let db = TargetDb::open(db_path.as_ref())?;

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(db, rx));
        info!("TargetManager spawned");

        Ok(Self { tx })
    }

    /// Store a week's target rows, replacing any prior submission for the
    /// same representative and week. Returns the number of rows written.
    pub async fn submit_week(&self, set: WeeklyTargetSet) -> StoreResponse<usize> {
        debug!(employee_id = %set.employee_id, week = set.week_number, "submit_week: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(TargetCommand::SubmitWeek {
                set: Box::new(set),
                reply: reply_tx,
            })
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)?
    }

    /// Fetch the stored rows for one representative-week
    pub async fn get_week(
        &self,
        employee_id: &str,
        week_number: u32,
        year: i32,
    ) -> StoreResponse<Vec<DailyTargetRow>> {
        debug!(%employee_id, week_number, year, "get_week: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(TargetCommand::GetWeek {
                employee_id: employee_id.to_string(),
                week_number,
                year,
                reply: reply_tx,
            })
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)?
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(TargetCommand::Shutdown).await;
    }
}

async fn actor_loop(mut db: TargetDb, mut rx: mpsc::Receiver<TargetCommand>) {
    debug!("actor_loop: started");
    while let Some(command) = rx.recv().await {
        match command {
            TargetCommand::SubmitWeek { set, reply } => {
                let _ = reply.send(db.submit_week(&set));
            }
            TargetCommand::GetWeek {
                employee_id,
                week_number,
                year,
                reply,
            } => {
                let _ = reply.send(db.get_week(&employee_id, week_number, year));
            }
            TargetCommand::Shutdown => {
                debug!("actor_loop: shutdown");
                break;
            }
        }
    }
    debug!("actor_loop: exited");
}

struct TargetDb {
    conn: Connection,
}

impl TargetDb {
    fn open(path: &Path) -> eyre::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS weekly_targets (
                id TEXT PRIMARY KEY,
                employee_id TEXT NOT NULL,
                rep_name TEXT NOT NULL,
                week_number INTEGER NOT NULL,
                week_year INTEGER NOT NULL,
                week_start_date TEXT NOT NULL,
                week_end_date TEXT NOT NULL,
                target_date TEXT NOT NULL,
                total_visit_plan INTEGER NOT NULL,
                nbd_visit_plan INTEGER NOT NULL,
                crr_visit_plan INTEGER NOT NULL,
                total_conversion_percent_plan REAL NOT NULL,
                nbd_conversion_percent_plan REAL NOT NULL,
                crr_conversion_percent_plan REAL NOT NULL,
                total_revenue_target REAL NOT NULL,
                nbd_revenue_target REAL NOT NULL,
                crr_revenue_target REAL NOT NULL,
                per_day_revenue_total REAL NOT NULL,
                per_day_nbd_revenue REAL NOT NULL,
                per_day_crr_revenue REAL NOT NULL,
                created_by TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_weekly_targets_week
                ON weekly_targets (employee_id, week_number, week_year);",
        )?;
        Ok(Self { conn })
    }

    fn submit_week(&mut self, set: &WeeklyTargetSet) -> StoreResponse<usize> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM weekly_targets
             WHERE employee_id = ?1 AND week_number = ?2 AND week_year = ?3",
            params![set.employee_id, set.week_number, set.week_year],
        )?;

        let created_at = now_ms();
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO weekly_targets (
                    id, employee_id, rep_name, week_number, week_year,
                    week_start_date, week_end_date, target_date,
                    total_visit_plan, nbd_visit_plan, crr_visit_plan,
                    total_conversion_percent_plan, nbd_conversion_percent_plan, crr_conversion_percent_plan,
                    total_revenue_target, nbd_revenue_target, crr_revenue_target,
                    per_day_revenue_total, per_day_nbd_revenue, per_day_crr_revenue,
                    created_by, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                          ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
            )?;
            for row in &set.daily {
                stmt.execute(params![
                    Uuid::now_v7().to_string(),
                    row.employee_id,
                    row.rep_name,
                    row.week_number,
                    row.week_year,
                    row.week_start_date.to_string(),
                    row.week_end_date.to_string(),
                    row.target_date.to_string(),
                    row.total_visit_plan,
                    row.nbd_visit_plan,
                    row.crr_visit_plan,
                    row.total_conversion_percent_plan,
                    row.nbd_conversion_percent_plan,
                    row.crr_conversion_percent_plan,
                    row.total_revenue_target,
                    row.nbd_revenue_target,
                    row.crr_revenue_target,
                    row.per_day_revenue_total,
                    row.per_day_nbd_revenue,
                    row.per_day_crr_revenue,
                    row.created_by,
                    created_at,
                ])?;
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn get_week(&self, employee_id: &str, week_number: u32, year: i32) -> StoreResponse<Vec<DailyTargetRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT employee_id, rep_name, week_number, week_year,
                    week_start_date, week_end_date, target_date,
                    total_visit_plan, nbd_visit_plan, crr_visit_plan,
                    total_conversion_percent_plan, nbd_conversion_percent_plan, crr_conversion_percent_plan,
                    total_revenue_target, nbd_revenue_target, crr_revenue_target,
                    per_day_revenue_total, per_day_nbd_revenue, per_day_crr_revenue,
                    created_by
             FROM weekly_targets
             WHERE employee_id = ?1 AND week_number = ?2 AND week_year = ?3
             ORDER BY target_date",
        )?;

        let rows = stmt.query_map(params![employee_id, week_number, year], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, i32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, u32>(7)?,
                row.get::<_, u32>(8)?,
                row.get::<_, u32>(9)?,
                row.get::<_, f64>(10)?,
                row.get::<_, f64>(11)?,
                row.get::<_, f64>(12)?,
                row.get::<_, f64>(13)?,
                row.get::<_, f64>(14)?,
                row.get::<_, f64>(15)?,
                row.get::<_, f64>(16)?,
                row.get::<_, f64>(17)?,
                row.get::<_, f64>(18)?,
                row.get::<_, String>(19)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let r = row?;
            out.push(DailyTargetRow {
                employee_id: r.0,
                rep_name: r.1,
                week_number: r.2,
                week_year: r.3,
                week_start_date: parse_date(&r.4)?,
                week_end_date: parse_date(&r.5)?,
                target_date: parse_date(&r.6)?,
                total_visit_plan: r.7,
                nbd_visit_plan: r.8,
                crr_visit_plan: r.9,
                total_conversion_percent_plan: r.10,
                nbd_conversion_percent_plan: r.11,
                crr_conversion_percent_plan: r.12,
                total_revenue_target: r.13,
                nbd_revenue_target: r.14,
                crr_revenue_target: r.15,
                per_day_revenue_total: r.16,
                per_day_nbd_revenue: r.17,
                per_day_crr_revenue: r.18,
                created_by: r.19,
            });
        }
        Ok(out)
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, StoreError> {
    s.parse()
        .map_err(|_| StoreError::Serialization(format!("bad date in store: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TargetSubmission;

    fn submission() -> TargetSubmission {
        TargetSubmission {
            name: "A. Mehta".to_string(),
            total_visit_plan: 48,
            nbd_visit_plan: 18,
            crr_visit_plan: 30,
            total_revenue_target: 90_000.0,
            nbd_revenue_target: 30_000.0,
            crr_revenue_target: 60_000.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_submit_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TargetManager::spawn(dir.path().join("targets.db")).unwrap();

        let set = WeeklyTargetSet::from_submission("emp-7", &submission(), 23, 2024, 6, "admin").unwrap();
        let written = manager.submit_week(set).await.unwrap();
        assert_eq!(written, 6);

        let rows = manager.get_week("emp-7", 23, 2024).await.unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].rep_name, "A. Mehta");
        // Rows come back date-ordered, Monday first
        assert!(rows.windows(2).all(|w| w[0].target_date < w[1].target_date));
        assert_eq!(rows[0].per_day_revenue_total, 15_000.0);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_resubmission_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TargetManager::spawn(dir.path().join("targets.db")).unwrap();

        let first = WeeklyTargetSet::from_submission("emp-7", &submission(), 23, 2024, 6, "admin").unwrap();
        manager.submit_week(first).await.unwrap();

        let mut revised = submission();
        revised.total_revenue_target = 120_000.0;
        let second = WeeklyTargetSet::from_submission("emp-7", &revised, 23, 2024, 6, "admin").unwrap();
        manager.submit_week(second).await.unwrap();

        let rows = manager.get_week("emp-7", 23, 2024).await.unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].total_revenue_target, 120_000.0);
        assert_eq!(rows[0].per_day_revenue_total, 20_000.0);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_get_week_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TargetManager::spawn(dir.path().join("targets.db")).unwrap();
        let rows = manager.get_week("nobody", 1, 2024).await.unwrap();
        assert!(rows.is_empty());
        manager.shutdown().await;
    }
}

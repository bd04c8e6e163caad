//! SQLite session history with Diesel ORM
//!
//! Completed sessions land here when the user ends them: one summary row in
//! `play_sessions` plus the individual row records in `play_rows`. The live
//! session itself is never in the database; that's the snapshot file's job.

use crate::ledger::Rate;
use crate::schema::*;
use crate::session::{RowRecord, SessionSummary};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use std::path::Path;

const DEFAULT_DB_PATH: &str = "pachilog.db";

// ============================================================================
// Diesel Models
// ============================================================================

/// Insertable session summary
#[derive(Insertable)]
#[diesel(table_name = play_sessions)]
pub struct NewPlaySession<'a> {
    pub date: &'a str,
    pub shop_name: &'a str,
    pub table_number: i32,
    pub rate: &'a str,
    pub started_at: &'a str,
    pub ended_at: &'a str,
    pub duration_min: i32,
    pub row_count: i32,
    pub total_invest: i32,
    pub total_used_balls: i32,
    pub total_spins: i32,
    pub avg_spin_rate: f64,
    pub final_balls: i32,
    pub recorded_at: &'a str,
}

/// Queryable session summary (database record)
#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = play_sessions)]
pub struct StoredSession {
    pub id: i32,
    pub date: String,
    pub shop_name: String,
    pub table_number: i32,
    pub rate: String,
    pub started_at: String,
    pub ended_at: String,
    pub duration_min: i32,
    pub row_count: i32,
    pub total_invest: i32,
    pub total_used_balls: i32,
    pub total_spins: i32,
    pub avg_spin_rate: f64,
    pub final_balls: i32,
    pub recorded_at: String,
}

/// Insertable row record
#[derive(Insertable)]
#[diesel(table_name = play_rows)]
pub struct NewPlayRow<'a> {
    pub session_id: i32,
    pub row_index: i32,
    pub time: &'a str,
    pub used_balls: i32,
    pub start_spin: i32,
    pub end_spin: i32,
    pub normal_spins: i32,
    pub spin_rate: f64,
    pub gained_balls: i32,
    pub rounds: i32,
    pub payout_per_round: f64,
}

/// Queryable row record
#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = play_rows)]
pub struct StoredRow {
    pub id: i32,
    pub session_id: i32,
    pub row_index: i32,
    pub time: String,
    pub used_balls: i32,
    pub start_spin: i32,
    pub end_spin: i32,
    pub normal_spins: i32,
    pub spin_rate: f64,
    pub gained_balls: i32,
    pub rounds: i32,
    pub payout_per_round: f64,
}

// ============================================================================
// Database Connection
// ============================================================================

type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Database connection wrapper with connection pool
pub struct Database {
    pool: DbPool,
}

/// Error type for database operations
#[derive(Debug)]
pub enum DbError {
    Connection(String),
    Query(diesel::result::Error),
    Pool(diesel::r2d2::Error),
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbError::Connection(msg) => write!(f, "Connection error: {}", msg),
            DbError::Query(e) => write!(f, "Query error: {}", e),
            DbError::Pool(e) => write!(f, "Pool error: {}", e),
        }
    }
}

impl std::error::Error for DbError {}

impl From<diesel::result::Error> for DbError {
    fn from(e: diesel::result::Error) -> Self {
        DbError::Query(e)
    }
}

impl From<diesel::r2d2::Error> for DbError {
    fn from(e: diesel::r2d2::Error) -> Self {
        DbError::Pool(e)
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Helper for raw SQL avg query
#[derive(QueryableByName)]
struct AvgResult {
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Double>)]
    avg: Option<f64>,
}

impl Database {
    /// Get the default database path
    pub fn db_path() -> std::path::PathBuf {
        std::path::PathBuf::from(DEFAULT_DB_PATH)
    }

    /// Open database at default path
    pub fn open() -> Result<Self> {
        Self::open_at(DEFAULT_DB_PATH)
    }

    /// Open database at specified path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(&path_str);
        let pool = Pool::builder()
            .max_size(5)
            .build(manager)
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    fn get_conn(&self) -> Result<DbConn> {
        self.pool.get().map_err(|e| DbError::Connection(e.to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let mut conn = self.get_conn()?;

        // Run raw SQL to create tables if they don't exist
        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS play_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                date TEXT NOT NULL,
                shop_name TEXT NOT NULL,
                table_number INTEGER NOT NULL,
                rate TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT NOT NULL,
                duration_min INTEGER NOT NULL,
                row_count INTEGER NOT NULL,
                total_invest INTEGER NOT NULL,
                total_used_balls INTEGER NOT NULL,
                total_spins INTEGER NOT NULL,
                avg_spin_rate REAL NOT NULL,
                final_balls INTEGER NOT NULL,
                recorded_at TEXT NOT NULL
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS play_rows (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                session_id INTEGER NOT NULL,
                row_index INTEGER NOT NULL,
                time TEXT NOT NULL,
                used_balls INTEGER NOT NULL,
                start_spin INTEGER NOT NULL,
                end_spin INTEGER NOT NULL,
                normal_spins INTEGER NOT NULL,
                spin_rate REAL NOT NULL,
                gained_balls INTEGER NOT NULL,
                rounds INTEGER NOT NULL,
                payout_per_round REAL NOT NULL,
                FOREIGN KEY (session_id) REFERENCES play_sessions(id)
            )
        "#).execute(&mut conn)?;

        // Create indexes
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_sessions_date ON play_sessions(date)")
            .execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_rows_session ON play_rows(session_id)")
            .execute(&mut conn)?;

        Ok(())
    }

    // ========================================================================
    // Session History
    // ========================================================================

    /// Store a completed session and its row records
    pub fn insert_session(&self, summary: &SessionSummary, rows: &[RowRecord]) -> Result<i32> {
        let mut conn = self.get_conn()?;
        let now = chrono::Local::now().to_rfc3339();
        let rate_str = summary.rate.to_string();

        let new_session = NewPlaySession {
            date: &summary.date,
            shop_name: &summary.shop_name,
            table_number: summary.table_number as i32,
            rate: &rate_str,
            started_at: &summary.started_at,
            ended_at: &summary.ended_at,
            duration_min: summary.duration_min as i32,
            row_count: summary.row_count as i32,
            total_invest: summary.total_invest as i32,
            total_used_balls: summary.total_used_balls as i32,
            total_spins: summary.total_spins as i32,
            avg_spin_rate: summary.avg_spin_rate,
            final_balls: summary.final_balls as i32,
            recorded_at: &now,
        };

        diesel::insert_into(play_sessions::table)
            .values(&new_session)
            .execute(&mut conn)?;

        // Get last insert ID
        let session_id: i32 = diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>(
            "last_insert_rowid()",
        ))
        .first(&mut conn)?;

        for (i, row) in rows.iter().enumerate() {
            let new_row = NewPlayRow {
                session_id,
                row_index: i as i32,
                time: &row.time,
                used_balls: row.used_balls as i32,
                start_spin: row.start_spin as i32,
                end_spin: row.end_spin as i32,
                normal_spins: row.normal_spins as i32,
                spin_rate: row.spin_rate,
                gained_balls: row.gained_balls as i32,
                rounds: row.rounds as i32,
                payout_per_round: row.payout_per_round,
            };
            diesel::insert_into(play_rows::table)
                .values(&new_row)
                .execute(&mut conn)?;
        }

        Ok(session_id)
    }

    /// Get recent sessions, newest first
    pub fn recent_sessions(&self, limit: i64) -> Result<Vec<StoredSession>> {
        let mut conn = self.get_conn()?;
        let sessions = play_sessions::table
            .order(play_sessions::recorded_at.desc())
            .limit(limit)
            .load::<StoredSession>(&mut conn)?;
        Ok(sessions)
    }

    /// Get one session by id
    pub fn get_session(&self, session_id: i32) -> Result<Option<StoredSession>> {
        let mut conn = self.get_conn()?;
        let session = play_sessions::table
            .filter(play_sessions::id.eq(session_id))
            .first::<StoredSession>(&mut conn)
            .optional()?;
        Ok(session)
    }

    /// Get the row records of a session, in play order
    pub fn session_rows(&self, session_id: i32) -> Result<Vec<StoredRow>> {
        let mut conn = self.get_conn()?;
        let rows = play_rows::table
            .filter(play_rows::session_id.eq(session_id))
            .order(play_rows::row_index.asc())
            .load::<StoredRow>(&mut conn)?;
        Ok(rows)
    }

    /// Lifetime statistics across all stored sessions
    pub fn lifetime_stats(&self) -> Result<LifetimeStats> {
        let mut conn = self.get_conn()?;

        let session_count: i64 = play_sessions::table.count().get_result(&mut conn)?;

        let total_invest: Option<i64> = play_sessions::table
            .select(diesel::dsl::sum(play_sessions::total_invest))
            .first(&mut conn)?;

        let total_spins: Option<i64> = play_sessions::table
            .select(diesel::dsl::sum(play_sessions::total_spins))
            .first(&mut conn)?;

        // Use raw SQL for avg since Diesel's avg returns Numeric type
        let avg_spin_rate: Option<f64> =
            diesel::sql_query("SELECT AVG(avg_spin_rate) as avg FROM play_sessions")
                .get_result::<AvgResult>(&mut conn)
                .ok()
                .and_then(|r| r.avg);

        Ok(LifetimeStats {
            session_count: session_count as i32,
            total_invest: total_invest.unwrap_or(0),
            total_spins: total_spins.unwrap_or(0),
            avg_spin_rate,
        })
    }

    /// Clear all history
    pub fn clear(&self) -> Result<usize> {
        let mut conn = self.get_conn()?;
        diesel::delete(play_rows::table).execute(&mut conn)?;
        let count = diesel::delete(play_sessions::table).execute(&mut conn)?;
        Ok(count)
    }
}

/// Aggregates across every stored session
#[derive(Debug, Clone, serde::Serialize)]
pub struct LifetimeStats {
    pub session_count: i32,
    pub total_invest: i64,
    pub total_spins: i64,
    pub avg_spin_rate: Option<f64>,
}

/// Rate as stored in the db, parsed back. Unknown strings read as 4-yen.
pub fn parse_rate(s: &str) -> Rate {
    match s {
        "1yen" => Rate::OneYen,
        _ => Rate::FourYen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_db(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("pachilog_test_{}_{}.db", name, std::process::id()));
        std::fs::remove_file(&p).ok();
        p
    }

    fn sample_summary() -> SessionSummary {
        SessionSummary {
            date: "2026-08-23".to_string(),
            shop_name: "Marion".to_string(),
            table_number: 123,
            rate: Rate::FourYen,
            started_at: "10:00".to_string(),
            ended_at: "13:15".to_string(),
            duration_min: 195,
            row_count: 1,
            total_invest: 10_000,
            total_used_balls: 500,
            total_spins: 200,
            avg_spin_rate: 100.0,
            final_balls: 1450,
        }
    }

    fn sample_row() -> RowRecord {
        RowRecord {
            time: "10:30".to_string(),
            used_balls: 500,
            start_spin: 0,
            end_spin: 200,
            normal_spins: 200,
            spin_rate: 100.0,
            gained_balls: 1450,
            rounds: 10,
            payout_per_round: 145.0,
        }
    }

    #[test]
    fn test_insert_and_read_back() {
        let path = temp_db("insert");
        let db = Database::open_at(&path).unwrap();

        let id = db.insert_session(&sample_summary(), &[sample_row()]).unwrap();
        assert!(id > 0);

        let sessions = db.recent_sessions(10).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].shop_name, "Marion");
        assert_eq!(sessions[0].rate, "4yen");
        assert_eq!(sessions[0].total_invest, 10_000);

        let rows = db.session_rows(id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].used_balls, 500);
        assert_eq!(rows[0].spin_rate, 100.0);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_lifetime_stats_and_clear() {
        let path = temp_db("stats");
        let db = Database::open_at(&path).unwrap();

        db.insert_session(&sample_summary(), &[]).unwrap();
        db.insert_session(&sample_summary(), &[]).unwrap();

        let stats = db.lifetime_stats().unwrap();
        assert_eq!(stats.session_count, 2);
        assert_eq!(stats.total_invest, 20_000);
        assert_eq!(stats.avg_spin_rate, Some(100.0));

        let removed = db.clear().unwrap();
        assert_eq!(removed, 2);
        assert_eq!(db.lifetime_stats().unwrap().session_count, 0);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("1yen"), Rate::OneYen);
        assert_eq!(parse_rate("4yen"), Rate::FourYen);
        assert_eq!(parse_rate("???"), Rate::FourYen);
    }
}

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;

/// One row of the training history.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRecord {
    pub generation: u32,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub std_fitness: f64,
    pub best_score: u32,
    pub best_lifespan: u32,
    /// RFC 3339, filled in on insert.
    pub created_at: String,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS generations (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    generation     INTEGER NOT NULL,
    best_fitness   REAL NOT NULL,
    mean_fitness   REAL NOT NULL,
    std_fitness    REAL NOT NULL,
    best_score     INTEGER NOT NULL,
    best_lifespan  INTEGER NOT NULL,
    created_at     TEXT NOT NULL
)";

const COLUMNS: &str =
    "generation, best_fitness, mean_fitness, std_fitness, best_score, best_lifespan, created_at";

pub fn init_db(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(path)?;
    conn.execute(SCHEMA, [])?;
    Ok(conn)
}

pub fn init_memory_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute(SCHEMA, [])?;
    Ok(conn)
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<GenerationRecord> {
    Ok(GenerationRecord {
        generation: row.get(0)?,
        best_fitness: row.get(1)?,
        mean_fitness: row.get(2)?,
        std_fitness: row.get(3)?,
        best_score: row.get(4)?,
        best_lifespan: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Append a generation, stamping it with the current time.
pub fn insert_generation(conn: &Connection, record: &GenerationRecord) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        &format!("INSERT INTO generations ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            record.generation,
            record.best_fitness,
            record.mean_fitness,
            record.std_fitness,
            record.best_score,
            record.best_lifespan,
            now,
        ],
    )?;
    Ok(())
}

pub fn generations(conn: &Connection) -> Result<Vec<GenerationRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM generations ORDER BY id"))?;
    let rows = stmt.query_map([], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Generation with the highest best fitness; the earliest wins ties.
pub fn best_generation(conn: &Connection) -> Result<Option<GenerationRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM generations ORDER BY best_fitness DESC, id ASC LIMIT 1"),
            [],
            from_row,
        )
        .optional()?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(generation: u32, best_fitness: f64) -> GenerationRecord {
        GenerationRecord {
            generation,
            best_fitness,
            mean_fitness: best_fitness / 2.0,
            std_fitness: 1.5,
            best_score: generation,
            best_lifespan: 40 + generation,
            created_at: String::new(),
        }
    }

    #[test]
    fn history_round_trips_in_insert_order() {
        let conn = init_memory_db().unwrap();
        for (g, f) in [(0, 12.0), (1, 80.5), (2, 33.0)] {
            insert_generation(&conn, &record(g, f)).unwrap();
        }
        let rows = generations(&conn).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].best_fitness, 80.5);
        assert_eq!(rows[2].best_lifespan, 42);
        assert!(chrono::DateTime::parse_from_rfc3339(&rows[0].created_at).is_ok());
    }

    #[test]
    fn best_generation_prefers_the_earliest_tie() {
        let conn = init_memory_db().unwrap();
        assert!(best_generation(&conn).unwrap().is_none());
        for (g, f) in [(0, 5.0), (1, 9.0), (2, 9.0)] {
            insert_generation(&conn, &record(g, f)).unwrap();
        }
        assert_eq!(best_generation(&conn).unwrap().unwrap().generation, 1);
    }

    #[test]
    fn file_database_creates_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("history.db");
        let conn = init_db(&path).unwrap();
        insert_generation(&conn, &record(0, 1.0)).unwrap();
        drop(conn);
        let conn = init_db(&path).unwrap();
        assert_eq!(generations(&conn).unwrap().len(), 1);
    }
}

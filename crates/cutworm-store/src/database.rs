//! Periodic snapshot writer for per-bin genotype counts.

use cutworm_core::{DatabaseConfig, Error, Frame, Genotype, Result};
use sqlx::sqlite::SqlitePool;
use sqlx::{Column, Row};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{debug, info, instrument};

const META_TABLE: &str = "snapshot_meta";

/// Provenance row stored in every snapshot file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMeta {
    pub run: String,
    pub start_tick: u64,
    pub end_tick: u64,
    pub created_at: i64,
}

/// Writes a snapshot file every `spacing` ticks.
pub struct Database {
    spacing: u64,
    file_name: String,
    output_dir: PathBuf,
    prev_dump: u64,
    next_dump: u64,
    runtime: Runtime,
}

impl Database {
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        Self::with_prev_dump(config, 0)
    }

    /// Resume a schedule whose last dump happened at `prev_dump`
    pub fn with_prev_dump(config: &DatabaseConfig, prev_dump: u64) -> Result<Self> {
        if config.spacing == 0 {
            return Err(Error::Config("database spacing must be positive".to_string()));
        }

        std::fs::create_dir_all(&config.output_dir).map_err(|e| {
            Error::Database(format!("Failed to create snapshot directory: {}", e))
        })?;

        Ok(Self {
            spacing: config.spacing,
            file_name: config.file_name.clone(),
            output_dir: config.output_dir.clone(),
            prev_dump,
            next_dump: prev_dump + config.spacing,
            runtime: build_runtime()?,
        })
    }

    pub fn prev_dump(&self) -> u64 {
        self.prev_dump
    }

    pub fn next_dump(&self) -> u64 {
        self.next_dump
    }

    pub fn is_due(&self, tick: u64) -> bool {
        tick == self.next_dump
    }

    /// Path of the snapshot covering `(start, end]`
    pub fn snapshot_path(&self, start: u64, end: u64) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}-{}.sqlite", self.file_name, start, end))
    }

    /// Dump `frames` if `tick` is a snapshot tick.
    ///
    /// Returns the written path; the caller must then clear the in-memory
    /// series the frames were built from.
    #[instrument(skip(self, frames), fields(run = %self.file_name))]
    pub fn save<F>(&mut self, tick: u64, frames: F) -> Result<Option<PathBuf>>
    where
        F: FnOnce() -> Vec<Frame>,
    {
        if !self.is_due(tick) {
            return Ok(None);
        }

        let frames: Vec<Frame> = frames().into_iter().filter(|f| !f.is_empty()).collect();
        let path = self.snapshot_path(self.prev_dump, self.next_dump);
        let meta = SnapshotMeta {
            run: self.file_name.clone(),
            start_tick: self.prev_dump,
            end_tick: self.next_dump,
            created_at: chrono::Utc::now().timestamp(),
        };

        self.runtime.block_on(write_snapshot(&path, &meta, &frames))?;

        info!(
            path = %path.display(),
            tables = frames.len(),
            start_tick = meta.start_tick,
            end_tick = meta.end_tick,
            "Snapshot written"
        );

        self.prev_dump = self.next_dump;
        self.next_dump = self.prev_dump + self.spacing;
        Ok(Some(path))
    }

    /// Read every count table of a snapshot file
    pub fn load(path: &Path) -> Result<(SnapshotMeta, Vec<Frame>)> {
        build_runtime()?.block_on(read_snapshot(path))
    }
}

fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(Error::Io)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn db_err(context: &str) -> impl Fn(sqlx::Error) -> Error + '_ {
    move |e| Error::Database(format!("{}: {}", context, e))
}

async fn connect(path: &Path) -> Result<SqlitePool> {
    SqlitePool::connect(&format!("sqlite:{}?mode=rwc", path.display()))
        .await
        .map_err(db_err("Failed to connect to database"))
}

async fn write_snapshot(path: &Path, meta: &SnapshotMeta, frames: &[Frame]) -> Result<()> {
    let partial = path.with_extension("sqlite.partial");
    if tokio::fs::try_exists(&partial).await? {
        tokio::fs::remove_file(&partial).await?;
    }

    let pool = connect(&partial).await?;
    let mut tx = pool.begin().await.map_err(db_err("Failed to begin"))?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE {} (
            run TEXT NOT NULL,
            start_tick INTEGER NOT NULL,
            end_tick INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
        META_TABLE
    ))
    .execute(&mut *tx)
    .await
    .map_err(db_err("Failed to create meta table"))?;

    sqlx::query(&format!(
        "INSERT INTO {} (run, start_tick, end_tick, created_at) VALUES (?1, ?2, ?3, ?4)",
        META_TABLE
    ))
    .bind(&meta.run)
    .bind(meta.start_tick as i64)
    .bind(meta.end_tick as i64)
    .bind(meta.created_at)
    .execute(&mut *tx)
    .await
    .map_err(db_err("Failed to store snapshot meta"))?;

    for frame in frames {
        let table = quote_ident(&frame.name);
        let genotypes: Vec<Genotype> = frame.columns.keys().copied().collect();
        let columns: Vec<String> = genotypes.iter().map(|g| quote_ident(g.as_str())).collect();

        let mut ddl = format!("CREATE TABLE {} (tick INTEGER PRIMARY KEY", table);
        for column in &columns {
            ddl.push_str(&format!(", {} INTEGER NOT NULL", column));
        }
        ddl.push_str(", percent_resistant REAL)");
        sqlx::query(&ddl)
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to create count table"))?;

        let placeholders: Vec<String> = (0..columns.len() + 2).map(|i| format!("?{}", i + 1)).collect();
        let insert = format!(
            "INSERT INTO {} (tick, {}percent_resistant) VALUES ({})",
            table,
            columns.iter().map(|c| format!("{}, ", c)).collect::<String>(),
            placeholders.join(", ")
        );

        for row in 0..frame.rows() {
            let mut query = sqlx::query(&insert).bind(frame.ticks[row] as i64);
            for genotype in &genotypes {
                query = query.bind(frame.count(*genotype, row) as i64);
            }
            let percent = frame.percent_resistant(row);
            query = query.bind(if percent.is_nan() { None } else { Some(percent) });
            query
                .execute(&mut *tx)
                .await
                .map_err(db_err("Failed to store counts"))?;
        }
        debug!(table = %frame.name, rows = frame.rows(), "Stored count table");
    }

    tx.commit().await.map_err(db_err("Failed to commit"))?;
    pool.close().await;

    tokio::fs::rename(&partial, path).await?;
    Ok(())
}

async fn read_snapshot(path: &Path) -> Result<(SnapshotMeta, Vec<Frame>)> {
    if !path.exists() {
        return Err(Error::NotFound(format!("snapshot {}", path.display())));
    }
    let pool = connect(path).await?;

    let row = sqlx::query(&format!(
        "SELECT run, start_tick, end_tick, created_at FROM {} LIMIT 1",
        META_TABLE
    ))
    .fetch_one(&pool)
    .await
    .map_err(db_err("Failed to read snapshot meta"))?;
    let meta = SnapshotMeta {
        run: row.get("run"),
        start_tick: row.get::<i64, _>("start_tick") as u64,
        end_tick: row.get::<i64, _>("end_tick") as u64,
        created_at: row.get("created_at"),
    };

    let tables: Vec<String> = sqlx::query(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name != ?1 ORDER BY name",
    )
    .bind(META_TABLE)
    .fetch_all(&pool)
    .await
    .map_err(db_err("Failed to list tables"))?
    .into_iter()
    .map(|row| row.get("name"))
    .collect();

    let mut frames = Vec::with_capacity(tables.len());
    for name in tables {
        let rows = sqlx::query(&format!("SELECT * FROM {} ORDER BY tick", quote_ident(&name)))
            .fetch_all(&pool)
            .await
            .map_err(db_err("Failed to read count table"))?;

        let mut frame = Frame::new(name);
        let mut columns: BTreeMap<Genotype, Vec<u64>> = BTreeMap::new();
        for row in &rows {
            frame.ticks.push(row.get::<i64, _>("tick") as u64);
            for column in row.columns() {
                if let Ok(genotype) = column.name().parse::<Genotype>() {
                    let count: i64 = row.get(column.ordinal());
                    columns.entry(genotype).or_default().push(count as u64);
                }
            }
        }
        frame.columns = columns;
        frames.push(frame);
    }

    pool.close().await;
    Ok((meta, frames))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> DatabaseConfig {
        DatabaseConfig {
            spacing: 5,
            file_name: "trial".to_string(),
            output_dir: dir.to_path_buf(),
        }
    }

    fn frame(name: &str, ticks: &[u64], rr: &[u64], ss: &[u64]) -> Frame {
        let mut frame = Frame::new(name);
        frame.ticks = ticks.to_vec();
        frame.columns.insert(Genotype::RR, rr.to_vec());
        frame.columns.insert(Genotype::SS, ss.to_vec());
        frame
    }

    #[test]
    fn test_spacing_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::new(&config(dir.path())).unwrap();
        assert_eq!(db.next_dump(), 5);

        for tick in 1..5 {
            assert!(db.save(tick, Vec::new).unwrap().is_none());
        }
        let path = db.save(5, Vec::new).unwrap().unwrap();
        assert!(path.ends_with("trial_0-5.sqlite"));
        assert_eq!(db.prev_dump(), 5);
        assert_eq!(db.next_dump(), 10);
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::new(&config(dir.path())).unwrap();
        let written = vec![
            frame("(0,)_adult", &[1, 2, 3, 4, 5], &[5, 5, 4, 4, 3], &[5, 4, 4, 4, 4]),
            frame("(0, 1)_adult", &[1, 2, 3, 4, 5], &[0, 0, 0, 0, 0], &[0, 0, 0, 0, 0]),
        ];
        let path = db.save(5, || written.clone()).unwrap().unwrap();

        let (meta, frames) = Database::load(&path).unwrap();
        assert_eq!(meta.run, "trial");
        assert_eq!((meta.start_tick, meta.end_tick), (0, 5));
        assert_eq!(frames.len(), 2);

        let root = frames.iter().find(|f| f.name == "(0,)_adult").unwrap();
        assert_eq!(root, &written[0]);
        assert!(!path.with_extension("sqlite.partial").exists());
    }

    #[test]
    fn test_empty_frames_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::new(&config(dir.path())).unwrap();
        let path = db
            .save(5, || vec![Frame::new("(0,)_egg")])
            .unwrap()
            .unwrap();
        let (_, frames) = Database::load(&path).unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn test_zero_spacing_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.spacing = 0;
        assert!(matches!(Database::new(&cfg), Err(Error::Config(_))));
    }
}

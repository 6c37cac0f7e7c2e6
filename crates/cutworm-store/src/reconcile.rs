//! Offline reconciliation of snapshot files from many runs.

use cutworm_core::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A completed snapshot file `{run}_{start}-{end}.sqlite`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    pub run: String,
    pub start: u64,
    pub end: u64,
    pub path: PathBuf,
}

impl SnapshotFile {
    pub fn parse(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let stem = name.strip_suffix(".sqlite")?;
        let (run, range) = stem.rsplit_once('_')?;
        let (start, end) = range.split_once('-')?;
        let start = start.parse().ok()?;
        let end = end.parse().ok()?;
        if run.is_empty() || end <= start {
            return None;
        }
        Some(Self {
            run: run.to_string(),
            start,
            end,
            path: path.to_path_buf(),
        })
    }
}

/// Snapshot coverage of one run
#[derive(Debug, Clone)]
pub struct RunStatus {
    pub run: String,
    pub files: Vec<SnapshotFile>,
    /// Tick ranges with no snapshot between the first and last file
    pub gaps: Vec<(u64, u64)>,
    pub last_tick: u64,
    pub complete: bool,
}

/// Group snapshot files by run and check that each run is contiguous.
///
/// Two files claiming overlapping tick ranges for the same run are fatal. A
/// run is complete when its snapshots cover `0..expected_ticks` without gaps;
/// with no expectation only gaps make a run incomplete.
pub fn reconcile(dirs: &[PathBuf], expected_ticks: Option<u64>) -> Result<Vec<RunStatus>> {
    let mut runs: BTreeMap<String, Vec<SnapshotFile>> = BTreeMap::new();

    for dir in dirs {
        if !dir.exists() {
            warn!("Snapshot directory {:?} does not exist", dir);
            continue;
        }

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if let Some(file) = SnapshotFile::parse(&path) {
                runs.entry(file.run.clone()).or_default().push(file);
            }
        }
    }

    let mut statuses = Vec::with_capacity(runs.len());
    for (run, mut files) in runs {
        files.sort_by_key(|f| (f.start, f.end));

        let mut gaps = Vec::new();
        let mut cursor = 0;
        for pair in files.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(Error::AlreadyExists(format!(
                    "run {} has {:?} and {:?} claiming ticks {}-{}",
                    run,
                    pair[0].path,
                    pair[1].path,
                    pair[1].start,
                    pair[0].end.min(pair[1].end)
                )));
            }
        }
        for file in &files {
            if file.start > cursor {
                gaps.push((cursor, file.start));
            }
            cursor = file.end;
        }

        let trailing_ok = expected_ticks.map_or(true, |expected| cursor >= expected);
        let complete = gaps.is_empty() && trailing_ok;
        if !complete {
            warn!(run = %run, last_tick = cursor, gaps = gaps.len(), "Run is incomplete");
        }

        statuses.push(RunStatus {
            run,
            files,
            gaps,
            last_tick: cursor,
            complete,
        });
    }

    info!(
        runs = statuses.len(),
        complete = statuses.iter().filter(|s| s.complete).count(),
        "Reconciled snapshot files"
    );
    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_parse_names() {
        let file = SnapshotFile::parse(Path::new("/tmp/bt_50_0-25.sqlite")).unwrap();
        assert_eq!(file.run, "bt_50");
        assert_eq!((file.start, file.end), (0, 25));

        assert!(SnapshotFile::parse(Path::new("bt_0-25.sqlite.partial")).is_none());
        assert!(SnapshotFile::parse(Path::new("bt_25-0.sqlite")).is_none());
        assert!(SnapshotFile::parse(Path::new("notes.txt")).is_none());
    }

    #[test]
    fn test_complete_and_incomplete_runs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a_0-10.sqlite", "a_10-20.sqlite", "b_0-10.sqlite", "b_10-20.sqlite.partial"] {
            touch(dir.path(), name);
        }

        let statuses = reconcile(&[dir.path().to_path_buf()], Some(20)).unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(statuses[0].complete);
        assert_eq!(statuses[0].last_tick, 20);
        assert!(!statuses[1].complete);
        assert_eq!(statuses[1].last_tick, 10);
    }

    #[test]
    fn test_gaps_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a_0-10.sqlite");
        touch(dir.path(), "a_20-30.sqlite");

        let statuses = reconcile(&[dir.path().to_path_buf()], None).unwrap();
        assert_eq!(statuses[0].gaps, vec![(10, 20)]);
        assert!(!statuses[0].complete);
    }

    #[test]
    fn test_duplicate_range_is_fatal() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        touch(first.path(), "a_0-10.sqlite");
        touch(second.path(), "a_0-10.sqlite");

        let result = reconcile(
            &[first.path().to_path_buf(), second.path().to_path_buf()],
            None,
        );
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use super::timestamp::timestamp_from_file_name;
use crate::error::ProcessingError;

/// One measurement folder (usually one measurement day or one fermentation)
/// with an optional acquisition window.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderSpec {
    pub path: PathBuf,
    /// Inclusive lower bound on the file name timestamp.
    pub start: Option<NaiveDateTime>,
    /// Inclusive upper bound on the file name timestamp.
    pub end: Option<NaiveDateTime>,
}

impl FolderSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            start: None,
            end: None,
        }
    }

    fn accepts(&self, t: NaiveDateTime) -> bool {
        self.start.map_or(true, |s| t >= s) && self.end.map_or(true, |e| t <= e)
    }
}

/// A measurement file found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub timestamp: NaiveDateTime,
}

/// List the measurement files of every folder, in folder order.
///
/// Inside a folder files are sorted by name and filtered by the folder's
/// window. Files whose name carries no timestamp are skipped.
pub fn discover(folders: &[FolderSpec], extension: &str) -> Result<Vec<DiscoveredFile>> {
    let mut found = Vec::new();
    for folder in folders {
        let files = list_files(&folder.path, extension)?;
        let before = found.len();
        for path in files {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let Some(timestamp) = timestamp_from_file_name(name) else {
                log::warn!("Skipping {}: no YYMMDD_HHMMSS timestamp in name", path.display());
                continue;
            };
            if folder.accepts(timestamp) {
                found.push(DiscoveredFile { path, timestamp });
            }
        }
        log::info!(
            "{}: {} measurement files selected",
            folder.path.display(),
            found.len() - before
        );
    }
    Ok(found)
}

/// Keep every `stride`-th file, starting with the first one.
pub fn stride_files(
    files: Vec<DiscoveredFile>,
    stride: usize,
) -> Result<Vec<DiscoveredFile>, ProcessingError> {
    if stride == 0 {
        return Err(ProcessingError::InvalidStride(stride));
    }
    Ok(files.into_iter().step_by(stride).collect())
}

fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let wanted = extension.trim_start_matches('.').to_ascii_lowercase();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading measurement folder {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("listing {}", dir.display()))?
            .path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.to_ascii_lowercase() == wanted);
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::timestamp::parse_timestamp;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "").unwrap();
    }

    #[test]
    fn discovers_sorted_files_with_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "210301_100000.csv");
        touch(dir.path(), "210301_090000.CSV");
        touch(dir.path(), "210301_080000.txt");
        touch(dir.path(), "notes.csv");

        let files = discover(&[FolderSpec::new(dir.path())], "csv").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["210301_090000.CSV", "210301_100000.csv"]);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["210301_080000.csv", "210301_090000.csv", "210301_100000.csv", "210301_110000.csv"] {
            touch(dir.path(), name);
        }
        let folder = FolderSpec {
            path: dir.path().to_path_buf(),
            start: parse_timestamp("2021-03-01 09:00:00"),
            end: parse_timestamp("2021-03-01 10:00:00"),
        };
        let files = discover(&[folder], ".csv").unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].timestamp, parse_timestamp("2021-03-01 09:00:00").unwrap());
        assert_eq!(files[1].timestamp, parse_timestamp("2021-03-01 10:00:00").unwrap());
    }

    #[test]
    fn only_end_bound() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "210301_080000.csv");
        touch(dir.path(), "210301_090000.csv");
        let folder = FolderSpec {
            path: dir.path().to_path_buf(),
            start: None,
            end: parse_timestamp("2021-03-01 08:30:00"),
        };
        assert_eq!(discover(&[folder], "csv").unwrap().len(), 1);
    }

    #[test]
    fn folders_are_concatenated_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        touch(first.path(), "210302_080000.csv");
        touch(second.path(), "210301_080000.csv");
        let files = discover(
            &[FolderSpec::new(first.path()), FolderSpec::new(second.path())],
            "csv",
        )
        .unwrap();
        assert!(files[0].timestamp > files[1].timestamp);
    }

    #[test]
    fn missing_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = FolderSpec::new(dir.path().join("nope"));
        assert!(discover(&[missing], "csv").is_err());
    }

    #[test]
    fn stride_keeps_first_and_every_nth() {
        let t = parse_timestamp("2021-03-01").unwrap();
        let files: Vec<_> = (0..5)
            .map(|i| DiscoveredFile {
                path: PathBuf::from(format!("{i}.csv")),
                timestamp: t,
            })
            .collect();
        let kept = stride_files(files, 2).unwrap();
        let names: Vec<_> = kept.iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            names,
            vec![PathBuf::from("0.csv"), PathBuf::from("2.csv"), PathBuf::from("4.csv")]
        );
        assert!(stride_files(Vec::new(), 0).is_err());
    }
}

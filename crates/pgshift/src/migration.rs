//! Migration files on disk.
//!
//! A migration is a `.sql` file named `<version>_<name>.sql` where
//! `<version>` is a non-empty digit string, conventionally the UTC creation
//! time as `YYYYMMDDHHMMSS`. Versions are ordered lexicographically on the
//! digit string.

use crate::error::{ShiftError, ShiftResult};
use crate::splitter::{self, SplitterConfig, DEFAULT_MAX_CAPACITY};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

static FILENAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]+)_(.*)\.sql$").unwrap());

/// A parsed migration file. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub version: String,
    pub name: String,
    pub path: PathBuf,
    /// Trimmed executable statements, in source order.
    pub statements: Vec<String>,
}

impl MigrationFile {
    /// Read and split a migration file.
    ///
    /// The splitter capacity is raised to the file length, so only the
    /// filename pattern can fail here for well-formed UTF-8 files.
    pub fn from_path(path: impl AsRef<Path>) -> ShiftResult<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ShiftError::InvalidVersion(path.display().to_string()))?;
        let (version, name) = parse_file_name(file_name)?;

        let body = fs::read_to_string(path).map_err(|e| ShiftError::fs(path, e))?;
        let config = SplitterConfig {
            max_capacity: DEFAULT_MAX_CAPACITY.max(body.len()),
        };
        let statements = splitter::split_and_trim_with_config(&body, config)?;

        Ok(Self {
            version,
            name,
            path: path.to_path_buf(),
            statements,
        })
    }

    /// Locate a migration by version under `dir`.
    ///
    /// Globs `<dir>/<version>_*.sql`; with multiple matches the first in
    /// sorted order wins, with none the result is `NotFound`.
    pub fn from_version(dir: &Path, version: &str) -> ShiftResult<Self> {
        validate_version(version)?;
        let pattern = dir.join(format!("{version}_*.sql"));
        let pattern = pattern
            .to_str()
            .ok_or_else(|| ShiftError::InvalidVersion(pattern.display().to_string()))?;

        let mut matches: Vec<PathBuf> = glob::glob(pattern)
            .map_err(|e| ShiftError::InvalidVersion(e.to_string()))?
            .filter_map(Result::ok)
            .collect();
        matches.sort();

        match matches.first() {
            Some(path) => Self::from_path(path),
            None => Err(ShiftError::not_found(format!(
                "migration {version} not found in {}",
                dir.display()
            ))),
        }
    }
}

/// Parse `<version>_<name>.sql` into its two groups.
pub fn parse_file_name(file_name: &str) -> ShiftResult<(String, String)> {
    let caps = FILENAME_RE
        .captures(file_name)
        .ok_or_else(|| ShiftError::InvalidVersion(file_name.to_string()))?;
    Ok((caps[1].to_string(), caps[2].to_string()))
}

/// Reject anything that is not a non-empty ASCII digit string.
pub fn validate_version(version: &str) -> ShiftResult<()> {
    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ShiftError::InvalidVersion(version.to_string()));
    }
    Ok(())
}

/// List the migrations directory, sorted ascending by version.
///
/// Files not matching the migration pattern are silently ignored; a missing
/// directory yields an empty list.
pub fn list_migrations(dir: &Path) -> ShiftResult<Vec<MigrationFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir).map_err(|e| ShiftError::fs(dir, e))?;
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ShiftError::fs(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if !FILENAME_RE.is_match(file_name) {
            continue;
        }
        out.push(MigrationFile::from_path(&path)?);
    }

    out.sort_by(|a, b| (&a.version, &a.name).cmp(&(&b.version, &b.name)));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_temp_dir() -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("pgshift-migration-test-{nonce}"));
        fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    #[test]
    fn parses_version_and_name() {
        let (version, name) = parse_file_name("20260801120000_create_users.sql").expect("parse");
        assert_eq!(version, "20260801120000");
        assert_eq!(name, "create_users");

        let (version, name) = parse_file_name("0_.sql").expect("parse");
        assert_eq!(version, "0");
        assert_eq!(name, "");
    }

    #[test]
    fn rejects_bad_file_names() {
        assert!(parse_file_name("create_users.sql").is_err());
        assert!(parse_file_name("20260801_users.txt").is_err());
        assert!(parse_file_name("_users.sql").is_err());
    }

    #[test]
    fn version_must_be_digits() {
        assert!(validate_version("20260801120000").is_ok());
        assert!(validate_version("0").is_ok());
        assert!(validate_version("").is_err());
        assert!(validate_version("20a1").is_err());
    }

    #[test]
    fn reads_and_splits_body() {
        let dir = make_temp_dir();
        let path = dir.join("1_init.sql");
        fs::write(&path, "create table t (id int);\n-- seed\ninsert into t values (1);\n")
            .expect("write");

        let m = MigrationFile::from_path(&path).expect("read");
        assert_eq!(m.version, "1");
        assert_eq!(m.name, "init");
        assert_eq!(
            m.statements,
            vec![
                "create table t (id int)",
                "-- seed\ninsert into t values (1)"
            ]
        );

        fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn lists_sorted_and_ignores_strays() {
        let dir = make_temp_dir();
        fs::write(dir.join("2_b.sql"), "select 2;").expect("write");
        fs::write(dir.join("0_a.sql"), "select 0;").expect("write");
        fs::write(dir.join("10_c.sql"), "select 10;").expect("write");
        fs::write(dir.join("README.md"), "not a migration").expect("write");
        fs::write(dir.join("notes.sql"), "select 'ignored';").expect("write");

        let listed = list_migrations(&dir).expect("list");
        let versions: Vec<&str> = listed.iter().map(|m| m.version.as_str()).collect();
        // lexicographic on the digit string
        assert_eq!(versions, vec!["0", "10", "2"]);

        fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn missing_dir_lists_empty() {
        let dir = make_temp_dir().join("does-not-exist");
        assert!(list_migrations(&dir).expect("list").is_empty());
    }

    #[test]
    fn from_version_takes_first_sorted_match() {
        let dir = make_temp_dir();
        fs::write(dir.join("5_bbb.sql"), "select 2;").expect("write");
        fs::write(dir.join("5_aaa.sql"), "select 1;").expect("write");

        let m = MigrationFile::from_version(&dir, "5").expect("find");
        assert_eq!(m.name, "aaa");

        fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn from_version_not_found() {
        let dir = make_temp_dir();
        let err = MigrationFile::from_version(&dir, "7").expect_err("must fail");
        assert!(err.is_not_found());
        fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn from_version_rejects_non_digit() {
        let dir = make_temp_dir();
        let err = MigrationFile::from_version(&dir, "7a").expect_err("must fail");
        assert!(matches!(err, ShiftError::InvalidVersion(_)));
        fs::remove_dir_all(dir).expect("cleanup");
    }
}

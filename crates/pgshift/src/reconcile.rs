//! Reconciling local migration files against the remote ledger.
//!
//! Both inputs arrive pre-sorted ascending (the filesystem listing and the
//! `ORDER BY version` on the SQL side); the walk is a single pass and never
//! sorts.

use crate::error::{ShiftError, ShiftResult};
use crate::migration::MigrationFile;

/// Compute the ordered list of migrations to apply.
///
/// Walks local and remote in lockstep. Local versions older than a remote
/// version but absent from the ledger are out-of-order candidates; remote
/// versions with no local file at all are fatal. The suffix of local files
/// past the last remote version is strictly new.
///
/// Returns `MissingLocal` when the ledger references versions that have no
/// file on disk, `MissingRemote` when out-of-order candidates exist and
/// `ignore_out_of_order` is unset, and otherwise the out-of-order
/// candidates followed by the strictly new files.
pub fn find_pending(
    local: &[MigrationFile],
    remote: &[String],
    ignore_out_of_order: bool,
) -> ShiftResult<Vec<MigrationFile>> {
    let mut unapplied: Vec<&MigrationFile> = Vec::new();
    let mut missing: Vec<String> = Vec::new();
    let mut j = 0;

    for version in remote {
        while j < local.len() && local[j].version.as_str() < version.as_str() {
            unapplied.push(&local[j]);
            j += 1;
        }
        if j < local.len() && local[j].version == *version {
            j += 1;
        } else {
            missing.push(version.clone());
        }
    }

    if !missing.is_empty() {
        return Err(ShiftError::MissingLocal { versions: missing });
    }
    if !unapplied.is_empty() && !ignore_out_of_order {
        return Err(ShiftError::MissingRemote {
            versions: unapplied.iter().map(|m| m.version.clone()).collect(),
        });
    }

    Ok(unapplied
        .into_iter()
        .cloned()
        .chain(local[j..].iter().cloned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(version: &str, name: &str) -> MigrationFile {
        MigrationFile {
            version: version.to_string(),
            name: name.to_string(),
            path: PathBuf::from(format!("{version}_{name}.sql")),
            statements: vec![format!("select '{name}'")],
        }
    }

    fn remote(versions: &[&str]) -> Vec<String> {
        versions.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn new_suffix_is_pending() {
        let local = [file("0", "a"), file("1", "b"), file("2", "c")];
        let pending = find_pending(&local, &remote(&["0", "1"]), false).expect("pending");
        let versions: Vec<&str> = pending.iter().map(|m| m.version.as_str()).collect();
        assert_eq!(versions, vec!["2"]);
    }

    #[test]
    fn exact_match_leaves_nothing_pending() {
        let local = [file("0", "a"), file("1", "b")];
        assert!(find_pending(&local, &remote(&["0", "1"]), false)
            .expect("pending")
            .is_empty());
    }

    #[test]
    fn remote_without_local_file_is_fatal() {
        let local = [file("0", "a")];
        let err = find_pending(&local, &remote(&["0", "1"]), false).expect_err("must fail");
        match &err {
            ShiftError::MissingLocal { versions } => assert_eq!(versions, &["1"]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err
            .suggestion()
            .expect("suggestion")
            .contains("repair --status reverted 1"));
    }

    #[test]
    fn empty_local_with_remote_history_is_missing_local() {
        let err = find_pending(&[], &remote(&["0"]), false).expect_err("must fail");
        assert!(matches!(err, ShiftError::MissingLocal { .. }));
    }

    #[test]
    fn empty_remote_returns_all_local() {
        let local = [file("0", "a"), file("2", "c")];
        let pending = find_pending(&local, &[], false).expect("pending");
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn out_of_order_is_rejected_by_default() {
        // 1_b was written after 2_c had already been applied remotely
        let local = [file("0", "a"), file("1", "b"), file("2", "c")];
        let err = find_pending(&local, &remote(&["0", "2"]), false).expect_err("must fail");
        match &err {
            ShiftError::MissingRemote { versions } => assert_eq!(versions, &["1"]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.suggestion().expect("suggestion").contains("--include-all"));
    }

    #[test]
    fn out_of_order_applies_before_new_when_included() {
        let local = [file("0", "a"), file("1", "b"), file("2", "c"), file("3", "d")];
        let pending = find_pending(&local, &remote(&["0", "2"]), true).expect("pending");
        let versions: Vec<&str> = pending.iter().map(|m| m.version.as_str()).collect();
        assert_eq!(versions, vec!["1", "3"]);
    }

    #[test]
    fn shrinking_the_remote_prefix_grows_pending_monotonically() {
        let local = [file("0", "a"), file("1", "b"), file("2", "c")];
        let full = find_pending(&local, &remote(&["0", "1"]), false).expect("pending");
        let shorter = find_pending(&local, &remote(&["0"]), false).expect("pending");

        let full_versions: Vec<&str> = full.iter().map(|m| m.version.as_str()).collect();
        let shorter_versions: Vec<&str> = shorter.iter().map(|m| m.version.as_str()).collect();
        assert_eq!(shorter_versions, vec!["1", "2"]);
        assert!(shorter_versions.ends_with(&full_versions));
    }
}

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{ClientError, ClientResult};

pub const TRANSACTION_FILE: &str = "NONDERIV_TRANS.tsv";
pub const SUBMISSION_FILE: &str = "SUBMISSION.tsv";

/// One filing drop: a directory holding both source files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub name: String,
    pub dir: PathBuf,
}

impl Partition {
    pub fn transaction_path(&self) -> PathBuf {
        self.dir.join(TRANSACTION_FILE)
    }

    pub fn submission_path(&self) -> PathBuf {
        self.dir.join(SUBMISSION_FILE)
    }

    fn is_complete(dir: &Path) -> bool {
        dir.join(TRANSACTION_FILE).is_file() && dir.join(SUBMISSION_FILE).is_file()
    }
}

/// Finds partitions under `root`.
///
/// A root that itself holds both files is the only partition. Otherwise each
/// complete child directory is one; numeric names sort first by value, the
/// rest follow by name. Incomplete children are skipped.
pub fn discover_partitions(root: &Path) -> ClientResult<Vec<Partition>> {
    if !root.is_dir() {
        return Err(ClientError::data_dir_not_found(root));
    }

    if Partition::is_complete(root) {
        let name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        return Ok(vec![Partition {
            name,
            dir: root.to_path_buf(),
        }]);
    }

    let entries = fs::read_dir(root)
        .map_err(|error| ClientError::source_unreadable(root, &error.to_string()))?;
    let mut partitions = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|error| ClientError::source_unreadable(root, &error.to_string()))?;
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        if !Partition::is_complete(&dir) {
            tracing::debug!(dir = %dir.display(), "skipping directory without both source files");
            continue;
        }
        partitions.push(Partition {
            name: entry.file_name().to_string_lossy().into_owned(),
            dir,
        });
    }

    if partitions.is_empty() {
        return Err(ClientError::no_partitions_found(root));
    }
    partitions.sort_by(|left, right| compare_names(&left.name, &right.name));
    Ok(partitions)
}

fn compare_names(left: &str, right: &str) -> Ordering {
    match (left.parse::<u64>(), right.parse::<u64>()) {
        (Ok(left_number), Ok(right_number)) => left_number
            .cmp(&right_number)
            .then_with(|| left.cmp(right)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => left.cmp(right),
    }
}

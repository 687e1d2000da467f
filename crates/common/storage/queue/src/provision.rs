// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Directory provisioning for disk queues.
//!
//! Runs once when a disk store is opened. Creation is idempotent: a directory
//! that already exists (including one created concurrently by another process
//! opening a sibling queue) counts as success.

use std::{fs, io, path::Path};

use snafu::ResultExt;
use tracing::debug;

use crate::{Result, error::ConstructionSnafu};

/// Make sure the parent directory of `path` exists, creating missing
/// ancestors.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).context(ConstructionSnafu { path })
        }
        _ => Ok(()),
    }
}

/// Provision the directory a disk queue lives in: its parent first, then the
/// queue directory itself.
pub fn ensure_queue_dir(path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;

    match fs::create_dir(path) {
        Ok(()) => {
            debug!(path = ?path, "Created queue directory");
            Ok(())
        }
        // A file squatting on the path still reports AlreadyExists.
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(e).context(ConstructionSnafu { path }),
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Barrier, thread};

    use super::*;
    use crate::QueueError;

    #[test]
    fn test_creates_missing_ancestors() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("a").join("b").join("queue");

        ensure_parent_dir(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());
        assert!(!path.exists());
    }

    #[test]
    fn test_repeated_provisioning_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("crawl").join("requests.fifo");

        ensure_queue_dir(&path).unwrap();
        ensure_queue_dir(&path).unwrap();
        assert!(path.is_dir());
    }

    #[test]
    fn test_relative_path_without_parent() {
        ensure_parent_dir(Path::new("queue")).unwrap();
    }

    #[test]
    fn test_file_in_the_way_is_a_construction_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("occupied");
        std::fs::write(&path, b"not a directory").unwrap();

        let err = ensure_queue_dir(&path).unwrap_err();
        assert!(matches!(err, QueueError::Construction { .. }));
    }

    #[test]
    fn test_concurrent_sibling_provisioning() {
        let temp_dir = tempfile::tempdir().unwrap();
        let parent = temp_dir.path().join("not").join("yet").join("there");
        let barrier = Barrier::new(8);

        thread::scope(|scope| {
            for i in 0..8 {
                let path = parent.join(format!("queue-{i}"));
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    ensure_queue_dir(&path).unwrap();
                });
            }
        });

        for i in 0..8 {
            assert!(parent.join(format!("queue-{i}")).is_dir());
        }
    }
}

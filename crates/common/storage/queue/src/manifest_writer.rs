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

//! Manifest persistence using two alternating slot files.
//!
//! Each write goes to the slot not holding the newest manifest and carries a
//! higher generation, so a write torn by a crash leaves the previous slot
//! intact. Recovery reads both slots and keeps the valid one with the highest
//! generation.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use snafu::ResultExt;
use tracing::{debug, warn};

use crate::{QueueError, Result, error::IoSnafu, manifest::Manifest};

const MANIFEST_SLOTS: [&str; 2] = ["manifest.1", "manifest.2"];

pub(crate) struct ManifestWriter {
    base_path:  PathBuf,
    /// Index into [`MANIFEST_SLOTS`] of the next write.
    next_slot:  usize,
    generation: u64,
}

impl ManifestWriter {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path:  base_path.as_ref().to_path_buf(),
            next_slot:  0,
            generation: 0,
        }
    }

    /// Load the newest valid manifest, if any slot holds one.
    ///
    /// A damaged slot is skipped as long as the other one is valid. When slot
    /// files exist but none of them parses, the last parse error is returned.
    pub fn read_latest(&mut self) -> Result<Option<Manifest>> {
        let mut latest: Option<(usize, Manifest)> = None;
        let mut last_error: Option<QueueError> = None;

        for (slot, name) in MANIFEST_SLOTS.iter().enumerate() {
            let path = self.base_path.join(name);
            let data = match fs::read(&path) {
                Ok(data) => data,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e).context(IoSnafu { path }),
            };

            match Manifest::deserialize(&data) {
                Ok(manifest) => {
                    if latest
                        .as_ref()
                        .is_none_or(|(_, best)| manifest.generation > best.generation)
                    {
                        latest = Some((slot, manifest));
                    }
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "Skipping unreadable manifest slot");
                    last_error = Some(e);
                }
            }
        }

        match (latest, last_error) {
            (Some((slot, manifest)), _) => {
                self.generation = manifest.generation;
                self.next_slot = (slot + 1) % MANIFEST_SLOTS.len();
                debug!(
                    slot = MANIFEST_SLOTS[slot],
                    generation = manifest.generation,
                    "Manifest loaded"
                );
                Ok(Some(manifest))
            }
            (None, Some(e)) => Err(e),
            (None, None) => Ok(None),
        }
    }

    /// Persist `manifest` into the next slot with a fresh generation.
    ///
    /// The generation is stamped onto `manifest`. With `sync` the slot is
    /// fsynced before returning.
    pub fn write(&mut self, manifest: &mut Manifest, sync: bool) -> Result<()> {
        self.generation += 1;
        manifest.generation = self.generation;

        let path = self.base_path.join(MANIFEST_SLOTS[self.next_slot]);
        let data = manifest.serialize();

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .context(IoSnafu { path: &path })?;
        file.write_all(&data).context(IoSnafu { path: &path })?;
        if sync {
            file.sync_all().context(IoSnafu { path: &path })?;
        }

        self.next_slot = (self.next_slot + 1) % MANIFEST_SLOTS.len();
        Ok(())
    }

    /// Delete both slot files.
    pub fn remove_all(&self) -> Result<()> {
        for name in MANIFEST_SLOTS {
            let path = self.base_path.join(name);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).context(IoSnafu { path }),
            }
        }
        Ok(())
    }
}

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

//! Data file handle shared by the disk stores.
//!
//! Wraps a read/write [`File`] with positioned reads, appends at the logical
//! end, tail truncation and flush bookkeeping for [`FlushMode`].

use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use snafu::ResultExt;

use crate::{
    FlushMode, Result,
    error::{ConstructionSnafu, IoSnafu},
};

pub(crate) struct DataFile {
    file:          File,
    path:          PathBuf,
    /// Logical end of the file; appends go here.
    len:           u64,
    /// Bytes written since the last fsync.
    pending_bytes: usize,
    last_sync:     Instant,
}

impl DataFile {
    /// Open `path` for reading and writing, creating it if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .context(ConstructionSnafu { path: &path })?;
        let len = file
            .metadata()
            .context(ConstructionSnafu { path: &path })?
            .len();

        Ok(Self {
            file,
            path,
            len,
            pending_bytes: 0,
            last_sync: Instant::now(),
        })
    }

    /// Append `data` at the logical end and return the offset it was written
    /// at.
    pub fn append(&mut self, data: &[u8]) -> Result<u64> {
        let offset = self.len;
        self.file
            .seek(SeekFrom::Start(offset))
            .context(IoSnafu { path: &self.path })?;
        self.file
            .write_all(data)
            .context(IoSnafu { path: &self.path })?;
        self.len += data.len() as u64;
        self.pending_bytes += data.len();
        Ok(offset)
    }

    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .context(IoSnafu { path: &self.path })?;
        self.file
            .read_exact(buf)
            .context(IoSnafu { path: &self.path })
    }

    /// Cut the file down to `len` bytes.
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.file
            .set_len(len)
            .context(IoSnafu { path: &self.path })?;
        self.pending_bytes += usize::try_from(self.len.saturating_sub(len)).unwrap_or(usize::MAX);
        self.len = len;
        Ok(())
    }

    /// Sync if the flush mode asks for it after a mutation.
    pub fn maybe_sync(&mut self, mode: FlushMode) -> Result<()> {
        if mode.should_sync(self.pending_bytes, self.last_sync.elapsed()) {
            self.sync()?;
        }
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file
            .sync_data()
            .context(IoSnafu { path: &self.path })?;
        self.pending_bytes = 0;
        self.last_sync = Instant::now();
        Ok(())
    }

    pub const fn len(&self) -> u64 { self.len }

    pub fn path(&self) -> &Path { &self.path }
}

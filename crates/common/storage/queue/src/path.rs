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

use std::path::{Path, PathBuf};

use snafu::ResultExt;

use crate::{Result, error::IoSnafu};

/// File name of the LIFO stack file inside its queue directory.
pub const STACK_FILE_NAME: &str = "stack.data";

const CHUNK_PREFIX: &str = "chunk-";
const CHUNK_EXTENSION: &str = "data";

/// Generates a chunk file name: `chunk-NNNNNNNN.data`.
pub fn chunk_file_name(chunk: u64) -> String { format!("{CHUNK_PREFIX}{chunk:08}.{CHUNK_EXTENSION}") }

/// Returns full path to a chunk file: `base/chunk-NNNNNNNN.data`.
pub fn chunk_file_path<P: AsRef<Path>>(base: P, chunk: u64) -> PathBuf {
    base.as_ref().join(chunk_file_name(chunk))
}

/// Returns full path to the LIFO stack file: `base/stack.data`.
pub fn stack_file_path<P: AsRef<Path>>(base: P) -> PathBuf { base.as_ref().join(STACK_FILE_NAME) }

/// Parses the chunk number out of a chunk file path.
pub fn parse_chunk_number(path: &Path) -> Option<u64> {
    if path.extension().and_then(|s| s.to_str()) != Some(CHUNK_EXTENSION) {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix(CHUNK_PREFIX))
        .and_then(|n| n.parse().ok())
}

/// Lists the chunk numbers present in `base`, sorted ascending.
pub fn scan_chunk_files<P: AsRef<Path>>(base: P) -> Result<Vec<u64>> {
    let base = base.as_ref();
    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut chunks = Vec::new();
    for entry in std::fs::read_dir(base).context(IoSnafu { path: base })? {
        let entry = entry.context(IoSnafu { path: base })?;
        if let Some(chunk) = parse_chunk_number(&entry.path()) {
            chunks.push(chunk);
        }
    }
    chunks.sort_unstable();
    Ok(chunks)
}

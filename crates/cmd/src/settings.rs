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

use std::path::Path;

use frontq_common_telemetry::LoggingOptions;
use frontq_queue::{Medium, QueueConfig};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Whatever, whatever};

/// Codec used for the stored request records.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    /// Self-describing serde encoding of the record.
    #[default]
    #[display("object")]
    Object,
    /// Restricted primitive value encoding.
    #[display("primitive")]
    Primitive,
}

/// Everything the CLI can read from `--config`.
///
/// ```toml
/// codec = "primitive"
/// callbacks = ["parse", "parse_item"]
///
/// [queue]
/// order = "lifo"
/// medium = { kind = "disk", path = "/var/lib/frontq/requests" }
///
/// [logging]
/// level = "debug"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub queue:     QueueConfig,
    pub logging:   LoggingOptions,
    pub codec:     CodecKind,
    /// Callback names requests may carry. Empty accepts any name.
    pub callbacks: Vec<String>,
}

impl Settings {
    /// Read settings from a TOML file, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, Whatever> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_whatever_context(|_| format!("Failed to read {}", path.display()))?;
        Self::parse(&text).with_whatever_context(|_| format!("Invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> { toml::from_str(text) }

    /// The CLI only operates on disk queues.
    pub fn require_disk(&self) -> Result<&Path, Whatever> {
        match &self.queue.medium {
            Medium::Disk { path } => Ok(path),
            Medium::Memory => whatever!("No queue path: pass --path or set queue.medium"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use frontq_common_telemetry::LogFormat;
    use frontq_queue::{CorruptPolicy, FlushMode, QueueOrder};

    use super::*;

    #[test]
    fn test_parse_full_config() {
        let settings = Settings::parse(
            r#"
            codec = "primitive"
            callbacks = ["parse"]

            [queue]
            order = "lifo"
            chunk_size = 500
            flush_mode = "sync"
            corrupt_policy = "halt"
            medium = { kind = "disk", path = "/var/lib/frontq/requests" }

            [logging]
            level = "debug"
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(settings.codec, CodecKind::Primitive);
        assert_eq!(settings.callbacks, vec!["parse".to_string()]);
        assert_eq!(settings.queue.order, QueueOrder::Lifo);
        assert_eq!(settings.queue.chunk_size, 500);
        assert_eq!(settings.queue.flush_mode, FlushMode::Sync);
        assert_eq!(settings.queue.corrupt_policy, CorruptPolicy::Halt);
        assert_eq!(
            settings.require_disk().unwrap(),
            Path::new("/var/lib/frontq/requests")
        );
        assert_eq!(settings.logging.level.as_deref(), Some("debug"));
        assert_eq!(settings.logging.log_format, LogFormat::Json);
    }

    #[test]
    fn test_empty_config_is_default() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.require_disk().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("frontq.toml");
        std::fs::write(&file, "[queue]\nmedium = { kind = \"disk\", path = \"q\" }\n").unwrap();

        let settings = Settings::load(Some(&file)).unwrap();
        assert_eq!(
            settings.queue.medium,
            Medium::Disk {
                path: PathBuf::from("q"),
            }
        );
    }

    #[test]
    fn test_load_reports_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.toml");
        std::fs::write(&file, "codec = \"yaml\"").unwrap();

        let err = Settings::load(Some(&file)).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
        assert!(Settings::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}

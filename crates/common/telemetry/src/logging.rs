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

use std::{
    env,
    io::IsTerminal,
    sync::{Mutex, Once},
};

use bon::Builder;
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, de};
use smart_default::SmartDefault;
use snafu::{ResultExt, Snafu};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Deserializes a string value, using `Default::default()` if the string is
/// empty.
pub fn empty_string_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(T::default())
    } else {
        T::deserialize(de::value::StrDeserializer::new(&s)).map_err(|e: de::value::Error| {
            de::Error::custom(format!("invalid value, expect empty string, err: {e}"))
        })
    }
}

/// Default directory name for log files when file logging is enabled.
pub const DEFAULT_LOGGING_DIR: &str = "logs";

/// Fallback filter when neither the options nor `RUST_LOG` set one.
const DEFAULT_LOG_TARGETS: &str = "info";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LoggingError {
    #[snafu(display("Invalid log filter `{filter}`"))]
    InvalidFilter {
        filter: String,
        source: filter::ParseError,
    },

    #[snafu(display("Failed to create rolling log appender in {dir}"))]
    RollingAppender {
        dir:    String,
        source: tracing_appender::rolling::InitError,
    },

    #[snafu(display("Failed to install global tracing subscriber"))]
    InstallSubscriber {
        source: tracing_subscriber::util::TryInitError,
    },
}

/// Configuration options for the logging system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for hourly-rotated log files. Empty disables file logging.
    #[default = ""]
    #[builder(default)]
    pub dir: String,

    /// Filter directives such as `"info,frontq_queue=debug"`. Falls back to
    /// `RUST_LOG`, then `"info"`.
    pub level: Option<String>,

    #[serde(default, deserialize_with = "empty_string_as_default")]
    #[builder(default)]
    pub log_format: LogFormat,

    /// Rotated files kept per log stream.
    #[default = 720]
    #[builder(default = 720)]
    pub max_log_files: usize,

    #[default = true]
    #[builder(default = true)]
    pub append_stdout: bool,
}

/// Available log output formats.
#[derive(
    Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per event, for log pipelines.
    #[display("json")]
    Json,

    #[default]
    #[display("text")]
    Text,
}

/// Initialize logging for unit tests.
///
/// Logs go to `UNITTEST_LOG_DIR` (default `/tmp/__unittest_logs`) filtered by
/// `UNITTEST_LOG_LEVEL`. Safe to call from every test; only the first call
/// does anything.
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let dir =
            env::var("UNITTEST_LOG_DIR").unwrap_or_else(|_| "/tmp/__unittest_logs".to_string());
        let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());
        let opts = LoggingOptions {
            dir: dir.clone(),
            level: Some(level),
            append_stdout: false,
            ..Default::default()
        };

        match init_global_logging("unittest", &opts) {
            Ok(guards) => {
                if let Ok(mut g) = GLOBAL_UT_LOG_GUARD.lock() {
                    *g = Some(guards);
                }
                tracing::info!("logs dir = {}", dir);
            }
            Err(e) => eprintln!("unit test logging disabled: {e}"),
        }
    });
}

/// Keeps unit test writer guards alive for the whole test binary.
static GLOBAL_UT_LOG_GUARD: Lazy<Mutex<Option<Vec<WorkerGuard>>>> = Lazy::new(|| Mutex::new(None));

/// Install the global subscriber.
///
/// Sets up a stdout layer (if `append_stdout`), plus a main and an error-only
/// file layer when `dir` is set. Files are named after `app_name` and rotate
/// hourly.
///
/// The returned guards flush the non-blocking writers on drop and must be
/// held for the life of the process. Only the first call installs anything;
/// later calls return no guards.
pub fn init_global_logging(
    app_name: &str,
    opts: &LoggingOptions,
) -> Result<Vec<WorkerGuard>, LoggingError> {
    static START: Once = Once::new();
    let mut result = Ok(vec![]);

    START.call_once(|| result = install(app_name, opts));

    result
}

fn install(app_name: &str, opts: &LoggingOptions) -> Result<Vec<WorkerGuard>, LoggingError> {
    let mut guards = vec![];

    let stdout_logging_layer = if opts.append_stdout {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        guards.push(guard);
        let ansi = std::io::stdout().is_terminal();

        Some(match opts.log_format {
            LogFormat::Json => tracing_subscriber::fmt::Layer::new()
                .json()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_current_span(true)
                .with_span_list(true)
                .boxed(),
            LogFormat::Text => tracing_subscriber::fmt::Layer::new()
                .with_writer(writer)
                .with_ansi(ansi)
                .boxed(),
        })
    } else {
        None
    };

    let (file_logging_layer, err_file_logging_layer) = if opts.dir.is_empty() {
        (None, None)
    } else {
        let (writer, guard) =
            tracing_appender::non_blocking(rolling_appender(opts, app_name.to_string())?);
        guards.push(guard);
        let main = match opts.log_format {
            LogFormat::Json => tracing_subscriber::fmt::Layer::new()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_current_span(true)
                .with_span_list(true)
                .boxed(),
            LogFormat::Text => tracing_subscriber::fmt::Layer::new()
                .with_writer(writer)
                .with_ansi(false)
                .boxed(),
        };

        let (writer, guard) =
            tracing_appender::non_blocking(rolling_appender(opts, format!("{app_name}-err"))?);
        guards.push(guard);
        let err = match opts.log_format {
            LogFormat::Json => tracing_subscriber::fmt::Layer::new()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter::LevelFilter::ERROR)
                .boxed(),
            LogFormat::Text => tracing_subscriber::fmt::Layer::new()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter::LevelFilter::ERROR)
                .boxed(),
        };

        (Some(main), Some(err))
    };

    Registry::default()
        .with(build_filter(opts)?)
        .with(stdout_logging_layer)
        .with(file_logging_layer)
        .with(err_file_logging_layer)
        .try_init()
        .context(InstallSubscriberSnafu)?;

    Ok(guards)
}

fn rolling_appender(
    opts: &LoggingOptions,
    prefix: String,
) -> Result<RollingFileAppender, LoggingError> {
    RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(prefix)
        .max_log_files(opts.max_log_files)
        .build(&opts.dir)
        .context(RollingAppenderSnafu { dir: &opts.dir })
}

/// Resolve the target filter: options first, then `RUST_LOG`, then `info`.
pub(crate) fn build_filter(opts: &LoggingOptions) -> Result<filter::Targets, LoggingError> {
    let from_env = env::var(EnvFilter::DEFAULT_ENV).ok();
    let directives = opts
        .level
        .as_deref()
        .or(from_env.as_deref())
        .unwrap_or(DEFAULT_LOG_TARGETS);

    directives
        .parse::<filter::Targets>()
        .context(InvalidFilterSnafu { filter: directives })
}

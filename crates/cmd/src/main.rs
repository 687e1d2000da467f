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
    io::{self, Write},
    path::PathBuf,
};

use clap::{Args, Parser, Subcommand, ValueEnum};
use frontq_common_telemetry::{LogFormat, init_global_logging, set_panic_hook};
use frontq_queue::{
    Codec, FlatRecord, FlushMode, Medium, ObjectCodec, PrimitiveCodec, QueueBuilder, QueueOrder,
    RecordQueue, Store,
};
use snafu::{ResultExt, Whatever};

mod build_info;
mod request;
mod settings;

use request::{CrawlRequest, RequestConverter};
use settings::{CodecKind, Settings};

#[derive(Debug, Parser)]
#[clap(
name = "frontq",
about= "Inspect and feed persistent crawl request queues",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION)]
struct Cli {
    /// TOML settings file. Flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter directives, e.g. `debug` or `warn,frontq_queue=debug`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Push(PushArgs),
    Pop(PopArgs),
    Peek(QueueArgs),
    Len(QueueArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OrderArg {
    Fifo,
    Lifo,
}

impl From<OrderArg> for QueueOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Fifo => Self::Fifo,
            OrderArg::Lifo => Self::Lifo,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(format: LogFormatArg) -> Self {
        match format {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// Options selecting and opening a queue.
#[derive(Debug, Clone, Default, Args)]
struct QueueArgs {
    /// Queue directory. Created with its parents if missing.
    #[arg(long)]
    path: Option<PathBuf>,

    #[arg(long, value_enum)]
    order: Option<OrderArg>,

    #[arg(long, value_enum)]
    codec: Option<CodecKind>,

    /// Records per chunk file for new FIFO queues.
    #[arg(long)]
    chunk_size: Option<u32>,

    /// fsync after every push and pop.
    #[arg(long)]
    sync: bool,
}

impl QueueArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(path) = &self.path {
            settings.queue.medium = Medium::Disk { path: path.clone() };
        }
        if let Some(order) = self.order {
            settings.queue.order = order.into();
        }
        if let Some(codec) = self.codec {
            settings.codec = codec;
        }
        if let Some(chunk_size) = self.chunk_size {
            settings.queue.chunk_size = chunk_size;
        }
        if self.sync {
            settings.queue.flush_mode = FlushMode::Sync;
        }
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Push GET requests for the given URLs.
Examples:

frontq push --path ./requests https://example.com/ https://example.org/
frontq push --path ./requests --priority 10 --callback parse_item https://example.com/item/1

")]
struct PushArgs {
    #[command(flatten)]
    queue: QueueArgs,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    priority: i64,

    #[arg(long)]
    callback: Option<String>,

    #[arg(long)]
    dont_filter: bool,

    #[arg(required = true)]
    urls: Vec<String>,
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Pop requests and print them, one per line.
Examples:

frontq pop --path ./requests --count 10

")]
struct PopArgs {
    #[command(flatten)]
    queue: QueueArgs,

    #[arg(long, default_value_t = 1)]
    count: usize,
}

/// What to do once the queue is open.
#[derive(Debug)]
enum Action {
    Push(Vec<CrawlRequest>),
    Pop(usize),
    Peek,
    Len,
}

impl Cli {
    fn settings(&self) -> Result<Settings, Whatever> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(level) = &self.log_level {
            settings.logging.level = Some(level.clone());
        }
        if let Some(format) = self.log_format {
            settings.logging.log_format = format.into();
        }
        // Keep stdout for command output unless asked otherwise.
        if settings.logging.level.is_none() {
            settings.logging.level = Some("warn".to_string());
        }
        Ok(settings)
    }
}

impl Commands {
    fn into_parts(self) -> (QueueArgs, Action) {
        match self {
            Self::Push(args) => {
                let requests = args
                    .urls
                    .into_iter()
                    .map(|url| {
                        let mut request = CrawlRequest::get(url);
                        request.priority = args.priority;
                        request.callback.clone_from(&args.callback);
                        request.dont_filter = args.dont_filter;
                        request
                    })
                    .collect();
                (args.queue, Action::Push(requests))
            }
            Self::Pop(args) => (args.queue, Action::Pop(args.count)),
            Self::Peek(queue) => (queue, Action::Peek),
            Self::Len(queue) => (queue, Action::Len),
        }
    }
}

/// Open the queue described by `settings` and run `action` against it.
fn run(settings: &Settings, action: Action, out: &mut impl Write) -> Result<(), Whatever> {
    let path = settings.require_disk()?;
    tracing::debug!(path = %path.display(), codec = %settings.codec, "opening queue");

    let converter = RequestConverter::new(settings.callbacks.iter().cloned());
    let builder = QueueBuilder::new(settings.queue.clone());
    match settings.codec {
        CodecKind::Object => {
            let queue = builder
                .build_records(ObjectCodec, converter)
                .whatever_context("Failed to open queue")?;
            execute(queue, action, out)
        }
        CodecKind::Primitive => {
            let queue = builder
                .build_records(PrimitiveCodec, converter)
                .whatever_context("Failed to open queue")?;
            execute(queue, action, out)
        }
    }
}

fn execute<C>(
    mut queue: RecordQueue<Store, C, RequestConverter>,
    action: Action,
    out: &mut impl Write,
) -> Result<(), Whatever>
where
    C: Codec<FlatRecord>,
{
    match action {
        Action::Push(requests) => {
            for request in &requests {
                queue
                    .push(request)
                    .with_whatever_context(|_| format!("Failed to push {}", request.url))?;
            }
            writeln!(out, "pushed {}, {} pending", requests.len(), queue.len())
                .whatever_context("Failed to write output")?;
        }
        Action::Pop(count) => {
            for _ in 0..count {
                let Some(request) = queue.pop().whatever_context("Failed to pop")? else {
                    break;
                };
                writeln!(out, "{request}").whatever_context("Failed to write output")?;
            }
        }
        Action::Peek => {
            if let Some(request) = queue.peek().whatever_context("Failed to peek")? {
                writeln!(out, "{request}").whatever_context("Failed to write output")?;
            }
        }
        Action::Len => {
            writeln!(out, "{}", queue.len()).whatever_context("Failed to write output")?;
        }
    }

    queue.close().whatever_context("Failed to close queue")
}

fn main() -> Result<(), Whatever> {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    let mut settings = cli.settings()?;
    let (queue_args, action) = cli.commands.into_parts();
    queue_args.apply(&mut settings);

    let _guards = init_global_logging("frontq", &settings.logging)
        .whatever_context("Failed to initialize logging")?;
    set_panic_hook();

    run(&settings, action, &mut io::stdout().lock())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_for(dir: &tempfile::TempDir, order: OrderArg, codec: CodecKind) -> Settings {
        let mut settings = Settings::default();
        QueueArgs {
            path: Some(dir.path().join("requests")),
            order: Some(order),
            codec: Some(codec),
            ..Default::default()
        }
        .apply(&mut settings);
        settings
    }

    fn run_to_string(settings: &Settings, action: Action) -> String {
        let mut out = Vec::new();
        run(settings, action, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn push_urls(urls: &[&str]) -> Action {
        Action::Push(urls.iter().map(|url| CrawlRequest::get(*url)).collect())
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from([
            "frontq",
            "push",
            "--path",
            "/tmp/q",
            "--order",
            "lifo",
            "--priority",
            "-3",
            "http://a",
            "http://b",
        ])
        .unwrap();
        let (args, action) = cli.commands.into_parts();
        assert_eq!(args.path, Some(PathBuf::from("/tmp/q")));
        let Action::Push(requests) = action else {
            panic!("expected push");
        };
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].priority, -3);
    }

    #[test]
    fn test_flags_override_config() {
        let mut settings = Settings::parse(
            "codec = \"primitive\"\n[queue]\norder = \"lifo\"\nchunk_size = 10\n",
        )
        .unwrap();
        QueueArgs {
            path: Some(PathBuf::from("/tmp/q")),
            order: Some(OrderArg::Fifo),
            sync: true,
            ..Default::default()
        }
        .apply(&mut settings);

        assert_eq!(settings.queue.order, QueueOrder::Fifo);
        assert_eq!(settings.queue.chunk_size, 10);
        assert_eq!(settings.queue.flush_mode, FlushMode::Sync);
        assert_eq!(settings.codec, CodecKind::Primitive);
    }

    #[test]
    fn test_fifo_session() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_for(&dir, OrderArg::Fifo, CodecKind::Object);

        let pushed = run_to_string(&settings, push_urls(&["http://a", "http://b", "http://c"]));
        assert_eq!(pushed, "pushed 3, 3 pending\n");
        assert_eq!(run_to_string(&settings, Action::Peek), "GET http://a\n");
        assert_eq!(
            run_to_string(&settings, Action::Pop(2)),
            "GET http://a\nGET http://b\n"
        );
        assert_eq!(run_to_string(&settings, Action::Len), "1\n");
    }

    #[test]
    fn test_lifo_session_drains() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_for(&dir, OrderArg::Lifo, CodecKind::Primitive);

        run_to_string(&settings, push_urls(&["http://a", "http://b"]));
        assert_eq!(
            run_to_string(&settings, Action::Pop(5)),
            "GET http://b\nGET http://a\n"
        );
        assert_eq!(run_to_string(&settings, Action::Peek), "");
        assert_eq!(run_to_string(&settings, Action::Len), "0\n");
    }

    #[test]
    fn test_run_requires_path() {
        let mut out = Vec::new();
        assert!(run(&Settings::default(), Action::Len, &mut out).is_err());
    }
}

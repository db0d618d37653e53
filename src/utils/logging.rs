//! Logging utilities
//!
//! `Logger` is the sink handed to a `Server` and threaded through to every
//! client it accepts. It wraps any `log::Log` implementation, so the same
//! server can log through the process-wide `env_logger`, a dedicated file
//! logger, or a capture in tests without touching global state.
//!
//! Fields travel as structured `log` key-values. `env_logger` renders them as
//! ` key=value` pairs after the message.

use log::kv::{self, Key, Source, Value, VisitSource};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::utils::rolling::{RollingFile, Rotation};

pub const DEFAULT_TARGET: &str = "tcpcat";

#[derive(Clone)]
enum Sink {
    Global,
    Custom(Arc<dyn Log>),
    Nop,
}

/// Leveled, structured log sink. Writing never fails the caller.
#[derive(Clone)]
pub struct Logger {
    sink: Sink,
    target: Arc<str>,
}

impl Logger {
    /// Forwards to whatever logger is installed behind the `log` facade.
    pub fn global() -> Self {
        Self {
            sink: Sink::Global,
            target: Arc::from(DEFAULT_TARGET),
        }
    }

    pub fn new(sink: Arc<dyn Log>) -> Self {
        Self {
            sink: Sink::Custom(sink),
            target: Arc::from(DEFAULT_TARGET),
        }
    }

    /// Discards everything.
    pub fn nop() -> Self {
        Self {
            sink: Sink::Nop,
            target: Arc::from(DEFAULT_TARGET),
        }
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Arc::from(target);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn debug(&self, message: &str, fields: &[(&str, &dyn fmt::Display)]) {
        self.log(Level::Debug, message, fields);
    }

    pub fn info(&self, message: &str, fields: &[(&str, &dyn fmt::Display)]) {
        self.log(Level::Info, message, fields);
    }

    pub fn error(&self, message: &str, fields: &[(&str, &dyn fmt::Display)]) {
        self.log(Level::Error, message, fields);
    }

    pub fn log(&self, level: Level, message: &str, fields: &[(&str, &dyn fmt::Display)]) {
        let sink: &dyn Log = match &self.sink {
            Sink::Global => log::logger(),
            Sink::Custom(sink) => sink.as_ref(),
            Sink::Nop => return,
        };

        let metadata = Metadata::builder()
            .level(level)
            .target(&self.target)
            .build();
        if !sink.enabled(&metadata) {
            return;
        }

        let fields = Fields(fields);
        sink.log(
            &Record::builder()
                .metadata(metadata)
                .args(format_args!("{}", message))
                .key_values(&fields)
                .build(),
        );
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sink = match self.sink {
            Sink::Global => "global",
            Sink::Custom(_) => "custom",
            Sink::Nop => "nop",
        };
        f.debug_struct("Logger")
            .field("sink", &sink)
            .field("target", &self.target)
            .finish()
    }
}

struct Fields<'a>(&'a [(&'a str, &'a dyn fmt::Display)]);

impl Source for Fields<'_> {
    fn visit<'kvs>(&'kvs self, visitor: &mut dyn VisitSource<'kvs>) -> Result<(), kv::Error> {
        for (key, value) in self.0 {
            visitor.visit_pair(Key::from_str(*key), Value::from_dyn_display(*value))?;
        }
        Ok(())
    }

    fn count(&self) -> usize {
        self.0.len()
    }
}

/// Logs every record to two loggers, each applying its own filter.
pub struct Tee {
    file: env_logger::Logger,
    console: env_logger::Logger,
}

impl Tee {
    pub fn new(file: env_logger::Logger, console: env_logger::Logger) -> Self {
        Self { file, console }
    }

    /// The most verbose level either side accepts.
    pub fn max_level(&self) -> LevelFilter {
        self.file.filter().max(self.console.filter())
    }
}

impl Log for Tee {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.file.enabled(metadata) || self.console.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        self.file.log(record);
        self.console.log(record);
    }

    fn flush(&self) {
        self.file.flush();
        self.console.flush();
    }
}

/// Builder for a logger that appends to `path` at info level and above,
/// rotating the file per `rotation`.
pub fn file_builder(path: &Path, rotation: Rotation) -> io::Result<env_logger::Builder> {
    let log_file = RollingFile::open(path, rotation)?;

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(LevelFilter::Info)
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .write_style(env_logger::WriteStyle::Never)
        .format_timestamp_millis();
    Ok(builder)
}

/// Builder for debug-level logging to stdout. `RUST_LOG` still takes
/// precedence.
pub fn console_builder() -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(LevelFilter::Debug)
        .target(env_logger::Target::Stdout)
        .parse_default_env();
    builder
}

/// Debug-level logging to stdout.
pub fn init_debug() {
    let _ = console_builder().try_init();
}

/// Installs the file logger from `file_builder` as the global logger.
pub fn init_file(path: &Path, rotation: Rotation) -> io::Result<()> {
    let mut builder = file_builder(path, rotation)?;
    let _ = builder.parse_default_env().try_init();
    Ok(())
}

/// Installs a global logger that writes info and above to the rotated file
/// at `path` and everything from debug up to stdout.
pub fn init_tee(path: &Path, rotation: Rotation) -> io::Result<()> {
    let file = file_builder(path, rotation)?.build();
    let tee = Tee::new(file, console_builder().build());
    let max_level = tee.max_level();
    if log::set_boxed_logger(Box::new(tee)).is_ok() {
        log::set_max_level(max_level);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    pub(crate) struct Event {
        pub(crate) level: Level,
        pub(crate) target: String,
        pub(crate) message: String,
        pub(crate) fields: Vec<(String, String)>,
    }

    impl Event {
        /// Message followed by ` key=value` pairs, as `env_logger` prints it.
        pub(crate) fn line(&self) -> String {
            let mut line = self.message.clone();
            for (key, value) in &self.fields {
                line.push_str(&format!(" {}={}", key, value));
            }
            line
        }
    }

    struct CollectFields<'a>(&'a mut Vec<(String, String)>);

    impl<'kvs> VisitSource<'kvs> for CollectFields<'_> {
        fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), kv::Error> {
            self.0.push((key.as_str().to_string(), value.to_string()));
            Ok(())
        }
    }

    /// Records every event it receives.
    #[derive(Default)]
    pub(crate) struct Capture {
        pub(crate) events: Mutex<Vec<Event>>,
    }

    impl Capture {
        pub(crate) fn messages(&self) -> Vec<String> {
            self.events.lock().unwrap().iter().map(Event::line).collect()
        }
    }

    impl Log for Capture {
        fn enabled(&self, _metadata: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            let mut fields = Vec::new();
            record
                .key_values()
                .visit(&mut CollectFields(&mut fields))
                .unwrap();
            self.events.lock().unwrap().push(Event {
                level: record.level(),
                target: record.target().to_string(),
                message: record.args().to_string(),
                fields,
            });
        }

        fn flush(&self) {}
    }

    #[test]
    fn test_fields_are_structured() {
        let capture = Arc::new(Capture::default());
        let logger = Logger::new(capture.clone()).with_target("unit");

        logger.info("accept new connection", &[("addr", &"127.0.0.1:9"), ("id", &42)]);
        logger.error("bare", &[]);

        let events = capture.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level, Level::Info);
        assert_eq!(events[0].target, "unit");
        assert_eq!(events[0].message, "accept new connection");
        assert_eq!(
            events[0].fields,
            vec![
                ("addr".to_string(), "127.0.0.1:9".to_string()),
                ("id".to_string(), "42".to_string()),
            ]
        );
        assert_eq!(events[0].line(), "accept new connection addr=127.0.0.1:9 id=42");
        assert_eq!(events[1].level, Level::Error);
        assert_eq!(events[1].message, "bare");
        assert!(events[1].fields.is_empty());
    }

    #[test]
    fn test_nop_logger_is_silent() {
        let logger = Logger::nop();
        logger.info("nothing", &[("k", &1)]);
        assert_eq!(logger.target(), DEFAULT_TARGET);
    }

    #[test]
    fn test_file_builder_writes_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tcpcat.log");

        let file_logger = file_builder(&path, Rotation::default()).unwrap().build();
        let logger = Logger::new(Arc::new(file_logger));
        logger.info("server started", &[("port", &9677)]);
        logger.debug("filtered out", &[]);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("server started port=9677"));
        assert!(!contents.contains("filtered out"));
    }

    #[test]
    fn test_tee_filters_each_side() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("tcpcat.log");
        let console_path = dir.path().join("console.log");

        let file = file_builder(&file_path, Rotation::default())
            .unwrap()
            .build();
        let console = file_builder(&console_path, Rotation::default())
            .unwrap()
            .filter_level(LevelFilter::Debug)
            .build();
        let tee = Tee::new(file, console);
        assert_eq!(tee.max_level(), LevelFilter::Debug);

        let logger = Logger::new(Arc::new(tee));
        logger.info("server started", &[("port", &9677)]);
        logger.debug("read success", &[("len", &4)]);

        let file = std::fs::read_to_string(&file_path).unwrap();
        let console = std::fs::read_to_string(&console_path).unwrap();
        assert!(file.contains("server started port=9677"));
        assert!(!file.contains("read success"));
        assert!(console.contains("server started port=9677"));
        assert!(console.contains("read success len=4"));
    }
}

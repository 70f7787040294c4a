//! Log sink for the CLI.
//!
//! A custom tracing layer that renders every event as
//! `YYYY-MM-DD HH:MM:SS [LEVEL] message`, duplicated to standard output and
//! to `CodeGen.log` in the working directory.

use std::fmt::Write as FmtWrite;
use std::io::Write as IoWrite;

use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Name of the log file created in the working directory.
pub const LOG_FILE: &str = "CodeGen.log";

/// A tracing layer that formats events and writes them to stdout and the
/// log file.
pub struct CodeGenLogLayer {
    file: NonBlocking,
}

impl CodeGenLogLayer {
    pub fn new(file: NonBlocking) -> Self {
        Self { file }
    }
}

impl<S> Layer<S> for CodeGenLogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut line = String::new();

        let now = chrono::Local::now();
        let _ = write!(line, "{} ", now.format("%Y-%m-%d %H:%M:%S"));
        let _ = write!(line, "[{}] ", level_label(*event.metadata().level()));

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        line.push_str(&visitor.message);

        println!("{}", line);
        let mut file = self.file.clone();
        let _ = writeln!(file, "{}", line);
    }
}

fn level_label(level: Level) -> &'static str {
    match level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

/// Visitor that extracts the `message` field from a tracing event.
#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_labels_match_log_format() {
        assert_eq!(level_label(Level::WARN), "WARNING");
        assert_eq!(level_label(Level::ERROR), "ERROR");
        assert_eq!(level_label(Level::INFO), "INFO");
    }
}

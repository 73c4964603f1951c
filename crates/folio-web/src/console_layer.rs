#![forbid(unsafe_code)]

//! Tracing layer that forwards events to the browser console.
//!
//! Each event becomes one line, `LEVEL target: message key=value ...`, and is
//! handed to a [`ConsoleSink`] together with its level so the browser sink
//! can pick `console.error`/`warn`/`info`/`debug`. The browser console
//! stamps its own time, so no timestamp is written.
//!
//! ```ignore
//! use folio_web::console_layer::{BrowserConsole, ConsoleLayer};
//! use tracing_subscriber::prelude::*;
//!
//! tracing_subscriber::registry()
//!     .with(ConsoleLayer::new(BrowserConsole))
//!     .init();
//! ```

use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Destination for formatted lines.
pub trait ConsoleSink: Send + Sync + 'static {
    fn write_line(&self, level: Level, line: &str);
}

/// Writes to `console.*` on wasm; discards elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserConsole;

impl ConsoleSink for BrowserConsole {
    #[cfg(target_arch = "wasm32")]
    fn write_line(&self, level: Level, line: &str) {
        use web_sys::console;
        let line = wasm_bindgen::JsValue::from_str(line);
        match level {
            Level::ERROR => console::error_1(&line),
            Level::WARN => console::warn_1(&line),
            Level::INFO => console::info_1(&line),
            Level::DEBUG | Level::TRACE => console::debug_1(&line),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn write_line(&self, _level: Level, _line: &str) {}
}

/// In-memory sink, for tests and headless runs.
#[derive(Debug, Default, Clone)]
pub struct CaptureSink {
    lines: Arc<Mutex<Vec<(Level, String)>>>,
}

impl CaptureSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines captured so far.
    #[must_use]
    pub fn lines(&self) -> Vec<(Level, String)> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ConsoleSink for CaptureSink {
    fn write_line(&self, level: Level, line: &str) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push((level, line.to_owned()));
    }
}

/// Output toggles.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Prefix the level. Default: true.
    pub show_level: bool,
    /// Show the target module path. Default: true.
    pub show_target: bool,
    /// Append structured fields. Default: true.
    pub show_fields: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            show_level: true,
            show_target: true,
            show_fields: true,
        }
    }
}

fn level_str(level: Level) -> &'static str {
    match level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARN ",
        Level::INFO => "INFO ",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    fields: Vec<(&'static str, String)>,
}

impl EventVisitor {
    fn push(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.push((field.name(), value));
        }
    }
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        let rendered = rendered
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .map_or_else(|| rendered.clone(), str::to_owned);
        self.push(field, rendered);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_owned());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value.to_string());
    }
}

/// `tracing_subscriber::Layer` writing one line per event to a sink.
pub struct ConsoleLayer<S> {
    sink: S,
    config: ConsoleConfig,
}

impl<S: ConsoleSink> ConsoleLayer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            config: ConsoleConfig::default(),
        }
    }

    #[must_use]
    pub fn show_level(mut self, show: bool) -> Self {
        self.config.show_level = show;
        self
    }

    #[must_use]
    pub fn show_target(mut self, show: bool) -> Self {
        self.config.show_target = show;
        self
    }

    #[must_use]
    pub fn show_fields(mut self, show: bool) -> Self {
        self.config.show_fields = show;
        self
    }

    fn format_event(&self, event: &Event<'_>) -> String {
        let metadata = event.metadata();
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let mut line = String::new();
        if self.config.show_level {
            line.push_str(level_str(*metadata.level()));
            line.push(' ');
        }
        if self.config.show_target {
            let _ = write!(line, "{}: ", metadata.target());
        }
        line.push_str(visitor.message.as_deref().unwrap_or_default());
        if self.config.show_fields {
            for (key, value) in &visitor.fields {
                let _ = write!(line, " {key}={value}");
            }
        }
        line
    }
}

impl<S, Sub> Layer<Sub> for ConsoleLayer<S>
where
    S: ConsoleSink,
    Sub: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, Sub>) {
        let line = self.format_event(event);
        self.sink.write_line(*event.metadata().level(), &line);
    }
}

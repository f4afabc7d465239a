//! In-memory log buffer backed by tracing subscriber events.

use std::collections::VecDeque;
use std::sync::{LazyLock, Mutex};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

pub const MAX_LOG_ENTRIES: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
    pub fields: Map<String, Value>,
}

/// Bounded ring of captured log entries; the oldest entry is dropped first.
pub struct LogBuffer {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn push(&self, entry: LogEntry) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Newest `limit` entries at or above `min_level`, oldest first.
    pub fn recent(&self, limit: usize, min_level: Option<Level>) -> Vec<LogEntry> {
        let safe_limit = limit.clamp(1, self.capacity);
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };

        let mut logs = entries
            .iter()
            .rev()
            .filter(|entry| min_level.is_none_or(|min| passes(&entry.level, min)))
            .take(safe_limit)
            .cloned()
            .collect::<Vec<_>>();
        logs.reverse();
        logs
    }

    pub fn clear(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let cleared = entries.len();
        entries.clear();
        cleared
    }
}

/// `tracing::Level` orders TRACE as the greatest, so "at least as severe"
/// is `<=`.
fn passes(level: &str, min: Level) -> bool {
    level
        .parse::<Level>()
        .map(|level| level <= min)
        .unwrap_or(true)
}

static LOG_BUFFER: LazyLock<LogBuffer> = LazyLock::new(|| LogBuffer::new(MAX_LOG_ENTRIES));

pub fn recent(limit: usize, min_level: Option<Level>) -> Vec<LogEntry> {
    LOG_BUFFER.recent(limit, min_level)
}

pub fn clear() -> usize {
    LOG_BUFFER.clear()
}

/// Layer that copies every event into the process-wide buffer.
#[derive(Default)]
pub struct LogCaptureLayer;

impl LogCaptureLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for LogCaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        LOG_BUFFER.push(capture(event));
    }
}

fn capture(event: &Event<'_>) -> LogEntry {
    let mut visitor = JsonVisitor::default();
    event.record(&mut visitor);

    let meta = event.metadata();
    LogEntry {
        timestamp: chrono::Utc::now().to_rfc3339(),
        level: meta.level().to_string().to_lowercase(),
        target: meta.target().to_string(),
        message: visitor.message.unwrap_or_else(|| meta.name().to_string()),
        fields: visitor.fields,
    }
}

#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl JsonVisitor {
    fn record_value(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
            return;
        }
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonVisitor {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record_value(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record_value(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_value(field, Value::from(format!("{value:?}")));
    }
}

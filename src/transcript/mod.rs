//! Transcript logging.
//!
//! [`TranscriptLogger`] reassembles the protocol lines of one exchange into a
//! single log record. Lines arrive through the [`LineSink`] interface tagged
//! with an [`ExchangeId`]; each exchange owns its own buffer, so concurrent
//! exchanges through one logger never interleave.
//!
//! # State Machine
//!
//! Per exchange:
//!
//! 1. **Idle**: no buffer exists for the exchange
//! 2. **Accumulating**: a request-start line (`--> GET ...`) opens a fresh buffer,
//!    discarding any residue; each following line is appended with a line break
//! 3. **Flush**: an end line (`<-- END HTTP` or `<-- HTTP FAILED`) appends itself,
//!    emits the whole buffer as one record and returns to Idle
//!
//! Lines whose trimmed content looks like a JSON object or array are
//! pretty-printed before being appended; malformed JSON is appended verbatim.
//!
//! A buffer that grows beyond the configured limit is flushed early with a
//! truncation note; the remaining lines of that exchange form a continuation
//! record.
//!
//! # Examples
//!
//! ```
//! use profile_http::interceptor::{ExchangeId, LineSink};
//! use profile_http::transcript::{RecordSink, TranscriptLogger};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Collect(Mutex<Vec<String>>);
//!
//! impl RecordSink for Collect {
//!     fn emit(&self, _exchange: ExchangeId, record: &str) {
//!         self.0.lock().unwrap().push(record.to_string());
//!     }
//! }
//!
//! let records = Arc::new(Collect::default());
//! let logger = TranscriptLogger::with_sink(records.clone());
//! let id = ExchangeId::new();
//!
//! logger.log(id, "--> POST http://localhost/api");
//! logger.log(id, r#"{"a":1}"#);
//! logger.log(id, "<-- END HTTP (7-byte body)");
//!
//! let records = records.0.lock().unwrap();
//! assert_eq!(records.len(), 1);
//! assert!(records[0].contains("\"a\": 1"));
//! ```

mod json;

pub use json::{is_structural_json, pretty_json, render_line};

use crate::interceptor::{ExchangeId, LineSink};
use crate::protocol::constants::markers;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Default per-exchange buffer limit (1 MiB).
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 1024 * 1024;

const TRUNCATED_NOTE: &str = "<-- TRANSCRIPT TRUNCATED (continues in next record)";

fn request_start_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^--> ([A-Z]+) \S").expect("static pattern compiles"))
}

/// Whether `line` opens a new exchange (`--> METHOD url`).
pub fn is_request_start(line: &str) -> bool {
    request_start_pattern()
        .captures(line)
        .map_or(false, |caps| &caps[1] != "END")
}

/// Whether `line` closes an exchange.
pub fn is_exchange_end(line: &str) -> bool {
    line.starts_with(markers::END_OF_EXCHANGE) || line.starts_with(markers::EXCHANGE_FAILED)
}

/// Per-exchange transcript state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptState {
    /// No buffer open
    Idle,
    /// Lines are being collected
    Accumulating,
}

/// Destination of completed transcripts.
pub trait RecordSink: Send + Sync + 'static {
    /// Receive one complete transcript.
    fn emit(&self, exchange: ExchangeId, record: &str);
}

/// Sink writing each transcript as one `info` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl RecordSink for TracingSink {
    fn emit(&self, exchange: ExchangeId, record: &str) {
        tracing::info!(exchange = %exchange, "\n{}", record);
    }
}

/// Line sink assembling each exchange into one record.
pub struct TranscriptLogger {
    buffers: Mutex<HashMap<ExchangeId, String>>,
    max_buffer_bytes: usize,
    sink: Arc<dyn RecordSink>,
}

impl TranscriptLogger {
    /// Logger emitting through `tracing`.
    pub fn new() -> Self {
        Self::with_sink(Arc::new(TracingSink))
    }

    /// Logger emitting to `sink`.
    pub fn with_sink(sink: Arc<dyn RecordSink>) -> Self {
        Self {
            buffers: Mutex::new(HashMap::new()),
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            sink,
        }
    }

    /// Change the per-exchange buffer limit.
    pub fn max_buffer_bytes(mut self, limit: usize) -> Self {
        self.max_buffer_bytes = limit;
        self
    }

    /// State of `exchange`.
    pub fn state(&self, exchange: ExchangeId) -> TranscriptState {
        if self.buffers.lock().contains_key(&exchange) {
            TranscriptState::Accumulating
        } else {
            TranscriptState::Idle
        }
    }

    /// Text buffered so far for `exchange`.
    pub fn buffered(&self, exchange: ExchangeId) -> Option<String> {
        self.buffers.lock().get(&exchange).cloned()
    }

    /// Number of exchanges with an open buffer.
    pub fn open_exchanges(&self) -> usize {
        self.buffers.lock().len()
    }

    /// Drop the buffer of an exchange that will never complete.
    pub fn discard(&self, exchange: ExchangeId) -> Option<String> {
        self.buffers.lock().remove(&exchange)
    }
}

impl Default for TranscriptLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSink for TranscriptLogger {
    fn log(&self, exchange: ExchangeId, line: &str) {
        let rendered = render_line(line);

        let record = {
            let mut buffers = self.buffers.lock();
            if is_request_start(line) {
                buffers.insert(exchange, String::new());
            }

            let buffer = buffers.entry(exchange).or_default();
            buffer.push_str(&rendered);
            buffer.push('\n');
            let oversized = buffer.len() > self.max_buffer_bytes;

            if is_exchange_end(line) {
                buffers.remove(&exchange)
            } else if oversized {
                buffers.remove(&exchange).map(|mut text| {
                    text.push_str(TRUNCATED_NOTE);
                    text.push('\n');
                    text
                })
            } else {
                None
            }
        };

        if let Some(record) = record {
            self.sink.emit(exchange, &record);
        }
    }
}

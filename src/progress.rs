//! Embed progress reporting.
//!
//! Reports per-document progress during `eda embed` so users see how many
//! documents are left and which ones failed. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;
use std::str::FromStr;

/// A single progress event for an embed run.
#[derive(Clone, Debug, PartialEq)]
pub enum EmbedProgressEvent {
    /// Work is about to start on `total` documents.
    Started { kind: String, total: u64 },
    /// Document `text_id` finished; `n` of `total` documents are done.
    Document {
        kind: String,
        text_id: u32,
        n: u64,
        total: u64,
        ok: bool,
    },
}

/// Reports embed progress. Implementations write to stderr (human or JSON).
pub trait EmbedProgressReporter: Send + Sync {
    fn report(&self, event: EmbedProgressEvent);
}

/// Human-friendly progress on stderr: "embed openai-3-small  12 / 58 documents".
pub struct StderrProgress;

impl EmbedProgressReporter for StderrProgress {
    fn report(&self, event: EmbedProgressEvent) {
        let line = match &event {
            EmbedProgressEvent::Started { kind, total } => {
                format!("embed {}  {} documents\n", kind, group_thousands(*total))
            }
            EmbedProgressEvent::Document {
                kind,
                text_id,
                n,
                total,
                ok,
            } => {
                let status = if *ok { "" } else { "  (failed)" };
                format!(
                    "embed {}  {} / {} documents  text {}{}\n",
                    kind,
                    group_thousands(*n),
                    group_thousands(*total),
                    text_id,
                    status
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl EmbedProgressReporter for JsonProgress {
    fn report(&self, event: EmbedProgressEvent) {
        let obj = match &event {
            EmbedProgressEvent::Started { kind, total } => serde_json::json!({
                "event": "started",
                "kind": kind,
                "total": total
            }),
            EmbedProgressEvent::Document {
                kind,
                text_id,
                n,
                total,
                ok,
            } => serde_json::json!({
                "event": "progress",
                "kind": kind,
                "text_id": text_id,
                "n": n,
                "total": total,
                "ok": ok
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl EmbedProgressReporter for NoProgress {
    fn report(&self, _event: EmbedProgressEvent) {}
}

/// Digits grouped by thousands: `1234567` becomes `1,234,567`.
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let lead = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.char_indices() {
        if i > 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn EmbedProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "unknown progress mode '{}' (expected off, human, or json)",
                other
            )),
        }
    }
}

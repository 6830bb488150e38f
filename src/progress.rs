//! Import progress reporting.
//!
//! Reports what `gutintel import` and `gutintel validate` are doing so users
//! see how many files were found and how far along the run is. Progress is
//! emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for an import run.
#[derive(Clone, Debug, PartialEq)]
pub enum ImportProgressEvent {
    /// Walking the input path. Total unknown.
    Discovering { root: String },
    /// Files parsed and validated as one batch.
    Validated { files: u64, accepted: u64 },
    /// Accepted records written so far.
    Writing { n: u64, total: u64 },
}

/// Reports import progress. Implementations write to stderr (human or JSON).
pub trait ImportProgressReporter: Send + Sync {
    fn report(&self, event: ImportProgressEvent);
}

/// Human-friendly progress on stderr: "import data/  writing  12 / 40 records".
pub struct StderrProgress;

impl ImportProgressReporter for StderrProgress {
    fn report(&self, event: ImportProgressEvent) {
        let line = match &event {
            ImportProgressEvent::Discovering { root } => {
                format!("import {}  discovering...\n", root)
            }
            ImportProgressEvent::Validated { files, accepted } => format!(
                "import  validated  {} files, {} accepted\n",
                format_number(*files),
                format_number(*accepted)
            ),
            ImportProgressEvent::Writing { n, total } => format!(
                "import  writing  {} / {} records\n",
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ImportProgressReporter for JsonProgress {
    fn report(&self, event: ImportProgressEvent) {
        let obj = match &event {
            ImportProgressEvent::Discovering { root } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "root": root
            }),
            ImportProgressEvent::Validated { files, accepted } => serde_json::json!({
                "event": "progress",
                "phase": "validated",
                "files": files,
                "accepted": accepted
            }),
            ImportProgressEvent::Writing { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "writing",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ImportProgressReporter for NoProgress {
    fn report(&self, _event: ImportProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    Auto,
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Resolves `Auto` against the terminal.
    pub fn resolve(self) -> Self {
        match self {
            ProgressMode::Auto if atty::is(atty::Stream::Stderr) => ProgressMode::Human,
            ProgressMode::Auto => ProgressMode::Off,
            other => other,
        }
    }

    pub fn reporter(&self) -> Box<dyn ImportProgressReporter> {
        match self.resolve() {
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
            ProgressMode::Off | ProgressMode::Auto => Box::new(NoProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn explicit_modes_resolve_to_themselves() {
        assert_eq!(ProgressMode::Json.resolve(), ProgressMode::Json);
        assert_eq!(ProgressMode::Off.resolve(), ProgressMode::Off);
        assert_ne!(ProgressMode::Auto.resolve(), ProgressMode::Auto);
    }
}

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Pipeline stage that issued a model call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Generation,
    Critique,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Generation => write!(f, "generation"),
            Stage::Critique => write!(f, "critique"),
        }
    }
}

/// Structured log events for a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    RunStarted {
        run_id: String,
        competency: String,
        level: String,
        track: String,
        duration_minutes: u32,
    },
    GenerationStarted {
        run_id: String,
        cycle: usize,
    },
    /// A model call is being retried after a transport or output failure
    CallRetried {
        run_id: String,
        stage: Stage,
        reason: String,
        attempt: u32,
        error: String,
    },
    GenerationCompleted {
        run_id: String,
        cycle: usize,
        criteria: usize,
        duration_secs: f64,
    },
    CritiqueStarted {
        run_id: String,
        cycle: usize,
    },
    CritiqueCompleted {
        run_id: String,
        cycle: usize,
        verdict: String,
        findings: usize,
        duration_secs: f64,
    },
    Regenerating {
        run_id: String,
        cycle: usize,
        findings: Vec<String>,
    },
    RunAccepted {
        run_id: String,
        cycles: usize,
        summary: String,
        duration_secs: f64,
    },
    RunFailed {
        run_id: String,
        failed_in: String,
        reason: String,
        findings: Vec<String>,
    },
    RunCancelled {
        run_id: String,
        state: String,
    },
    ExportCompleted {
        run_id: String,
        json_path: PathBuf,
        markdown_path: PathBuf,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for pipeline events - handles both console output and file logging.
///
/// Shared by concurrent runs; every event carries its `run_id`.
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
    quiet: bool,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
            quiet: false,
        }
    }

    /// A logger that writes nothing to the console
    pub fn quiet() -> Self {
        Self {
            format: LogFormat::Compact,
            file_writer: None,
            quiet: true,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
            quiet: false,
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON lines
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                if let Err(e) = writeln!(file, "{}", json) {
                    tracing::warn!(error = %e, "Failed to write log file entry");
                }
            }
        }

        if self.quiet {
            return;
        }

        let line = match self.format {
            LogFormat::Json => serde_json::to_string(event).ok(),
            LogFormat::Pretty => Self::render_pretty(event),
            LogFormat::Compact => Some(Self::render_compact(event)),
        };
        if let Some(line) = line {
            // One write per event so concurrent runs do not interleave lines
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }

    fn render_pretty(event: &LogEvent) -> Option<String> {
        let text = match event {
            LogEvent::RunStarted {
                run_id,
                competency,
                level,
                track,
                duration_minutes,
            } => {
                let border = "─".repeat(69);
                [
                    String::new(),
                    format!("╭{}╮", border).bright_blue().to_string(),
                    format!(
                        "{}  {} {}",
                        "│".bright_blue(),
                        "skillassess".bold().bright_white(),
                        short_id(run_id).dimmed()
                    ),
                    format!(
                        "{}  {} {}",
                        "│".bright_blue(),
                        "Competency:".dimmed(),
                        truncate(competency, 54)
                    ),
                    format!(
                        "{}  {} {} · {} · {} min",
                        "│".bright_blue(),
                        "Context:".dimmed(),
                        level,
                        track,
                        duration_minutes
                    ),
                    format!("╰{}╯", border).bright_blue().to_string(),
                ]
                .join("\n")
            }
            LogEvent::GenerationStarted { cycle, .. } => format!(
                "{} {} {}",
                "▶".bright_cyan(),
                "GENERATE".bright_cyan().bold(),
                format!("(cycle {})", cycle + 1).dimmed()
            ),
            LogEvent::CallRetried {
                stage,
                reason,
                attempt,
                error,
                ..
            } => format!(
                "    {} {} retry after attempt {} ({}): {}",
                "↻".bright_yellow(),
                stage,
                attempt,
                reason,
                truncate(error, 80).dimmed()
            ),
            LogEvent::GenerationCompleted {
                criteria,
                duration_secs,
                ..
            } => format!(
                "    {} Draft with {} criteria ({:.1}s)",
                "✓".bright_green(),
                criteria,
                duration_secs
            ),
            LogEvent::CritiqueStarted { .. } => format!(
                "{} {}",
                "▶".bright_magenta(),
                "CRITIQUE".bright_magenta().bold()
            ),
            LogEvent::CritiqueCompleted {
                verdict,
                duration_secs,
                ..
            } => {
                let styled = if verdict.starts_with("ACCEPTED") {
                    format!("✓ Verdict: {}", verdict).bright_green().to_string()
                } else {
                    format!("→ Verdict: {}", verdict).bright_yellow().to_string()
                };
                format!("    {} ({:.1}s)", styled, duration_secs)
            }
            LogEvent::Regenerating { findings, .. } => {
                let mut lines = vec![format!(
                    "  {} Regenerating with {} finding(s)",
                    "↺".bright_yellow(),
                    findings.len()
                )];
                lines.extend(findings.iter().map(|f| format!("    {} {}", "│".dimmed(), f)));
                lines.join("\n")
            }
            // The final outcome is printed by the binary
            LogEvent::RunAccepted { .. } => return None,
            LogEvent::RunFailed {
                failed_in, reason, ..
            } => format!(
                "{} Run failed in {}: {}",
                "✗".bright_red(),
                failed_in,
                reason.bright_red()
            ),
            LogEvent::RunCancelled { state, .. } => format!(
                "{} Run cancelled during {}",
                "⚠".bright_yellow(),
                state
            ),
            LogEvent::ExportCompleted {
                json_path,
                markdown_path,
                ..
            } => format!(
                "  {} {}\n  {} {}",
                "📄".dimmed(),
                json_path.display(),
                "📄".dimmed(),
                markdown_path.display()
            ),
        };
        Some(text)
    }

    fn render_compact(event: &LogEvent) -> String {
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        match event {
            LogEvent::RunStarted { run_id, .. } => {
                format!("[{}] {} run:start", timestamp, short_id(run_id))
            }
            LogEvent::GenerationStarted { run_id, cycle } => {
                format!("[{}] {} gen:start:{}", timestamp, short_id(run_id), cycle + 1)
            }
            LogEvent::CallRetried {
                run_id,
                stage,
                reason,
                attempt,
                ..
            } => format!(
                "[{}] {} {}:retry:{} {}",
                timestamp,
                short_id(run_id),
                stage,
                attempt,
                reason
            ),
            LogEvent::GenerationCompleted {
                run_id,
                cycle,
                duration_secs,
                ..
            } => format!(
                "[{}] {} gen:done:{} {:.1}s",
                timestamp,
                short_id(run_id),
                cycle + 1,
                duration_secs
            ),
            LogEvent::CritiqueStarted { run_id, cycle } => {
                format!("[{}] {} critique:start:{}", timestamp, short_id(run_id), cycle + 1)
            }
            LogEvent::CritiqueCompleted {
                run_id,
                cycle,
                verdict,
                ..
            } => format!(
                "[{}] {} critique:done:{} {}",
                timestamp,
                short_id(run_id),
                cycle + 1,
                verdict
            ),
            LogEvent::Regenerating {
                run_id,
                cycle,
                findings,
            } => format!(
                "[{}] {} regen:{} findings={}",
                timestamp,
                short_id(run_id),
                cycle + 1,
                findings.len()
            ),
            LogEvent::RunAccepted {
                run_id,
                cycles,
                duration_secs,
                ..
            } => format!(
                "[{}] {} run:accepted cycles={} {:.1}s",
                timestamp,
                short_id(run_id),
                cycles,
                duration_secs
            ),
            LogEvent::RunFailed {
                run_id,
                failed_in,
                reason,
                ..
            } => format!(
                "[{}] {} run:failed:{} {}",
                timestamp,
                short_id(run_id),
                failed_in,
                reason
            ),
            LogEvent::RunCancelled { run_id, state } => {
                format!("[{}] {} run:cancelled:{}", timestamp, short_id(run_id), state)
            }
            LogEvent::ExportCompleted {
                run_id, json_path, ..
            } => format!(
                "[{}] {} export {}",
                timestamp,
                short_id(run_id),
                json_path.display()
            ),
        }
    }
}

fn short_id(run_id: &str) -> &str {
    run_id.get(..8).unwrap_or(run_id)
}

/// Truncate to `max_chars` characters
fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars.saturating_sub(3)) {
        Some((cut, _)) if s.chars().count() > max_chars => format!("{}...", &s[..cut]),
        _ => s.to_string(),
    }
}

// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

impl OutputMode {
    pub fn from_flags(quiet: bool, json: bool) -> Self {
        match (quiet, json) {
            (_, true) => OutputMode::Json,
            (true, false) => OutputMode::Quiet,
            (false, false) => OutputMode::Normal,
        }
    }
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Instant,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: Instant::now(),
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            eprintln!("{message}");
        }
    }

    /// Print a success message, with elapsed time in normal mode.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                println!("{message} ({:.1}s)", self.start_time.elapsed().as_secs_f64());
            }
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => self.event("success", message),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => {
                if let Some(json) = event_json("error", message, self.start_time) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print a table of rows, or one JSON object per row.
    pub fn rows<T: Serialize>(&self, header: &[&str], rows: &[T], cells: impl Fn(&T) -> Vec<String>) {
        match self.mode {
            OutputMode::Json => {
                for row in rows {
                    if let Ok(json) = serde_json::to_string(row) {
                        println!("{json}");
                    }
                }
            }
            OutputMode::Quiet => {
                for row in rows {
                    if let Some(first) = cells(row).into_iter().next() {
                        println!("{first}");
                    }
                }
            }
            OutputMode::Normal => {
                let table: Vec<Vec<String>> = rows.iter().map(&cells).collect();
                print!("{}", render_table(header, &table));
            }
        }
    }

    fn event(&self, event: &str, message: &str) {
        if let Some(json) = event_json(event, message, self.start_time) {
            println!("{json}");
        }
    }
}

fn event_json(event: &str, message: &str, start_time: Instant) -> Option<String> {
    serde_json::to_string(&JsonEvent {
        event,
        message,
        duration_secs: start_time.elapsed().as_secs_f64(),
    })
    .ok()
}

/// Left-aligned columns padded to the widest cell.
fn render_table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut out = line(header.to_vec());
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    out
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    duration_secs: f64,
}

//! Plain-text rendering of a pipeline run for the terminal.

use std::fmt::Write;

use np_protocol::{CommandCategory, ExecutionRecord, PipelineState, RecordStatus};

const RULE: &str = "----------------------------------------";

/// Render the whole run: commands by category, then every record.
pub fn render_state(state: &PipelineState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Query: {}", state.query);
    let _ = writeln!(out, "Status: {:?}", state.status);
    let _ = writeln!(out, "Run: {}  ({})", state.id, state.timestamp.to_rfc3339());

    if let Some(message) = &state.error_message {
        let _ = writeln!(out, "\nError: {message}");
    }

    if let Some(commands) = &state.commands {
        let _ = writeln!(out, "\n== Commands to Execute ==");
        for category in CommandCategory::ALL {
            let _ = writeln!(out, "\n{} Commands", capitalize(category.as_str()));
            let list = commands.get(category);
            if list.is_empty() {
                let _ = writeln!(out, "  (none)");
            }
            for command in list {
                let _ = writeln!(out, "  {command}");
            }
        }
    }

    if !state.execution_results.is_empty() {
        let _ = writeln!(out, "\n== Execution Results ==");
        for record in &state.execution_results {
            out.push('\n');
            out.push_str(&render_record(record));
        }
    }

    out
}

/// One record: type, command, status marker and output.
pub fn render_record(record: &ExecutionRecord) -> String {
    let marker = match record.status {
        RecordStatus::Success => "[OK]",
        RecordStatus::Failed => "[FAILED]",
    };
    let mut out = String::new();
    let _ = writeln!(out, "Command Type: {}", record.kind.as_str().to_uppercase());
    let _ = writeln!(out, "Command: {}", record.command);
    if let Some(batch) = record.batch_commands() {
        for line in batch {
            let _ = writeln!(out, "  | {line}");
        }
    }
    let _ = writeln!(out, "Status: {marker} {}", record.status);
    if !record.output.is_empty() {
        for line in record.output.lines() {
            let _ = writeln!(out, "    {line}");
        }
    }
    let _ = writeln!(out, "{RULE}");
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

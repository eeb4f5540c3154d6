//! CLI output formatting utilities.

use crate::config::Persona;
use crate::session::{ToolCallRecord, ToolStatus};
use crate::tools::tool_purpose;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a persona entry.
    pub fn persona(persona: &Persona, selected: bool) {
        let marker = if selected {
            style("*").green().bold()
        } else {
            style("*").cyan()
        };
        println!(
            "  {} {} {} ({}, {})",
            marker,
            persona.avatar,
            style(persona.name).bold(),
            style(persona.key).dim(),
            persona.house
        );
        println!("      {}", style(persona.description).dim());
    }

    /// Print a tool call: name, purpose, status, duration when settled, a
    /// one-line input summary, and the error or media result.
    pub fn tool_call(record: &ToolCallRecord) {
        let icon = match record.status {
            ToolStatus::Pending => style("…").yellow(),
            ToolStatus::Completed => style("✓").green(),
            ToolStatus::Error => style("✗").red(),
        };
        let timing = record
            .duration_ms
            .map(format_duration_ms)
            .unwrap_or_default();
        println!(
            "  {} {} {} {}",
            icon,
            style(format!("[{}]", record.tool_name)).dim(),
            tool_purpose(&record.tool_name),
            style(timing).dim()
        );

        let input = format_input(&record.input);
        if !input.is_empty() {
            println!("    {} {}", style("Input:").dim(), content_preview(&input, 120));
        }
        if let Some(error) = &record.error {
            println!("    {}", style(content_preview(error, 120)).red());
        }
        if record.status == ToolStatus::Completed {
            if let Some(result) = &record.result {
                for (key, value) in media_details(result) {
                    println!("    {}: {}", style(key).dim(), value);
                }
            }
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Format milliseconds as a short human-readable duration.
fn format_duration_ms(ms: u64) -> String {
    if ms >= 60_000 {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1000)
    } else if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

/// Short summary of a tool input: the query, prompt or url it is about.
fn format_input(input: &Value) -> String {
    if let Some(text) = input.as_str() {
        return text.to_string();
    }
    for key in ["query", "prompt", "url"] {
        if let Some(text) = input[key].as_str() {
            return text.to_string();
        }
    }
    if let Some(urls) = input["urls"].as_array() {
        return urls
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", ");
    }
    match input {
        Value::Null => String::new(),
        Value::Object(map) if map.is_empty() => String::new(),
        other => other.to_string(),
    }
}

/// Labelled lines for an image or video result. Empty for anything else.
fn media_details(result: &Value) -> Vec<(&'static str, String)> {
    let mut details = Vec::new();
    let (kind, info_key) = match result["type"].as_str() {
        Some("image") => ("Image", "uploadInfo"),
        Some("video") => ("Video", "videoInfo"),
        _ => return details,
    };
    let Some(url) = result["url"].as_str() else {
        return details;
    };

    details.push((kind, url.to_string()));
    if let Some(prompt) = result["prompt"].as_str() {
        details.push(("Prompt", prompt.to_string()));
    }

    let info = &result[info_key];
    if kind == "Image" {
        if let Some(title) = info["title"].as_str() {
            details.push(("Title", title.to_string()));
        }
        if let Some(size) = info["size"].as_u64() {
            details.push(("Size", format!("{:.1} KB", size as f64 / 1024.0)));
        }
    } else if info.is_object() {
        let field = |key: &str| match &info[key] {
            Value::String(s) => s.clone(),
            Value::Null => "?".to_string(),
            other => other.to_string(),
        };
        details.push((
            "Format",
            format!(
                "{} {}, {} frames at {} fps",
                field("resolution"),
                field("aspect_ratio"),
                field("num_frames"),
                field("frame_rate")
            ),
        ));
    }
    details
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

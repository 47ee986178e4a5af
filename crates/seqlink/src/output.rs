use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Where a printed body came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Reply,
    Push,
}

impl BodyKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::Push => "push",
        }
    }
}

#[derive(Serialize)]
struct BodyOutput<'a> {
    kind: BodyKind,
    endpoint: &'a str,
    size: usize,
    hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<u128>,
    timestamp: String,
}

pub struct Printed<'a> {
    pub kind: BodyKind,
    pub endpoint: &'a str,
    pub body: &'a [u8],
    pub elapsed_ms: Option<u128>,
}

pub fn print_body(printed: &Printed<'_>, format: OutputFormat) {
    let body = printed.body;
    match format {
        OutputFormat::Json => {
            let out = BodyOutput {
                kind: printed.kind,
                endpoint: printed.endpoint,
                size: body.len(),
                hex: hex::encode(body),
                text: printable_text(body),
                elapsed_ms: printed.elapsed_ms,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "SIZE", "ENDPOINT", "BODY"])
                .add_row(vec![
                    printed.kind.as_str().to_string(),
                    body.len().to_string(),
                    printed.endpoint.to_string(),
                    body_preview(body),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let elapsed = printed
                .elapsed_ms
                .map(|ms| format!(" elapsed={ms}ms"))
                .unwrap_or_default();
            println!(
                "{} size={} endpoint={}{} body={}",
                printed.kind.as_str(),
                body.len(),
                printed.endpoint,
                elapsed,
                body_preview(body)
            );
        }
        OutputFormat::Raw => print_raw(body),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// The body as text when it is printable UTF-8.
fn printable_text(body: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(body).ok()?;
    text.chars()
        .all(|c| !c.is_control() || c == '\n' || c == '\t')
        .then_some(text)
}

fn body_preview(body: &[u8]) -> String {
    match printable_text(body) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => format!("0x{}", hex::encode(body)),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

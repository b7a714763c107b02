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

#[derive(Serialize)]
struct LineOutput<'a> {
    kind: &'static str,
    peer: &'a str,
    chars: usize,
    line: &'a str,
    timestamp: String,
}

pub fn print_line(line: &str, peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = LineOutput {
                kind: "line-received",
                peer,
                chars: line.chars().count(),
                line,
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
                .set_header(vec!["PEER", "CHARS", "LINE"])
                .add_row(vec![
                    peer.to_string(),
                    line.chars().count().to_string(),
                    line.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("peer={} chars={} line={:?}", peer, line.chars().count(), line);
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            let _ = writeln!(out, "{line}");
            let _ = out.flush();
        }
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

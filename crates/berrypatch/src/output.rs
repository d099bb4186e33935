//! What berrypatch prints
//!
//! Status lines start with a four-column tag (`  ok`, `  ..`, `warn`,
//! `fail`) so they read the same without colour. Warnings and failures go
//! to stderr; results, tables and JSON go to stdout.

use console::{style, StyledObject};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

const DETAIL_INDENT: &str = "     ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Done,
    Progress,
    Caution,
    Failed,
}

impl Tone {
    fn tag(self) -> StyledObject<&'static str> {
        match self {
            Self::Done => style("  ok").green().bold(),
            Self::Progress => style("  ..").cyan(),
            Self::Caution => style("warn").yellow().bold(),
            Self::Failed => style("fail").red().bold(),
        }
    }

    fn is_problem(self) -> bool {
        matches!(self, Self::Caution | Self::Failed)
    }
}

fn status_line(tone: Tone, msg: &str) -> String {
    format!("{} {}", tone.tag(), msg)
}

fn say(tone: Tone, msg: &str) {
    let line = status_line(tone, msg);
    if tone.is_problem() {
        eprintln!("{}", line);
    } else {
        println!("{}", line);
    }
}

pub fn success(msg: &str) {
    say(Tone::Done, msg);
}

pub fn info(msg: &str) {
    say(Tone::Progress, msg);
}

pub fn warning(msg: &str) {
    say(Tone::Caution, msg);
}

pub fn error(msg: &str) {
    say(Tone::Failed, msg);
}

/// Title above a table
pub fn header(title: &str) {
    println!("{}", style(title).bold());
}

fn detail_line(key: &str, value: &str) -> String {
    format!("{}{} {}", DETAIL_INDENT, style(format!("{:<10}", key)).dim(), value)
}

/// Aligned `key value` line under the preceding status line
pub fn kv(key: &str, value: &str) {
    println!("{}", detail_line(key, value));
}

pub fn table<T: Tabled>(rows: Vec<T>) {
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);
}

pub fn json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

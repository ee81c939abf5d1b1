use std::collections::HashMap;

use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::error::ClassifyError;
use crate::models::{
    confidence_distribution, percent, ClassificationBatch, ClassificationResult, SensitivityLevel,
    MAX_CONFIDENCE, MIN_CONFIDENCE,
};
use crate::session::HistoryEntry;

/// Print the tool banner once per session.
pub fn render_banner(quiet: bool) {
    if !quiet {
        println!(
            "\n {} v{}",
            "sensitivity-checkr".bold(),
            env!("CARGO_PKG_VERSION")
        );
    }
}

/// Visible width between the box borders.
const BOX_WIDTH: usize = 48;

/// Render one classified batch: summary box, result table, flagged columns.
pub fn render_batch(source_name: &str, batch: &ClassificationBatch, quiet: bool) {
    let flagged: Vec<&ClassificationResult> =
        batch.results.iter().filter(|r| r.is_flagged()).collect();

    if quiet {
        println!("{}", summary_line(source_name, &batch.results));
        return;
    }

    println!(" Classified: {} ({})\n", source_name, batch.model);

    // Summary box
    println!("{}", box_border('┌', '┐'));
    println!(" │  {:<width$} │", "SUMMARY".bold(), width = BOX_WIDTH);
    println!("{}", box_text(&format!("Total columns      : {}", batch.results.len())));
    for level in SensitivityLevel::REPORT_ORDER {
        let text = format!("{:<17}: {:>4}", level.label(), batch.count(level));
        println!("{}", box_row(&marker(level), &text));
    }
    println!("{}", box_text(""));
    for line in confidence_lines(&batch.results) {
        println!("{}", box_text(&line));
    }
    println!("{}\n", box_border('└', '┘'));

    println!("{}", results_table(&batch.results));
    println!();

    if !flagged.is_empty() {
        println!(" {} Columns needing review:\n", "[WARN]".yellow().bold());
        for r in flagged {
            println!("   {} {}", "⚠".yellow(), flag_note(r));
        }
        println!();
    }
}

fn box_border(left: char, right: char) -> String {
    format!(" {}{}{}", left, "─".repeat(BOX_WIDTH + 3), right)
}

/// Box line holding plain text.
fn box_text(text: &str) -> String {
    format!(" │  {:<width$} │", text, width = BOX_WIDTH)
}

/// Box line with a one-column marker in front of the text. The text is padded
/// on its own so color escapes in the marker never shift the right border.
fn box_row(marker: &dyn std::fmt::Display, text: &str) -> String {
    format!(" │  {}  {:<width$} │", marker, text, width = BOX_WIDTH - 3)
}

/// Share of columns at each confidence score, highest score first.
fn confidence_lines(results: &[ClassificationResult]) -> Vec<String> {
    let counts = confidence_distribution(results);
    let total = results.len();
    (MIN_CONFIDENCE..=MAX_CONFIDENCE)
        .rev()
        .map(|score| {
            let n = counts[usize::from(score - MIN_CONFIDENCE)];
            let pct = percent(n, total);
            format!(
                "Confidence {}/5     : {:>4}  {:>3}%  {}",
                score,
                n,
                pct,
                "█".repeat(pct / 10)
            )
        })
        .collect()
}

/// Report a failed batch. Nothing partial is shown.
pub fn render_failure(source_name: &str, err: &ClassifyError) {
    eprintln!(" {} {}: {}", "[ERROR]".red().bold(), source_name, err);
}

/// The recent-runs overview followed by each run's per-column results,
/// most recent last.
pub fn history_report<'a>(entries: impl ExactSizeIterator<Item = &'a HistoryEntry>) -> String {
    if entries.len() == 0 {
        return " No classification runs in this session.\n".to_string();
    }

    let mut overview = Table::new();
    overview
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("When").add_attribute(Attribute::Bold),
            Cell::new("Source").add_attribute(Attribute::Bold),
            Cell::new("Columns").add_attribute(Attribute::Bold),
            Cell::new("Sensitive").add_attribute(Attribute::Bold),
            Cell::new("Flagged").add_attribute(Attribute::Bold),
        ]);

    let mut details = String::new();
    for (index, entry) in entries.enumerate() {
        let sensitive = entry
            .results
            .iter()
            .filter(|r| r.sensitivity_level.is_sensitive())
            .count();
        let flagged = entry.results.iter().filter(|r| r.is_flagged()).count();
        overview.add_row(vec![
            Cell::new(index + 1),
            Cell::new(entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
            Cell::new(&entry.source_name),
            Cell::new(entry.results.len()).set_alignment(CellAlignment::Right),
            Cell::new(sensitive).set_alignment(CellAlignment::Right),
            Cell::new(flagged).set_alignment(CellAlignment::Right),
        ]);

        details.push_str(&format!("\n Run {}: ", index + 1));
        details.push_str(&entry_report(entry));
    }

    format!(
        " {} Recent runs:\n\n{}\n{}",
        "[HISTORY]".cyan().bold(),
        overview,
        details
    )
}

/// Per-column results of one past run.
pub fn entry_report(entry: &HistoryEntry) -> String {
    format!(
        "{} ({})\n{}\n",
        entry.source_name.bold(),
        entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        results_table(&entry.results)
    )
}

fn results_table(results: &[ClassificationResult]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Column").add_attribute(Attribute::Bold),
            Cell::new("Sensitivity").add_attribute(Attribute::Bold),
            Cell::new("Confidence").add_attribute(Attribute::Bold),
            Cell::new("Reasoning").add_attribute(Attribute::Bold),
        ]);

    for r in results {
        let mut name = Cell::new(&r.column_name);
        if r.is_flagged() {
            name = name.add_attribute(Attribute::Italic);
        }
        table.add_row(vec![
            name,
            Cell::new(r.sensitivity_level.label()).fg(level_color(r.sensitivity_level)),
            Cell::new(format!("{}/5", r.confidence)).set_alignment(CellAlignment::Center),
            Cell::new(&r.reasoning),
        ]);
    }
    table
}

fn level_color(level: SensitivityLevel) -> Color {
    match level {
        SensitivityLevel::Pii => Color::Red,
        SensitivityLevel::FinanceCritical => Color::Magenta,
        SensitivityLevel::Confidential => Color::Yellow,
        SensitivityLevel::Internal => Color::Cyan,
        SensitivityLevel::Public => Color::Green,
        SensitivityLevel::Unclassified => Color::DarkGrey,
    }
}

fn marker(level: SensitivityLevel) -> ColoredString {
    match level {
        SensitivityLevel::Pii => "✗".red(),
        SensitivityLevel::FinanceCritical => "✗".magenta(),
        SensitivityLevel::Confidential => "⚠".yellow(),
        SensitivityLevel::Internal => "•".cyan(),
        SensitivityLevel::Public => "✓".green(),
        SensitivityLevel::Unclassified => "?".dimmed(),
    }
}

fn level_counts(results: &[ClassificationResult]) -> HashMap<SensitivityLevel, usize> {
    let mut counts = HashMap::new();
    for r in results {
        *counts.entry(r.sensitivity_level).or_insert(0) += 1;
    }
    counts
}

fn flag_note(r: &ClassificationResult) -> String {
    if r.flags.is_empty() {
        return format!("{}: unclassified", r.column_name);
    }
    let notes: Vec<String> = r.flags.iter().map(ToString::to_string).collect();
    format!("{}: {}", r.column_name, notes.join("; "))
}

/// One-line summary used by `--quiet`.
fn summary_line(source_name: &str, results: &[ClassificationResult]) -> String {
    let counts = level_counts(results);
    let parts: Vec<String> = SensitivityLevel::REPORT_ORDER
        .iter()
        .map(|level| format!("{}: {}", level, counts.get(level).copied().unwrap_or(0)))
        .collect();
    format!("{}  Total: {}  {}", source_name, results.len(), parts.join("  "))
}

//! Terminal Presenter
//!
//! Renders session output as plain text on stdout. Bubbles cannot be edited in
//! place on a line terminal, so edits and removals are printed as short notes
//! that refer back to the bubble number.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use askflow_core::presenter::describe_result;
use askflow_core::{ChartData, EnrichmentNotice, GroupRef, Presenter, QueryResult, TurnRef};
use serde_json::{Map, Value};

/// Rows printed per result table
const MAX_TABLE_ROWS: usize = 20;

/// Widest cell printed before truncation
const MAX_CELL_WIDTH: usize = 32;

/// Presenter that prints to stdout
#[derive(Default)]
pub struct TerminalPresenter {
    next_ref: AtomicU64,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> u64 {
        self.next_ref.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn emit(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout leaves nothing to report to
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }
}

impl Presenter for TerminalPresenter {
    fn render_user_turn(&self, text: &str) -> TurnRef {
        let turn = TurnRef(self.next());
        self.emit(&format!("[#{}] you: {text}", turn.0));
        turn
    }

    fn update_user_turn(&self, turn: TurnRef, text: &str) {
        self.emit(&format!("[#{}] you (edited): {text}", turn.0));
    }

    fn remove_user_turn(&self, turn: TurnRef) {
        self.emit(&format!("[#{}] edit discarded", turn.0));
    }

    fn set_editable(&self, turn: TurnRef) {
        self.emit(&format!(
            "[#{}] stopped. Use /edit <text> to change and resend it.",
            turn.0
        ));
    }

    fn clear_editable(&self, _turn: TurnRef) {}

    fn render_assistant_error(&self, text: &str) {
        self.emit(&format!("askflow: {text}"));
    }

    fn render_clarification(&self, text: &str) {
        self.emit(&format!("askflow asks: {text}"));
    }

    fn render_assistant_result(&self, result: &QueryResult) -> GroupRef {
        let group = GroupRef(self.next());
        let mut text = format!("[#{}] askflow: {}", group.0, describe_result(result));
        if let Some(ref chart) = result.chart {
            text.push('\n');
            text.push_str(&chart_caption(chart));
        }
        if !result.data.is_empty() {
            text.push('\n');
            text.push_str(&format_table(&result.data, MAX_TABLE_ROWS));
        }
        self.emit(&text);
        group
    }

    fn render_enrichment(&self, group: GroupRef, insights: &str, follow_ups: &[String]) {
        let mut text = format!("[#{}] insights:", group.0);
        if !insights.is_empty() {
            text.push(' ');
            text.push_str(insights);
        }
        for (i, question) in follow_ups.iter().enumerate() {
            text.push_str(&format!("\n  {}. {question}", i + 1));
        }
        self.emit(&text);
    }

    fn render_enrichment_progress(&self, group: GroupRef, phase: &str) {
        tracing::debug!(group = group.0, phase, "Insights progress");
    }

    fn render_enrichment_notice(&self, group: GroupRef, notice: EnrichmentNotice) {
        self.emit(&format!("[#{}] {}", group.0, notice.message()));
    }

    fn set_processing_indicator(&self, processing: bool) {
        if processing {
            self.emit("... working (/stop to cancel)");
        }
    }
}

/// One-line caption for a chart that cannot be drawn here
fn chart_caption(chart: &ChartData) -> String {
    match chart.title {
        Some(ref title) => format!("({} chart: {title})", chart.chart_type),
        None => format!("({} chart)", chart.chart_type),
    }
}

/// Plain-text table of `rows`, columns taken from the first row
pub fn format_table(rows: &[Map<String, Value>], limit: usize) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };
    let columns: Vec<&String> = first.keys().collect();

    let cells: Vec<Vec<String>> = rows
        .iter()
        .take(limit)
        .map(|row| {
            columns
                .iter()
                .map(|col| cell_text(row.get(col.as_str())))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(col.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render_row = |values: Vec<&str>| {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{value:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render_row(columns.iter().map(|c| c.as_str()).collect())];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &cells {
        lines.push(render_row(row.iter().map(String::as_str).collect()));
    }
    if rows.len() > limit {
        lines.push(format!("... {} more rows", rows.len() - limit));
    }
    lines.join("\n")
}

fn cell_text(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    if text.chars().count() > MAX_CELL_WIDTH {
        let cut: String = text.chars().take(MAX_CELL_WIDTH - 1).collect();
        format!("{cut}…")
    } else {
        text
    }
}

//! Chart Intent Detection
//!
//! Decides whether a query asks for a visualization, so the backend can be
//! told to prepare chart data.

/// Phrases that request a chart outright
const CHART_PHRASES: &[&str] = &[
    "show me a chart",
    "show me a graph",
    "show me a plot",
    "show me a visual",
    "over time",
    "visualize",
    "visualise",
    "bar chart",
    "bar graph",
    "line chart",
    "line graph",
    "pie chart",
    "doughnut chart",
    "donut chart",
    "area chart",
    "scatter plot",
    "scatter chart",
    "histogram",
    "heatmap",
    "heat map",
    "pivot table",
    "kpi",
    "dashboard",
    "breakdown by",
    "distribution of",
    "compare by",
];

/// Nouns that make a query chart-related on their own
const CHART_NOUNS: &[&str] = &[
    "chart",
    "graph",
    "plot",
    "visualization",
    "visualisation",
    "trend",
    "pattern",
];

/// Whether `word` is `noun` or an inflection of it (charts, plotted, trending)
fn matches_noun(word: &str, noun: &str) -> bool {
    word.strip_prefix(noun).is_some_and(|rest| {
        matches!(rest, "" | "s" | "es" | "ed" | "ing" | "ted" | "ting")
    })
}

/// Whether `query` asks for a chart
///
/// Phrases are matched first, then keywords. Generic verbs such as "show" only
/// count when a chart noun also appears, so "show open tickets" is not a chart
/// request while "show the trend" is.
#[must_use]
pub fn detect_chart_request(query: &str) -> bool {
    let lowered = query.to_lowercase();
    let normalized = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>();

    let padded = format!(" {} ", normalized.join(" "));
    if let Some(phrase) = CHART_PHRASES
        .iter()
        .find(|phrase| padded.contains(&format!(" {phrase} ")))
    {
        tracing::trace!(phrase, "Chart phrase matched");
        return true;
    }

    // Generic verbs (show, display, create, generate, make) never qualify on
    // their own, so only the nouns are checked here.
    normalized
        .iter()
        .any(|word| CHART_NOUNS.iter().any(|noun| matches_noun(word, noun)))
}

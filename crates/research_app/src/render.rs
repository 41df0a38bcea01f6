use chrono::{DateTime, Local};
use research_core::sources::{self, SourceRow};
use research_core::{
    AppViewModel, FeedbackState, HistoryRowView, Outcome, ProgressEvent, StepState, StepView,
};
use research_engine::{MarkdownReportRenderer, ReportRenderer};

/// Lines describing what changed between two views.
///
/// With no previous view everything that is not at its default is printed.
pub fn render(previous: Option<&AppViewModel>, view: &AppViewModel) -> Vec<String> {
    let blank = AppViewModel::default();
    let previous = previous.unwrap_or(&blank);
    let mut lines = Vec::new();

    let new_session = view.outcome == Outcome::Researching && previous.ticket != view.ticket;
    if new_session {
        if let Some(query) = &view.query {
            lines.push(format!("Researching: {query}"));
        }
    }

    if view.outcome != Outcome::Idle
        && (new_session
            || view.progress_pct != previous.progress_pct
            || view.progress_text != previous.progress_text)
    {
        lines.push(progress_line(view.progress_pct, &view.progress_text));
    }

    // A failed session's board is reset; the error panel stands in for it.
    let shows_steps = matches!(view.outcome, Outcome::Researching | Outcome::Succeeded { .. });
    for (index, step) in view.steps.iter().enumerate() {
        let changed = new_session || previous.steps.get(index) != Some(step);
        if changed && shows_steps {
            lines.push(step_line(step));
        }
    }

    if view.sources != previous.sources && !view.sources.is_empty() {
        lines.push(format!("Sources ({}):", view.source_count));
        lines.extend(view.sources.iter().map(source_line));
    }

    if view.outcome != previous.outcome {
        match &view.outcome {
            Outcome::Succeeded { content } => {
                lines.push("Research Results".to_string());
                let report = report_lines(content);
                if report.is_empty() {
                    lines.push("(the research finished without a report)".to_string());
                }
                lines.extend(report);
            }
            Outcome::Failed { message } => {
                lines.push("Research Error".to_string());
                lines.push(message.clone());
            }
            Outcome::Idle | Outcome::Researching => {}
        }
    }

    if view.feedback != previous.feedback {
        if let FeedbackState::Acknowledged(_) = view.feedback {
            lines.push("Thanks for your feedback!".to_string());
        }
    }

    let history_settled = !view.history_loading && previous.history_loading;
    if !view.history_loading && (view.history != previous.history || history_settled) {
        lines.extend(history_lines(&view.history));
    }

    lines
}

/// One-shot rendering of a progress snapshot.
pub fn snapshot_lines(session_id: &str, event: &ProgressEvent) -> Vec<String> {
    let pct = event.progress_pct.unwrap_or(0);
    let text = event
        .message_text()
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| format!("Research {pct}% complete"));
    let mut lines = vec![
        format!("Session {session_id}"),
        progress_line(pct, &text),
    ];

    let rows = event.sources.as_deref().map(sources::rebuild).unwrap_or_default();
    if !rows.is_empty() {
        lines.push(format!("Sources ({}):", rows.len()));
        lines.extend(rows.iter().map(source_line));
    }
    if let Some(result) = event.result.as_deref().filter(|_| event.status.is_terminal()) {
        lines.push("Research Results".to_string());
        lines.extend(report_lines(result));
    }
    if let Some(error) = event.error.as_deref() {
        lines.push("Research Error".to_string());
        lines.push(error.to_string());
    }
    lines
}

fn progress_line(pct: u8, text: &str) -> String {
    format!("[{pct:>3}%] {text}")
}

fn step_line(step: &StepView) -> String {
    let marker = match step.state {
        StepState::Pending => "[ ]",
        StepState::Active => "[>]",
        StepState::Completed => "[x]",
    };
    match (&step.detail, step.state) {
        (Some(detail), _) => format!("  {marker} {}: {detail}", step.label),
        (None, StepState::Active) => format!("  {marker} {}: thinking...", step.label),
        (None, _) => format!("  {marker} {}", step.label),
    }
}

fn source_line(row: &SourceRow) -> String {
    let mut line = format!("  {}. {} ({})", row.number, row.title, row.host);
    if let Some(relevance) = &row.relevance {
        line.push_str(" - ");
        line.push_str(relevance);
    }
    line
}

fn report_lines(content: &str) -> Vec<String> {
    MarkdownReportRenderer
        .render(content)
        .lines()
        .map(ToOwned::to_owned)
        .collect()
}

fn history_lines(history: &[HistoryRowView]) -> Vec<String> {
    if history.is_empty() {
        return vec!["No research history yet.".to_string()];
    }
    let mut lines = vec!["History:".to_string()];
    lines.extend(history.iter().map(|row| {
        format!(
            "  {}. {} — {} ({})",
            row.number,
            row.query,
            row.summary,
            format_timestamp(row.timestamp)
        )
    }));
    lines
}

pub(crate) fn format_timestamp(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "unknown time".to_string();
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9) as u32;
    match DateTime::from_timestamp(whole as i64, nanos) {
        Some(utc) => utc.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => "unknown time".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use research_core::{update, Msg, Phase, SessionId, Source, SourceStatus, Status, Step, UiState};

    use super::*;

    fn apply(state: UiState, msgs: Vec<Msg>) -> UiState {
        msgs.into_iter().fold(state, |state, msg| update(state, msg).0)
    }

    fn started(query: &str) -> UiState {
        let state = apply(
            UiState::new(),
            vec![Msg::QueryChanged(query.to_string()), Msg::SearchSubmitted],
        );
        let ticket = state.session().unwrap().ticket;
        apply(
            state,
            vec![Msg::SessionStarted {
                ticket,
                session_id: SessionId::new("s-1"),
            }],
        )
    }

    fn progress(state: UiState, event: ProgressEvent) -> UiState {
        let ticket = state.session().unwrap().ticket;
        apply(state, vec![Msg::ProgressReceived { ticket, event }])
    }

    #[test]
    fn idle_view_prints_nothing() {
        assert!(render(None, &UiState::new().view()).is_empty());
    }

    #[test]
    fn new_session_prints_header_progress_and_all_steps() {
        let view = started("rust async").view();
        let lines = render(None, &view);

        assert_eq!(lines[0], "Researching: rust async");
        assert_eq!(lines[1], "[  0%] Starting research...");
        assert_eq!(lines[2], "  [>] Query analysis: thinking...");
        assert_eq!(lines[3], "  [ ] Web search");
        assert_eq!(lines.len(), 2 + Step::ALL.len());
    }

    #[test]
    fn only_changed_lines_are_printed() {
        let state = started("rust");
        let before = state.view();
        let state = progress(
            state,
            ProgressEvent::new(Phase::WebSearch, Status::Other("searching".into()), 25)
                .with_message("Searching the web"),
        );
        let lines = render(Some(&before), &state.view());

        assert_eq!(
            lines,
            vec![
                "[ 25%] Searching the web".to_string(),
                "  [x] Query analysis: Query optimized for search".to_string(),
                "  [>] Web search: Searching the web".to_string(),
            ]
        );
        assert!(render(Some(&state.view()), &state.view()).is_empty());
    }

    #[test]
    fn resubmitting_the_same_query_prints_a_fresh_board() {
        let state = started("rust");
        let state = progress(
            state,
            ProgressEvent::new(Phase::WebSearch, Status::Other("searching".into()), 25),
        );
        let before = state.view();
        let state = apply(state, vec![Msg::SearchSubmitted]);
        let lines = render(Some(&before), &state.view());

        assert_eq!(lines[0], "Researching: rust");
        assert_eq!(lines[1], "[  0%] Starting research...");
        assert_eq!(lines.len(), 2 + Step::ALL.len());
    }

    #[test]
    fn sources_are_listed_with_host_and_relevance() {
        let state = started("rust");
        let before = state.view();
        let state = progress(
            state,
            ProgressEvent::new(Phase::AnalyzingContent, Status::Other("analyzing".into()), 50)
                .with_sources(vec![
                    Source {
                        url: "https://docs.rs/tokio".to_string(),
                        title: Some("Tokio docs".to_string()),
                        status: SourceStatus::Analyzed,
                        relevance: Some(0.91),
                    },
                    Source {
                        url: "https://blog.example/post".to_string(),
                        title: None,
                        status: SourceStatus::Processing,
                        relevance: None,
                    },
                ]),
        );
        let lines = render(Some(&before), &state.view());
        let start = lines.iter().position(|l| l == "Sources (2):").unwrap();

        assert_eq!(lines[start + 1], "  1. Tokio docs (docs.rs) - 91% relevant");
        assert_eq!(lines[start + 2], "  2. https://blog.example/post (blog.example)");
    }

    #[test]
    fn error_panel_has_heading_and_message() {
        let state = started("rust");
        let before = state.view();
        let state = progress(
            state,
            ProgressEvent::new(Phase::WebSearch, Status::Error, 30).with_error("rate limited"),
        );
        let lines = render(Some(&before), &state.view());
        let heading = lines.iter().position(|l| l == "Research Error").unwrap();
        assert_eq!(lines[heading + 1], "rate limited");
    }

    #[test]
    fn result_panel_renders_html_report() {
        let state = started("rust");
        let before = state.view();
        let state = progress(
            state,
            ProgressEvent::new(Phase::Synthesis, Status::Complete, 100)
                .with_result("<p>Rust is <strong>fast</strong>.</p>"),
        );
        let lines = render(Some(&before), &state.view());
        let heading = lines.iter().position(|l| l == "Research Results").unwrap();
        assert!(lines[heading + 1..].iter().any(|l| l.contains("**fast**")));
        assert!(lines.iter().all(|l| !l.contains("<p>")));
    }

    #[test]
    fn empty_report_prints_placeholder() {
        let state = started("rust");
        let before = state.view();
        let state = progress(state, ProgressEvent::new(Phase::Synthesis, Status::Complete, 100));
        let lines = render(Some(&before), &state.view());
        let heading = lines.iter().position(|l| l == "Research Results").unwrap();
        assert_eq!(lines[heading + 1], "(the research finished without a report)");
    }

    #[test]
    fn history_prints_after_loading_even_when_empty() {
        let loading = apply(UiState::new(), vec![Msg::HistoryRequested]);
        assert!(render(None, &loading.view()).is_empty());

        let loaded = apply(loading.clone(), vec![Msg::HistoryLoaded(Vec::new())]);
        assert_eq!(
            render(Some(&loading.view()), &loaded.view()),
            vec!["No research history yet.".to_string()]
        );
    }

    #[test]
    fn history_rows_are_numbered() {
        let loaded = apply(
            UiState::new(),
            vec![
                Msg::HistoryRequested,
                Msg::HistoryLoaded(vec![research_core::HistoryEntry {
                    query: "tokio".to_string(),
                    summary: "An async runtime".to_string(),
                    timestamp: 1_700_000_000.5,
                }]),
            ],
        );
        let lines = render(None, &loaded.view());
        assert_eq!(lines[0], "History:");
        assert!(lines[1].starts_with("  1. tokio — An async runtime ("));
    }

    #[test]
    fn snapshot_shows_progress_and_error() {
        let event = ProgressEvent::new(Phase::WebSearch, Status::Error, 40).with_error("quota");
        let lines = snapshot_lines("abc", &event);
        assert_eq!(
            lines,
            vec![
                "Session abc".to_string(),
                "[ 40%] Research 40% complete".to_string(),
                "Research Error".to_string(),
                "quota".to_string(),
            ]
        );
    }

    #[test]
    fn timestamps_format_locally_or_fall_back() {
        assert_eq!(format_timestamp(f64::NAN), "unknown time");
        assert_eq!(format_timestamp(1_700_000_000.0).len(), "2023-11-14 22:13".len());
    }
}

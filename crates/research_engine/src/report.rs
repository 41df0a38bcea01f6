/// Turns the backend's rendered report into terminal-readable text.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, content: &str) -> String;
}

/// Converts HTML reports back to Markdown, which reads well as plain text.
/// Content that is already plain text passes through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownReportRenderer;

impl ReportRenderer for MarkdownReportRenderer {
    fn render(&self, content: &str) -> String {
        let trimmed = content.trim();
        if !looks_like_html(trimmed) {
            return trimmed.to_string();
        }
        let markdown = html2md::parse_html(trimmed);
        let markdown = collapse_blank_lines(markdown.trim());
        if markdown.is_empty() {
            trimmed.to_string()
        } else {
            markdown
        }
    }
}

fn looks_like_html(text: &str) -> bool {
    text.starts_with('<') && text.contains('>')
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out.trim_end().to_string()
}

use url::Url;

use crate::Source;

/// One row of the displayed source list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// 1-based position in the displayed list; not a stable identity.
    pub number: usize,
    pub url: String,
    pub title: String,
    pub host: String,
    pub relevance: Option<String>,
}

/// Rebuilds the displayed list from one full source snapshot.
///
/// Only `processing` and `analyzed` sources are shown, in input order.
/// Sources whose URL does not parse are skipped before numbering.
pub fn rebuild(sources: &[Source]) -> Vec<SourceRow> {
    sources
        .iter()
        .filter(|source| source.status.is_visible())
        .filter_map(|source| {
            let host = host_of(&source.url)?;
            Some((source, host))
        })
        .enumerate()
        .map(|(position, (source, host))| SourceRow {
            number: position + 1,
            url: source.url.clone(),
            title: display_title(source),
            host,
            relevance: source.relevance.and_then(relevance_label),
        })
        .collect()
}

/// `84% relevant` for 0.837; nothing for zero, negative or non-finite scores.
pub fn relevance_label(relevance: f64) -> Option<String> {
    if !relevance.is_finite() || relevance <= 0.0 {
        return None;
    }
    Some(format!("{:.0}% relevant", (relevance * 100.0).round()))
}

fn host_of(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    parsed.host_str().map(ToOwned::to_owned)
}

fn display_title(source: &Source) -> String {
    source
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(&source.url)
        .to_string()
}

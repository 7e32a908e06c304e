// src/utils/match_debug.rs
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::extractors::eps::{EpsMatch, EpsPattern};
use crate::utils::error::AppError;

fn css_class(pattern: EpsPattern) -> &'static str {
    match pattern {
        EpsPattern::Abbreviation => "highlight-eps",
        EpsPattern::EarningsPerShare => "highlight-earnings",
        EpsPattern::LossPerShare | EpsPattern::LossCatchAll => "highlight-loss",
        EpsPattern::Qualifier => "highlight-qualifier",
        EpsPattern::BroadNet => "highlight-broad",
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Renders `text` as HTML with every EPS pattern hit highlighted.
/// Overlapping hits are clipped so each character is emitted once.
pub fn render_match_html(text: &str, hits: &[EpsMatch]) -> String {
    let mut debug_html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<style>\n");

    // CSS for highlight colors
    debug_html.push_str("body { white-space: pre-wrap; font-family: monospace; }\n");
    debug_html.push_str(".highlight-eps { background-color: #FFFF00; }\n");
    debug_html.push_str(".highlight-earnings { background-color: #90EE90; }\n");
    debug_html.push_str(".highlight-loss { background-color: #FFA500; }\n");
    debug_html.push_str(".highlight-qualifier { background-color: #ADD8E6; }\n");
    debug_html.push_str(".highlight-broad { background-color: #FFC0CB; }\n");
    debug_html.push_str("</style>\n</head>\n<body>\n");

    let mut sorted_hits: Vec<&EpsMatch> = hits.iter().collect();
    sorted_hits.sort_by_key(|hit| hit.span.0); // Sort by position

    let mut last_pos = 0;
    for hit in sorted_hits {
        let (start, end) = hit.span;
        if end <= last_pos {
            continue;
        }
        let start = start.max(last_pos);

        if start > last_pos {
            debug_html.push_str(&escape_html(&text[last_pos..start]));
        }

        debug_html.push_str(&format!(
            "<span class=\"{}\" title=\"Pattern: {}, Value: {}, Position: {}-{}\">",
            css_class(hit.pattern),
            hit.pattern.label(),
            hit.value,
            hit.span.0,
            hit.span.1
        ));
        debug_html.push_str(&escape_html(&text[start..end]));
        debug_html.push_str("</span>");

        last_pos = end;
    }

    if last_pos < text.len() {
        debug_html.push_str(&escape_html(&text[last_pos..]));
    }

    debug_html.push_str("\n</body>\n</html>");
    debug_html
}

/// Writes the highlighted view of one document into `debug_dir`.
pub fn save_match_html(debug_dir: &Path, document_id: &str, text: &str, hits: &[EpsMatch]) -> Result<PathBuf, AppError> {
    std::fs::create_dir_all(debug_dir)?;

    let path = debug_dir.join(format!("{}.matches.html", document_id));
    let mut file = File::create(&path)?;
    file.write_all(render_match_html(text, hits).as_bytes())?;

    tracing::debug!("Saved match debug HTML to {}", path.display());
    Ok(path)
}

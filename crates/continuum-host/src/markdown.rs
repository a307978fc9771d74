//! Markdown ingester (§4.11): a line-scanner, not an AST parser.

use std::path::Path;

/// A candidate statement pulled from a markdown file, tagged with its
/// provenance for the `source` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownCandidate {
    pub text: String,
    pub source: String,
}

/// Scan `path` line by line, skipping headings and fenced code blocks,
/// and return the remaining non-empty trimmed lines as candidates.
pub fn scan_file(path: &Path) -> std::io::Result<Vec<MarkdownCandidate>> {
    let contents = std::fs::read_to_string(path)?;
    let source = format!("markdown:{}", path.display());
    Ok(scan_text(&contents, &source))
}

fn is_heading(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('#') && trimmed.trim_start_matches('#').starts_with(|c: char| c == ' ' || c.is_whitespace())
}

fn is_fence_delimiter(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

pub fn scan_text(contents: &str, source: &str) -> Vec<MarkdownCandidate> {
    let mut candidates = Vec::new();
    let mut in_fence = false;
    for line in contents.lines() {
        if is_fence_delimiter(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() || is_heading(line) {
            continue;
        }
        candidates.push(MarkdownCandidate {
            text: trimmed.to_string(),
            source: source.to_string(),
        });
    }
    candidates
}

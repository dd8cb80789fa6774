use crate::text_metrics::{FontRole, TextMetrics};

use super::TextBlock;

pub(super) fn measure_text(text: &str, role: FontRole, metrics: &dyn TextMetrics) -> TextBlock {
    let lines = split_lines(text);
    let width = lines
        .iter()
        .map(|line| metrics.line_width(line, role))
        .fold(0.0, f32::max);
    let height = lines.len() as f32 * metrics.line_height(role);
    TextBlock {
        lines,
        width,
        height,
    }
}

/// Code keeps its leading indentation; trailing whitespace and carriage
/// returns are dropped. Always yields at least one line.
pub(super) fn split_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text
        .split('\n')
        .map(|line| line.trim_end_matches('\r').trim_end().to_string())
        .collect();
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Strips the common indentation of all non-blank lines and the blank lines
/// around the text.
pub(super) fn dedent(text: &str) -> String {
    let lines = split_lines(text);
    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    let body: Vec<&str> = lines
        .iter()
        .map(|line| line.get(indent..).unwrap_or("").trim_end())
        .collect();
    let first = body.iter().position(|line| !line.is_empty());
    let last = body.iter().rposition(|line| !line.is_empty());
    match (first, last) {
        (Some(first), Some(last)) => body[first..=last].join("\n"),
        _ => String::new(),
    }
}

/// Pushes a side comment down so that it lines up with its source line.
pub(super) fn shift_down(text: &str, lines: usize) -> String {
    let mut shifted = "\n".repeat(lines);
    shifted.push_str(text);
    shifted
}

pub(super) fn return_text(text: &str) -> String {
    if text.trim().is_empty() {
        "None".to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_metrics::MonospaceMetrics;

    fn metrics() -> MonospaceMetrics {
        MonospaceMetrics {
            text_size: 10.0,
            badge_size: 10.0,
            line_height: 1.0,
        }
    }

    #[test]
    fn split_lines_keeps_indentation() {
        assert_eq!(split_lines("a\r\n    b  "), vec!["a", "    b"]);
        assert_eq!(split_lines(""), vec![""]);
    }

    #[test]
    fn dedent_strips_common_prefix_and_blank_edges() {
        assert_eq!(dedent("\n    first\n      second\n\n"), "first\n  second");
        assert_eq!(dedent("   \n  "), "");
    }

    #[test]
    fn shifted_text_grows_by_blank_lines() {
        let block = measure_text(&shift_down("note", 2), FontRole::Text, &metrics());
        assert_eq!(block.lines.len(), 3);
        assert_eq!(block.height, 30.0);
        assert_eq!(block.width, 24.0);
    }

    #[test]
    fn empty_return_reads_none() {
        assert_eq!(return_text("  "), "None");
        assert_eq!(return_text("x + 1"), "x + 1");
    }
}

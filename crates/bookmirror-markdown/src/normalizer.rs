use regex_lite::Regex;
use std::sync::OnceLock;

fn separator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*\|?\s*:?-{3,}:?\s*(\|\s*:?-{3,}:?\s*)*\|?\s*$")
            .expect("valid separator pattern")
    })
}

pub fn is_separator_line(line: &str) -> bool {
    line.contains('-') && separator_pattern().is_match(line)
}

/// Repair pipe tables whose separator row was lost or never emitted: when a
/// run of consecutive pipe-bearing lines starts and its second line is not
/// already a separator, insert a synthetic one after the first line. Column
/// count is derived from the first line's pipe count. Firing only at the
/// start of a run keeps body rows untouched.
pub fn normalize_tables(markdown: &str) -> String {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 4);
    for (index, line) in lines.iter().enumerate() {
        out.push((*line).to_string());
        let starts_run = line.contains('|')
            && !is_separator_line(line)
            && (index == 0 || !lines[index - 1].contains('|'));
        if !starts_run {
            continue;
        }
        if let Some(next) = lines.get(index + 1) {
            if next.contains('|') && !is_separator_line(next) {
                let columns = line.matches('|').count().saturating_sub(1).max(1);
                out.push(crate::converter::separator_line(columns));
            }
        }
    }
    let mut result = out.join("\n");
    if markdown.ends_with('\n') {
        result.push('\n');
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("| --- | --- |", true)]
    #[case("|:---|---:|", true)]
    #[case("---", true)]
    #[case("| a | b |", false)]
    #[case("| -- | -- |", false)]
    #[case("plain text", false)]
    fn test_is_separator_line(#[case] line: &str, #[case] expected: bool) {
        assert_eq!(is_separator_line(line), expected);
    }

    #[test]
    fn test_inserts_missing_separator() {
        let markdown = "| A | B |\n| 1 | 2 |\n| 3 | 4 |";
        let normalized = normalize_tables(markdown);
        assert_eq!(
            normalized,
            "| A | B |\n| --- | --- |\n| 1 | 2 |\n| 3 | 4 |"
        );
    }

    #[test]
    fn test_valid_table_is_untouched() {
        let markdown = "| A | B |\n| --- | --- |\n| 1 | 2 |";
        assert_eq!(normalize_tables(markdown), markdown);
    }

    #[test]
    fn test_does_not_insert_between_body_rows() {
        let markdown = "| A |\n| --- |\n| 1 |\n| 2 |\n| 3 |";
        assert_eq!(normalize_tables(markdown), markdown);
    }

    #[test]
    fn test_single_pipe_line_is_untouched() {
        let markdown = "value | other\n\nprose";
        assert_eq!(normalize_tables(markdown), markdown);
    }

    #[test]
    fn test_idempotent() {
        let markdown = "| A | B |\n| 1 | 2 |";
        let once = normalize_tables(markdown);
        assert_eq!(normalize_tables(&once), once);
    }

    #[test]
    fn test_preserves_trailing_newline() {
        let markdown = "no tables here\n";
        assert_eq!(normalize_tables(markdown), markdown);
    }
}

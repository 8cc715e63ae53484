/// Strip one trailing newline, as delivered by line sources.
pub fn strip_newline(line: &str) -> &str {
    line.strip_suffix('\n').unwrap_or(line)
}

/// Split a line at its first `|` into left and right stage strings.
/// Only one pipe per line is supported; any later `|` stays part of the
/// right stage.
pub fn split_pipeline(line: &str) -> Option<(&str, &str)> {
    line.split_once('|')
}

/// Space-delimited tokenization. Consecutive delimiters produce no empty
/// tokens; an empty or whitespace-only line yields an empty list.
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_owned).collect()
}

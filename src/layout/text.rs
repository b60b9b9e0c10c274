use crate::theme::Theme;

use super::TextBlock;

/// Number of average-width glyphs that fit in `max_width_px`, never below one.
pub fn chars_per_line(max_width_px: f64, theme: &Theme) -> usize {
    let char_width = theme.char_width();
    if char_width <= 0.0 {
        return 1;
    }
    ((max_width_px / char_width).floor() as usize).max(1)
}

/// Greedy word wrap. Words are never split: a word longer than `max_chars`
/// occupies a line of its own.
pub fn wrap_words(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let needed = if current.is_empty() {
            word_len
        } else {
            word_len + 1
        };
        if current_len + needed <= max_chars {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_len += needed;
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current.push_str(word);
            current_len = word_len;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Wraps `text` to fit `max_width_px` and measures the result.
pub fn wrap_label(text: &str, max_width_px: f64, theme: &Theme) -> TextBlock {
    let lines = wrap_words(text, chars_per_line(max_width_px, theme));
    measure_lines(lines, theme)
}

/// Measures already broken text (explicit `\n` separators) without re-wrapping.
pub fn measure_label(text: &str, theme: &Theme) -> TextBlock {
    measure_lines(split_lines(text), theme)
}

pub(crate) fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}

fn measure_lines(lines: Vec<String>, theme: &Theme) -> TextBlock {
    let max_len = lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0);
    TextBlock {
        width: max_len as f64 * theme.char_width(),
        height: lines.len() as f64 * theme.line_advance(),
        lines,
    }
}

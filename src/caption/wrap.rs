use crate::caption::measure::TextMeasure;

/// Greedy word wrap capped at `max_lines`.
///
/// Words are appended to the current line while the measured width of the candidate line stays
/// strictly below `max_width_px`. A word that does not fit starts the next line; a word that is
/// wider than `max_width_px` on its own still gets its own line. Lines past `max_lines` are
/// dropped.
pub fn wrap_lines(
    text: &str,
    measure: &mut dyn TextMeasure,
    max_width_px: f32,
    max_lines: usize,
) -> Vec<String> {
    let mut lines = Vec::new();
    if max_lines == 0 {
        return lines;
    }

    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }

        let candidate = format!("{current} {word}");
        if measure.width(&candidate) < max_width_px {
            current = candidate;
            continue;
        }

        lines.push(std::mem::replace(&mut current, word.to_owned()));
        if lines.len() == max_lines {
            return lines;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

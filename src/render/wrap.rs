//! Greedy word wrapping for margin boxes.
//!
//! Widths are counted in characters; the box width is converted to a
//! character budget by [`crate::config::LayoutConfig::wrap_chars`]. Words
//! longer than a line are split across lines so nothing ever exceeds the
//! budget.

/// Wrap `text` into lines of at most `width` characters.
///
/// Runs of whitespace collapse to single spaces. Empty or blank input gives
/// no lines.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let needed = if line_len == 0 { word_len } else { line_len + 1 + word_len };

        if needed <= width {
            if line_len > 0 {
                line.push(' ');
            }
            line.push_str(word);
            line_len = needed;
            continue;
        }

        if word_len <= width {
            lines.push(std::mem::take(&mut line));
            line.push_str(word);
            line_len = word_len;
            continue;
        }

        // Long word: fill what is left of the current line, then split.
        let mut rest: Vec<char> = word.chars().collect();
        if line_len > 0 {
            let space_left = width.saturating_sub(line_len + 1);
            if space_left > 0 {
                line.push(' ');
                line.extend(rest.drain(..space_left));
            }
            lines.push(std::mem::take(&mut line));
        }
        while rest.len() > width {
            lines.push(rest.drain(..width).collect());
        }
        line = rest.into_iter().collect();
        line_len = line.chars().count();
    }

    if line_len > 0 {
        lines.push(line);
    }
    lines
}

/// Shorten a quote to `max_chars` characters plus `…` and wrap it in
/// double quotes. An empty quote stays empty.
pub fn quote_marked(quote: &str, max_chars: usize) -> String {
    let quote = quote.trim();
    if quote.is_empty() {
        return String::new();
    }
    if quote.chars().count() > max_chars {
        let short: String = quote.chars().take(max_chars).collect();
        format!("\"{short}…\"")
    } else {
        format!("\"{quote}\"")
    }
}

/// `#tag` strings for the first `max_tags` themes, two spaces apart.
pub fn theme_tags(themes: &[String], max_tags: usize) -> String {
    themes
        .iter()
        .filter(|t| !t.trim().is_empty())
        .take(max_tags)
        .map(|t| format!("#{}", t.trim()))
        .collect::<Vec<_>>()
        .join("  ")
}

use unicode_segmentation::UnicodeSegmentation;

use crate::tokens::{chars_for_tokens, estimate_tokens};

/// Split prose so every piece estimates at or below `max_tokens`.
///
/// Sentence boundaries first, then raw length at the last whitespace that fits.
/// Pieces are trimmed and never empty.
pub(crate) fn split_prose(text: &str, max_tokens: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if estimate_tokens(text) <= max_tokens {
        return vec![text.to_owned()];
    }
    let max_chars = chars_for_tokens(max_tokens).max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for sentence in text.split_sentence_bounds() {
        let len = sentence.chars().count();
        if current_chars + len <= max_chars {
            current.push_str(sentence);
            current_chars += len;
            continue;
        }
        push_trimmed(&mut pieces, &current);
        current.clear();
        current_chars = 0;
        if len <= max_chars {
            current.push_str(sentence);
            current_chars = len;
        } else {
            pieces.extend(split_raw(sentence, max_chars));
        }
    }
    push_trimmed(&mut pieces, &current);
    pieces
}

/// Split preformatted text on line boundaries, keeping indentation intact.
pub(crate) fn split_lines(text: &str, max_tokens: usize) -> Vec<String> {
    let text = text.trim_matches('\n');
    if text.trim().is_empty() {
        return Vec::new();
    }
    if estimate_tokens(text) <= max_tokens {
        return vec![text.to_owned()];
    }
    let max_chars = chars_for_tokens(max_tokens).max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for line in text.lines() {
        let len = line.chars().count();
        let sep = usize::from(!current.is_empty());
        if current_chars + sep + len <= max_chars {
            if sep == 1 {
                current.push('\n');
            }
            current.push_str(line);
            current_chars += sep + len;
            continue;
        }
        if !current.trim().is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        current.clear();
        current_chars = 0;
        if len <= max_chars {
            current.push_str(line);
            current_chars = len;
        } else {
            pieces.extend(split_raw(line, max_chars));
        }
    }
    if !current.trim().is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Cut `text` into pieces of at most `max_chars` characters, preferring whitespace.
pub(crate) fn split_raw(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut rest = text.trim();
    while !rest.is_empty() {
        let Some((limit, _)) = rest.char_indices().nth(max_chars) else {
            pieces.push(rest.to_owned());
            break;
        };
        let cut = rest[..limit]
            .rfind(char::is_whitespace)
            .filter(|&i| i > 0)
            .unwrap_or(limit);
        pieces.push(rest[..cut].trim_end().to_owned());
        rest = rest[cut..].trim_start();
    }
    pieces
}

/// Truncate to at most `max_chars` characters, preferring a sentence end, then whitespace.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    let Some((limit, _)) = text.char_indices().nth(max_chars) else {
        return text;
    };
    let window = &text[..limit];
    if let Some(end) = window.rfind(['.', '!', '?']).filter(|&i| i > 0) {
        return &window[..=end];
    }
    window
        .rfind(char::is_whitespace)
        .filter(|&i| i > 0)
        .map_or(window, |i| window[..i].trim_end())
}

fn push_trimmed(pieces: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        pieces.push(piece.to_owned());
    }
}

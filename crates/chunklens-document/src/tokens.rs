/// Approximate token count: one token per four characters, rounded up.
///
/// Rounding up keeps every size budget conservative: a text of `4 * n` characters
/// or fewer never estimates above `n` tokens.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Largest character count that still estimates at or below `tokens`.
#[must_use]
pub fn chars_for_tokens(tokens: usize) -> usize {
    tokens.saturating_mul(4)
}

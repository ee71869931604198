//! Display masking for API keys.

/// Characters kept visible at each end of a key.
const VISIBLE_CHARS: usize = 4;

/// Mask an API key for display: first 4 and last 4 characters joined by `...`.
///
/// Keys of 8 characters or fewer would be fully revealed by that rule, so
/// they keep a quarter of their length at each end instead (possibly none).
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let len = chars.len();
    let keep = if len > VISIBLE_CHARS * 2 {
        VISIBLE_CHARS
    } else {
        len / 4
    };

    let head: String = chars[..keep].iter().collect();
    let tail: String = chars[len - keep..].iter().collect();
    format!("{}...{}", head, tail)
}

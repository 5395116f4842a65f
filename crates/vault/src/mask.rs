//! Display masking for stored API keys.

/// Mask a credential for display, keeping just enough to recognise it.
///
/// Keys of four characters or fewer become `"****"`. Longer keys keep
/// their last four characters; when the key carries a `-` prefix (as in
/// `sk-...`), everything up to and including the last `-` stays visible.
#[must_use]
pub fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    // Only the part before the visible tail counts when looking for a
    // `-` separator; a dash inside the tail must not anchor the prefix.
    let head = &chars[..chars.len() - 4];
    match head.iter().rposition(|&c| c == '-') {
        Some(idx) => {
            let prefix: String = head[..=idx].iter().collect();
            format!("{prefix}****{tail}")
        }
        None => format!("****{tail}"),
    }
}

/// Replace `${ENV_VAR}` placeholders in a raw config string.
///
/// Variables that are not set stay as-is so the parse error points at
/// the placeholder rather than an empty value.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match lookup(name) {
                    Some(val) => out.push_str(&val),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    },
                }
                rest = &after[end + 1..];
            },
            _ => {
                // Unterminated or empty placeholder, emit literally.
                out.push_str("${");
                rest = after;
            },
        }
    }

    out.push_str(rest);
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_var() {
        let lookup = |name: &str| (name == "MODELPROBE_KEY").then(|| "abc123".to_string());
        assert_eq!(
            substitute_env_with("key = \"${MODELPROBE_KEY}\"", lookup),
            "key = \"abc123\""
        );
    }

    #[test]
    fn leaves_unknown_var() {
        assert_eq!(
            substitute_env_with("${MODELPROBE_MISSING}", |_| None),
            "${MODELPROBE_MISSING}"
        );
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(substitute_env_with("a ${broken", |_| None), "a ${broken");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(substitute_env("no placeholders here"), "no placeholders here");
    }
}

/// Replace `${ENV_VAR}` and `${ENV_VAR:-fallback}` placeholders in raw config text.
///
/// Unresolvable variables without a fallback are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated: emit the remainder verbatim.
            out.push_str(&rest[start..]);
            return out;
        };

        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body, None),
        };

        match (name.is_empty(), lookup(name), fallback) {
            (false, Some(value), _) => out.push_str(&value),
            (false, None, Some(fallback)) => out.push_str(fallback),
            _ => {
                out.push_str("${");
                out.push_str(body);
                out.push('}');
            },
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "REELBOT_SOURCE_URL" => Some("https://api.example.test".into()),
            "REELBOT_KEY" => Some("abc".into()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_vars() {
        let out = substitute_env_with(
            r#"base_url = "${REELBOT_SOURCE_URL}" key = "${REELBOT_KEY}""#,
            lookup,
        );
        assert_eq!(out, r#"base_url = "https://api.example.test" key = "abc""#);
    }

    #[test]
    fn unknown_var_is_left_alone() {
        assert_eq!(substitute_env_with("x=${NOPE}", lookup), "x=${NOPE}");
    }

    #[test]
    fn fallback_used_when_unset() {
        assert_eq!(substitute_env_with("ttl=${TTL:-600}", lookup), "ttl=600");
        assert_eq!(substitute_env_with("k=${REELBOT_KEY:-zzz}", lookup), "k=abc");
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(substitute_env_with("a ${OPEN", lookup), "a ${OPEN");
    }

    #[test]
    fn empty_name_is_literal() {
        assert_eq!(substitute_env_with("${}", lookup), "${}");
    }
}

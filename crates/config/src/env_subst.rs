/// Replace `${ENV_VAR}` and `${ENV_VAR:-default}` placeholders in config
/// string values.
///
/// Unresolvable variables without a default are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Implementation of [`substitute_env`] with a pluggable lookup, so it is
/// testable without mutating the process environment.
fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut placeholder = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                placeholder.push(c);
            }

            if closed && !placeholder.is_empty() {
                let (name, default) = match placeholder.split_once(":-") {
                    Some((name, default)) => (name, Some(default)),
                    None => (placeholder.as_str(), None),
                };
                match lookup(name).or_else(|| default.map(str::to_string)) {
                    Some(val) => result.push_str(&val),
                    None => {
                        // Leave unresolved placeholder as-is.
                        result.push_str("${");
                        result.push_str(&placeholder);
                        result.push('}');
                    },
                }
            } else {
                // Malformed — emit literal.
                result.push_str("${");
                result.push_str(&placeholder);
            }
        } else {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_var() {
        let lookup = |name: &str| (name == "CONFAB_APP_SECRET").then(|| "s3cret".to_string());
        assert_eq!(
            substitute_env_with("app_secret = \"${CONFAB_APP_SECRET}\"", lookup),
            "app_secret = \"s3cret\""
        );
    }

    #[test]
    fn leaves_unknown_var() {
        let lookup = |_: &str| None;
        assert_eq!(substitute_env_with("${CONFAB_NOPE}", lookup), "${CONFAB_NOPE}");
    }

    #[test]
    fn default_applies_when_unset() {
        let lookup = |_: &str| None;
        assert_eq!(substitute_env_with("${CONFAB_PORT:-8378}", lookup), "8378");
    }

    #[test]
    fn env_wins_over_default() {
        let lookup = |name: &str| (name == "CONFAB_PORT").then(|| "9000".to_string());
        assert_eq!(substitute_env_with("${CONFAB_PORT:-8378}", lookup), "9000");
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}

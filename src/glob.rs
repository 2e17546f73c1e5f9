use regex::Regex;

/// Converts a Redis-style glob (`*` any run, `?` single char) into an
/// anchored regular expression. Everything else is matched literally.
pub fn glob_to_regex(pattern: &str) -> Regex {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            _ => expr.push_str(&regex::escape(&ch.to_string())),
        }
    }
    expr.push('$');

    // The escape above leaves no way to produce an invalid expression.
    Regex::new(&expr).unwrap_or_else(|_| Regex::new("^$").expect("empty pattern"))
}

/// True when `name` matches the glob `pattern`.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    glob_to_regex(pattern).is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_any_run() {
        assert!(glob_match("ord*", "orders"));
        assert!(glob_match("ord*", "ord"));
        assert!(!glob_match("ord*", "xorders"));
    }

    #[test]
    fn test_question_mark_matches_one_char() {
        assert!(glob_match("h?llo", "hello"));
        assert!(glob_match("h?llo", "hallo"));
        assert!(!glob_match("h?llo", "hllo"));
        assert!(!glob_match("h?llo", "heello"));
    }

    #[test]
    fn test_literals_are_escaped() {
        assert!(glob_match("a.b", "a.b"));
        assert!(!glob_match("a.b", "axb"));
        assert!(glob_match("price[usd]", "price[usd]"));
    }

    #[test]
    fn test_match_is_anchored() {
        assert!(!glob_match("user", "user:1"));
        assert!(glob_match("user:*", "user:1"));
    }
}

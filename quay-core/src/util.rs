/// Longest prefix of `value` that fits in `max` bytes without splitting a character.
pub fn truncated(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Advances `input` past the leading characters matching `predicate` and returns them.
pub fn consume_while<'s>(input: &mut &'s str, mut predicate: impl FnMut(char) -> bool) -> &'s str {
    let len = input
        .char_indices()
        .find(|(_, c)| !predicate(*c))
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    let result = &input[..len];
    *input = &input[len..];
    result
}

/// Whether `name` can be used as a prepared statement name.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {
        format_args!(
            "{}{}",
            $crate::truncated(&$query, 497).trim_end(),
            if $query.len() > 497 { "..." } else { "" },
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_keeps_char_boundaries() {
        assert_eq!(truncated("hello", 10), "hello");
        assert_eq!(truncated("hello", 3), "hel");
        assert_eq!(truncated("aè", 2), "a");
        let long = "x".repeat(600);
        assert_eq!(format!("{}", truncate_long!(long)).len(), 500);
    }

    #[test]
    fn consume_while_advances() {
        let mut input = "abc def";
        assert_eq!(consume_while(&mut input, |c| c.is_alphabetic()), "abc");
        assert_eq!(input, " def");
        assert_eq!(consume_while(&mut input, |c| c.is_alphabetic()), "");
        assert_eq!(input, " def");
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("insert"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("SELECT 1"));
    }
}

//! Window pattern matching
//!
//! Shell-style globs, case-insensitive: `*` matches any run of characters,
//! `?` matches exactly one.

/// Match `text` against a glob `pattern`, ignoring case
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().flat_map(char::to_lowercase).collect();
    let text: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last star and the text position it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, star_t)) => {
                    p = star + 1;
                    t = star_t + 1;
                    backtrack = Some((star, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_and_case() {
        assert!(glob_match("Krita", "krita"));
        assert!(glob_match("krita", "KRITA"));
        assert!(!glob_match("krita", "kritas"));
    }

    #[test]
    fn test_star() {
        assert!(glob_match("*krita*", "Untitled - Krita 5.2"));
        assert!(glob_match("*", ""));
        assert!(glob_match("gimp*", "gimp-2.10"));
        assert!(!glob_match("gimp*", "the gimp"));
    }

    #[test]
    fn test_question_mark() {
        assert!(glob_match("gimp-?.10", "GIMP-2.10"));
        assert!(!glob_match("gimp-?.10", "gimp-.10"));
    }

    #[test]
    fn test_backtracking() {
        assert!(glob_match("*a*b", "xaxxab"));
        assert!(glob_match("*.kra - krita", "sketch.kra.kra - Krita"));
        assert!(!glob_match("*a*b", "xaxxa"));
    }

    #[test]
    fn test_empty_pattern() {
        assert!(glob_match("", ""));
        assert!(!glob_match("", "x"));
    }
}

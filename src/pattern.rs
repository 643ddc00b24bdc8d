//! Shell-style name patterns.
//!
//! - `*` matches any run of characters other than `/`
//! - `?` matches one character other than `/`
//! - `[abc]`, `[a-z]`, `[^a-z]` match one character from (or outside) a class
//! - `\c` matches `c` literally, also inside classes
//!
//! A pattern must match the whole name.

use thiserror::Error;

pub const SEPARATOR: char = '/';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("syntax error in pattern {pattern:?}: {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Char(char),
    AnyChar,
    AnySequence,
    Class { negated: bool, ranges: Vec<(char, char)> },
}

impl Token {
    fn matches(&self, c: char) -> bool {
        match self {
            Token::Char(expected) => *expected == c,
            Token::AnyChar => c != SEPARATOR,
            Token::AnySequence => unreachable!("sequences are matched by the caller"),
            Token::Class { negated, ranges } => {
                let hit = ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi);
                hit != *negated
            }
        }
    }
}

/// A compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    original: String,
    tokens: Vec<Token>,
}

impl Pattern {
    /// Compiles `pattern`, rejecting malformed classes and dangling escapes.
    pub fn new(pattern: &str) -> Result<Pattern, PatternError> {
        let fail = |reason: &'static str| PatternError {
            pattern: pattern.to_string(),
            reason,
        };

        let mut tokens = Vec::new();
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' => {
                    if tokens.last() != Some(&Token::AnySequence) {
                        tokens.push(Token::AnySequence);
                    }
                }
                '?' => tokens.push(Token::AnyChar),
                '\\' => {
                    let escaped = chars.next().ok_or_else(|| fail("dangling escape"))?;
                    tokens.push(Token::Char(escaped));
                }
                '[' => {
                    let negated = chars.next_if_eq(&'^').is_some();
                    let mut ranges = Vec::new();
                    loop {
                        if !ranges.is_empty() && chars.next_if_eq(&']').is_some() {
                            break;
                        }
                        let lo = class_char(&mut chars).ok_or_else(|| fail("invalid character class"))?;
                        let hi = if chars.next_if_eq(&'-').is_some() {
                            class_char(&mut chars).ok_or_else(|| fail("invalid character range"))?
                        } else {
                            lo
                        };
                        ranges.push((lo, hi));
                    }
                    tokens.push(Token::Class { negated, ranges });
                }
                c => tokens.push(Token::Char(c)),
            }
        }

        Ok(Pattern {
            original: pattern.to_string(),
            tokens,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn matches(&self, name: &str) -> bool {
        let name: Vec<char> = name.chars().collect();
        match_tokens(&self.tokens, &name)
    }
}

/// One class member; `]` and `-` must be escaped, and the class must close.
fn class_char(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<char> {
    let c = match chars.next()? {
        '-' | ']' => return None,
        '\\' => chars.next()?,
        c => c,
    };
    chars.peek()?;
    Some(c)
}

/// Table match over token and name suffixes, working from the back.
///
/// `next[i]` holds whether the tokens after the current one match
/// `name[i..]`, so each `*` costs one pass over the name rather than a
/// backtracking search.
fn match_tokens(tokens: &[Token], name: &[char]) -> bool {
    let len = name.len();
    let mut next = vec![false; len + 1];
    next[len] = true;
    let mut current = vec![false; len + 1];

    for token in tokens.iter().rev() {
        for i in (0..=len).rev() {
            current[i] = match token {
                Token::AnySequence => next[i] || (i < len && name[i] != SEPARATOR && current[i + 1]),
                token => i < len && token.matches(name[i]) && next[i + 1],
            };
        }
        std::mem::swap(&mut next, &mut current);
    }
    next[0]
}

/// Compiles a pattern handed to a `glob` capability.
///
/// A malformed pattern there is a caller bug, so it aborts the call loudly
/// instead of coming back as an error. Callers holding untrusted input should
/// check it with [`Pattern::new`] first.
pub(crate) fn compile_glob(pattern: &str) -> Pattern {
    match Pattern::new(pattern) {
        Ok(compiled) => compiled,
        Err(err) => {
            log::error!("Invalid glob pattern {:?}: {}", pattern, err.reason);
            panic!("Invalid glob pattern {:?}: {}", pattern, err.reason);
        }
    }
}

/// True if `pattern` contains any character with special meaning.
pub fn has_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, name: &str) -> bool {
        Pattern::new(pattern).unwrap().matches(name)
    }

    #[test]
    fn literal() {
        assert!(matches("abc", "abc"));
        assert!(!matches("abc", "abcd"));
        assert!(!matches("abc", "ab"));
    }

    #[test]
    fn star_stays_in_segment() {
        assert!(matches("*", "a.txt"));
        assert!(matches("*", ""));
        assert!(!matches("*", "dir/b.txt"));
        assert!(matches("dir/*", "dir/b.txt"));
        assert!(!matches("dir/*", "dir/sub/b.txt"));
        assert!(matches("a*b*c", "axxbyyc"));
        assert!(!matches("a*b", "a/b"));
        assert!(matches("*.rs", "main.rs"));
        assert!(matches("a**c", "abbc"));
        assert!(matches("*/*", "dir/b.txt"));
        assert!(!matches("*/", "dir/b.txt"));
    }

    #[test]
    fn many_stars_stay_fast() {
        let name = "a".repeat(200);
        let failing = format!("{}b", "*a".repeat(40));
        let started = std::time::Instant::now();
        assert!(!matches(&failing, &name));
        assert!(matches(&"*a".repeat(40), &name));
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn question_mark() {
        assert!(matches("a?c", "abc"));
        assert!(!matches("a?c", "a/c"));
        assert!(!matches("a?c", "ac"));
    }

    #[test]
    fn classes() {
        assert!(matches("[abc]", "b"));
        assert!(!matches("[abc]", "d"));
        assert!(matches("[a-c]x", "bx"));
        assert!(matches("[^a-c]", "d"));
        assert!(!matches("[^a-c]", "a"));
        assert!(matches("[\\]]", "]"));
        assert!(matches("[\\-]", "-"));
    }

    #[test]
    fn escapes() {
        assert!(matches("\\*", "*"));
        assert!(!matches("\\*", "x"));
        assert!(matches("a\\?", "a?"));
    }

    #[test]
    fn non_ascii() {
        assert!(matches("caf?", "café"));
        assert!(matches("[α-ω]", "λ"));
    }

    #[test]
    fn malformed() {
        for bad in ["[", "[]", "[a", "[a-", "[a-]", "[-a]", "a\\", "[^]", "x[\\"] {
            let err = Pattern::new(bad).unwrap_err();
            assert_eq!(err.pattern, bad);
        }
    }

    #[test]
    #[should_panic(expected = "Invalid glob pattern")]
    fn glob_compile_panics_on_malformed() {
        compile_glob("[z");
    }

    #[test]
    fn meta_detection() {
        assert!(has_meta("a*"));
        assert!(has_meta("[a]"));
        assert!(has_meta("a\\b"));
        assert!(!has_meta("dir/file.txt"));
    }
}

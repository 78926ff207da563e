//! PostgreSQL statement splitter.
//!
//! Splits a source stream into individual statements on top-level `;`,
//! honoring every lexical escape PostgreSQL permits: line and nested block
//! comments, single/double quotes with doubled-delimiter escapes, top-level
//! backslash escapes, dollar-quoted bodies (`$tag$ … $tag$`), parenthesized
//! groups, and `BEGIN ATOMIC … END` function bodies.
//!
//! [`split`] returns the raw token slices; concatenating them reproduces the
//! input byte-for-byte. [`split_and_trim`] additionally trims one trailing
//! `;` plus outer whitespace per token and discards empties, which is the
//! form statements are executed in.

use crate::error::{ShiftError, ShiftResult};

/// Default ceiling for a single statement, in bytes.
pub const DEFAULT_MAX_CAPACITY: usize = 256 * 1024;

/// How much of the last emitted statement to include in a
/// [`ShiftError::TokenTooLong`] report.
const ERROR_PREFIX_LEN: usize = 80;

/// Splitter tuning, passed explicitly instead of read from the environment.
#[derive(Debug, Clone, Copy)]
pub struct SplitterConfig {
    /// Maximum size of a single statement before splitting fails.
    pub max_capacity: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            max_capacity: DEFAULT_MAX_CAPACITY,
        }
    }
}

/// Lexer state. Each transition consumes one rune; `buf` is the token
/// accumulated so far, including the rune being dispatched.
#[derive(Debug, Clone)]
enum State {
    /// Top level: `;` terminates a statement here and nowhere else.
    Ready,
    /// Seen a single `-`; a second one starts a line comment.
    CommentStart,
    /// Block comment, `depth` levels deep. Depth 0 means the opening `/`
    /// has been seen but not yet confirmed by `*`.
    Block { depth: u32 },
    /// Inside `'…'` or `"…"`. `closing` is set after an unpaired delimiter;
    /// a second delimiter re-enters the literal (doubled-delimiter escape).
    Quote { delim: char, closing: bool },
    /// Consuming until the trailing window equals `delim`. Covers both
    /// dollar-quoted bodies (`delim = "$tag$"`) and line comments
    /// (`delim = "\n"`).
    Dollar { delim: String },
    /// Reading a dollar-quote tag: `[A-Za-z0-9_]*` between two `$`.
    Tag { tag: String },
    /// A top-level `\` consumes exactly one following rune.
    Escape,
    /// `;` suspended until the trailing window matches `delim` while the
    /// delegated inner state is back at Ready. Covers `( … )` groups
    /// (`delim = ")"`) and `BEGIN ATOMIC … END` bodies (`delim = "END"`).
    Atomic { inner: Box<State>, delim: &'static str },
}

impl State {
    /// Consume one rune, returning the successor state and whether the
    /// accumulated buffer is emitted as a statement.
    fn next(self, r: char, buf: &str) -> (State, bool) {
        match self {
            State::Ready => match r {
                ';' => (State::Ready, true),
                '-' => (State::CommentStart, false),
                '/' => (State::Block { depth: 0 }, false),
                '\'' | '"' => (
                    State::Quote {
                        delim: r,
                        closing: false,
                    },
                    false,
                ),
                '\\' => (State::Escape, false),
                '$' => (State::Tag { tag: String::new() }, false),
                '(' => (
                    State::Atomic {
                        inner: Box::new(State::Ready),
                        delim: ")",
                    },
                    false,
                ),
                'c' | 'C' if ends_with_fold(buf, "ATOMIC") => (
                    State::Atomic {
                        inner: Box::new(State::Ready),
                        delim: "END",
                    },
                    false,
                ),
                _ => (State::Ready, false),
            },
            State::CommentStart => match r {
                '-' => (
                    State::Dollar {
                        delim: "\n".to_string(),
                    },
                    false,
                ),
                _ => State::Ready.next(r, buf),
            },
            State::Block { depth } => {
                if buf.ends_with("/*") {
                    (State::Block { depth: depth + 1 }, false)
                } else if buf.ends_with("*/") && depth > 0 {
                    if depth == 1 {
                        (State::Ready, false)
                    } else {
                        (State::Block { depth: depth - 1 }, false)
                    }
                } else if depth == 0 {
                    // `/` was not a comment opener after all
                    State::Ready.next(r, buf)
                } else {
                    (State::Block { depth }, false)
                }
            }
            State::Quote { delim, closing } => {
                if closing {
                    if r == delim {
                        // doubled delimiter escapes the delimiter
                        (
                            State::Quote {
                                delim,
                                closing: false,
                            },
                            false,
                        )
                    } else {
                        // the quote closed at the previous rune
                        State::Ready.next(r, buf)
                    }
                } else if r == delim {
                    (State::Quote { delim, closing: true }, false)
                } else {
                    (
                        State::Quote {
                            delim,
                            closing: false,
                        },
                        false,
                    )
                }
            }
            State::Dollar { delim } => {
                if buf.ends_with(delim.as_str()) {
                    (State::Ready, false)
                } else {
                    (State::Dollar { delim }, false)
                }
            }
            State::Tag { mut tag } => match r {
                '$' => (
                    State::Dollar {
                        delim: format!("${tag}$"),
                    },
                    false,
                ),
                c if c.is_ascii_alphanumeric() || c == '_' => {
                    tag.push(c);
                    (State::Tag { tag }, false)
                }
                _ => State::Ready.next(r, buf),
            },
            State::Escape => (State::Ready, false),
            State::Atomic { inner, delim } => {
                // Emission is decided only at the top level; a `;` consumed
                // by the delegated state must not terminate the statement.
                let (next_inner, _) = (*inner).next(r, buf);
                if matches!(next_inner, State::Ready) && ends_with_fold(buf, delim) {
                    (State::Ready, false)
                } else {
                    (
                        State::Atomic {
                            inner: Box::new(next_inner),
                            delim,
                        },
                        false,
                    )
                }
            }
        }
    }
}

/// ASCII case-insensitive suffix check over the raw trailing window.
fn ends_with_fold(buf: &str, suffix: &str) -> bool {
    let b = buf.as_bytes();
    let s = suffix.as_bytes();
    b.len() >= s.len() && b[b.len() - s.len()..].eq_ignore_ascii_case(s)
}

/// Split `sql` into raw statement tokens with the default configuration.
pub fn split(sql: &str) -> ShiftResult<Vec<String>> {
    split_with_config(sql, SplitterConfig::default())
}

/// Split `sql` into raw statement tokens.
///
/// Tokens include the terminating `;` and any surrounding whitespace, so
/// concatenating them reproduces the input exactly. The final token is
/// emitted at end of input regardless of lexer state.
pub fn split_with_config(sql: &str, config: SplitterConfig) -> ShiftResult<Vec<String>> {
    let mut tokens: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut state = State::Ready;

    for r in sql.chars() {
        buf.push(r);
        if buf.len() > config.max_capacity {
            let prefix = tokens
                .last()
                .map(|t| t.chars().take(ERROR_PREFIX_LEN).collect())
                .unwrap_or_default();
            return Err(ShiftError::TokenTooLong {
                index: tokens.len(),
                prefix,
                max_capacity: config.max_capacity,
            });
        }
        let (next, emit) = state.next(r, &buf);
        state = next;
        if emit {
            tokens.push(std::mem::take(&mut buf));
        }
    }
    if !buf.is_empty() {
        tokens.push(buf);
    }
    Ok(tokens)
}

/// Split `sql`, trim one trailing `;` plus outer whitespace per token, and
/// discard tokens that become empty.
pub fn split_and_trim(sql: &str) -> ShiftResult<Vec<String>> {
    split_and_trim_with_config(sql, SplitterConfig::default())
}

/// [`split_and_trim`] with explicit configuration.
pub fn split_and_trim_with_config(sql: &str, config: SplitterConfig) -> ShiftResult<Vec<String>> {
    let tokens = split_with_config(sql, config)?;
    Ok(tokens
        .into_iter()
        .filter_map(|t| {
            let t = t.trim();
            let t = t.strip_suffix(';').unwrap_or(t).trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn must_split(sql: &str) -> Vec<String> {
        split(sql).expect("split")
    }

    #[test]
    fn terminator_ends_statement() {
        assert_eq!(
            must_split("CREATE TABLE t (id int); SELECT 1;"),
            vec!["CREATE TABLE t (id int);", " SELECT 1;"]
        );
    }

    #[test]
    fn line_comment_swallows_terminator() {
        assert_eq!(must_split("END;-- comment"), vec!["END;", "-- comment"]);
        assert_eq!(
            must_split("SELECT 1 -- trailing; note\n;"),
            vec!["SELECT 1 -- trailing; note\n;"]
        );
    }

    #[test]
    fn nested_block_comment_is_one_token() {
        assert_eq!(
            must_split("SELECT /*; /*;*/ ;*/ 1"),
            vec!["SELECT /*; /*;*/ ;*/ 1"]
        );
    }

    #[test]
    fn slash_without_star_is_not_a_comment() {
        assert_eq!(must_split("SELECT 1 / 2;"), vec!["SELECT 1 / 2;"]);
    }

    #[test]
    fn dollar_quote_swallows_everything() {
        assert_eq!(
            must_split("$$\"Dane's horse\"$$"),
            vec!["$$\"Dane's horse\"$$"]
        );
        assert_eq!(
            must_split("SELECT $body$ x; y; $body$;"),
            vec!["SELECT $body$ x; y; $body$;"]
        );
    }

    #[test]
    fn dollar_tag_is_matched_byte_for_byte() {
        // $a$ does not close $ab$
        assert_eq!(
            must_split("SELECT $ab$ x $a$ ; $ab$;"),
            vec!["SELECT $ab$ x $a$ ; $ab$;"]
        );
    }

    #[test]
    fn lone_dollar_is_ordinary_input() {
        assert_eq!(must_split("SELECT 1 + $1; SELECT 2;").len(), 2);
    }

    #[test]
    fn quoted_semicolons_do_not_terminate() {
        assert_eq!(
            must_split("INSERT INTO t VALUES ('a;b');"),
            vec!["INSERT INTO t VALUES ('a;b');"]
        );
        assert_eq!(
            must_split("SELECT \";\" FROM t;"),
            vec!["SELECT \";\" FROM t;"]
        );
    }

    #[test]
    fn doubled_quote_escapes_the_delimiter() {
        assert_eq!(
            must_split("SELECT 'it''s; here';"),
            vec!["SELECT 'it''s; here';"]
        );
        assert_eq!(
            must_split("SELECT \"a\"\";b\" FROM t;"),
            vec!["SELECT \"a\"\";b\" FROM t;"]
        );
    }

    #[test]
    fn backslash_consumes_one_rune() {
        assert_eq!(must_split("SELECT \\; 1;"), vec!["SELECT \\; 1;"]);
    }

    #[test]
    fn atomic_body_suspends_terminator() {
        assert_eq!(
            must_split("BEGIN ATOMIC; select 'end'; end"),
            vec!["BEGIN ATOMIC; select 'end'; end"]
        );
    }

    #[test]
    fn atomic_end_is_case_insensitive() {
        assert_eq!(
            must_split("begin atomic; select 1; END; SELECT 2;"),
            vec!["begin atomic; select 1; END;", " SELECT 2;"]
        );
    }

    #[test]
    fn parenthesized_group_suspends_terminator() {
        assert_eq!(
            must_split("SELECT f(1; 2); SELECT 3;"),
            vec!["SELECT f(1; 2);", " SELECT 3;"]
        );
    }

    #[test]
    fn quotes_nest_inside_atomic_bodies() {
        assert_eq!(
            must_split("CREATE FUNCTION f() BEGIN ATOMIC select f('x; y'); end;"),
            vec!["CREATE FUNCTION f() BEGIN ATOMIC select f('x; y'); end;"]
        );
    }

    #[test]
    fn split_is_lossless() {
        let inputs = [
            "END;-- comment",
            "SELECT /*; /*;*/ ;*/ 1",
            "$$\"Dane's horse\"$$",
            "BEGIN ATOMIC; select 'end'; end",
            "a;b;;c",
            "  \n SELECT 1 ; \t SELECT 2 ;",
            "-- only a comment\n",
            "",
        ];
        for input in inputs {
            let tokens = must_split(input);
            assert_eq!(tokens.concat(), input, "lossless split of {input:?}");
        }
    }

    #[test]
    fn trimmed_statements_retokenize_to_themselves() {
        let input = "CREATE TABLE t (id int);\n\nINSERT INTO t VALUES (1);\n-- done\n";
        for stmt in split_and_trim(input).expect("split") {
            let again = split_and_trim(&stmt).expect("re-split");
            assert_eq!(again, vec![stmt.clone()], "round trip of {stmt:?}");
        }
    }

    #[test]
    fn trim_drops_empty_statements() {
        assert_eq!(
            split_and_trim(";;  ;\nSELECT 1;").expect("split"),
            vec!["SELECT 1"]
        );
    }

    #[test]
    fn oversized_statement_reports_last_emitted() {
        let config = SplitterConfig { max_capacity: 16 };
        let err = split_with_config("SELECT 1; SELECT 'way past the ceiling';", config)
            .expect_err("must fail");
        match err {
            ShiftError::TokenTooLong { index, prefix, max_capacity } => {
                assert_eq!(index, 1);
                assert_eq!(max_capacity, 16);
                assert!(prefix.starts_with("SELECT 1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn capacity_can_be_raised() {
        let config = SplitterConfig { max_capacity: 1024 };
        let long = format!("SELECT '{}';", "x".repeat(200));
        assert_eq!(split_with_config(&long, config).expect("split").len(), 1);
    }
}

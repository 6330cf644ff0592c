//! URL pattern compilation and matching
//!
//! Plain patterns use the ABP syntax: `*` matches anything, `^` matches a
//! separator character or the end of the URL, a leading `|` anchors at the
//! URL start, a trailing `|` at its end, and a leading `||` at the start of
//! the hostname or of any of its labels. Patterns wrapped in slashes are
//! regular expressions.

use regex::{Regex, RegexBuilder};

use fg_core::url::{get_host_position, is_boundary_char};

use crate::error::RuleSyntaxError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Wildcard,
    Separator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    None,
    Left,
    Hostname,
}

/// Compiled URL pattern.
#[derive(Debug, Clone)]
pub struct Pattern(Compiled);

#[derive(Debug, Clone)]
enum Compiled {
    /// Empty pattern or a lone `*`
    Any,
    Plain {
        tokens: Vec<Token>,
        anchor: Anchor,
        end_anchor: bool,
        match_case: bool,
    },
    Regex(Regex),
}

impl Pattern {
    /// Compile a pattern. Literals are lowercased unless `match_case` is set.
    pub fn parse(text: &str, match_case: bool) -> Result<Self, RuleSyntaxError> {
        if let Some(body) = regex_body(text) {
            let regex = RegexBuilder::new(body).case_insensitive(!match_case).build()?;
            return Ok(Self(Compiled::Regex(regex)));
        }

        let (anchor, rest) = if let Some(rest) = text.strip_prefix("||") {
            (Anchor::Hostname, rest)
        } else if let Some(rest) = text.strip_prefix('|') {
            (Anchor::Left, rest)
        } else {
            (Anchor::None, text)
        };

        let (rest, end_anchor) = match rest.strip_suffix('|') {
            Some(stripped) => (stripped, true),
            None => (rest, false),
        };

        let tokens = tokenize(rest, match_case);
        if anchor == Anchor::None && !end_anchor && tokens.iter().all(|t| *t == Token::Wildcard) {
            return Ok(Self(Compiled::Any));
        }

        Ok(Self(Compiled::Plain {
            tokens,
            anchor,
            end_anchor,
            match_case,
        }))
    }

    /// Test the pattern against a URL and its lowercase form.
    pub fn matches(&self, url: &str, url_lowercase: &str) -> bool {
        match &self.0 {
            Compiled::Any => true,
            Compiled::Regex(regex) => regex.is_match(url),
            Compiled::Plain {
                tokens,
                anchor,
                end_anchor,
                match_case,
            } => {
                let text = if *match_case { url } else { url_lowercase };
                let bytes = text.as_bytes();
                let matches_from = |pos: usize| match_tokens(tokens, bytes, pos, *end_anchor);

                match anchor {
                    Anchor::Left => matches_from(0),
                    Anchor::None => (0..=bytes.len()).any(matches_from),
                    Anchor::Hostname => {
                        let Some((host_start, host_end)) = get_host_position(text) else {
                            return false;
                        };
                        let label_starts = (host_start..host_end)
                            .filter(|&i| i == host_start || bytes[i - 1] == b'.');
                        label_starts.into_iter().any(matches_from)
                    }
                }
            }
        }
    }

    /// Longest literal run, lowercased; empty for regex patterns.
    pub fn shortcut(&self) -> String {
        match &self.0 {
            Compiled::Any | Compiled::Regex(_) => String::new(),
            Compiled::Plain { tokens, .. } => tokens
                .iter()
                .filter_map(|token| match token {
                    Token::Literal(literal) => Some(literal),
                    _ => None,
                })
                .max_by_key(|literal| literal.len())
                .map(|literal| literal.to_ascii_lowercase())
                .unwrap_or_default(),
        }
    }
}

/// Body of a `/regex/` pattern.
fn regex_body(text: &str) -> Option<&str> {
    if text.len() > 2 && text.starts_with('/') && text.ends_with('/') {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

fn tokenize(text: &str, match_case: bool) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal = String::new();

    for ch in text.chars() {
        let token = match ch {
            '*' => Token::Wildcard,
            '^' => Token::Separator,
            _ => {
                literal.push(if match_case { ch } else { ch.to_ascii_lowercase() });
                continue;
            }
        };

        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }
        // Collapse runs of wildcards
        if token == Token::Wildcard && tokens.last() == Some(&Token::Wildcard) {
            continue;
        }
        tokens.push(token);
    }

    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    tokens
}

/// Backtracking matcher over the token list.
fn match_tokens(tokens: &[Token], text: &[u8], pos: usize, end_anchor: bool) -> bool {
    let Some((token, rest)) = tokens.split_first() else {
        return !end_anchor || pos == text.len();
    };

    match token {
        Token::Literal(literal) => {
            text[pos..].starts_with(literal.as_bytes())
                && match_tokens(rest, text, pos + literal.len(), end_anchor)
        }
        // `^` also matches the end of the address
        Token::Separator => match text.get(pos) {
            None => match_tokens(rest, text, pos, end_anchor),
            Some(&c) => is_boundary_char(c) && match_tokens(rest, text, pos + 1, end_anchor),
        },
        Token::Wildcard => match rest.first() {
            None => true,
            // Jump straight to candidate occurrences of the next literal
            Some(Token::Literal(next)) => {
                let needle = next.as_bytes();
                (pos..=text.len().saturating_sub(needle.len()))
                    .filter(|&p| text[p..].starts_with(needle))
                    .any(|p| match_tokens(rest, text, p, end_anchor))
            }
            Some(_) => (pos..=text.len()).any(|p| match_tokens(rest, text, p, end_anchor)),
        },
    }
}

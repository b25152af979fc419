//! Pull-based tokenizer over rule text.

use crate::error::{Result, RuleError};
use vroute_common::geom::Coord;

/// Whitespace-separated tokens with `;` always standing alone and quotes stripped.
#[derive(Clone, Debug)]
pub struct TokenStream {
    tokens: Vec<String>,
    pos: usize,
    scale: f64,
}

impl TokenStream {
    pub fn new(text: &str, scale: f64) -> Self {
        let tokens = text
            .replace(';', " ; ")
            .replace('"', " ")
            .split_whitespace()
            .map(str::to_string)
            .collect();
        Self {
            tokens,
            pos: 0,
            scale,
        }
    }

    fn from_tokens(tokens: Vec<String>, scale: f64) -> Self {
        Self {
            tokens,
            pos: 0,
            scale,
        }
    }

    /// Splits the stream at `;` into one stream per statement. Empty statements are dropped.
    pub fn statements(self) -> Vec<TokenStream> {
        let scale = self.scale;
        self.tokens
            .split(|t| t == ";")
            .filter(|s| !s.is_empty())
            .map(|s| TokenStream::from_tokens(s.to_vec(), scale))
            .collect()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn rewind(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn remaining(&self) -> &[String] {
        &self.tokens[self.pos.min(self.tokens.len())..]
    }

    pub fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    pub fn peek_at(&self, ahead: usize) -> Option<&str> {
        self.tokens.get(self.pos + ahead).map(String::as_str)
    }

    pub fn next_token(&mut self) -> Option<&str> {
        let t = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(t.as_str())
    }

    /// Consumes `kw` if it is next.
    pub fn eat(&mut self, kw: &str) -> bool {
        if self.peek() == Some(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_keyword(&mut self, kw: &'static str) -> Result<()> {
        match self.next_token() {
            Some(t) if t == kw => Ok(()),
            Some(t) => Err(RuleError::Expected {
                expected: kw,
                found: t.to_string(),
            }),
            None => Err(RuleError::UnexpectedEnd { expected: kw }),
        }
    }

    pub fn expect_word(&mut self, what: &'static str) -> Result<String> {
        self.next_token()
            .map(str::to_string)
            .ok_or(RuleError::UnexpectedEnd { expected: what })
    }

    pub fn peek_is_number(&self) -> bool {
        self.peek().is_some_and(is_number)
    }

    fn expect_f64(&mut self, what: &'static str) -> Result<f64> {
        let t = self
            .next_token()
            .ok_or(RuleError::UnexpectedEnd { expected: what })?;
        if !is_number(t) {
            return Err(RuleError::BadNumber {
                token: t.to_string(),
            });
        }
        t.parse::<f64>().map_err(|_| RuleError::BadNumber {
            token: t.to_string(),
        })
    }

    /// A length, scaled to database units.
    pub fn expect_coord(&mut self, what: &'static str) -> Result<Coord> {
        let v = self.expect_f64(what)?;
        Ok((v * self.scale).round() as Coord)
    }

    /// An area, scaled twice.
    pub fn expect_area(&mut self, what: &'static str) -> Result<i64> {
        let v = self.expect_f64(what)?;
        Ok((v * self.scale * self.scale).round() as i64)
    }

    pub fn expect_count(&mut self, what: &'static str) -> Result<u32> {
        let t = self
            .next_token()
            .ok_or(RuleError::UnexpectedEnd { expected: what })?;
        t.parse::<u32>().map_err(|_| RuleError::BadNumber {
            token: t.to_string(),
        })
    }

    /// Reads a length only if a number is next.
    pub fn opt_coord(&mut self, what: &'static str) -> Result<Option<Coord>> {
        if self.peek_is_number() {
            self.expect_coord(what).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn unsupported(&self, context: &str) -> RuleError {
        let at = self.peek().unwrap_or("<end>");
        RuleError::Unsupported(format!("{} keyword '{}'", context, at))
    }
}

/// Plain decimal numbers only; `inf` and `nan` are names, not numbers.
pub fn is_number(t: &str) -> bool {
    t.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
        && t.parse::<f64>().is_ok()
}

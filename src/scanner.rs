use crate::error::{LispError, LispResult};

/// Zero sentinel returned at end of input. Including it in a terminator set
/// makes end-of-input an accepted terminator.
pub const END: u8 = 0;

/// Character-level cursor over an immutable input buffer.
pub struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Scanner {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    /// Current character, or the zero sentinel at end.
    pub fn peek(&self) -> u8 {
        if self.pos < self.input.len() {
            self.input[self.pos]
        } else {
            END
        }
    }

    /// Consume and return the current character; zero sentinel at end.
    pub fn next(&mut self) -> u8 {
        let ch = self.peek();
        if ch != END {
            self.pos += 1;
        }
        ch
    }

    /// If the current character matches any of `set`, consume and return it.
    /// The zero sentinel in `set` matches end of input.
    pub fn one_of(&mut self, set: &[u8]) -> LispResult<u8> {
        let ch = self.peek();
        if set.contains(&ch) {
            Ok(self.next())
        } else {
            Err(LispError::Syntax(format!(
                "expected one of {} at {:?}",
                show_set(set),
                self.snippet()
            )))
        }
    }

    /// Return the substring from the current position up to (not including)
    /// the first occurrence of any terminator; the cursor stops on the
    /// terminator. With the zero sentinel in the set, end of input is an
    /// accepted terminator; otherwise running off the end fails.
    pub fn until(&mut self, terminators: &[u8]) -> LispResult<&'a str> {
        let start = self.pos;
        loop {
            let ch = self.peek();
            if terminators.contains(&ch) {
                let text = std::str::from_utf8(&self.input[start..self.pos])
                    .map_err(|_| LispError::Syntax("invalid UTF-8 in input".into()))?;
                return Ok(text);
            }
            if ch == END {
                break;
            }
            self.pos += 1;
        }
        Err(LispError::Syntax(format!(
            "expected one of {} before end of input",
            show_set(terminators)
        )))
    }

    /// Consume any spaces, tabs and newlines.
    pub fn skip_whitespace(&mut self) {
        while matches!(self.peek(), b' ' | b'\t' | b'\n' | b'\r') {
            self.pos += 1;
        }
    }

    /// Remaining input (diagnostics).
    pub fn rest(&self) -> &'a str {
        std::str::from_utf8(&self.input[self.pos..]).unwrap_or("<invalid UTF-8>")
    }

    pub fn ended(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Current byte offset into the input.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// A short preview of the remaining input, for error messages.
    fn snippet(&self) -> String {
        let rest = self.rest();
        if rest.len() > 24 {
            let cut = rest
                .char_indices()
                .take_while(|&(i, _)| i < 24)
                .last()
                .map(|(i, c)| i + c.len_utf8())
                .unwrap_or(0);
            format!("{}…", &rest[..cut])
        } else if rest.is_empty() {
            "end of input".to_string()
        } else {
            rest.to_string()
        }
    }
}

fn show_set(set: &[u8]) -> String {
    let mut out = String::new();
    for (i, &ch) in set.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        match ch {
            END => out.push_str("<end>"),
            b'\n' => out.push_str("'\\n'"),
            b'\t' => out.push_str("'\\t'"),
            c => {
                out.push('\'');
                out.push(c as char);
                out.push('\'');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_and_next_walk_the_buffer() {
        let mut scan = Scanner::new("ab");
        assert_eq!(scan.peek(), b'a');
        assert_eq!(scan.next(), b'a');
        assert_eq!(scan.next(), b'b');
        assert!(scan.ended());
        assert_eq!(scan.peek(), END);
        assert_eq!(scan.next(), END);
    }

    #[test]
    fn one_of_consumes_on_match_and_fails_otherwise() {
        let mut scan = Scanner::new("(x");
        assert_eq!(scan.one_of(&[b'(', b'\'']).unwrap(), b'(');
        assert!(scan.one_of(&[b'(']).is_err());
        assert_eq!(scan.peek(), b'x');
    }

    #[test]
    fn one_of_sentinel_matches_end() {
        let mut scan = Scanner::new("");
        assert_eq!(scan.one_of(&[END]).unwrap(), END);
    }

    #[test]
    fn until_stops_on_terminator_without_consuming_it() {
        let mut scan = Scanner::new("word)");
        assert_eq!(scan.until(&[b')', b' ']).unwrap(), "word");
        assert_eq!(scan.peek(), b')');
    }

    #[test]
    fn until_accepts_end_only_with_sentinel() {
        let mut scan = Scanner::new("word");
        assert!(scan.until(&[b')']).is_err());
        let mut scan = Scanner::new("word");
        assert_eq!(scan.until(&[b')', END]).unwrap(), "word");
    }

    #[test]
    fn skip_whitespace_and_rest() {
        let mut scan = Scanner::new(" \t\n rest here");
        scan.skip_whitespace();
        assert_eq!(scan.rest(), "rest here");
    }
}

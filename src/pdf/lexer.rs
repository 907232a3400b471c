//! Byte-level tokenizer for PDF syntax

use crate::error::{PDFError, PDFResult};
use super::object::{decode_name, is_delimiter, is_whitespace, Name, PdfString};

/// Nesting limit for literal string parentheses
const MAX_PAREN_DEPTH: usize = 256;

/// Lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Integer(i64),
    Real(f64),
    Name(Name),
    String(PdfString),
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
    /// Bare word: `true`, `obj`, `R`, `xref`, ...
    Keyword(String),
}

impl Token {
    /// Check for a specific keyword
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Keyword(k) if k == keyword)
    }
}

/// Tokenizer over an in-memory buffer
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create lexer at the start of the buffer
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create lexer at an offset
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    /// Current offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move to an offset, saved earlier with `position`
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Underlying buffer
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Skip whitespace and `%` comments
    pub fn skip_whitespace(&mut self) {
        while let Some(&byte) = self.data.get(self.pos) {
            if is_whitespace(byte) {
                self.pos += 1;
            } else if byte == b'%' {
                while let Some(&b) = self.data.get(self.pos) {
                    if b == b'\r' || b == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Next token, or `None` at end of input
    pub fn next_token(&mut self) -> PDFResult<Option<Token>> {
        self.skip_whitespace();
        let start = self.pos;
        let byte = match self.data.get(self.pos) {
            Some(&b) => b,
            None => return Ok(None),
        };

        let token = match byte {
            b'[' => {
                self.pos += 1;
                Token::ArrayStart
            }
            b']' => {
                self.pos += 1;
                Token::ArrayEnd
            }
            b'<' if self.data.get(self.pos + 1) == Some(&b'<') => {
                self.pos += 2;
                Token::DictStart
            }
            b'>' if self.data.get(self.pos + 1) == Some(&b'>') => {
                self.pos += 2;
                Token::DictEnd
            }
            b'<' => Token::String(self.read_hex_string()?),
            b'(' => Token::String(self.read_literal_string()?),
            b'/' => {
                self.pos += 1;
                let raw = self.read_regular();
                Token::Name(decode_name(raw))
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number()?,
            _ if is_delimiter(byte) => {
                return Err(PDFError::InvalidToken {
                    offset: start,
                    message: format!("unexpected delimiter '{}'", byte as char),
                })
            }
            _ => {
                let raw = self.read_regular();
                Token::Keyword(String::from_utf8_lossy(raw).into_owned())
            }
        };

        Ok(Some(token))
    }

    /// Next token, treating end of input as an error
    pub fn expect_token(&mut self, context: &'static str) -> PDFResult<Token> {
        self.next_token()?.ok_or(PDFError::UnexpectedEof(context))
    }

    /// Peek the next token without consuming it
    pub fn peek_token(&mut self) -> PDFResult<Option<Token>> {
        let saved = self.pos;
        let token = self.next_token();
        self.pos = saved;
        token
    }

    /// Consume a keyword or fail
    pub fn expect_keyword(&mut self, keyword: &str) -> PDFResult<()> {
        let offset = self.pos;
        match self.next_token()? {
            Some(ref token) if token.is_keyword(keyword) => Ok(()),
            Some(token) => Err(PDFError::InvalidToken {
                offset,
                message: format!("expected '{}', found {:?}", keyword, token),
            }),
            None => Err(PDFError::UnexpectedEof("keyword")),
        }
    }

    /// Consume a non-negative integer or fail
    pub fn expect_unsigned(&mut self, context: &'static str) -> PDFResult<u64> {
        let offset = self.pos;
        match self.expect_token(context)? {
            Token::Integer(i) if i >= 0 => Ok(i as u64),
            token => Err(PDFError::InvalidToken {
                offset,
                message: format!("expected {} as unsigned integer, found {:?}", context, token),
            }),
        }
    }

    fn read_regular(&mut self) -> &'a [u8] {
        let start = self.pos;
        while let Some(&b) = self.data.get(self.pos) {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    fn read_number(&mut self) -> PDFResult<Token> {
        let start = self.pos;
        let raw = self.read_regular();
        let text = std::str::from_utf8(raw).map_err(|_| PDFError::InvalidToken {
            offset: start,
            message: "non-ASCII number".to_string(),
        })?;

        if !text.contains('.') {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Token::Integer(i));
            }
        }

        // Integers past i64 degrade to reals, as other readers do
        text.parse::<f64>()
            .ok()
            .filter(|r| r.is_finite())
            .map(Token::Real)
            .ok_or_else(|| PDFError::InvalidToken {
                offset: start,
                message: format!("invalid number '{}'", text),
            })
    }

    fn read_hex_string(&mut self) -> PDFResult<PdfString> {
        let start = self.pos;
        self.pos += 1;
        let end = self.data[self.pos..]
            .iter()
            .position(|&b| b == b'>')
            .map(|i| self.pos + i)
            .ok_or(PDFError::UnexpectedEof("hex string"))?;

        let digits = &self.data[self.pos..end];
        self.pos = end + 1;
        PdfString::from_hex_digits(digits).map_err(|e| PDFError::InvalidToken {
            offset: start,
            message: e.to_string(),
        })
    }

    fn read_literal_string(&mut self) -> PDFResult<PdfString> {
        self.pos += 1;
        let mut bytes = Vec::new();
        let mut depth = 1usize;

        loop {
            let byte = *self
                .data
                .get(self.pos)
                .ok_or(PDFError::UnexpectedEof("literal string"))?;
            self.pos += 1;

            match byte {
                b'(' => {
                    depth += 1;
                    if depth > MAX_PAREN_DEPTH {
                        return Err(PDFError::InvalidToken {
                            offset: self.pos - 1,
                            message: "literal string nested too deeply".to_string(),
                        });
                    }
                    bytes.push(byte);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    bytes.push(byte);
                }
                b'\\' => self.read_escape(&mut bytes)?,
                b'\r' => {
                    // Unescaped end-of-line of any form reads as \n
                    if self.data.get(self.pos) == Some(&b'\n') {
                        self.pos += 1;
                    }
                    bytes.push(b'\n');
                }
                _ => bytes.push(byte),
            }
        }

        Ok(PdfString::literal(bytes))
    }

    fn read_escape(&mut self, bytes: &mut Vec<u8>) -> PDFResult<()> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(PDFError::UnexpectedEof("string escape"))?;
        self.pos += 1;

        match byte {
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b't' => bytes.push(b'\t'),
            b'b' => bytes.push(0x08),
            b'f' => bytes.push(0x0C),
            b'0'..=b'7' => {
                let mut value = (byte - b'0') as u32;
                for _ in 0..2 {
                    match self.data.get(self.pos) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + (d - b'0') as u32;
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                // High-order overflow is ignored
                bytes.push((value & 0xFF) as u8);
            }
            // Line continuation
            b'\r' => {
                if self.data.get(self.pos) == Some(&b'\n') {
                    self.pos += 1;
                }
            }
            b'\n' => {}
            // \( \) \\ and unknown escapes yield the byte itself
            other => bytes.push(other),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(input: &[u8]) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        while let Some(token) = lexer.next_token().unwrap() {
            out.push(token);
        }
        out
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            tokens(b"<< /Type /Catalog /Pages 2 0 R >> % comment\n[1 -2.5 .5 true]"),
            vec![
                Token::DictStart,
                Token::Name("Type".into()),
                Token::Name("Catalog".into()),
                Token::Name("Pages".into()),
                Token::Integer(2),
                Token::Integer(0),
                Token::Keyword("R".into()),
                Token::DictEnd,
                Token::ArrayStart,
                Token::Integer(1),
                Token::Real(-2.5),
                Token::Real(0.5),
                Token::Keyword("true".into()),
                Token::ArrayEnd,
            ]
        );
    }

    #[test]
    fn test_literal_string_escapes() {
        let t = tokens(b"(a\\(b\\)\\\\ \\101\\7x (nested) line\\\ncont\r\nend)");
        assert_eq!(
            t,
            vec![Token::String(PdfString::literal(
                b"a(b)\\ A\x07x (nested) linecont\nend".to_vec()
            ))]
        );
    }

    #[test]
    fn test_hex_string_tokens() {
        assert_eq!(
            tokens(b"<48 65 6C6C 6F> <ABC>"),
            vec![
                Token::String(PdfString::hexadecimal(b"Hello".to_vec())),
                Token::String(PdfString::hexadecimal(vec![0xAB, 0xC0])),
            ]
        );
    }

    #[test]
    fn test_escaped_name_token() {
        assert_eq!(tokens(b"/A#20B"), vec![Token::Name("A B".into())]);
    }

    #[test]
    fn test_integer_overflow_becomes_real() {
        assert_eq!(
            tokens(b"99999999999999999999"),
            vec![Token::Real(99999999999999999999.0)]
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Lexer::new(b"(unterminated").next_token(),
            Err(PDFError::UnexpectedEof(_))
        ));
        assert!(matches!(
            Lexer::new(b")").next_token(),
            Err(PDFError::InvalidToken { offset: 0, .. })
        ));
        assert!(matches!(
            Lexer::new(b"--").next_token(),
            Err(PDFError::InvalidToken { .. })
        ));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut lexer = Lexer::new(b"12 obj");
        assert_eq!(lexer.peek_token().unwrap(), Some(Token::Integer(12)));
        assert_eq!(lexer.next_token().unwrap(), Some(Token::Integer(12)));
        lexer.expect_keyword("obj").unwrap();
        assert_eq!(lexer.next_token().unwrap(), None);
    }
}

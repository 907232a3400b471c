//! PDF document parser implementation

use log::{debug, trace, warn};

use crate::error::{PDFError, PDFResult};
use super::lexer::{Lexer, Token};
use super::{Dictionary, Document, Object, ObjectId, Stream, XRefTable};

const PDF_MAGIC: &[u8] = b"%PDF-";
const PDF_EOF_MARKER: &[u8] = b"%%EOF";
const STARTXREF_MARKER: &[u8] = b"startxref";
const ENDSTREAM_MARKER: &[u8] = b"endstream";

/// The header must appear within this many leading bytes
const HEADER_SEARCH_LIMIT: usize = 1024;

/// Array/dictionary nesting limit
const MAX_DEPTH: usize = 100;

/// Resolves an indirect `/Length` to its integer value
pub type LengthResolver<'r> = dyn Fn(ObjectId) -> Option<usize> + 'r;

/// PDF document parser
#[derive(Debug, Default)]
pub struct PDFParser;

impl PDFParser {
    /// Create new parser instance
    pub fn new() -> Self {
        Self
    }

    /// Parse document structure: header, cross-reference chain and trailer
    ///
    /// Objects are not read here. The returned document materializes each
    /// one on first access.
    pub fn parse(&self, data: Vec<u8>) -> PDFResult<Document> {
        debug!("Parsing PDF document ({} bytes)", data.len());

        let version = parse_header(&data)?;
        trace!("PDF version {}", version);

        let startxref = find_startxref(&data)?;
        if find_last(&data, PDF_EOF_MARKER).is_none() {
            warn!("Missing %%EOF marker");
        }

        let (xref, trailer) = XRefTable::parse_chain(&data, startxref)?;
        debug!("Cross-reference chain lists {} objects", xref.in_use().count());

        Document::from_parsed(version, data, xref, &trailer)
    }
}

/// Locate `%PDF-x.y` and return the version
fn parse_header(data: &[u8]) -> PDFResult<String> {
    let window = &data[..data.len().min(HEADER_SEARCH_LIMIT)];
    let start = window
        .windows(PDF_MAGIC.len())
        .position(|w| w == PDF_MAGIC)
        .ok_or_else(|| PDFError::malformed("Missing %PDF- header"))?;

    let version: String = data[start + PDF_MAGIC.len()..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .map(|&b| b as char)
        .collect();

    let valid = matches!(version.split_once('.'), Some((major, minor))
        if !major.is_empty() && !minor.is_empty() && !minor.contains('.'));
    if !valid {
        return Err(PDFError::malformed(format!("Invalid PDF version '{}'", version)));
    }

    Ok(version)
}

/// Offset named by the last `startxref`
fn find_startxref(data: &[u8]) -> PDFResult<usize> {
    let marker = find_last(data, STARTXREF_MARKER)
        .ok_or_else(|| PDFError::XRefError("startxref not found".to_string()))?;

    let mut lexer = Lexer::at(data, marker + STARTXREF_MARKER.len());
    let offset = lexer.expect_unsigned("startxref offset")?;
    usize::try_from(offset).map_err(|_| PDFError::XRefError("startxref offset out of range".to_string()))
}

fn find_last(data: &[u8], needle: &[u8]) -> Option<usize> {
    data.windows(needle.len()).rposition(|w| w == needle)
}

fn find_from(data: &[u8], start: usize, needle: &[u8]) -> Option<usize> {
    data.get(start..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| start + i)
}

/// Parse one direct object
///
/// A Reference is recognised by lookahead: an unsigned integer followed by
/// a generation and the `R` keyword. Otherwise the position is restored and
/// the integer stands alone.
pub fn parse_object(lexer: &mut Lexer<'_>, depth: usize) -> PDFResult<Object> {
    if depth > MAX_DEPTH {
        return Err(PDFError::InvalidToken {
            offset: lexer.position(),
            message: format!("objects nested deeper than {}", MAX_DEPTH),
        });
    }

    let offset = lexer.position();
    let token = lexer.expect_token("object")?;
    match token {
        Token::Integer(number) => {
            if let Some(id) = try_reference(lexer, number)? {
                return Ok(Object::Reference(id));
            }
            Ok(Object::integer(number))
        }
        Token::Real(r) => Ok(Object::real(r)),
        Token::Name(n) => Ok(Object::Name(n)),
        Token::String(s) => Ok(Object::String(s)),
        Token::ArrayStart => parse_array_body(lexer, depth + 1).map(Object::Array),
        Token::DictStart => parse_dictionary_body(lexer, depth + 1).map(Object::Dictionary),
        Token::Keyword(ref k) if k == "true" => Ok(Object::Boolean(true)),
        Token::Keyword(ref k) if k == "false" => Ok(Object::Boolean(false)),
        Token::Keyword(ref k) if k == "null" => Ok(Object::Null),
        other => Err(PDFError::InvalidToken {
            offset,
            message: format!("{:?} cannot start an object", other),
        }),
    }
}

fn try_reference(lexer: &mut Lexer<'_>, number: i64) -> PDFResult<Option<ObjectId>> {
    let number = match u32::try_from(number) {
        Ok(n) => n,
        Err(_) => return Ok(None),
    };

    let saved = lexer.position();
    if let Ok(Some(Token::Integer(generation))) = lexer.next_token() {
        if let Ok(generation) = u16::try_from(generation) {
            if let Ok(Some(token)) = lexer.next_token() {
                if token.is_keyword("R") {
                    return Ok(Some(ObjectId::new(number, generation)));
                }
            }
        }
    }

    lexer.set_position(saved);
    Ok(None)
}

fn parse_array_body(lexer: &mut Lexer<'_>, depth: usize) -> PDFResult<Vec<Object>> {
    let mut items = Vec::new();
    loop {
        match lexer.peek_token()? {
            Some(Token::ArrayEnd) => {
                lexer.next_token()?;
                return Ok(items);
            }
            Some(_) => items.push(parse_object(lexer, depth)?),
            None => return Err(PDFError::UnexpectedEof("array")),
        }
    }
}

/// Parse dictionary entries up to and including `>>`; the opening `<<` is
/// already consumed
pub(crate) fn parse_dictionary_body(lexer: &mut Lexer<'_>, depth: usize) -> PDFResult<Dictionary> {
    let mut dict = Dictionary::new();
    loop {
        let offset = lexer.position();
        match lexer.expect_token("dictionary")? {
            Token::DictEnd => return Ok(dict),
            Token::Name(key) => {
                let value = parse_object(lexer, depth)?;
                dict.set(key, value);
            }
            other => {
                return Err(PDFError::InvalidToken {
                    offset,
                    message: format!("dictionary key must be a name, found {:?}", other),
                })
            }
        }
    }
}

/// Parse an object and, for a dictionary followed by `stream`, its content
fn parse_object_or_stream(
    lexer: &mut Lexer<'_>,
    resolve_length: &LengthResolver<'_>,
) -> PDFResult<Object> {
    match parse_object(lexer, 0)? {
        Object::Dictionary(dict) => {
            let saved = lexer.position();
            match lexer.next_token() {
                Ok(Some(ref token)) if token.is_keyword("stream") => {
                    read_stream(lexer, dict, resolve_length).map(Object::Stream)
                }
                _ => {
                    lexer.set_position(saved);
                    Ok(Object::Dictionary(dict))
                }
            }
        }
        other => Ok(other),
    }
}

/// Read stream content following the `stream` keyword
///
/// `/Length` is trusted only when `endstream` sits right after the counted
/// bytes; otherwise the content runs to the next `endstream`.
fn read_stream(
    lexer: &mut Lexer<'_>,
    dict: Dictionary,
    resolve_length: &LengthResolver<'_>,
) -> PDFResult<Stream> {
    let data = lexer.data();
    let mut start = lexer.position();
    if data.get(start) == Some(&b'\r') {
        start += 1;
    }
    if data.get(start) == Some(&b'\n') {
        start += 1;
    }

    let declared = match dict.get("Length") {
        Some(Object::Reference(id)) => resolve_length(*id),
        Some(length) => length.as_i64().and_then(|l| usize::try_from(l).ok()),
        None => None,
    };

    let checked = declared.and_then(|length| {
        let end = start.checked_add(length)?;
        let mut after = Lexer::at(data, end);
        after.skip_whitespace();
        data.get(after.position()..)?
            .starts_with(ENDSTREAM_MARKER)
            .then_some((end, after.position()))
    });

    let (end, marker) = match checked {
        Some(found) => found,
        None => {
            let marker = find_from(data, start, ENDSTREAM_MARKER)
                .ok_or(PDFError::UnexpectedEof("stream data"))?;
            let mut end = marker;
            if end > start && data[end - 1] == b'\n' {
                end -= 1;
            }
            if end > start && data[end - 1] == b'\r' {
                end -= 1;
            }
            warn!(
                "Stream /Length {:?} unusable at offset {}, repaired to {}",
                declared,
                start,
                end - start
            );
            (end, marker)
        }
    };

    lexer.set_position(marker + ENDSTREAM_MARKER.len());
    Ok(Stream::new(dict, data[start..end].to_vec()))
}

/// Parse the indirect object `n g obj ... endobj` at `offset`
pub fn parse_indirect_object(
    data: &[u8],
    offset: usize,
    resolve_length: &LengthResolver<'_>,
) -> PDFResult<(ObjectId, Object)> {
    let mut lexer = Lexer::at(data, offset);

    let number = lexer.expect_unsigned("object number")?;
    let generation = lexer.expect_unsigned("generation number")?;
    let id = match (u32::try_from(number), u16::try_from(generation)) {
        (Ok(n), Ok(g)) => ObjectId::new(n, g),
        _ => {
            return Err(PDFError::InvalidToken {
                offset,
                message: format!("object identity {} {} out of range", number, generation),
            })
        }
    };
    lexer.expect_keyword("obj")?;

    let object = parse_object_or_stream(&mut lexer, resolve_length)?;

    match lexer.peek_token() {
        Ok(Some(ref token)) if token.is_keyword("endobj") => {}
        _ => warn!("Object {} missing endobj", id),
    }

    trace!("Parsed object {} ({})", id, object.type_name());
    Ok((id, object))
}

/// Parse a single object from bytes, including a trailing stream body
pub fn parse_object_bytes(data: &[u8]) -> PDFResult<Object> {
    let mut lexer = Lexer::new(data);
    parse_object_or_stream(&mut lexer, &|_| None)
}

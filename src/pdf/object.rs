//! PDF object types and their byte-level serialization

use std::borrow::{Borrow, Cow};
use std::fmt;
use log::warn;
use crate::error::{PDFError, PDFResult};
use super::{Dictionary, Stream};

/// Indirect object identity: object number plus generation number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    number: u32,
    generation: u16,
}

impl ObjectId {
    /// Create new object identity
    pub const fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }

    /// Object number
    pub const fn number(&self) -> u32 {
        self.number
    }

    /// Generation number
    pub const fn generation(&self) -> u16 {
        self.generation
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

/// PDF numeric value
///
/// Integers and reals compare by numeric value, so `1` and `1.0` are equal:
/// the serialized form of a whole real is indistinguishable from an integer.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Integer(i64),
    Real(f64),
}

impl Number {
    /// Value as integer, truncating reals
    pub fn as_i64(&self) -> i64 {
        match *self {
            Number::Integer(i) => i,
            Number::Real(r) => r as i64,
        }
    }

    /// Value as real
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Integer(i) => i as f64,
            Number::Real(r) => r,
        }
    }

    /// Write number in PDF syntax
    pub fn write_to(&self, output: &mut Vec<u8>) {
        match *self {
            Number::Integer(i) => output.extend_from_slice(i.to_string().as_bytes()),
            Number::Real(r) => output.extend_from_slice(format_real(r).as_bytes()),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (*self, *other) {
            (Number::Integer(a), Number::Integer(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }
}

/// Shortest decimal that reads back as the same value
///
/// `Display` for `f64` never switches to exponent notation, which PDF lacks.
fn format_real(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    value.to_string()
}

/// Preferred output syntax for a string object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringFormat {
    /// `(...)` with escapes
    #[default]
    Literal,
    /// `<...>` hexadecimal digits
    Hexadecimal,
}

/// PDF string: raw bytes plus the syntax they were read from or should be written in
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PdfString {
    bytes: Vec<u8>,
    format: StringFormat,
}

impl PdfString {
    /// Create literal string
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            format: StringFormat::Literal,
        }
    }

    /// Create hexadecimal string
    pub fn hexadecimal(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            format: StringFormat::Hexadecimal,
        }
    }

    /// Build a string from hex digits, ignoring whitespace
    ///
    /// An odd digit count is completed with a trailing `0`, as readers have
    /// always done for malformed files. Any other non-hex byte is an error.
    pub fn from_hex_digits(digits: &[u8]) -> PDFResult<Self> {
        let mut clean: Vec<u8> = Vec::with_capacity(digits.len() + 1);
        for &byte in digits {
            if byte.is_ascii_hexdigit() {
                clean.push(byte);
            } else if !is_whitespace(byte) {
                return Err(PDFError::malformed(format!(
                    "Invalid hex digit 0x{:02X} in hex string",
                    byte
                )));
            }
        }

        if clean.len() % 2 != 0 {
            warn!("Odd-length hex string padded with trailing zero");
            clean.push(b'0');
        }

        let bytes = hex::decode(&clean)
            .map_err(|e| PDFError::malformed(format!("Invalid hex string: {}", e)))?;
        Ok(Self::hexadecimal(bytes))
    }

    /// String bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take ownership of the bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Replace the bytes, keeping the output format
    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
    }

    /// Output syntax
    pub fn format(&self) -> StringFormat {
        self.format
    }

    /// Change output syntax
    pub fn set_format(&mut self, format: StringFormat) {
        self.format = format;
    }

    /// Write string in its preferred syntax
    pub fn write_to(&self, output: &mut Vec<u8>) {
        match self.format {
            StringFormat::Literal => {
                output.push(b'(');
                for &byte in &self.bytes {
                    match byte {
                        b'(' | b')' | b'\\' => {
                            output.push(b'\\');
                            output.push(byte);
                        }
                        0x00..=0x1F | 0x7F => {
                            output.extend_from_slice(format!("\\{:03o}", byte).as_bytes());
                        }
                        _ => output.push(byte),
                    }
                }
                output.push(b')');
            }
            StringFormat::Hexadecimal => {
                output.push(b'<');
                output.extend_from_slice(hex::encode_upper(&self.bytes).as_bytes());
                output.push(b'>');
            }
        }
    }
}

/// PDF name, stored decoded: no leading slash, `#XX` escapes resolved
///
/// Names are byte sequences. Most are ASCII, but `/F#E91` is as valid as
/// `/F1`, so the bytes are kept exactly as read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Name(Vec<u8>);

impl Name {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Name(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Name text, when the bytes are UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl Borrow<[u8]> for Name {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Name {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Name(name.as_bytes().to_vec())
    }
}

impl From<String> for Name {
    fn from(name: String) -> Self {
        Name(name.into_bytes())
    }
}

impl From<&String> for Name {
    fn from(name: &String) -> Self {
        Name::from(name.as_str())
    }
}

impl From<&[u8]> for Name {
    fn from(bytes: &[u8]) -> Self {
        Name(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Name {
    fn from(bytes: Vec<u8>) -> Self {
        Name(bytes)
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

/// PDF object types
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Object {
    /// Null object
    #[default]
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer or real
    Number(Number),
    /// Name object
    Name(Name),
    /// String value (literal or hexadecimal)
    String(PdfString),
    /// Indirect reference
    Reference(ObjectId),
    /// Array object
    Array(Vec<Object>),
    /// Dictionary object
    Dictionary(Dictionary),
    /// Stream object
    Stream(Stream),
}

impl Object {
    /// Integer object
    pub fn integer(value: i64) -> Self {
        Object::Number(Number::Integer(value))
    }

    /// Real object
    ///
    /// `value` must be finite; use `Object::try_from` for unchecked input.
    pub fn real(value: f64) -> Self {
        debug_assert!(value.is_finite(), "PDF reals must be finite, got {}", value);
        Object::Number(Number::Real(value))
    }

    /// Name object
    pub fn name(name: impl Into<Name>) -> Self {
        Object::Name(name.into())
    }

    /// Literal string object
    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Object::String(PdfString::literal(bytes))
    }

    /// Hexadecimal string object
    pub fn hex_string(bytes: impl Into<Vec<u8>>) -> Self {
        Object::String(PdfString::hexadecimal(bytes))
    }

    /// Reference object
    pub fn reference(number: u32, generation: u16) -> Self {
        Object::Reference(ObjectId::new(number, generation))
    }

    /// Name of the variant, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "null",
            Object::Boolean(_) => "boolean",
            Object::Number(Number::Integer(_)) => "integer",
            Object::Number(Number::Real(_)) => "real",
            Object::Name(_) => "name",
            Object::String(_) => "string",
            Object::Reference(_) => "reference",
            Object::Array(_) => "array",
            Object::Dictionary(_) => "dictionary",
            Object::Stream(_) => "stream",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Object::Number(n) => Some(n.as_i64()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Object::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    /// Name text; `None` also for a name that is not UTF-8
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(n) => n.as_str(),
            _ => None,
        }
    }

    pub fn as_name_bytes(&self) -> Option<&[u8]> {
        match self {
            Object::Name(n) => Some(n.as_bytes()),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// String bytes, if this is a string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.as_string().map(PdfString::as_bytes)
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Object::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Object>> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Dictionary of a dictionary or stream object
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(s.dict()),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(s.dict_mut()),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_stream_mut(&mut self) -> Option<&mut Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// Dictionary or a typed error naming what was found instead
    pub fn expect_dict(&self) -> PDFResult<&Dictionary> {
        self.as_dict().ok_or(PDFError::InvalidObjectType {
            expected: "dictionary",
            found: self.type_name(),
        })
    }

    /// Write object in PDF syntax
    pub fn write_to(&self, output: &mut Vec<u8>) {
        match self {
            Object::Null => output.extend_from_slice(b"null"),
            Object::Boolean(b) => output.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Number(n) => n.write_to(output),
            Object::Name(n) => output.extend_from_slice(&encode_name(n)),
            Object::String(s) => s.write_to(output),
            Object::Reference(id) => output.extend_from_slice(id.to_string().as_bytes()),
            Object::Array(items) => {
                output.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        output.push(b' ');
                    }
                    item.write_to(output);
                }
                output.push(b']');
            }
            Object::Dictionary(d) => d.write_to(output),
            Object::Stream(s) => s.write_to(output),
        }
    }

    /// Serialize into a fresh buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut output = Vec::new();
        self.write_to(&mut output);
        output
    }
}

impl From<bool> for Object {
    fn from(b: bool) -> Self {
        Object::Boolean(b)
    }
}

impl From<i32> for Object {
    fn from(i: i32) -> Self {
        Object::integer(i as i64)
    }
}

impl From<i64> for Object {
    fn from(i: i64) -> Self {
        Object::integer(i)
    }
}

impl From<u32> for Object {
    fn from(i: u32) -> Self {
        Object::integer(i as i64)
    }
}

impl From<Number> for Object {
    fn from(n: Number) -> Self {
        Object::Number(n)
    }
}

impl From<PdfString> for Object {
    fn from(s: PdfString) -> Self {
        Object::String(s)
    }
}

impl From<ObjectId> for Object {
    fn from(id: ObjectId) -> Self {
        Object::Reference(id)
    }
}

impl From<Vec<Object>> for Object {
    fn from(items: Vec<Object>) -> Self {
        Object::Array(items)
    }
}

impl From<Dictionary> for Object {
    fn from(d: Dictionary) -> Self {
        Object::Dictionary(d)
    }
}

impl From<Stream> for Object {
    fn from(s: Stream) -> Self {
        Object::Stream(s)
    }
}

impl From<Name> for Object {
    fn from(n: Name) -> Self {
        Object::Name(n)
    }
}

impl TryFrom<f64> for Object {
    type Error = PDFError;

    fn try_from(value: f64) -> PDFResult<Self> {
        if value.is_finite() {
            Ok(Object::real(value))
        } else {
            Err(PDFError::Conversion {
                from: "f64",
                reason: format!("{} has no PDF number representation", value),
            })
        }
    }
}

impl TryFrom<u64> for Object {
    type Error = PDFError;

    fn try_from(value: u64) -> PDFResult<Self> {
        i64::try_from(value)
            .map(Object::integer)
            .map_err(|_| PDFError::Conversion {
                from: "u64",
                reason: format!("{} exceeds the PDF integer range", value),
            })
    }
}

impl TryFrom<usize> for Object {
    type Error = PDFError;

    fn try_from(value: usize) -> PDFResult<Self> {
        Object::try_from(value as u64)
    }
}

/// PDF whitespace characters
pub(crate) fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

/// PDF delimiter characters
pub(crate) fn is_delimiter(byte: u8) -> bool {
    matches!(byte, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Encode a name with its leading slash, escaping as `#XX` every byte
/// outside `!`..`~`, every delimiter, and `#` itself
pub fn encode_name(name: impl AsRef<[u8]>) -> Vec<u8> {
    let name = name.as_ref();
    let mut output = Vec::with_capacity(name.len() + 1);
    output.push(b'/');
    for &byte in name {
        if byte < b'!' || byte > b'~' || byte == b'#' || is_delimiter(byte) {
            output.extend_from_slice(format!("#{:02X}", byte).as_bytes());
        } else {
            output.push(byte);
        }
    }
    output
}

/// Decode a name, with or without its leading slash, reversing `#XX`
///
/// A `#` not followed by two hex digits is kept as-is.
pub fn decode_name(raw: &[u8]) -> Name {
    let raw = raw.strip_prefix(b"/").unwrap_or(raw);
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            if let Some(byte) = hex_pair(raw[i + 1], raw[i + 2]) {
                bytes.push(byte);
                i += 3;
                continue;
            }
        }
        bytes.push(raw[i]);
        i += 1;
    }
    Name(bytes)
}

fn hex_pair(high: u8, low: u8) -> Option<u8> {
    let high = (high as char).to_digit(16)?;
    let low = (low as char).to_digit(16)?;
    Some((high * 16 + low) as u8)
}

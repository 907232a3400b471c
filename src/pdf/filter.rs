//! Stream filters
//!
//! Only the general-purpose filters are implemented; image codecs pass
//! through untouched because nothing here needs their decoded form.

use std::fmt;
use std::io::{Read, Write};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::{trace, warn};

use crate::error::{PDFError, PDFResult};
use crate::pdf::Dictionary;

/// PDF stream filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    ASCII85Decode,
    ASCIIHexDecode,
    FlateDecode,
    RunLengthDecode,
}

impl Filter {
    /// Create filter from name, accepting the abbreviated inline-image forms
    pub fn from_name(name: &str) -> PDFResult<Self> {
        match name {
            "ASCII85Decode" | "A85" => Ok(Filter::ASCII85Decode),
            "ASCIIHexDecode" | "AHx" => Ok(Filter::ASCIIHexDecode),
            "FlateDecode" | "Fl" => Ok(Filter::FlateDecode),
            "RunLengthDecode" | "RL" => Ok(Filter::RunLengthDecode),
            _ => Err(PDFError::UnsupportedFilter(name.to_string())),
        }
    }

    /// Filter name as written in `/Filter`
    pub fn name(&self) -> &'static str {
        match self {
            Filter::ASCII85Decode => "ASCII85Decode",
            Filter::ASCIIHexDecode => "ASCIIHexDecode",
            Filter::FlateDecode => "FlateDecode",
            Filter::RunLengthDecode => "RunLengthDecode",
        }
    }

    /// Decode data using this filter
    pub fn decode(&self, data: &[u8], params: Option<&Dictionary>) -> PDFResult<Vec<u8>> {
        if let Some(predictor) = params.and_then(|p| p.get_integer("Predictor")) {
            if predictor > 1 {
                return Err(PDFError::UnsupportedFilter(format!(
                    "{} with predictor {}",
                    self.name(),
                    predictor
                )));
            }
        }

        trace!("Decoding {} bytes with {}", data.len(), self);
        match self {
            Filter::ASCII85Decode => decode_ascii85(data),
            Filter::ASCIIHexDecode => decode_ascii_hex(data),
            Filter::FlateDecode => decode_flate(data),
            Filter::RunLengthDecode => decode_run_length(data),
        }
    }

    /// Encode data using this filter
    pub fn encode(&self, data: &[u8]) -> PDFResult<Vec<u8>> {
        trace!("Encoding {} bytes with {}", data.len(), self);
        match self {
            Filter::ASCII85Decode => Ok(encode_ascii85(data)),
            Filter::ASCIIHexDecode => Ok(encode_ascii_hex(data)),
            Filter::FlateDecode => encode_flate(data),
            Filter::RunLengthDecode => Ok(encode_run_length(data)),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn decode_ascii85(data: &[u8]) -> PDFResult<Vec<u8>> {
    let data = data.strip_prefix(b"<~").unwrap_or(data);
    let mut output = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut count = 0;

    let mut iter = data.iter().copied().peekable();
    while let Some(byte) = iter.next() {
        match byte {
            b'~' => {
                if iter.peek() != Some(&b'>') {
                    warn!("ASCII85 end marker without closing '>'");
                }
                break;
            }
            b'z' if count == 0 => output.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[count] = byte - b'!';
                count += 1;
                if count == 5 {
                    output.extend_from_slice(&ascii85_group_value(&group)?.to_be_bytes());
                    count = 0;
                }
            }
            b if super::object::is_whitespace(b) => continue,
            _ => {
                return Err(PDFError::malformed(format!(
                    "Invalid ASCII85 character: 0x{:02X}",
                    byte
                )))
            }
        }
    }

    match count {
        0 => {}
        1 => return Err(PDFError::malformed("ASCII85 data ends with a single digit")),
        _ => {
            // Pad the final partial group with 'u' and keep count-1 bytes
            for digit in group.iter_mut().skip(count) {
                *digit = b'u' - b'!';
            }
            let bytes = ascii85_group_value(&group)?.to_be_bytes();
            output.extend_from_slice(&bytes[..count - 1]);
        }
    }

    Ok(output)
}

fn ascii85_group_value(group: &[u8; 5]) -> PDFResult<u32> {
    let value = group
        .iter()
        .fold(0u64, |acc, &digit| acc * 85 + digit as u64);
    u32::try_from(value).map_err(|_| PDFError::malformed("ASCII85 group out of range"))
}

fn encode_ascii85(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len() * 5 / 4 + 2);
    let mut buffer = [0u8; 4];

    for chunk in data.chunks(4) {
        buffer.fill(0);
        buffer[..chunk.len()].copy_from_slice(chunk);
        let value = u32::from_be_bytes(buffer);

        if value == 0 && chunk.len() == 4 {
            output.push(b'z');
            continue;
        }

        let mut digits = [0u8; 5];
        let mut temp = value;
        for digit in digits.iter_mut().rev() {
            *digit = (temp % 85) as u8 + b'!';
            temp /= 85;
        }
        output.extend_from_slice(&digits[..chunk.len() + 1]);
    }

    output.extend_from_slice(b"~>");
    output
}

fn decode_ascii_hex(data: &[u8]) -> PDFResult<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;

    for &byte in data {
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'A'..=b'F' => byte - b'A' + 10,
            b'a'..=b'f' => byte - b'a' + 10,
            b'>' => break,
            b if super::object::is_whitespace(b) => continue,
            _ => {
                return Err(PDFError::malformed(format!(
                    "Invalid hex character: 0x{:02X}",
                    byte
                )))
            }
        };

        match high.take() {
            Some(h) => output.push(h << 4 | digit),
            None => high = Some(digit),
        }
    }

    // A trailing odd digit is treated as followed by 0
    if let Some(h) = high {
        output.push(h << 4);
    }

    Ok(output)
}

fn encode_ascii_hex(data: &[u8]) -> Vec<u8> {
    let mut output = hex::encode_upper(data).into_bytes();
    output.push(b'>');
    output
}

fn decode_run_length(data: &[u8]) -> PDFResult<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() * 2);
    let mut i = 0;

    while i < data.len() {
        let length = data[i];
        i += 1;

        match length {
            128 => break,
            0..=127 => {
                let count = length as usize + 1;
                let literal = data
                    .get(i..i + count)
                    .ok_or_else(|| PDFError::malformed("Truncated run length literal"))?;
                output.extend_from_slice(literal);
                i += count;
            }
            _ => {
                let byte = *data
                    .get(i)
                    .ok_or_else(|| PDFError::malformed("Truncated run length repeat"))?;
                let count = 257 - length as usize;
                output.extend(std::iter::repeat(byte).take(count));
                i += 1;
            }
        }
    }

    Ok(output)
}

fn encode_run_length(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len() + data.len() / 128 + 2);
    let mut i = 0;

    while i < data.len() {
        let mut run = 1;
        while i + run < data.len() && data[i + run] == data[i] && run < 128 {
            run += 1;
        }

        if run >= 2 {
            output.push((257 - run) as u8);
            output.push(data[i]);
            i += run;
            continue;
        }

        // Literal until the next repeated pair
        let start = i;
        while i < data.len()
            && i - start < 128
            && !(i + 1 < data.len() && data[i] == data[i + 1])
        {
            i += 1;
        }
        output.push((i - start - 1) as u8);
        output.extend_from_slice(&data[start..i]);
    }

    output.push(128);
    output
}

fn decode_flate(data: &[u8]) -> PDFResult<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() * 2);
    ZlibDecoder::new(data)
        .read_to_end(&mut output)
        .map_err(|e| PDFError::CompressionError(e.to_string()))?;
    Ok(output)
}

fn encode_flate(data: &[u8]) -> PDFResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| PDFError::CompressionError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| PDFError::CompressionError(e.to_string()))
}

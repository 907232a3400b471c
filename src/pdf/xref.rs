//! PDF cross-reference table implementation

use std::collections::{BTreeMap, HashSet};
use log::{debug, trace, warn};
use crate::error::{PDFError, PDFResult};
use super::lexer::{Lexer, Token};
use super::parser::parse_dictionary_body;
use super::Dictionary;

/// Generation number of the free-list head
const FREE_HEAD_GENERATION: u16 = 65535;

/// One cross-reference entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XRefEntry {
    /// Byte offset for in-use entries, next free object number for free ones
    pub offset: usize,
    pub generation: u16,
    pub in_use: bool,
}

/// PDF cross-reference table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XRefTable {
    entries: BTreeMap<u32, XRefEntry>,
}

impl XRefTable {
    /// Create new xref table
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Look up an entry
    pub fn get(&self, number: u32) -> Option<&XRefEntry> {
        self.entries.get(&number)
    }

    /// Record an in-use object
    pub fn insert_in_use(&mut self, number: u32, offset: usize, generation: u16) {
        self.entries.insert(
            number,
            XRefEntry {
                offset,
                generation,
                in_use: true,
            },
        );
    }

    /// In-use entries in ascending object number order
    pub fn in_use(&self) -> impl Iterator<Item = (u32, &XRefEntry)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.in_use)
            .map(|(&n, e)| (n, e))
    }

    /// Number of entries, free ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the section chain starting at `startxref`
    ///
    /// Sections are read newest first and `/Prev` is followed; an object
    /// number keeps the entry from the newest section that lists it. The
    /// returned trailer is the newest one, with keys it lacks filled in from
    /// older trailers.
    pub fn parse_chain(data: &[u8], start: usize) -> PDFResult<(Self, Dictionary)> {
        let mut table = XRefTable::new();
        let mut trailer = Dictionary::new();
        let mut visited = HashSet::new();
        let mut next = Some(start);

        while let Some(offset) = next.take() {
            if !visited.insert(offset) {
                warn!("Cycle in /Prev chain at offset {}, stopping", offset);
                break;
            }

            debug!("Reading xref section at offset {}", offset);
            let section_trailer = table.parse_section(data, offset)?;

            next = match section_trailer.get("Prev") {
                Some(prev) => {
                    let prev = prev.as_i64().filter(|p| *p >= 0).ok_or_else(|| {
                        PDFError::XRefError("/Prev is not a non-negative integer".to_string())
                    })?;
                    Some(prev as usize)
                }
                None => None,
            };

            for (key, value) in &section_trailer {
                if key != "Prev" && !trailer.contains_key(key) {
                    trailer.set(key.clone(), value.clone());
                }
            }
        }

        Ok((table, trailer))
    }

    /// Parse one `xref` section plus its trailer, keeping existing entries
    fn parse_section(&mut self, data: &[u8], offset: usize) -> PDFResult<Dictionary> {
        if offset >= data.len() {
            return Err(PDFError::XRefError(format!(
                "xref offset {} past end of file ({} bytes)",
                offset,
                data.len()
            )));
        }

        let mut lexer = Lexer::at(data, offset);
        match lexer.next_token()? {
            Some(Token::Keyword(ref k)) if k == "xref" => {}
            Some(Token::Integer(_)) => {
                return Err(PDFError::XRefError(
                    "cross-reference streams are not supported".to_string(),
                ))
            }
            other => {
                return Err(PDFError::XRefError(format!(
                    "expected 'xref' at offset {}, found {:?}",
                    offset, other
                )))
            }
        }

        loop {
            match lexer.expect_token("xref subsection")? {
                Token::Keyword(ref k) if k == "trailer" => break,
                Token::Integer(first) if first >= 0 => {
                    let count = lexer.expect_unsigned("xref count")?;
                    trace!("xref subsection {} {}", first, count);
                    for i in 0..count {
                        let number = u32::try_from(first as u64 + i).map_err(|_| {
                            PDFError::XRefError("object number out of range".to_string())
                        })?;
                        let entry = Self::parse_entry(&mut lexer)?;
                        self.entries.entry(number).or_insert(entry);
                    }
                }
                token => {
                    return Err(PDFError::XRefError(format!(
                        "unexpected token in xref section: {:?}",
                        token
                    )))
                }
            }
        }

        match lexer.expect_token("trailer dictionary")? {
            Token::DictStart => parse_dictionary_body(&mut lexer, 0),
            token => Err(PDFError::XRefError(format!(
                "trailer is not a dictionary: {:?}",
                token
            ))),
        }
    }

    fn parse_entry(lexer: &mut Lexer<'_>) -> PDFResult<XRefEntry> {
        let offset = lexer.expect_unsigned("xref offset")?;
        let generation = lexer.expect_unsigned("xref generation")?;
        let generation = u16::try_from(generation)
            .map_err(|_| PDFError::XRefError(format!("generation {} out of range", generation)))?;

        let in_use = match lexer.expect_token("xref entry type")? {
            Token::Keyword(ref k) if k == "n" => true,
            Token::Keyword(ref k) if k == "f" => false,
            token => {
                return Err(PDFError::XRefError(format!(
                    "invalid xref entry type {:?}",
                    token
                )))
            }
        };

        Ok(XRefEntry {
            offset: offset as usize,
            generation,
            in_use,
        })
    }

    /// Write a single-subsection table covering `0..=max`
    ///
    /// Numbers without an in-use entry are chained into the free list
    /// headed by object 0.
    pub fn write_to(&self, output: &mut Vec<u8>) {
        let max = self.entries.keys().next_back().copied().unwrap_or(0);
        let free: Vec<u32> = (1..=max)
            .filter(|n| !self.entries.get(n).map_or(false, |e| e.in_use))
            .collect();

        output.extend_from_slice(format!("xref\n0 {}\n", max as u64 + 1).as_bytes());
        let head = free.first().copied().unwrap_or(0);
        write_entry(output, head as usize, FREE_HEAD_GENERATION, false);

        let mut free_iter = free.iter().skip(1);
        for number in 1..=max {
            match self.entries.get(&number) {
                Some(entry) if entry.in_use => {
                    write_entry(output, entry.offset, entry.generation, true)
                }
                _ => {
                    let next_free = free_iter.next().copied().unwrap_or(0);
                    write_entry(output, next_free as usize, 0, false);
                }
            }
        }
    }
}

/// Fixed 20-byte entry, terminated by space and LF
fn write_entry(output: &mut Vec<u8>, offset: usize, generation: u16, in_use: bool) {
    let kind = if in_use { 'n' } else { 'f' };
    output.extend_from_slice(format!("{:010} {:05} {} \n", offset, generation, kind).as_bytes());
}

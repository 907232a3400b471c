//! PDF stream object implementation

use log::{trace, warn};
use crate::error::{PDFError, PDFResult};
use super::{Dictionary, Filter, Object};

/// PDF stream object: a dictionary plus raw (still encoded) content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stream {
    /// Stream dictionary
    dictionary: Dictionary,
    /// Raw stream data, exactly as stored between `stream` and `endstream`
    content: Vec<u8>,
}

impl Stream {
    /// Create new stream object
    pub fn new(dictionary: Dictionary, content: Vec<u8>) -> Self {
        let mut stream = Self {
            dictionary,
            content,
        };
        stream.sync_length();
        stream
    }

    /// Stream dictionary
    pub fn dict(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Mutable stream dictionary
    pub fn dict_mut(&mut self) -> &mut Dictionary {
        &mut self.dictionary
    }

    /// Raw content bytes
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Replace the raw content; `/Length` follows
    pub fn set_content(&mut self, content: Vec<u8>) {
        self.content = content;
        self.sync_length();
    }

    fn sync_length(&mut self) {
        self.dictionary.set("Length", self.content.len() as i64);
    }

    /// Filters listed in `/Filter`, in application order
    pub fn filters(&self) -> PDFResult<Vec<Filter>> {
        match self.dictionary.get("Filter") {
            None | Some(Object::Null) => Ok(Vec::new()),
            Some(Object::Name(name)) => Ok(vec![Filter::from_name(&name.to_string_lossy())?]),
            Some(Object::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Object::Name(name) => Filter::from_name(&name.to_string_lossy()),
                    other => Err(PDFError::invalid_dict_value(
                        "Filter",
                        format!("expected name, found {}", other.type_name()),
                    )),
                })
                .collect(),
            Some(other) => Err(PDFError::invalid_dict_value(
                "Filter",
                format!("expected name or array, found {}", other.type_name()),
            )),
        }
    }

    /// `/DecodeParms` entry matching the filter at `index`
    fn decode_params(&self, index: usize) -> Option<&Dictionary> {
        match self.dictionary.get("DecodeParms") {
            Some(Object::Dictionary(d)) if index == 0 => Some(d),
            Some(Object::Array(items)) => match items.get(index) {
                Some(Object::Dictionary(d)) => Some(d),
                _ => None,
            },
            _ => None,
        }
    }

    /// Content with every filter undone
    pub fn decoded_content(&self) -> PDFResult<Vec<u8>> {
        let filters = self.filters()?;
        trace!("Decoding stream with {} filters", filters.len());

        let mut data = self.content.clone();
        for (index, filter) in filters.iter().enumerate() {
            data = filter.decode(&data, self.decode_params(index))?;
        }
        Ok(data)
    }

    /// Flate-compress content that carries no filter yet
    ///
    /// Returns `false` and leaves the stream alone when it is already filtered.
    pub fn compress(&mut self) -> PDFResult<bool> {
        if self.dictionary.contains_key("Filter") {
            return Ok(false);
        }

        let compressed = Filter::FlateDecode.encode(&self.content)?;
        if compressed.len() >= self.content.len() {
            trace!("Skipping compression, no size gain");
            return Ok(false);
        }

        self.dictionary.set("Filter", Object::name(Filter::FlateDecode.name()));
        self.set_content(compressed);
        Ok(true)
    }

    /// XMP metadata stream (`/Type /Metadata`)
    pub fn is_metadata(&self) -> bool {
        self.dictionary.has_type("Metadata")
    }

    /// Write stream as dictionary, `stream`, content, `endstream`
    ///
    /// `/Length` is always written as the current content length.
    pub fn write_to(&self, output: &mut Vec<u8>) {
        let mut dictionary = self.dictionary.clone();
        if dictionary.get_integer("Length") != Some(self.content.len() as i64) {
            warn!("Stream length out of sync, writing actual length {}", self.content.len());
            dictionary.set("Length", self.content.len() as i64);
        }

        dictionary.write_to(output);
        output.extend_from_slice(b"\nstream\n");
        output.extend_from_slice(&self.content);
        output.extend_from_slice(b"\nendstream");
    }
}

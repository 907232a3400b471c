//! PDF serialization: objects, cross-reference table and trailer

use std::path::Path;
use log::{debug, trace, warn};

use crate::error::{PDFError, PDFResult};
use super::{Document, Object, XRefTable};

/// Comment line with high-bit bytes so transfer tools treat the file as binary
const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

/// Writer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// FlateDecode every stream that has no filter yet
    pub compress_streams: bool,
    /// Emit the binary marker comment after the header
    pub binary_marker: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compress_streams: false,
            binary_marker: true,
        }
    }
}

/// Serializes a `Document` into a complete, non-incremental PDF file
#[derive(Debug, Clone, Default)]
pub struct PDFWriter {
    options: WriterOptions,
}

impl PDFWriter {
    pub fn new(options: WriterOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Serialize the document
    ///
    /// Objects keep their numbers and are written in ascending order. The
    /// output is built completely in memory; nothing is returned on error.
    pub fn write(&self, document: &Document) -> PDFResult<Vec<u8>> {
        debug!("Writing PDF {} with {} objects", document.version(), document.len());

        let compress = self.options.compress_streams && !document.is_encrypted();
        if self.options.compress_streams && !compress {
            warn!("Stream compression skipped, content is encrypted");
        }
        if document.trailer().root.is_none() {
            warn!("Writing document without /Root");
        }

        let mut output = Vec::new();
        output.extend_from_slice(format!("%PDF-{}\n", document.version()).as_bytes());
        if self.options.binary_marker {
            output.extend_from_slice(BINARY_MARKER);
        }

        let mut ids = document.object_ids();
        ids.sort();

        let mut xref = XRefTable::new();
        for id in ids {
            let object = match document.get_object(id) {
                Ok(object) => object,
                Err(PDFError::ObjectNotFound(_)) => {
                    warn!("Skipping unreadable object {}", id);
                    continue;
                }
                Err(e) => return Err(e),
            };

            xref.insert_in_use(id.number(), output.len(), id.generation());
            output.extend_from_slice(format!("{} {} obj\n", id.number(), id.generation()).as_bytes());

            match object {
                Object::Stream(stream) if compress => {
                    let mut stream = stream.clone();
                    stream.compress()?;
                    stream.write_to(&mut output);
                }
                other => other.write_to(&mut output),
            }
            output.extend_from_slice(b"\nendobj\n");
            trace!("Wrote object {}", id);
        }

        let mut trailer = document.trailer().clone();
        if trailer.id.is_empty() {
            // Derived from the body so identical documents get identical IDs
            let digest = md5::compute(&output).0.to_vec();
            trailer.id = vec![digest.clone(), digest];
        }

        let startxref = output.len();
        xref.write_to(&mut output);
        let size = document.max_object_number() + 1;

        output.extend_from_slice(b"trailer\n");
        trailer.to_dict(size).write_to(&mut output);
        output.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", startxref).as_bytes());

        debug!("Wrote {} bytes", output.len());
        Ok(output)
    }

    /// Serialize and write to disk
    ///
    /// The file is written only after serialization has fully succeeded.
    pub fn write_file(&self, document: &Document, path: impl AsRef<Path>) -> PDFResult<()> {
        let path = path.as_ref();
        let bytes = self.write(document)?;
        std::fs::write(path, bytes).map_err(|e| PDFError::io(path, e))
    }
}

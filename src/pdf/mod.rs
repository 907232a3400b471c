//! PDF object model, parsing and serialization

mod object;
mod dict;
mod stream;
mod filter;
mod lexer;
mod parser;
mod xref;
mod document;
mod writer;

pub use object::{decode_name, encode_name, Name, Number, Object, ObjectId, PdfString, StringFormat};
pub use dict::Dictionary;
pub use stream::Stream;
pub use filter::Filter;
pub use lexer::{Lexer, Token};
pub use parser::{parse_indirect_object, parse_object, parse_object_bytes, PDFParser};
pub use xref::{XRefEntry, XRefTable};
pub use document::{Document, Trailer, DEFAULT_VERSION};
pub use writer::{PDFWriter, WriterOptions};

//! Applying a handler to every string and stream of a document

use log::{debug, trace};

use crate::error::PDFResult;
use crate::handlers::EncryptionHandler;
use crate::pdf::{Document, Object, ObjectId, StringFormat};

/// Which way data flows through the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Walks objects and rewrites string and stream bytes with per-object keys
///
/// Keys are derived from the identity of the indirect object that contains
/// the data, so nested strings share their container's key.
pub struct ObjectCrypter<'a> {
    handler: &'a dyn EncryptionHandler,
    file_key: &'a [u8],
    direction: Direction,
}

impl<'a> ObjectCrypter<'a> {
    pub fn new(handler: &'a dyn EncryptionHandler, file_key: &'a [u8], direction: Direction) -> Self {
        Self {
            handler,
            file_key,
            direction,
        }
    }

    fn apply(&self, data: &[u8], id: ObjectId) -> PDFResult<Vec<u8>> {
        match self.direction {
            Direction::Encrypt => self.handler.encrypt(data, self.file_key, id.number(), id.generation()),
            Direction::Decrypt => self.handler.decrypt(data, self.file_key, id.number(), id.generation()),
        }
    }

    /// Rewrite every string and stream body inside `object`
    ///
    /// Metadata streams keep their content when the handler leaves metadata
    /// in the clear. Stream dictionaries are still walked.
    pub fn process_object(&self, object: &mut Object, id: ObjectId) -> PDFResult<()> {
        match object {
            Object::String(string) => {
                // Some writers leave empty strings unencrypted
                if self.direction == Direction::Decrypt && string.as_bytes().is_empty() {
                    return Ok(());
                }
                let bytes = self.apply(string.as_bytes(), id)?;
                string.set_bytes(bytes);
                if self.direction == Direction::Encrypt {
                    string.set_format(StringFormat::Hexadecimal);
                }
            }
            Object::Array(items) => {
                for item in items.iter_mut() {
                    self.process_object(item, id)?;
                }
            }
            Object::Dictionary(dict) => {
                for (_, value) in dict.iter_mut() {
                    self.process_object(value, id)?;
                }
            }
            Object::Stream(stream) => {
                for (_, value) in stream.dict_mut().iter_mut() {
                    self.process_object(value, id)?;
                }
                if stream.is_metadata() && !self.handler.encrypt_metadata() {
                    trace!("Leaving metadata stream {} in the clear", id);
                } else {
                    let content = self.apply(stream.content(), id)?;
                    stream.set_content(content);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Process every indirect object except `skip`
    ///
    /// Returns the number of objects visited. Any handler failure aborts
    /// the walk; the document is then partially rewritten and must be
    /// discarded.
    pub fn process_document(&self, document: &mut Document, skip: Option<ObjectId>) -> PDFResult<usize> {
        let mut ids = document.object_ids();
        ids.sort();

        let mut count = 0;
        for id in ids.into_iter().filter(|id| Some(*id) != skip) {
            let object = document.get_object_mut(id)?;
            self.process_object(object, id)?;
            count += 1;
        }

        debug!("{:?}ed {} objects", self.direction, count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{Aes128Handler, Rc4Handler};
    use crate::pdf::{Dictionary, PdfString, Stream};
    use pretty_assertions::assert_eq;

    fn sample() -> Object {
        let mut info = Dictionary::new();
        info.set("Title", Object::string(b"Quarterly report".to_vec()));
        info.set("Keywords", vec![Object::string(b"a".to_vec()), Object::integer(3)]);
        info.set("Kind", Object::name("Report"));
        Object::Dictionary(info)
    }

    #[test_log::test]
    fn test_strings_round_trip() {
        let handler = Aes128Handler::default();
        let key = [4u8; 16];
        let id = ObjectId::new(5, 0);
        let original = sample();

        let mut object = original.clone();
        ObjectCrypter::new(&handler, &key, Direction::Encrypt)
            .process_object(&mut object, id)
            .unwrap();
        let dict = object.as_dict().unwrap();
        assert_ne!(dict.get_string("Title"), Some(&b"Quarterly report"[..]));
        assert_eq!(dict.get("Title").and_then(Object::as_string).map(PdfString::format), Some(StringFormat::Hexadecimal));
        assert_eq!(dict.get_name("Kind"), Some("Report"));

        ObjectCrypter::new(&handler, &key, Direction::Decrypt)
            .process_object(&mut object, id)
            .unwrap();
        assert_eq!(
            object.as_dict().unwrap().get_string("Title"),
            Some(&b"Quarterly report"[..])
        );
        assert_eq!(
            object.as_dict().unwrap().get_array("Keywords"),
            original.as_dict().unwrap().get_array("Keywords")
        );
    }

    #[test_log::test]
    fn test_metadata_left_clear() {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("Metadata"));
        dict.set("Subtype", Object::name("XML"));
        let xml = b"<x:xmpmeta/>".to_vec();

        let mut clear = Object::Stream(Stream::new(dict.clone(), xml.clone()));
        ObjectCrypter::new(&Aes128Handler::new(false), &[1u8; 16], Direction::Encrypt)
            .process_object(&mut clear, ObjectId::new(9, 0))
            .unwrap();
        assert_eq!(clear.as_stream().unwrap().content(), &xml[..]);

        let mut encrypted = Object::Stream(Stream::new(dict, xml.clone()));
        ObjectCrypter::new(&Aes128Handler::new(true), &[1u8; 16], Direction::Encrypt)
            .process_object(&mut encrypted, ObjectId::new(9, 0))
            .unwrap();
        let stream = encrypted.as_stream().unwrap();
        assert_ne!(stream.content(), &xml[..]);
        assert_eq!(stream.dict().get_integer("Length"), Some(stream.content().len() as i64));
    }

    #[test_log::test]
    fn test_document_skips_encrypt_dictionary() {
        let mut doc = Document::new();
        let first = doc.add_object(Object::string(b"one".to_vec()));
        let skipped = doc.add_object(Object::string(b"two".to_vec()));

        let handler = Rc4Handler::rc4_128();
        let count = ObjectCrypter::new(&handler, &[2u8; 16], Direction::Encrypt)
            .process_document(&mut doc, Some(skipped))
            .unwrap();

        assert_eq!(count, 1);
        assert_ne!(doc.get_object(first).unwrap().as_bytes(), Some(&b"one"[..]));
        assert_eq!(doc.get_object(skipped).unwrap().as_bytes(), Some(&b"two"[..]));
    }

    #[test_log::test]
    fn test_empty_string_kept_on_decrypt() {
        let mut object = Object::string(Vec::new());
        ObjectCrypter::new(&Aes128Handler::default(), &[1u8; 16], Direction::Decrypt)
            .process_object(&mut object, ObjectId::new(1, 0))
            .unwrap();
        assert_eq!(object.as_bytes(), Some(&b""[..]));
    }
}

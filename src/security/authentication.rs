//! Opening encrypted documents
//!
//! The password is checked as the user password first and then as the
//! owner password. On success every string and stream is decrypted and the
//! encryption dictionary is dropped.

use log::{debug, warn};

use crate::error::{PDFError, PDFResult};
use crate::handlers::{handler_for_dictionary, EncryptionDictionary, EncryptionHandler, FileKey, PasswordKind};
use crate::pdf::{Document, ObjectId};
use crate::security::{Direction, ObjectCrypter};

/// Locate and read the encryption dictionary of `document`
pub fn read_encryption_dictionary(document: &Document) -> PDFResult<(ObjectId, EncryptionDictionary)> {
    let id = document
        .trailer()
        .encrypt
        .ok_or_else(|| PDFError::InvalidState("document is not encrypted".to_string()))?;
    let dict = document.get_object(id)?.expect_dict()?;
    Ok((id, EncryptionDictionary::from_dict(dict)?))
}

/// Encrypted document together with its security handler
#[derive(Debug)]
pub struct Decryptor {
    document: Document,
    encrypt_id: ObjectId,
    dictionary: EncryptionDictionary,
    handler: Box<dyn EncryptionHandler>,
}

impl Decryptor {
    /// Fails with `InvalidState` for unencrypted documents and with a crypto
    /// error for handlers this crate does not implement
    pub fn new(document: Document) -> PDFResult<Self> {
        let (encrypt_id, dictionary) = read_encryption_dictionary(&document)?;
        let handler = handler_for_dictionary(&dictionary)?;
        Ok(Self {
            document,
            encrypt_id,
            dictionary,
            handler,
        })
    }

    pub fn dictionary(&self) -> &EncryptionDictionary {
        &self.dictionary
    }

    pub fn handler(&self) -> &dyn EncryptionHandler {
        self.handler.as_ref()
    }

    fn file_id(&self) -> &[u8] {
        match self.document.trailer().file_id() {
            Some(id) => id,
            None => {
                if self.handler.revision() < 6 {
                    warn!("Encrypted document has no /ID, deriving keys with an empty identifier");
                }
                &[]
            }
        }
    }

    /// Check a password without decrypting anything
    pub fn authenticate(&self, password: &str) -> PDFResult<FileKey> {
        self.handler.authenticate(password, &self.dictionary, self.file_id())
    }

    /// Authenticate and decrypt the whole document
    pub fn decrypt(mut self, password: &str) -> PDFResult<(Document, PasswordKind)> {
        let file_key = self.authenticate(password)?;
        self.document.load_all()?;

        let count = ObjectCrypter::new(self.handler.as_ref(), file_key.key(), Direction::Decrypt)
            .process_document(&mut self.document, Some(self.encrypt_id))?;

        self.document.remove_object(self.encrypt_id);
        self.document.trailer_mut().encrypt = None;
        debug!(
            "Decrypted {} objects with {} ({:?} password)",
            count,
            self.handler.algorithm(),
            file_key.kind()
        );
        Ok((self.document, file_key.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::handler_for;
    use crate::pdf::{Dictionary, Object, PDFWriter};
    use crate::security::{Encryptor, Permissions};
    use crate::EncryptionAlgorithm;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn catalog_with_title(title: &[u8]) -> Document {
        let mut doc = Document::new();
        let mut pages = Dictionary::new();
        pages.set("Type", Object::name("Pages"));
        pages.set("Kids", Vec::<Object>::new());
        pages.set("Count", 0);
        let pages = doc.add_object(pages);

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::name("Catalog"));
        catalog.set("Pages", pages);
        let catalog = doc.add_object(catalog);

        let mut info = Dictionary::new();
        info.set("Title", Object::string(title.to_vec()));
        let info = doc.add_object(info);

        doc.trailer_mut().root = Some(catalog);
        doc.trailer_mut().info = Some(info);
        doc
    }

    fn encrypted_bytes(algorithm: EncryptionAlgorithm) -> Vec<u8> {
        Encryptor::new(catalog_with_title(b"Secret title"), handler_for(algorithm, true))
            .unwrap()
            .derive_keys("user", "owner", Permissions::allow_all(), None)
            .unwrap()
            .rewrite()
            .unwrap()
            .serialize(&PDFWriter::default())
            .unwrap()
    }

    #[rstest]
    #[case(EncryptionAlgorithm::RC4_40)]
    #[case(EncryptionAlgorithm::RC4_128)]
    #[case(EncryptionAlgorithm::AES_128)]
    #[case(EncryptionAlgorithm::AES_256)]
    fn test_decrypt_with_either_password(#[case] algorithm: EncryptionAlgorithm) {
        let bytes = encrypted_bytes(algorithm);

        for (password, kind) in [("user", PasswordKind::User), ("owner", PasswordKind::Owner)] {
            let decryptor = Decryptor::new(Document::load(bytes.clone()).unwrap()).unwrap();
            assert_eq!(decryptor.handler().algorithm(), algorithm);

            let (document, opened_as) = decryptor.decrypt(password).unwrap();
            assert_eq!(opened_as, kind);
            assert!(!document.is_encrypted());
            assert_eq!(
                document.info().unwrap().and_then(|info| info.get_string("Title")),
                Some(&b"Secret title"[..])
            );
        }
    }

    #[test_log::test]
    fn test_wrong_password() {
        let bytes = encrypted_bytes(EncryptionAlgorithm::AES_128);
        let decryptor = Decryptor::new(Document::load(bytes).unwrap()).unwrap();
        assert!(decryptor.authenticate("nope").unwrap_err().is_auth_error());
    }

    #[test_log::test]
    fn test_plain_document_rejected() {
        let doc = catalog_with_title(b"plain");
        assert!(matches!(Decryptor::new(doc), Err(PDFError::InvalidState(_))));
    }

    #[test_log::test]
    fn test_encrypt_dictionary_removed() {
        let bytes = encrypted_bytes(EncryptionAlgorithm::RC4_128);
        let document = Document::load(bytes).unwrap();
        let (encrypt_id, _) = read_encryption_dictionary(&document).unwrap();

        let (document, _) = Decryptor::new(document).unwrap().decrypt("user").unwrap();
        assert!(document.get_object(encrypt_id).is_err());
        assert_eq!(document.trailer().encrypt, None);
    }
}

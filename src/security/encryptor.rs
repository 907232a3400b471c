//! Document encryption, one stage per type
//!
//! `Encryptor` (loaded) → `KeyedEncryptor` (keys derived) →
//! `RewrittenEncryptor` (strings and streams encrypted, dictionary added) →
//! bytes. Each stage consumes the previous one, so stages cannot be
//! skipped or repeated.

use log::{debug, info};

use crate::crypto::random_bytes;
use crate::error::{PDFError, PDFResult};
use crate::handlers::{EncryptionContext, EncryptionHandler};
use crate::pdf::{Document, ObjectId, PDFWriter};
use crate::security::{Direction, ObjectCrypter, Permissions};

/// Length of a generated file identifier
pub const FILE_ID_LENGTH: usize = 16;

/// A document accepted for encryption and densely renumbered
#[derive(Debug)]
pub struct Encryptor {
    document: Document,
    handler: Box<dyn EncryptionHandler>,
}

impl Encryptor {
    /// Take ownership of a document
    ///
    /// Fails with `InvalidState` if the document has no catalog or is
    /// already encrypted. Every object is loaded and renumbered from 1 so the
    /// encryption dictionary can take the next free number.
    pub fn new(mut document: Document, handler: Box<dyn EncryptionHandler>) -> PDFResult<Self> {
        if document.is_encrypted() {
            return Err(PDFError::InvalidState("document is already encrypted".to_string()));
        }
        if let Err(e) = document.catalog() {
            return Err(PDFError::InvalidState(format!("document has no usable catalog: {}", e)));
        }

        let mapping = document.renumber_objects()?;
        debug!("Loaded {} objects for {} encryption", mapping.len(), handler.algorithm());
        Ok(Self { document, handler })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn handler(&self) -> &dyn EncryptionHandler {
        self.handler.as_ref()
    }

    /// Derive the file key and dictionary values
    ///
    /// The file identifier is `file_id` if given, else the existing first
    /// `/ID` element if it has 16 bytes, else 16 random bytes.
    pub fn derive_keys(
        mut self,
        user_password: &str,
        owner_password: &str,
        permissions: Permissions,
        file_id: Option<&[u8]>,
    ) -> PDFResult<KeyedEncryptor> {
        let existing = self
            .document
            .trailer()
            .file_id()
            .filter(|id| id.len() == FILE_ID_LENGTH)
            .map(<[u8]>::to_vec);
        let file_id = match (file_id, existing) {
            (Some(id), _) => id.to_vec(),
            (None, Some(id)) => id,
            (None, None) => random_bytes(FILE_ID_LENGTH),
        };

        let trailer = self.document.trailer_mut();
        let second = trailer.id.get(1).cloned().unwrap_or_else(|| file_id.clone());
        trailer.id = vec![file_id.clone(), second];

        let context = self
            .handler
            .create_context(user_password, owner_password, permissions, &file_id)?;
        debug!(
            "Derived {} keys, P = {}, ID = {}",
            self.handler.algorithm(),
            permissions.value(),
            hex::encode(&file_id)
        );

        Ok(KeyedEncryptor {
            document: self.document,
            handler: self.handler,
            context,
        })
    }
}

/// Keys derived, document still in the clear
#[derive(Debug)]
pub struct KeyedEncryptor {
    document: Document,
    handler: Box<dyn EncryptionHandler>,
    context: EncryptionContext,
}

impl KeyedEncryptor {
    pub fn context(&self) -> &EncryptionContext {
        &self.context
    }

    /// Encrypt every string and stream, then append the encryption dictionary
    ///
    /// The PDF version is raised to the algorithm's minimum.
    pub fn rewrite(mut self) -> PDFResult<RewrittenEncryptor> {
        let count = ObjectCrypter::new(self.handler.as_ref(), self.context.file_key(), Direction::Encrypt)
            .process_document(&mut self.document, None)?;

        let dictionary = self.handler.encryption_dictionary(&self.context).to_dict();
        let encrypt_id = self.document.add_object(dictionary);
        self.document.trailer_mut().encrypt = Some(encrypt_id);
        self.document.ensure_min_version(self.handler.min_pdf_version());

        info!(
            "Encrypted {} objects with {}, encryption dictionary {}",
            count,
            self.handler.algorithm(),
            encrypt_id
        );
        Ok(RewrittenEncryptor {
            document: self.document,
            encrypt_id,
        })
    }
}

/// Encrypted document ready to serialize
#[derive(Debug)]
pub struct RewrittenEncryptor {
    document: Document,
    encrypt_id: ObjectId,
}

impl RewrittenEncryptor {
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Identity of the appended encryption dictionary
    pub fn encrypt_id(&self) -> ObjectId {
        self.encrypt_id
    }

    /// Serialize with a fresh xref table and a trailer carrying `/Encrypt`
    pub fn serialize(&self, writer: &PDFWriter) -> PDFResult<Vec<u8>> {
        writer.write(&self.document)
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

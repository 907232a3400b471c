//! RC4 security handler (40 and 128 bit, revisions 2 to 4)

use crate::crypto::{CryptoProvider, Rc4Provider};
use crate::error::{PDFError, PDFResult};
use crate::pdf::ObjectId;
use crate::security::key_derivation::object_key;
use crate::security::Permissions;
use crate::EncryptionAlgorithm;
use super::{
    legacy_authenticate, legacy_context, EncryptionContext, EncryptionDictionary, EncryptionHandler,
    FileKey, StandardKeyDerivation,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rc4Handler {
    version: u8,
    revision: u8,
    key_length: usize,
    encrypt_metadata: bool,
}

impl Rc4Handler {
    /// V 1, R 2, 40-bit key
    pub fn rc4_40() -> Self {
        Self {
            version: 1,
            revision: 2,
            key_length: 5,
            encrypt_metadata: true,
        }
    }

    /// V 2, R 3, 128-bit key
    pub fn rc4_128() -> Self {
        Self {
            version: 2,
            revision: 3,
            key_length: 16,
            encrypt_metadata: true,
        }
    }

    /// Handler for parameters read from an existing dictionary
    ///
    /// Revision 2 always uses a 5-byte key. Revision 4 is RC4 under the
    /// `V2` crypt filter.
    pub fn from_parameters(version: u8, revision: u8, key_length: usize, encrypt_metadata: bool) -> PDFResult<Self> {
        if !(2..=4).contains(&revision) {
            return Err(PDFError::UnsupportedRevision(revision));
        }
        if !(5..=16).contains(&key_length) {
            return Err(PDFError::InvalidKeyLength { expected: 16, found: key_length });
        }
        Ok(Self {
            version,
            revision,
            key_length: if revision == 2 { 5 } else { key_length },
            encrypt_metadata: revision < 4 || encrypt_metadata,
        })
    }
}

impl EncryptionHandler for Rc4Handler {
    fn algorithm(&self) -> EncryptionAlgorithm {
        if self.key_length <= 5 {
            EncryptionAlgorithm::RC4_40
        } else {
            EncryptionAlgorithm::RC4_128
        }
    }

    fn key_length_bits(&self) -> u16 {
        (self.key_length * 8) as u16
    }

    fn version(&self) -> u8 {
        self.version
    }

    fn revision(&self) -> u8 {
        self.revision
    }

    fn encrypt_metadata(&self) -> bool {
        self.encrypt_metadata
    }

    fn crypt_filter_method(&self) -> Option<&'static str> {
        (self.version == 4).then_some("V2")
    }

    fn encrypt(&self, data: &[u8], file_key: &[u8], object_number: u32, generation: u16) -> PDFResult<Vec<u8>> {
        let key = object_key(file_key, ObjectId::new(object_number, generation), false);
        Rc4Provider.encrypt(&key, data)
    }

    fn decrypt(&self, data: &[u8], file_key: &[u8], object_number: u32, generation: u16) -> PDFResult<Vec<u8>> {
        let key = object_key(file_key, ObjectId::new(object_number, generation), false);
        Rc4Provider.decrypt(&key, data)
    }

    fn create_context(
        &self,
        user_password: &str,
        owner_password: &str,
        permissions: Permissions,
        file_id: &[u8],
    ) -> PDFResult<EncryptionContext> {
        legacy_context(self, user_password, owner_password, permissions, file_id)
    }

    fn authenticate(&self, password: &str, dictionary: &EncryptionDictionary, file_id: &[u8]) -> PDFResult<FileKey> {
        legacy_authenticate(self, password, dictionary, file_id)
    }
}

impl StandardKeyDerivation for Rc4Handler {
    fn key_length(&self) -> usize {
        self.key_length
    }
}

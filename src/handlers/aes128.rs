//! AES-128-CBC security handler (V 4, R 4, `AESV2` crypt filter)

use crate::crypto::{AesCbcProvider, CryptoProvider};
use crate::error::PDFResult;
use crate::pdf::ObjectId;
use crate::security::key_derivation::object_key;
use crate::security::Permissions;
use crate::EncryptionAlgorithm;
use super::{
    legacy_authenticate, legacy_context, EncryptionContext, EncryptionDictionary, EncryptionHandler,
    FileKey, StandardKeyDerivation,
};

/// Same password derivation as RC4 revision 4; object data is AES-128-CBC
/// with a random IV prepended and PKCS#7 padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aes128Handler {
    encrypt_metadata: bool,
}

impl Aes128Handler {
    pub fn new(encrypt_metadata: bool) -> Self {
        Self { encrypt_metadata }
    }

    fn provider() -> AesCbcProvider {
        AesCbcProvider::new(16)
    }
}

impl Default for Aes128Handler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl EncryptionHandler for Aes128Handler {
    fn algorithm(&self) -> EncryptionAlgorithm {
        EncryptionAlgorithm::AES_128
    }

    fn key_length_bits(&self) -> u16 {
        128
    }

    fn version(&self) -> u8 {
        4
    }

    fn revision(&self) -> u8 {
        4
    }

    fn encrypt_metadata(&self) -> bool {
        self.encrypt_metadata
    }

    fn crypt_filter_method(&self) -> Option<&'static str> {
        Some("AESV2")
    }

    fn encrypt(&self, data: &[u8], file_key: &[u8], object_number: u32, generation: u16) -> PDFResult<Vec<u8>> {
        let key = object_key(file_key, ObjectId::new(object_number, generation), true);
        Self::provider().encrypt(&key, data)
    }

    fn decrypt(&self, data: &[u8], file_key: &[u8], object_number: u32, generation: u16) -> PDFResult<Vec<u8>> {
        let key = object_key(file_key, ObjectId::new(object_number, generation), true);
        Self::provider().decrypt(&key, data)
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

impl StandardKeyDerivation for Aes128Handler {}

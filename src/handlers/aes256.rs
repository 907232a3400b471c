//! AES-256 security handler (V 5, R 6, `AESV3` crypt filter)
//!
//! The file key is random. Passwords only protect it: `/UE` and `/OE` hold
//! the key encrypted under hashes of the user and owner passwords, `/U` and
//! `/O` hold the verification hashes and their salts, and `/Perms` binds the
//! permission bits to the key.

use log::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::{
    aes256_ecb_decrypt_block, aes256_ecb_encrypt_block, cbc_decrypt_no_padding, cbc_encrypt_no_padding,
    random_bytes, AesCbcProvider, CryptoProvider,
};
use crate::error::{PDFError, PDFResult};
use crate::security::key_derivation::{compute_hash_r6, prepare_password_r6};
use crate::security::Permissions;
use crate::EncryptionAlgorithm;
use super::{EncryptionContext, EncryptionDictionary, EncryptionHandler, FileKey, PasswordKind};

const KEY_LENGTH: usize = 32;
const SALT_LENGTH: usize = 8;
/// Hash, validation salt, key salt
const VALUE_LENGTH: usize = 48;
const ZERO_IV: [u8; 16] = [0; 16];
const PERMS_MARKER: &[u8; 3] = b"adb";

/// Everything Algorithms 8, 9 and 10 produce
pub struct Aes256EncryptionData {
    pub file_key: Zeroizing<Vec<u8>>,
    /// `/O`, 48 bytes
    pub owner_value: Vec<u8>,
    /// `/U`, 48 bytes
    pub user_value: Vec<u8>,
    /// `/OE`, 32 bytes
    pub owner_encrypted_key: Vec<u8>,
    /// `/UE`, 32 bytes
    pub user_encrypted_key: Vec<u8>,
    /// `/Perms`, 16 bytes
    pub perms: Vec<u8>,
    pub permissions: Permissions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aes256Handler {
    encrypt_metadata: bool,
}

impl Default for Aes256Handler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Aes256Handler {
    pub fn new(encrypt_metadata: bool) -> Self {
        Self { encrypt_metadata }
    }

    /// Algorithm 2.B
    pub fn compute_hash_r6(&self, password: &[u8], salt: &[u8], extra: &[u8]) -> PDFResult<Zeroizing<Vec<u8>>> {
        compute_hash_r6(password, salt, extra)
    }

    /// Generate a random file key and every revision 6 dictionary value
    ///
    /// An empty owner password falls back to the user password.
    pub fn generate_encryption_data(
        &self,
        user_password: &str,
        owner_password: &str,
        permissions: Permissions,
    ) -> PDFResult<Aes256EncryptionData> {
        let owner_password = if owner_password.is_empty() {
            user_password
        } else {
            owner_password
        };
        let user = prepare_password_r6(user_password);
        let owner = prepare_password_r6(owner_password);
        let file_key = Zeroizing::new(random_bytes(KEY_LENGTH));

        // Algorithm 8
        let salts = random_bytes(2 * SALT_LENGTH);
        let (validation_salt, key_salt) = salts.split_at(SALT_LENGTH);
        let mut user_value = self.compute_hash_r6(user, validation_salt, &[])?.to_vec();
        user_value.extend_from_slice(validation_salt);
        user_value.extend_from_slice(key_salt);

        let user_key = self.compute_hash_r6(user, key_salt, &[])?;
        let user_encrypted_key = cbc_encrypt_no_padding(&user_key, &ZERO_IV, &file_key)?;

        // Algorithm 9, hashed together with the complete /U
        let salts = random_bytes(2 * SALT_LENGTH);
        let (validation_salt, key_salt) = salts.split_at(SALT_LENGTH);
        let mut owner_value = self.compute_hash_r6(owner, validation_salt, &user_value)?.to_vec();
        owner_value.extend_from_slice(validation_salt);
        owner_value.extend_from_slice(key_salt);

        let owner_key = self.compute_hash_r6(owner, key_salt, &user_value)?;
        let owner_encrypted_key = cbc_encrypt_no_padding(&owner_key, &ZERO_IV, &file_key)?;

        // Algorithm 10
        let perms = aes256_ecb_encrypt_block(&file_key, &self.perms_block(permissions))?.to_vec();

        Ok(Aes256EncryptionData {
            file_key,
            owner_value,
            user_value,
            owner_encrypted_key,
            user_encrypted_key,
            perms,
            permissions,
        })
    }

    /// Plaintext `/Perms` block
    fn perms_block(&self, permissions: Permissions) -> Zeroizing<Vec<u8>> {
        let mut block = Zeroizing::new(Vec::with_capacity(16));
        block.extend_from_slice(&permissions.value().to_le_bytes());
        block.extend_from_slice(&[0xFF; 4]);
        block.push(if self.encrypt_metadata { b'T' } else { b'F' });
        block.extend_from_slice(PERMS_MARKER);
        block.extend_from_slice(&random_bytes(4));
        block
    }

    /// Algorithm 13: check the decrypted `/Perms` against `/P`
    fn verify_perms(&self, file_key: &[u8], dictionary: &EncryptionDictionary) -> PDFResult<()> {
        let perms = dictionary
            .perms
            .as_deref()
            .ok_or_else(|| PDFError::MissingDictionaryEntry("Perms".to_string()))?;
        let block = Zeroizing::new(aes256_ecb_decrypt_block(file_key, perms.get(..16).unwrap_or(perms))?);

        if &block[9..12] != PERMS_MARKER {
            warn!("Perms marker mismatch, file key is not valid");
            return Err(PDFError::AuthenticationFailed);
        }
        if block[0..4] != dictionary.p.to_le_bytes() {
            warn!("Perms does not match /P, permissions were altered");
            return Err(PDFError::AuthenticationFailed);
        }
        let metadata = block[8] == b'T';
        if metadata != dictionary.encrypt_metadata {
            warn!("Perms metadata flag {} disagrees with EncryptMetadata", metadata);
        }
        Ok(())
    }

    /// Algorithms 11 and 12
    fn recover_key(&self, password: &[u8], dictionary: &EncryptionDictionary) -> PDFResult<Option<FileKey>> {
        let user_value = fixed(&dictionary.user_value, "U", VALUE_LENGTH)?;
        let owner_value = fixed(&dictionary.owner_value, "O", VALUE_LENGTH)?;

        let hash = self.compute_hash_r6(password, &user_value[32..40], &[])?;
        if hash[..] == user_value[..32] {
            let ue = required(&dictionary.user_encrypted_key, "UE")?;
            let key = self.compute_hash_r6(password, &user_value[40..48], &[])?;
            let file_key = cbc_decrypt_no_padding(&key, &ZERO_IV, ue)?;
            return Ok(Some(FileKey::new(Zeroizing::new(file_key), PasswordKind::User)));
        }

        let hash = self.compute_hash_r6(password, &owner_value[32..40], user_value)?;
        if hash[..] == owner_value[..32] {
            let oe = required(&dictionary.owner_encrypted_key, "OE")?;
            let key = self.compute_hash_r6(password, &owner_value[40..48], user_value)?;
            let file_key = cbc_decrypt_no_padding(&key, &ZERO_IV, oe)?;
            return Ok(Some(FileKey::new(Zeroizing::new(file_key), PasswordKind::Owner)));
        }

        Ok(None)
    }
}

fn fixed<'a>(value: &'a [u8], key: &str, length: usize) -> PDFResult<&'a [u8]> {
    value.get(..length).ok_or_else(|| {
        PDFError::invalid_dict_value(key, format!("expected {} bytes, found {}", length, value.len()))
    })
}

fn required<'a>(value: &'a Option<Vec<u8>>, key: &str) -> PDFResult<&'a [u8]> {
    let value = value
        .as_deref()
        .ok_or_else(|| PDFError::MissingDictionaryEntry(key.to_string()))?;
    fixed(value, key, KEY_LENGTH)
}

impl EncryptionHandler for Aes256Handler {
    fn algorithm(&self) -> EncryptionAlgorithm {
        EncryptionAlgorithm::AES_256
    }

    fn key_length_bits(&self) -> u16 {
        256
    }

    fn version(&self) -> u8 {
        5
    }

    fn revision(&self) -> u8 {
        6
    }

    fn encrypt_metadata(&self) -> bool {
        self.encrypt_metadata
    }

    fn crypt_filter_method(&self) -> Option<&'static str> {
        Some("AESV3")
    }

    /// The file key is used directly; object numbers do not enter the key
    fn encrypt(&self, data: &[u8], file_key: &[u8], _object_number: u32, _generation: u16) -> PDFResult<Vec<u8>> {
        AesCbcProvider::new(KEY_LENGTH).encrypt(file_key, data)
    }

    fn decrypt(&self, data: &[u8], file_key: &[u8], _object_number: u32, _generation: u16) -> PDFResult<Vec<u8>> {
        AesCbcProvider::new(KEY_LENGTH).decrypt(file_key, data)
    }

    fn create_context(
        &self,
        user_password: &str,
        owner_password: &str,
        permissions: Permissions,
        _file_id: &[u8],
    ) -> PDFResult<EncryptionContext> {
        Ok(self.generate_encryption_data(user_password, owner_password, permissions)?.into())
    }

    fn authenticate(&self, password: &str, dictionary: &EncryptionDictionary, _file_id: &[u8]) -> PDFResult<FileKey> {
        let password = prepare_password_r6(password);
        let file_key = self
            .recover_key(password, dictionary)?
            .ok_or(PDFError::AuthenticationFailed)?;

        self.verify_perms(file_key.key(), dictionary)?;
        debug!("Authenticated revision 6 {:?} password", file_key.kind());
        Ok(file_key)
    }
}

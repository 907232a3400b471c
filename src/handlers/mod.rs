//! Standard security handlers for PDF encryption/decryption
//!
//! Every algorithm implements [`EncryptionHandler`]. RC4 and AES-128 share
//! the MD5-based password derivation of revisions 2 to 4 through
//! [`StandardKeyDerivation`]; AES-256 (revision 6) carries its own
//! multi-value contract on [`Aes256Handler`].

mod dictionary;
mod rc4;
mod aes128;
mod aes256;

pub use self::dictionary::EncryptionDictionary;
pub use self::rc4::Rc4Handler;
pub use self::aes128::Aes128Handler;
pub use self::aes256::{Aes256EncryptionData, Aes256Handler};

use std::fmt;
use log::{debug, trace};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{PDFError, PDFResult};
use crate::security::key_derivation::{
    compute_encryption_key, compute_owner_value, compute_user_value, user_password_from_owner,
    user_value_matches,
};
use crate::security::Permissions;
use crate::EncryptionAlgorithm;

/// Which password opened a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordKind {
    User,
    Owner,
}

/// File key recovered by a successful authentication
pub struct FileKey {
    key: Zeroizing<Vec<u8>>,
    kind: PasswordKind,
}

impl FileKey {
    pub(crate) fn new(key: Zeroizing<Vec<u8>>, kind: PasswordKind) -> Self {
        Self { key, kind }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn kind(&self) -> PasswordKind {
        self.kind
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileKey")
            .field("length", &self.key.len())
            .field("kind", &self.kind)
            .finish()
    }
}

/// Keys and verification values for one encrypt operation
///
/// Created once per operation; only the dictionary values ever leave it.
/// All byte buffers are wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionContext {
    file_key: Vec<u8>,
    owner_value: Vec<u8>,
    user_value: Vec<u8>,
    owner_encrypted_key: Option<Vec<u8>>,
    user_encrypted_key: Option<Vec<u8>>,
    perms: Option<Vec<u8>>,
    #[zeroize(skip)]
    permissions: Permissions,
}

impl EncryptionContext {
    /// Context for revisions 2 to 4
    pub(crate) fn legacy(
        file_key: Vec<u8>,
        owner_value: Vec<u8>,
        user_value: Vec<u8>,
        permissions: Permissions,
    ) -> Self {
        Self {
            file_key,
            owner_value,
            user_value,
            owner_encrypted_key: None,
            user_encrypted_key: None,
            perms: None,
            permissions,
        }
    }

    pub fn file_key(&self) -> &[u8] {
        &self.file_key
    }

    /// `/O`
    pub fn owner_value(&self) -> &[u8] {
        &self.owner_value
    }

    /// `/U`
    pub fn user_value(&self) -> &[u8] {
        &self.user_value
    }

    /// `/OE` (revision 6 only)
    pub fn owner_encrypted_key(&self) -> Option<&[u8]> {
        self.owner_encrypted_key.as_deref()
    }

    /// `/UE` (revision 6 only)
    pub fn user_encrypted_key(&self) -> Option<&[u8]> {
        self.user_encrypted_key.as_deref()
    }

    /// `/Perms` (revision 6 only)
    pub fn perms(&self) -> Option<&[u8]> {
        self.perms.as_deref()
    }

    pub fn permissions(&self) -> Permissions {
        self.permissions
    }
}

impl From<Aes256EncryptionData> for EncryptionContext {
    fn from(data: Aes256EncryptionData) -> Self {
        let Aes256EncryptionData {
            file_key,
            owner_value,
            user_value,
            owner_encrypted_key,
            user_encrypted_key,
            perms,
            permissions,
        } = data;
        Self {
            file_key: file_key.to_vec(),
            owner_value,
            user_value,
            owner_encrypted_key: Some(owner_encrypted_key),
            user_encrypted_key: Some(user_encrypted_key),
            perms: Some(perms),
            permissions,
        }
    }
}

impl fmt::Debug for EncryptionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionContext")
            .field("file_key", &"<redacted>")
            .field("owner_value", &hex::encode(&self.owner_value))
            .field("user_value", &hex::encode(&self.user_value))
            .field("permissions", &self.permissions)
            .finish()
    }
}

/// Common contract of every standard security handler algorithm
pub trait EncryptionHandler: fmt::Debug {
    fn algorithm(&self) -> EncryptionAlgorithm;

    /// Key length in bits as written to `/Length`
    fn key_length_bits(&self) -> u16;

    /// `/V`
    fn version(&self) -> u8;

    /// `/R`
    fn revision(&self) -> u8;

    /// Whether metadata streams are encrypted
    fn encrypt_metadata(&self) -> bool;

    /// `/CFM` of the standard crypt filter, if crypt filters are used
    fn crypt_filter_method(&self) -> Option<&'static str> {
        None
    }

    /// Lowest PDF version that defines this algorithm
    fn min_pdf_version(&self) -> &'static str {
        self.algorithm().min_pdf_version()
    }

    /// Encrypt a string or stream body of object `object_number generation`
    fn encrypt(&self, data: &[u8], file_key: &[u8], object_number: u32, generation: u16)
        -> PDFResult<Vec<u8>>;

    /// Inverse of `encrypt`
    fn decrypt(&self, data: &[u8], file_key: &[u8], object_number: u32, generation: u16)
        -> PDFResult<Vec<u8>>;

    /// Derive the file key and every dictionary value for a new encryption
    ///
    /// `file_id` is the first trailer `/ID` element; revision 6 ignores it.
    fn create_context(
        &self,
        user_password: &str,
        owner_password: &str,
        permissions: Permissions,
        file_id: &[u8],
    ) -> PDFResult<EncryptionContext>;

    /// Recover the file key from a user or owner password
    fn authenticate(
        &self,
        password: &str,
        dictionary: &EncryptionDictionary,
        file_id: &[u8],
    ) -> PDFResult<FileKey>;

    /// Encryption dictionary describing `context`
    fn encryption_dictionary(&self, context: &EncryptionContext) -> EncryptionDictionary {
        EncryptionDictionary {
            filter: "Standard".to_string(),
            version: self.version(),
            revision: self.revision(),
            length_bits: self.key_length_bits(),
            owner_value: context.owner_value().to_vec(),
            user_value: context.user_value().to_vec(),
            owner_encrypted_key: context.owner_encrypted_key().map(<[u8]>::to_vec),
            user_encrypted_key: context.user_encrypted_key().map(<[u8]>::to_vec),
            perms: context.perms().map(<[u8]>::to_vec),
            p: context.permissions().value(),
            encrypt_metadata: self.encrypt_metadata(),
            crypt_filter_method: self.crypt_filter_method().map(str::to_string),
        }
    }
}

/// Password derivation of revisions 2 to 4 (ISO 32000-1 Algorithms 2 to 7)
pub trait StandardKeyDerivation: EncryptionHandler {
    /// Key length in bytes
    fn key_length(&self) -> usize {
        usize::from(self.key_length_bits() / 8)
    }

    /// Algorithm 2
    fn compute_encryption_key(
        &self,
        password: &[u8],
        owner_value: &[u8],
        permissions: i32,
        file_id: &[u8],
    ) -> PDFResult<Zeroizing<Vec<u8>>> {
        compute_encryption_key(
            password,
            owner_value,
            permissions,
            file_id,
            self.revision(),
            self.key_length(),
            self.encrypt_metadata(),
        )
    }

    /// Algorithm 3
    fn compute_owner_value(&self, owner_password: &[u8], user_password: &[u8]) -> PDFResult<Vec<u8>> {
        compute_owner_value(owner_password, user_password, self.revision(), self.key_length())
    }

    /// Algorithms 4 and 5
    fn compute_user_value(&self, key: &[u8], file_id: &[u8]) -> PDFResult<Vec<u8>> {
        compute_user_value(key, file_id, self.revision())
    }
}

/// Shared `create_context` for revisions 2 to 4
fn legacy_context<H: StandardKeyDerivation + ?Sized>(
    handler: &H,
    user_password: &str,
    owner_password: &str,
    permissions: Permissions,
    file_id: &[u8],
) -> PDFResult<EncryptionContext> {
    let owner_value = handler.compute_owner_value(owner_password.as_bytes(), user_password.as_bytes())?;
    let key = handler.compute_encryption_key(
        user_password.as_bytes(),
        &owner_value,
        permissions.value(),
        file_id,
    )?;
    let user_value = handler.compute_user_value(&key, file_id)?;

    trace!("Derived {}-byte file key for revision {}", key.len(), handler.revision());
    Ok(EncryptionContext::legacy(key.to_vec(), owner_value, user_value, permissions))
}

/// Shared `authenticate` for revisions 2 to 4: user password first, then owner
fn legacy_authenticate<H: StandardKeyDerivation + ?Sized>(
    handler: &H,
    password: &str,
    dictionary: &EncryptionDictionary,
    file_id: &[u8],
) -> PDFResult<FileKey> {
    let try_user = |candidate: &[u8]| -> PDFResult<Option<Zeroizing<Vec<u8>>>> {
        let key = handler.compute_encryption_key(candidate, &dictionary.owner_value, dictionary.p, file_id)?;
        let user_value = handler.compute_user_value(&key, file_id)?;
        Ok(user_value_matches(&user_value, &dictionary.user_value, handler.revision()).then_some(key))
    };

    if let Some(key) = try_user(password.as_bytes())? {
        debug!("Authenticated with the user password");
        return Ok(FileKey::new(key, PasswordKind::User));
    }

    let user_password = user_password_from_owner(
        password.as_bytes(),
        &dictionary.owner_value,
        handler.revision(),
        handler.key_length(),
    )?;
    if let Some(key) = try_user(&user_password)? {
        debug!("Authenticated with the owner password");
        return Ok(FileKey::new(key, PasswordKind::Owner));
    }

    Err(PDFError::AuthenticationFailed)
}

/// Handler for a new encryption with `algorithm`
pub fn handler_for(algorithm: EncryptionAlgorithm, encrypt_metadata: bool) -> Box<dyn EncryptionHandler> {
    match algorithm {
        EncryptionAlgorithm::RC4_40 => Box::new(Rc4Handler::rc4_40()),
        EncryptionAlgorithm::RC4_128 => Box::new(Rc4Handler::rc4_128()),
        EncryptionAlgorithm::AES_128 => Box::new(Aes128Handler::new(encrypt_metadata)),
        EncryptionAlgorithm::AES_256 => Box::new(Aes256Handler::new(encrypt_metadata)),
    }
}

/// Handler matching an existing encryption dictionary
pub fn handler_for_dictionary(dictionary: &EncryptionDictionary) -> PDFResult<Box<dyn EncryptionHandler>> {
    let handler: Box<dyn EncryptionHandler> = match (dictionary.version, dictionary.revision) {
        (1 | 2, 2 | 3) => Box::new(Rc4Handler::from_parameters(
            dictionary.version,
            dictionary.revision,
            dictionary.key_length()?,
            true,
        )?),
        (4, 4) => match dictionary.crypt_filter_method.as_deref() {
            Some("AESV2") => Box::new(Aes128Handler::new(dictionary.encrypt_metadata)),
            Some("V2") => Box::new(Rc4Handler::from_parameters(
                4,
                4,
                dictionary.key_length()?,
                dictionary.encrypt_metadata,
            )?),
            other => {
                return Err(PDFError::UnsupportedAlgorithm(format!(
                    "crypt filter method {}",
                    other.unwrap_or("None")
                )))
            }
        },
        (5, 6) => Box::new(Aes256Handler::new(dictionary.encrypt_metadata)),
        (5, 5) => return Err(PDFError::UnsupportedRevision(5)),
        (v, r) => {
            return Err(PDFError::UnsupportedAlgorithm(format!("V {} R {}", v, r)));
        }
    };

    debug!("Selected {} handler for V {} R {}", handler.algorithm(), dictionary.version, dictionary.revision);
    Ok(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Permission;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const FILE_ID: [u8; 16] = *b"0123456789abcdef";

    #[rstest]
    #[case(EncryptionAlgorithm::RC4_40, 1, 2, 40)]
    #[case(EncryptionAlgorithm::RC4_128, 2, 3, 128)]
    #[case(EncryptionAlgorithm::AES_128, 4, 4, 128)]
    #[case(EncryptionAlgorithm::AES_256, 5, 6, 256)]
    fn test_handler_markers(
        #[case] algorithm: EncryptionAlgorithm,
        #[case] version: u8,
        #[case] revision: u8,
        #[case] bits: u16,
    ) {
        let handler = handler_for(algorithm, true);
        assert_eq!(handler.algorithm(), algorithm);
        assert_eq!(handler.version(), version);
        assert_eq!(handler.revision(), revision);
        assert_eq!(handler.key_length_bits(), bits);
    }

    #[rstest]
    #[case(EncryptionAlgorithm::RC4_40)]
    #[case(EncryptionAlgorithm::RC4_128)]
    #[case(EncryptionAlgorithm::AES_128)]
    #[case(EncryptionAlgorithm::AES_256)]
    fn test_context_authenticates(#[case] algorithm: EncryptionAlgorithm) {
        let handler = handler_for(algorithm, true);
        let permissions = Permissions::deny_all().with(Permission::Print);
        let context = handler.create_context("user", "owner", permissions, &FILE_ID).unwrap();
        let dictionary = handler.encryption_dictionary(&context);

        let user = handler.authenticate("user", &dictionary, &FILE_ID).unwrap();
        assert_eq!(user.kind(), PasswordKind::User);
        assert_eq!(user.key(), context.file_key());

        let owner = handler.authenticate("owner", &dictionary, &FILE_ID).unwrap();
        assert_eq!(owner.kind(), PasswordKind::Owner);
        assert_eq!(owner.key(), context.file_key());

        assert!(matches!(
            handler.authenticate("wrong", &dictionary, &FILE_ID),
            Err(PDFError::AuthenticationFailed)
        ));
    }

    #[rstest]
    #[case(EncryptionAlgorithm::RC4_40)]
    #[case(EncryptionAlgorithm::RC4_128)]
    #[case(EncryptionAlgorithm::AES_128)]
    #[case(EncryptionAlgorithm::AES_256)]
    fn test_dictionary_selects_same_handler(#[case] algorithm: EncryptionAlgorithm) {
        let handler = handler_for(algorithm, true);
        let context = handler.create_context("", "owner", Permissions::allow_all(), &FILE_ID).unwrap();
        let dictionary = EncryptionDictionary::from_dict(&handler.encryption_dictionary(&context).to_dict()).unwrap();

        let selected = handler_for_dictionary(&dictionary).unwrap();
        assert_eq!(selected.algorithm(), algorithm);
        assert_eq!(selected.revision(), handler.revision());
        assert!(selected.authenticate("", &dictionary, &FILE_ID).is_ok());
    }

    #[test_log::test]
    fn test_unknown_dictionary_rejected() {
        let handler = handler_for(EncryptionAlgorithm::AES_128, true);
        let context = handler.create_context("u", "o", Permissions::allow_all(), &FILE_ID).unwrap();
        let mut dictionary = handler.encryption_dictionary(&context);

        dictionary.crypt_filter_method = Some("Identity".to_string());
        assert!(matches!(
            handler_for_dictionary(&dictionary),
            Err(PDFError::UnsupportedAlgorithm(_))
        ));

        dictionary.version = 3;
        assert!(handler_for_dictionary(&dictionary).is_err());
    }

    #[test_log::test]
    fn test_context_debug_hides_key() {
        let handler = handler_for(EncryptionAlgorithm::RC4_128, true);
        let context = handler.create_context("u", "o", Permissions::allow_all(), &FILE_ID).unwrap();
        let debug = format!("{:?}", context);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(&hex::encode(context.file_key())));
    }
}

//! PDF Vault
//!
//! Reads and writes PDF files and applies the standard security handler:
//! RC4 (40 and 128 bit), AES-128 and AES-256 password encryption.
//!
//! ```no_run
//! use pdf_vault::{EncryptionAlgorithm, EncryptionOptions, PDFVault, Permission, Permissions};
//!
//! # fn main() -> pdf_vault::PDFResult<()> {
//! let options = EncryptionOptions::new(EncryptionAlgorithm::AES_256)
//!     .user_password("reader")
//!     .owner_password("author")
//!     .permissions(Permissions::deny_all().with(Permission::Print));
//! PDFVault::new().encrypt_file("in.pdf", "out.pdf", &options)?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use log::{debug, info};

pub mod error;
pub mod pdf;
pub mod crypto;
pub mod handlers;
pub mod security;

pub use error::{PDFError, PDFResult};
pub use handlers::{EncryptionHandler, PasswordKind};
pub use pdf::{Document, Object, ObjectId, PDFParser, PDFWriter, WriterOptions};
pub use security::{Decryptor, Encryptor, Permission, Permissions};

/// Supported encryption algorithms
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptionAlgorithm {
    /// RC4 with a 40-bit key (V 1, R 2)
    RC4_40,
    /// RC4 with a 128-bit key (V 2, R 3)
    RC4_128,
    /// AES-128-CBC (V 4, R 4)
    AES_128,
    /// AES-256-CBC (V 5, R 6)
    AES_256,
}

impl EncryptionAlgorithm {
    pub const ALL: [EncryptionAlgorithm; 4] = [
        EncryptionAlgorithm::RC4_40,
        EncryptionAlgorithm::RC4_128,
        EncryptionAlgorithm::AES_128,
        EncryptionAlgorithm::AES_256,
    ];

    /// `/V` and `/R` of the encryption dictionary
    pub fn version_revision(&self) -> (u8, u8) {
        match self {
            EncryptionAlgorithm::RC4_40 => (1, 2),
            EncryptionAlgorithm::RC4_128 => (2, 3),
            EncryptionAlgorithm::AES_128 => (4, 4),
            EncryptionAlgorithm::AES_256 => (5, 6),
        }
    }

    pub fn key_length_bits(&self) -> u16 {
        match self {
            EncryptionAlgorithm::RC4_40 => 40,
            EncryptionAlgorithm::RC4_128 | EncryptionAlgorithm::AES_128 => 128,
            EncryptionAlgorithm::AES_256 => 256,
        }
    }

    /// Lowest PDF version that defines the algorithm
    pub fn min_pdf_version(&self) -> &'static str {
        match self {
            EncryptionAlgorithm::RC4_40 => "1.1",
            EncryptionAlgorithm::RC4_128 => "1.4",
            EncryptionAlgorithm::AES_128 => "1.5",
            EncryptionAlgorithm::AES_256 => "1.7",
        }
    }

    pub fn is_aes(&self) -> bool {
        matches!(self, EncryptionAlgorithm::AES_128 | EncryptionAlgorithm::AES_256)
    }
}

impl fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionAlgorithm::RC4_40 => write!(f, "RC4-40"),
            EncryptionAlgorithm::RC4_128 => write!(f, "RC4-128"),
            EncryptionAlgorithm::AES_128 => write!(f, "AES-128"),
            EncryptionAlgorithm::AES_256 => write!(f, "AES-256"),
        }
    }
}

impl FromStr for EncryptionAlgorithm {
    type Err = PDFError;

    /// Case-insensitive; `-` and `_` are interchangeable
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "rc4-40" => Ok(EncryptionAlgorithm::RC4_40),
            "rc4-128" => Ok(EncryptionAlgorithm::RC4_128),
            "aes-128" => Ok(EncryptionAlgorithm::AES_128),
            "aes-256" => Ok(EncryptionAlgorithm::AES_256),
            _ => Err(PDFError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Settings for one encryption
#[derive(Clone)]
pub struct EncryptionOptions {
    pub algorithm: EncryptionAlgorithm,
    pub user_password: String,
    /// Empty means "same as the user password"
    pub owner_password: String,
    pub permissions: Permissions,
    pub encrypt_metadata: bool,
    /// FlateDecode unfiltered streams before encrypting
    pub compress_streams: bool,
    /// Fixed 16-byte file identifier instead of the existing or a random one
    pub file_id: Option<Vec<u8>>,
}

impl Default for EncryptionOptions {
    fn default() -> Self {
        Self::new(EncryptionAlgorithm::AES_128)
    }
}

impl EncryptionOptions {
    /// Empty passwords, every permission granted, metadata encrypted
    pub fn new(algorithm: EncryptionAlgorithm) -> Self {
        Self {
            algorithm,
            user_password: String::new(),
            owner_password: String::new(),
            permissions: Permissions::allow_all(),
            encrypt_metadata: true,
            compress_streams: false,
            file_id: None,
        }
    }

    pub fn user_password(mut self, password: impl Into<String>) -> Self {
        self.user_password = password.into();
        self
    }

    pub fn owner_password(mut self, password: impl Into<String>) -> Self {
        self.owner_password = password.into();
        self
    }

    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn encrypt_metadata(mut self, encrypt: bool) -> Self {
        self.encrypt_metadata = encrypt;
        self
    }

    pub fn compress_streams(mut self, compress: bool) -> Self {
        self.compress_streams = compress;
        self
    }

    pub fn file_id(mut self, id: impl Into<Vec<u8>>) -> Self {
        self.file_id = Some(id.into());
        self
    }

    /// Reject combinations that cannot be written
    pub fn validate(&self) -> PDFResult<()> {
        if let Some(id) = &self.file_id {
            if id.len() != security::FILE_ID_LENGTH {
                return Err(PDFError::invalid_length("file identifier", id.len()));
            }
        }
        if !self.encrypt_metadata && !self.algorithm.is_aes() {
            return Err(PDFError::UnsupportedAlgorithm(format!(
                "{} cannot leave metadata unencrypted",
                self.algorithm
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for EncryptionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionOptions")
            .field("algorithm", &self.algorithm)
            .field("user_password", &"<redacted>")
            .field("owner_password", &"<redacted>")
            .field("permissions", &self.permissions)
            .field("encrypt_metadata", &self.encrypt_metadata)
            .field("compress_streams", &self.compress_streams)
            .field("file_id", &self.file_id.as_ref().map(hex::encode))
            .finish()
    }
}

/// Encryption parameters of a document
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionInfo {
    pub algorithm: EncryptionAlgorithm,
    /// `/V`
    pub version: u8,
    /// `/R`
    pub revision: u8,
    pub key_length_bits: u16,
    pub permissions: Permissions,
    pub encrypt_metadata: bool,
}

/// Entry point for whole-file encryption and decryption
///
/// Every operation parses, transforms and serializes fully in memory and
/// only then returns or writes its result.
#[derive(Debug, Clone, Default)]
pub struct PDFVault {
    writer: PDFWriter,
}

impl PDFVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_writer_options(options: WriterOptions) -> Self {
        Self {
            writer: PDFWriter::new(options),
        }
    }

    /// Encrypt a parsed document and serialize it
    pub fn encrypt_document(&self, mut document: Document, options: &EncryptionOptions) -> PDFResult<Vec<u8>> {
        options.validate()?;
        debug!("Encrypting with {:?}", options);

        if options.compress_streams {
            document.load_all()?;
            let compressed = document.compress_streams()?;
            debug!("Compressed {} streams before encryption", compressed);
        }

        let handler = handlers::handler_for(options.algorithm, options.encrypt_metadata);
        Encryptor::new(document, handler)?
            .derive_keys(
                &options.user_password,
                &options.owner_password,
                options.permissions,
                options.file_id.as_deref(),
            )?
            .rewrite()?
            .serialize(&self.writer)
    }

    /// Parse, encrypt and serialize
    pub fn encrypt(&self, pdf_data: Vec<u8>, options: &EncryptionOptions) -> PDFResult<Vec<u8>> {
        options.validate()?;
        self.encrypt_document(Document::load(pdf_data)?, options)
    }

    /// Decrypt a parsed document with the user or owner password
    pub fn decrypt_document(&self, document: Document, password: &str) -> PDFResult<Document> {
        let (document, kind) = Decryptor::new(document)?.decrypt(password)?;
        debug!("Opened with the {:?} password", kind);
        Ok(document)
    }

    /// Parse, decrypt and serialize without an encryption dictionary
    pub fn decrypt(&self, pdf_data: Vec<u8>, password: &str) -> PDFResult<Vec<u8>> {
        let document = self.decrypt_document(Document::load(pdf_data)?, password)?;
        self.writer.write(&document)
    }

    /// Encrypt `input` into `output`
    ///
    /// `output` is written only after encryption has fully succeeded; it is
    /// not replaced atomically.
    pub fn encrypt_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        options: &EncryptionOptions,
    ) -> PDFResult<()> {
        options.validate()?;
        let (input, output) = (input.as_ref(), output.as_ref());
        let bytes = self.encrypt_document(Document::load_file(input)?, options)?;
        std::fs::write(output, &bytes).map_err(|e| PDFError::io(output, e))?;
        info!("Encrypted {} into {} ({} bytes)", input.display(), output.display(), bytes.len());
        Ok(())
    }

    /// Decrypt `input` into `output`
    pub fn decrypt_file(&self, input: impl AsRef<Path>, output: impl AsRef<Path>, password: &str) -> PDFResult<()> {
        let (input, output) = (input.as_ref(), output.as_ref());
        let document = self.decrypt_document(Document::load_file(input)?, password)?;
        self.writer.write_file(&document, output)?;
        info!("Decrypted {} into {}", input.display(), output.display());
        Ok(())
    }

    /// Encryption parameters, or `None` for an unencrypted document
    pub fn get_encryption_info(&self, pdf_data: Vec<u8>) -> PDFResult<Option<EncryptionInfo>> {
        let document = Document::load(pdf_data)?;
        if !document.is_encrypted() {
            return Ok(None);
        }

        let (_, dictionary) = security::read_encryption_dictionary(&document)?;
        Ok(Some(EncryptionInfo {
            algorithm: dictionary.algorithm()?,
            version: dictionary.version,
            revision: dictionary.revision,
            key_length_bits: dictionary.length_bits,
            permissions: dictionary.permissions(),
            encrypt_metadata: dictionary.encrypt_metadata,
        }))
    }
}

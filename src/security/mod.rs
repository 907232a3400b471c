//! Standard security handler: permissions, key derivation, encryption and
//! decryption of whole documents

pub mod key_derivation;
mod permissions;
mod object_encryption;
mod encryptor;
mod authentication;

pub use self::permissions::{Permission, Permissions, BASE_MASK, DOCUMENTED_BITS};
pub use self::object_encryption::{Direction, ObjectCrypter};
pub use self::encryptor::{Encryptor, KeyedEncryptor, RewrittenEncryptor, FILE_ID_LENGTH};
pub use self::authentication::{read_encryption_dictionary, Decryptor};

//! Cipher primitives used by the security handlers

mod rc4;
mod aes;

pub use self::rc4::{rc4_crypt, Rc4Provider};
pub use self::aes::{
    aes256_ecb_decrypt_block, aes256_ecb_encrypt_block, cbc_decrypt_no_padding,
    cbc_decrypt_padded, cbc_encrypt_no_padding, cbc_encrypt_padded, random_bytes,
    AesCbcProvider, BLOCK_SIZE,
};

use crate::error::PDFResult;

/// Symmetric cipher applied to string and stream data under an object key
pub trait CryptoProvider {
    fn encrypt(&self, key: &[u8], data: &[u8]) -> PDFResult<Vec<u8>>;
    fn decrypt(&self, key: &[u8], data: &[u8]) -> PDFResult<Vec<u8>>;
}

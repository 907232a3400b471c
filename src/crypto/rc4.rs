//! RC4 stream cipher

use rc4::consts::{U1, U10, U11, U12, U13, U14, U15, U16, U2, U3, U4, U5, U6, U7, U8, U9};
use rc4::{KeyInit, Rc4, StreamCipher};
use crate::error::{PDFError, PDFResult};
use super::CryptoProvider;

/// Longest key the standard security handler derives
const MAX_KEY_LENGTH: usize = 16;

/// `Rc4` is generic over its key size, so each supported length gets an arm
macro_rules! apply_keystream {
    ($key:expr, $data:expr; $($len:literal => $size:ty),+ $(,)?) => {
        match $key.len() {
            $($len => Rc4::<$size>::new_from_slice($key)?
                .try_apply_keystream($data)
                .map_err(|e| PDFError::crypto(format!("RC4 keystream: {}", e)))?,)+
            found => {
                return Err(PDFError::InvalidKeyLength {
                    expected: MAX_KEY_LENGTH,
                    found,
                })
            }
        }
    };
}

/// One-shot RC4 over keys of 1 to 16 bytes; encryption and decryption are
/// the same operation
pub fn rc4_crypt(key: &[u8], data: &[u8]) -> PDFResult<Vec<u8>> {
    let mut output = data.to_vec();
    apply_keystream!(key, &mut output;
        1 => U1, 2 => U2, 3 => U3, 4 => U4,
        5 => U5, 6 => U6, 7 => U7, 8 => U8,
        9 => U9, 10 => U10, 11 => U11, 12 => U12,
        13 => U13, 14 => U14, 15 => U15, 16 => U16,
    );
    Ok(output)
}

/// RC4 provider for object data
#[derive(Debug, Clone, Copy, Default)]
pub struct Rc4Provider;

impl CryptoProvider for Rc4Provider {
    fn encrypt(&self, key: &[u8], data: &[u8]) -> PDFResult<Vec<u8>> {
        rc4_crypt(key, data)
    }

    fn decrypt(&self, key: &[u8], data: &[u8]) -> PDFResult<Vec<u8>> {
        rc4_crypt(key, data)
    }
}

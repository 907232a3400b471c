//! AES primitives: CBC with and without padding, single-block ECB

use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use aes::{Aes128, Aes256};
use cbc::{Decryptor, Encryptor};
use rand::{thread_rng, RngCore};

use crate::error::{PDFError, PDFResult};
use super::CryptoProvider;

type Aes128CbcEnc = Encryptor<Aes128>;
type Aes128CbcDec = Decryptor<Aes128>;
type Aes256CbcEnc = Encryptor<Aes256>;
type Aes256CbcDec = Decryptor<Aes256>;

/// AES block and IV size
pub const BLOCK_SIZE: usize = 16;

/// Fill a buffer of `len` bytes from the thread RNG
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// CBC-encrypt with PKCS#7 padding under a 16- or 32-byte key
pub fn cbc_encrypt_padded(key: &[u8], iv: &[u8], data: &[u8]) -> PDFResult<Vec<u8>> {
    let padded_len = (data.len() / BLOCK_SIZE + 1) * BLOCK_SIZE;
    let mut buffer = vec![0u8; padded_len];
    buffer[..data.len()].copy_from_slice(data);

    let written = match key.len() {
        16 => Aes128CbcEnc::new_from_slices(key, iv)?
            .encrypt_padded_mut::<Pkcs7>(&mut buffer, data.len())
            .map(<[u8]>::len),
        32 => Aes256CbcEnc::new_from_slices(key, iv)?
            .encrypt_padded_mut::<Pkcs7>(&mut buffer, data.len())
            .map(<[u8]>::len),
        found => return Err(PDFError::InvalidKeyLength { expected: 16, found }),
    }
    .map_err(|_| PDFError::AesError("padding buffer too small".to_string()))?;

    buffer.truncate(written);
    Ok(buffer)
}

/// CBC-decrypt and strip PKCS#7 padding
pub fn cbc_decrypt_padded(key: &[u8], iv: &[u8], data: &[u8]) -> PDFResult<Vec<u8>> {
    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        return Err(PDFError::invalid_length("AES-CBC decryption", data.len()));
    }

    let mut buffer = data.to_vec();
    let plain_len = match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)?
            .decrypt_padded_mut::<Pkcs7>(&mut buffer)
            .map(<[u8]>::len),
        32 => Aes256CbcDec::new_from_slices(key, iv)?
            .decrypt_padded_mut::<Pkcs7>(&mut buffer)
            .map(<[u8]>::len),
        found => return Err(PDFError::InvalidKeyLength { expected: 16, found }),
    }
    .map_err(|_| PDFError::AesError("invalid PKCS#7 padding".to_string()))?;

    buffer.truncate(plain_len);
    Ok(buffer)
}

/// CBC-encrypt block-aligned data without padding
pub fn cbc_encrypt_no_padding(key: &[u8], iv: &[u8], data: &[u8]) -> PDFResult<Vec<u8>> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(PDFError::invalid_length("unpadded AES-CBC encryption", data.len()));
    }

    let mut buffer = data.to_vec();
    match key.len() {
        16 => Aes128CbcEnc::new_from_slices(key, iv)?
            .encrypt_padded_mut::<NoPadding>(&mut buffer, data.len())
            .map(|_| ()),
        32 => Aes256CbcEnc::new_from_slices(key, iv)?
            .encrypt_padded_mut::<NoPadding>(&mut buffer, data.len())
            .map(|_| ()),
        found => return Err(PDFError::InvalidKeyLength { expected: 32, found }),
    }
    .map_err(|_| PDFError::AesError("unaligned unpadded input".to_string()))?;

    Ok(buffer)
}

/// CBC-decrypt block-aligned data without padding
pub fn cbc_decrypt_no_padding(key: &[u8], iv: &[u8], data: &[u8]) -> PDFResult<Vec<u8>> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(PDFError::invalid_length("unpadded AES-CBC decryption", data.len()));
    }

    let mut buffer = data.to_vec();
    match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)?
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map(|_| ()),
        32 => Aes256CbcDec::new_from_slices(key, iv)?
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map(|_| ()),
        found => return Err(PDFError::InvalidKeyLength { expected: 32, found }),
    }
    .map_err(|_| PDFError::AesError("unaligned unpadded input".to_string()))?;

    Ok(buffer)
}

/// Encrypt exactly one block with AES-256 in ECB mode
pub fn aes256_ecb_encrypt_block(key: &[u8], block: &[u8]) -> PDFResult<[u8; BLOCK_SIZE]> {
    if block.len() != BLOCK_SIZE {
        return Err(PDFError::invalid_length("AES-256-ECB block", block.len()));
    }
    let cipher = Aes256::new_from_slice(key)?;
    let mut block = aes::Block::clone_from_slice(block);
    cipher.encrypt_block(&mut block);

    let mut output = [0u8; BLOCK_SIZE];
    output.copy_from_slice(&block);
    Ok(output)
}

/// Decrypt exactly one block with AES-256 in ECB mode
pub fn aes256_ecb_decrypt_block(key: &[u8], block: &[u8]) -> PDFResult<[u8; BLOCK_SIZE]> {
    if block.len() != BLOCK_SIZE {
        return Err(PDFError::invalid_length("AES-256-ECB block", block.len()));
    }
    let cipher = Aes256::new_from_slice(key)?;
    let mut block = aes::Block::clone_from_slice(block);
    cipher.decrypt_block(&mut block);

    let mut output = [0u8; BLOCK_SIZE];
    output.copy_from_slice(&block);
    Ok(output)
}

/// AES-CBC provider for object data: random IV prepended, PKCS#7 padding
#[derive(Debug, Clone, Copy)]
pub struct AesCbcProvider {
    key_length: usize,
}

impl AesCbcProvider {
    /// Provider for 16- or 32-byte keys
    pub fn new(key_length: usize) -> Self {
        Self { key_length }
    }

    fn check_key(&self, key: &[u8]) -> PDFResult<()> {
        if key.len() != self.key_length {
            return Err(PDFError::InvalidKeyLength {
                expected: self.key_length,
                found: key.len(),
            });
        }
        Ok(())
    }
}

impl CryptoProvider for AesCbcProvider {
    fn encrypt(&self, key: &[u8], data: &[u8]) -> PDFResult<Vec<u8>> {
        self.check_key(key)?;
        let iv = random_bytes(BLOCK_SIZE);
        let ciphertext = cbc_encrypt_padded(key, &iv, data)?;

        let mut output = iv;
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    fn decrypt(&self, key: &[u8], data: &[u8]) -> PDFResult<Vec<u8>> {
        self.check_key(key)?;
        if data.len() < BLOCK_SIZE {
            return Err(PDFError::invalid_length("AES decryption (missing IV)", data.len()));
        }

        let (iv, ciphertext) = data.split_at(BLOCK_SIZE);
        cbc_decrypt_padded(key, iv, ciphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(16, 0)]
    #[case(16, 1)]
    #[case(16, 16)]
    #[case(16, 1000)]
    #[case(32, 0)]
    #[case(32, 1)]
    #[case(32, 1000)]
    fn test_aes_round_trip(#[case] key_length: usize, #[case] data_length: usize) {
        let provider = AesCbcProvider::new(key_length);
        let key = vec![7u8; key_length];
        let data: Vec<u8> = (0..data_length).map(|i| i as u8).collect();

        let encrypted = provider.encrypt(&key, &data).unwrap();
        assert_eq!(encrypted.len(), BLOCK_SIZE + (data_length / BLOCK_SIZE + 1) * BLOCK_SIZE);
        assert_eq!(provider.decrypt(&key, &encrypted).unwrap(), data);
    }

    #[test_log::test]
    fn test_random_iv() {
        let provider = AesCbcProvider::new(16);
        let key = [1u8; 16];
        let first = provider.encrypt(&key, b"same input").unwrap();
        let second = provider.encrypt(&key, b"same input").unwrap();
        assert_ne!(first[..BLOCK_SIZE], second[..BLOCK_SIZE]);
    }

    #[test_log::test]
    fn test_fips197_known_answer() {
        // FIPS-197 appendix C.3 via the zero-IV CBC path
        let key = hex::decode("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f").unwrap();
        let plain = hex::decode("00112233445566778899aabbccddeeff").unwrap();
        let expected = "8ea2b7ca516745bfeafc49904b496089";

        assert_eq!(hex::encode(aes256_ecb_encrypt_block(&key, &plain).unwrap()), expected);
        assert_eq!(hex::encode(cbc_encrypt_no_padding(&key, &[0u8; 16], &plain).unwrap()), expected);
        assert_eq!(aes256_ecb_decrypt_block(&key, &hex::decode(expected).unwrap()).unwrap().to_vec(), plain);
    }

    #[test_log::test]
    fn test_invalid_key_length() {
        let provider = AesCbcProvider::new(16);
        assert!(matches!(
            provider.encrypt(&[1u8; 24], b"data"),
            Err(PDFError::InvalidKeyLength { expected: 16, found: 24 })
        ));
    }

    #[test_log::test]
    fn test_short_ciphertext_is_error() {
        let provider = AesCbcProvider::new(16);
        let key = [1u8; 16];
        for length in [0, 8, 15] {
            assert!(matches!(
                provider.decrypt(&key, &vec![0u8; length]),
                Err(PDFError::InvalidDataLength { .. })
            ));
        }
        // IV alone, no ciphertext blocks
        assert!(provider.decrypt(&key, &[0u8; 16]).is_err());
    }

    #[test_log::test]
    fn test_unaligned_no_padding_rejected() {
        assert!(cbc_encrypt_no_padding(&[0u8; 16], &[0u8; 16], &[0u8; 15]).is_err());
        assert!(cbc_decrypt_no_padding(&[0u8; 32], &[0u8; 16], &[0u8; 17]).is_err());
    }
}

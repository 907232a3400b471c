//! Standard security handler key derivation
//!
//! Revisions 2 to 4 derive keys from MD5 and RC4 (ISO 32000-1 Algorithms
//! 2 to 7); revision 6 uses the iterated SHA-2/AES hash of ISO 32000-2
//! Algorithm 2.B.

use log::trace;
use sha2::{Digest, Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use crate::crypto::{cbc_encrypt_no_padding, rc4_crypt};
use crate::error::{PDFError, PDFResult};
use crate::pdf::ObjectId;

/// Password padding string
pub const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Salt appended when deriving AES-128 object keys
const AES_SALT: &[u8; 4] = b"sAlT";

/// Revision 6 passwords are truncated to this many bytes
pub const MAX_R6_PASSWORD_LEN: usize = 127;

/// Minimum and maximum rounds of Algorithm 2.B
const R6_MIN_ROUNDS: u32 = 64;
const R6_MAX_ROUNDS: u32 = 96;

/// Truncate or pad a password to 32 bytes with `PADDING`
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

fn check_key_length(key_length: usize) -> PDFResult<()> {
    if !(5..=16).contains(&key_length) {
        return Err(PDFError::InvalidKeyLength {
            expected: 16,
            found: key_length,
        });
    }
    Ok(())
}

/// Algorithm 2: file key from a user password
///
/// `key_length` is in bytes. For revision 2 only 5 is meaningful.
pub fn compute_encryption_key(
    password: &[u8],
    owner_value: &[u8],
    permissions: i32,
    file_id: &[u8],
    revision: u8,
    key_length: usize,
    encrypt_metadata: bool,
) -> PDFResult<Zeroizing<Vec<u8>>> {
    check_key_length(key_length)?;
    if !(2..=4).contains(&revision) {
        return Err(PDFError::UnsupportedRevision(revision));
    }

    let mut context = md5::Context::new();
    context.consume(pad_password(password));
    context.consume(owner_value);
    context.consume(permissions.to_le_bytes());
    context.consume(file_id);
    if revision >= 4 && !encrypt_metadata {
        context.consume([0xFF; 4]);
    }
    let mut hash = Zeroizing::new(context.finalize().0.to_vec());

    if revision >= 3 {
        for _ in 0..50 {
            *hash = md5::compute(&hash[..key_length]).0.to_vec();
        }
    }

    let length = if revision == 2 { 5 } else { key_length };
    Ok(Zeroizing::new(hash[..length].to_vec()))
}

/// RC4 key derived from the owner password (Algorithm 3, steps a to d)
fn owner_rc4_key(owner_password: &[u8], revision: u8, key_length: usize) -> Zeroizing<Vec<u8>> {
    let mut hash = Zeroizing::new(md5::compute(pad_password(owner_password)).0.to_vec());
    if revision >= 3 {
        for _ in 0..50 {
            *hash = md5::compute(&hash[..]).0.to_vec();
        }
    }
    let length = if revision == 2 { 5 } else { key_length };
    Zeroizing::new(hash[..length].to_vec())
}

fn xor_key(key: &[u8], round: u8) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(key.iter().map(|b| b ^ round).collect())
}

/// Algorithm 3: the `/O` value
///
/// An empty owner password falls back to the user password.
pub fn compute_owner_value(
    owner_password: &[u8],
    user_password: &[u8],
    revision: u8,
    key_length: usize,
) -> PDFResult<Vec<u8>> {
    check_key_length(key_length)?;
    let owner_password = if owner_password.is_empty() {
        user_password
    } else {
        owner_password
    };

    let key = owner_rc4_key(owner_password, revision, key_length);
    let mut value = rc4_crypt(&key, &pad_password(user_password))?;

    if revision >= 3 {
        for round in 1..=19u8 {
            value = rc4_crypt(&xor_key(&key, round), &value)?;
        }
    }

    Ok(value)
}

/// Algorithms 4 and 5: the `/U` value for a file key
///
/// Revision 3 and later produce 16 meaningful bytes followed by 16 zero bytes.
pub fn compute_user_value(key: &[u8], file_id: &[u8], revision: u8) -> PDFResult<Vec<u8>> {
    match revision {
        2 => rc4_crypt(key, &PADDING),
        3 | 4 => {
            let mut context = md5::Context::new();
            context.consume(PADDING);
            context.consume(file_id);
            let mut value = context.finalize().0.to_vec();

            for round in 0..=19u8 {
                value = rc4_crypt(&xor_key(key, round), &value)?;
            }

            value.resize(32, 0);
            Ok(value)
        }
        other => Err(PDFError::UnsupportedRevision(other)),
    }
}

/// Algorithm 7, first half: recover the padded user password from `/O`
pub fn user_password_from_owner(
    owner_password: &[u8],
    owner_value: &[u8],
    revision: u8,
    key_length: usize,
) -> PDFResult<Zeroizing<Vec<u8>>> {
    check_key_length(key_length)?;
    let key = owner_rc4_key(owner_password, revision, key_length);
    let mut value = owner_value.get(..32).unwrap_or(owner_value).to_vec();

    if revision == 2 {
        value = rc4_crypt(&key, &value)?;
    } else {
        for round in (0..=19u8).rev() {
            value = rc4_crypt(&xor_key(&key, round), &value)?;
        }
    }

    Ok(Zeroizing::new(value))
}

/// Compare `/U` values; revision 3+ checks only the first 16 bytes
pub fn user_value_matches(computed: &[u8], stored: &[u8], revision: u8) -> bool {
    let length = if revision == 2 { 32 } else { 16 };
    match (computed.get(..length), stored.get(..length)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Per-object key: MD5 of the file key, object number (3 bytes LE),
/// generation (2 bytes LE) and, for AES, the `sAlT` suffix; truncated to
/// `min(n + 5, 16)` bytes
pub fn object_key(file_key: &[u8], id: ObjectId, aes: bool) -> Zeroizing<Vec<u8>> {
    let mut context = md5::Context::new();
    context.consume(file_key);
    context.consume(&id.number().to_le_bytes()[..3]);
    context.consume(id.generation().to_le_bytes());
    if aes {
        context.consume(AES_SALT);
    }

    let digest = context.finalize();
    let length = (file_key.len() + 5).min(16);
    Zeroizing::new(digest.0[..length].to_vec())
}

/// UTF-8 password truncated to 127 bytes at a character boundary
pub fn prepare_password_r6(password: &str) -> &[u8] {
    if password.len() <= MAX_R6_PASSWORD_LEN {
        return password.as_bytes();
    }
    let mut end = MAX_R6_PASSWORD_LEN;
    while !password.is_char_boundary(end) {
        end -= 1;
    }
    &password.as_bytes()[..end]
}

/// Sum of bytes mod 3; 256 is 1 mod 3, so byte residues simply add
fn bytes_mod_3(input: &[u8]) -> usize {
    input.iter().map(|&b| (b % 3) as usize).sum::<usize>() % 3
}

/// Algorithm 2.B: revision 6 password hash
///
/// `extra` is empty for user computations and the 48-byte `/U` for owner
/// computations. Always returns 32 bytes.
pub fn compute_hash_r6(password: &[u8], salt: &[u8], extra: &[u8]) -> PDFResult<Zeroizing<Vec<u8>>> {
    let password = &password[..password.len().min(MAX_R6_PASSWORD_LEN)];

    let mut hasher = Sha256::new();
    hasher.update(password);
    hasher.update(salt);
    hasher.update(extra);
    let mut k = Zeroizing::new(hasher.finalize().to_vec());

    let mut round: u32 = 0;
    let mut last: u32 = 0;
    while round < R6_MIN_ROUNDS || (last > round - 32 && round < R6_MAX_ROUNDS) {
        let mut block = Zeroizing::new(Vec::with_capacity(password.len() + k.len() + extra.len()));
        block.extend_from_slice(password);
        block.extend_from_slice(&k);
        block.extend_from_slice(extra);
        let k1 = Zeroizing::new(block.repeat(64));

        let e = Zeroizing::new(cbc_encrypt_no_padding(&k[..16], &k[16..32], &k1)?);

        *k = match bytes_mod_3(&e[..16]) {
            0 => Sha256::digest(&e[..]).to_vec(),
            1 => Sha384::digest(&e[..]).to_vec(),
            _ => Sha512::digest(&e[..]).to_vec(),
        };

        last = e[e.len() - 1] as u32;
        round += 1;
    }

    trace!("Algorithm 2.B finished after {} rounds", round);
    k.truncate(32);
    Ok(k)
}

//! The `/Encrypt` dictionary of the standard security handler

use log::warn;

use crate::error::{PDFError, PDFResult};
use crate::pdf::{Dictionary, Object};
use crate::security::Permissions;
use crate::EncryptionAlgorithm;

/// Name of the single crypt filter written for AES documents
pub const STANDARD_CRYPT_FILTER: &str = "StdCF";

/// Typed view of an encryption dictionary
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionDictionary {
    pub filter: String,
    /// `/V`
    pub version: u8,
    /// `/R`
    pub revision: u8,
    /// `/Length` in bits
    pub length_bits: u16,
    /// `/O`
    pub owner_value: Vec<u8>,
    /// `/U`
    pub user_value: Vec<u8>,
    /// `/OE`
    pub owner_encrypted_key: Option<Vec<u8>>,
    /// `/UE`
    pub user_encrypted_key: Option<Vec<u8>>,
    /// `/Perms`
    pub perms: Option<Vec<u8>>,
    /// `/P` exactly as stored; key derivation hashes this value
    pub p: i32,
    pub encrypt_metadata: bool,
    /// `/CFM` of the stream crypt filter
    pub crypt_filter_method: Option<String>,
}

impl EncryptionDictionary {
    /// Read an encryption dictionary
    ///
    /// Only `/Filter /Standard` is supported. `/Length` defaults to 40.
    pub fn from_dict(dict: &Dictionary) -> PDFResult<Self> {
        let filter = dict.get_name("Filter").unwrap_or("Standard").to_string();
        if filter != "Standard" {
            return Err(PDFError::UnsupportedFilter(filter));
        }

        let small = |key: &str| -> PDFResult<u8> {
            let value = dict.require_integer(key)?;
            u8::try_from(value).map_err(|_| PDFError::invalid_dict_value(key, format!("{} out of range", value)))
        };
        let version = small("V")?;
        let revision = small("R")?;

        let length_bits = match dict.get_integer("Length") {
            Some(bits) => u16::try_from(bits)
                .map_err(|_| PDFError::invalid_dict_value("Length", format!("{} out of range", bits)))?,
            None if version == 5 => 256,
            None => 40,
        };

        let p = dict.require_integer("P")?;
        // Some writers store P as the unsigned 32-bit value
        let p = i32::try_from(p)
            .or_else(|_| u32::try_from(p).map(|v| v as i32))
            .map_err(|_| PDFError::invalid_dict_value("P", format!("{} out of range", p)))?;

        let crypt_filter_method = match dict.get_name("StmF") {
            Some("Identity") => Some("None".to_string()),
            Some(name) => dict
                .get_dict("CF")
                .and_then(|cf| cf.get_dict(name))
                .and_then(|filter| filter.get_name("CFM"))
                .map(str::to_string),
            None => None,
        };
        if let (Some(stm), Some(str_f)) = (dict.get_name("StmF"), dict.get_name("StrF")) {
            if stm != str_f {
                warn!("StmF {} differs from StrF {}, using {} for both", stm, str_f, stm);
            }
        }

        let optional = |key: &str| dict.get_string(key).map(<[u8]>::to_vec);

        Ok(Self {
            filter,
            version,
            revision,
            length_bits,
            owner_value: dict.require_string("O")?.to_vec(),
            user_value: dict.require_string("U")?.to_vec(),
            owner_encrypted_key: optional("OE"),
            user_encrypted_key: optional("UE"),
            perms: optional("Perms"),
            p,
            encrypt_metadata: dict.get_bool("EncryptMetadata").unwrap_or(true),
            crypt_filter_method,
        })
    }

    /// Key length in bytes for RC4 and AES-128 derivation
    pub fn key_length(&self) -> PDFResult<usize> {
        if self.length_bits % 8 != 0 || !(40..=128).contains(&self.length_bits) {
            return Err(PDFError::invalid_dict_value(
                "Length",
                format!("{} bits is not a valid key length", self.length_bits),
            ));
        }
        Ok(usize::from(self.length_bits / 8))
    }

    /// Normalized permissions
    pub fn permissions(&self) -> Permissions {
        Permissions::from_value(self.p)
    }

    /// Algorithm named by `V`, `R`, `Length` and the crypt filter
    pub fn algorithm(&self) -> PDFResult<EncryptionAlgorithm> {
        match (self.version, self.revision, self.crypt_filter_method.as_deref()) {
            (1, 2, _) | (2, 2, _) => Ok(EncryptionAlgorithm::RC4_40),
            (_, 3, _) | (4, 4, Some("V2")) if self.length_bits <= 40 => Ok(EncryptionAlgorithm::RC4_40),
            (_, 3, _) | (4, 4, Some("V2")) => Ok(EncryptionAlgorithm::RC4_128),
            (4, 4, Some("AESV2")) => Ok(EncryptionAlgorithm::AES_128),
            (5, 6, _) => Ok(EncryptionAlgorithm::AES_256),
            (v, r, cfm) => Err(PDFError::UnsupportedAlgorithm(format!(
                "V {} R {} CFM {}",
                v,
                r,
                cfm.unwrap_or("None")
            ))),
        }
    }

    /// Dictionary form; strings are written as hex
    pub fn to_dict(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::name(self.filter.clone()));
        dict.set("V", i64::from(self.version));
        dict.set("R", i64::from(self.revision));
        dict.set("Length", i64::from(self.length_bits));
        dict.set("O", Object::hex_string(self.owner_value.clone()));
        dict.set("U", Object::hex_string(self.user_value.clone()));
        if let Some(oe) = &self.owner_encrypted_key {
            dict.set("OE", Object::hex_string(oe.clone()));
        }
        if let Some(ue) = &self.user_encrypted_key {
            dict.set("UE", Object::hex_string(ue.clone()));
        }
        if let Some(perms) = &self.perms {
            dict.set("Perms", Object::hex_string(perms.clone()));
        }
        dict.set("P", i64::from(self.p));

        if let Some(method) = &self.crypt_filter_method {
            let mut filter = Dictionary::new();
            filter.set("Type", Object::name("CryptFilter"));
            filter.set("AuthEvent", Object::name("DocOpen"));
            filter.set("CFM", Object::name(method.clone()));
            filter.set("Length", i64::from(self.length_bits / 8));

            let mut filters = Dictionary::new();
            filters.set(STANDARD_CRYPT_FILTER, filter);
            dict.set("CF", filters);
            dict.set("StmF", Object::name(STANDARD_CRYPT_FILTER));
            dict.set("StrF", Object::name(STANDARD_CRYPT_FILTER));
        }

        if !self.encrypt_metadata {
            dict.set("EncryptMetadata", false);
        }
        dict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::parse_object_bytes;
    use pretty_assertions::assert_eq;

    fn aes128_dictionary() -> EncryptionDictionary {
        EncryptionDictionary {
            filter: "Standard".to_string(),
            version: 4,
            revision: 4,
            length_bits: 128,
            owner_value: vec![1; 32],
            user_value: vec![2; 32],
            owner_encrypted_key: None,
            user_encrypted_key: None,
            perms: None,
            p: -3904,
            encrypt_metadata: false,
            crypt_filter_method: Some("AESV2".to_string()),
        }
    }

    #[test_log::test]
    fn test_dictionary_round_trip() {
        let dictionary = aes128_dictionary();
        let dict = dictionary.to_dict();

        assert_eq!(dict.get_name("StmF"), Some("StdCF"));
        assert_eq!(dict.get_bool("EncryptMetadata"), Some(false));
        assert_eq!(
            dict.get_dict("CF").and_then(|cf| cf.get_dict("StdCF")).and_then(|f| f.get_integer("Length")),
            Some(16)
        );
        assert_eq!(EncryptionDictionary::from_dict(&dict).unwrap(), dictionary);
        assert_eq!(dictionary.algorithm().unwrap(), EncryptionAlgorithm::AES_128);
    }

    #[test_log::test]
    fn test_parse_rc4_dictionary() {
        let object = parse_object_bytes(
            b"<< /Filter /Standard /V 2 /R 3 /Length 128 /P 4294967292 \
              /O <0000000000000000000000000000000000000000000000000000000000000000> \
              /U (user value) >>",
        )
        .unwrap();
        let dictionary = EncryptionDictionary::from_dict(object.as_dict().unwrap()).unwrap();

        assert_eq!(dictionary.p, -4);
        assert_eq!(dictionary.key_length().unwrap(), 16);
        assert_eq!(dictionary.user_value, b"user value");
        assert!(dictionary.encrypt_metadata);
        assert_eq!(dictionary.algorithm().unwrap(), EncryptionAlgorithm::RC4_128);
    }

    #[test_log::test]
    fn test_length_defaults_to_40() {
        let object = parse_object_bytes(b"<< /Filter /Standard /V 1 /R 2 /P -4 /O <00> /U <00> >>").unwrap();
        let dictionary = EncryptionDictionary::from_dict(object.as_dict().unwrap()).unwrap();
        assert_eq!(dictionary.length_bits, 40);
        assert_eq!(dictionary.algorithm().unwrap(), EncryptionAlgorithm::RC4_40);
    }

    #[test_log::test]
    fn test_rejects_other_filters() {
        let object = parse_object_bytes(b"<< /Filter /Adobe.PubSec /V 4 /R 4 /P -4 >>").unwrap();
        assert!(matches!(
            EncryptionDictionary::from_dict(object.as_dict().unwrap()),
            Err(PDFError::UnsupportedFilter(ref f)) if f == "Adobe.PubSec"
        ));

        let missing = parse_object_bytes(b"<< /Filter /Standard /V 2 /R 3 /P -4 /U <00> >>").unwrap();
        assert!(EncryptionDictionary::from_dict(missing.as_dict().unwrap()).is_err());
    }
}

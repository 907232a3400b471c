//! PDF dictionary implementation

use indexmap::IndexMap;
use crate::error::{PDFError, PDFResult};
use super::object::{encode_name, Name, Object, ObjectId};

/// PDF dictionary object
///
/// Keys are decoded names without the leading slash, looked up by their
/// text. Insertion order is kept so that a parsed dictionary writes back in
/// its original order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: IndexMap<Name, Object>,
}

impl Dictionary {
    /// Create new dictionary
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Get value by key
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&Object> {
        self.entries.get(key.as_ref())
    }

    /// Get mutable value by key
    pub fn get_mut(&mut self, key: impl AsRef<[u8]>) -> Option<&mut Object> {
        self.entries.get_mut(key.as_ref())
    }

    /// Get value or a missing-entry error
    pub fn require(&self, key: &str) -> PDFResult<&Object> {
        self.get(key)
            .ok_or_else(|| PDFError::MissingDictionaryEntry(key.to_string()))
    }

    /// Check whether key is present
    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.entries.contains_key(key.as_ref())
    }

    /// Get integer value
    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Object::as_i64)
    }

    /// Get boolean value
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Object::as_bool)
    }

    /// Get string bytes
    pub fn get_string(&self, key: &str) -> Option<&[u8]> {
        self.get(key).and_then(Object::as_bytes)
    }

    /// Get name value
    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Object::as_name)
    }

    /// Get reference value
    pub fn get_reference(&self, key: &str) -> Option<ObjectId> {
        self.get(key).and_then(Object::as_reference)
    }

    /// Get nested dictionary value
    pub fn get_dict(&self, key: &str) -> Option<&Dictionary> {
        match self.get(key) {
            Some(Object::Dictionary(d)) => Some(d),
            _ => None,
        }
    }

    /// Get array value
    pub fn get_array(&self, key: &str) -> Option<&Vec<Object>> {
        self.get(key).and_then(Object::as_array)
    }

    /// Integer value or a typed error
    pub fn require_integer(&self, key: &str) -> PDFResult<i64> {
        let value = self.require(key)?;
        value.as_i64().ok_or_else(|| {
            PDFError::invalid_dict_value(key, format!("expected integer, found {}", value.type_name()))
        })
    }

    /// String bytes or a typed error
    pub fn require_string(&self, key: &str) -> PDFResult<&[u8]> {
        let value = self.require(key)?;
        value.as_bytes().ok_or_else(|| {
            PDFError::invalid_dict_value(key, format!("expected string, found {}", value.type_name()))
        })
    }

    /// Set value, replacing any previous one in place
    pub fn set(&mut self, key: impl Into<Name>, value: impl Into<Object>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Remove entry, preserving the order of the rest
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> Option<Object> {
        self.entries.shift_remove(key.as_ref())
    }

    /// Check `/Type` against a name
    pub fn has_type(&self, type_name: &str) -> bool {
        self.get_name("Type") == Some(type_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Object)> {
        self.entries.iter()
    }

    /// Iterate entries mutably in insertion order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Name, &mut Object)> {
        self.entries.iter_mut()
    }

    /// Write dictionary as `<< /Key value ... >>`
    pub fn write_to(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(b"<<");
        for (key, value) in &self.entries {
            output.push(b' ');
            output.extend_from_slice(&encode_name(key));
            output.push(b' ');
            value.write_to(output);
        }
        output.extend_from_slice(b" >>");
    }
}

impl<K: Into<Name>> FromIterator<(K, Object)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, Object)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Name, &'a Object);
    type IntoIter = indexmap::map::Iter<'a, Name, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dictionary_accessors() {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("Example"));
        dict.set("IntItem", 12);
        dict.set("StringItem", Object::string(b"test".to_vec()));
        dict.set("Ref", ObjectId::new(1, 0));

        assert!(dict.has_type("Example"));
        assert_eq!(dict.get_integer("IntItem"), Some(12));
        assert_eq!(dict.get_string("StringItem"), Some(&b"test"[..]));
        assert_eq!(dict.get_reference("Ref"), Some(ObjectId::new(1, 0)));
        assert_eq!(dict.get_name("IntItem"), None);
    }

    #[test]
    fn test_required_entries() {
        let mut dict = Dictionary::new();
        dict.set("P", Object::name("Wrong"));

        assert!(matches!(dict.require("O"), Err(PDFError::MissingDictionaryEntry(k)) if k == "O"));
        assert!(matches!(
            dict.require_integer("P"),
            Err(PDFError::InvalidDictionaryValue { .. })
        ));
    }

    #[test]
    fn test_order_preserved_on_write() {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("Catalog"));
        dict.set("Pages", ObjectId::new(2, 0));
        dict.set("Lang", Object::string(b"en".to_vec()));
        // Replacing keeps position
        dict.set("Type", Object::name("Catalog"));

        let mut out = Vec::new();
        dict.write_to(&mut out);
        assert_eq!(out, b"<< /Type /Catalog /Pages 2 0 R /Lang (en) >>".to_vec());

        dict.remove("Pages");
        let mut out = Vec::new();
        dict.write_to(&mut out);
        assert_eq!(out, b"<< /Type /Catalog /Lang (en) >>".to_vec());
    }

    #[test]
    fn test_nested_dictionary_write() {
        let inner: Dictionary = vec![("Key2", Object::integer(123))].into_iter().collect();
        let mut dict = Dictionary::new();
        dict.set("Nested", inner);

        let mut out = Vec::new();
        dict.write_to(&mut out);
        assert_eq!(out, b"<< /Nested << /Key2 123 >> >>".to_vec());
    }
}

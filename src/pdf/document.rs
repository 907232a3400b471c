//! Object store: indirect objects, trailer metadata and lazy loading

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, trace, warn};
use once_cell::unsync::OnceCell;

use crate::error::{PDFError, PDFResult};
use super::parser::{parse_indirect_object, PDFParser};
use super::{Dictionary, Object, ObjectId, XRefTable};

static NULL: Object = Object::Null;

/// Version written for freshly built documents
pub const DEFAULT_VERSION: &str = "1.4";

/// Trailer metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trailer {
    /// Document catalog
    pub root: Option<ObjectId>,
    /// Document information dictionary
    pub info: Option<ObjectId>,
    /// Encryption dictionary, present only for encrypted documents
    pub encrypt: Option<ObjectId>,
    /// File identifier pair; empty when the file carries none
    pub id: Vec<Vec<u8>>,
    /// `/Size` as read; the writer recomputes it
    pub size: u32,
}

impl Trailer {
    fn from_dict(dict: &Dictionary) -> PDFResult<Self> {
        let reference = |key: &str| -> PDFResult<Option<ObjectId>> {
            match dict.get(key) {
                None | Some(Object::Null) => Ok(None),
                Some(Object::Reference(id)) => Ok(Some(*id)),
                Some(other) => Err(PDFError::invalid_dict_value(
                    key,
                    format!("expected reference, found {}", other.type_name()),
                )),
            }
        };

        let id = match dict.get_array("ID") {
            Some(items) => items
                .iter()
                .filter_map(|item| item.as_bytes().map(<[u8]>::to_vec))
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            root: reference("Root")?,
            info: reference("Info")?,
            encrypt: match dict.get("Encrypt") {
                // Direct dictionaries are lifted into objects by the caller
                Some(Object::Dictionary(_)) => None,
                _ => reference("Encrypt")?,
            },
            id,
            size: dict
                .get_integer("Size")
                .and_then(|s| u32::try_from(s).ok())
                .unwrap_or(0),
        })
    }

    /// First element of the file identifier
    pub fn file_id(&self) -> Option<&[u8]> {
        self.id.first().map(Vec::as_slice)
    }

    /// Trailer dictionary with the given `/Size`
    pub fn to_dict(&self, size: u32) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Size", size);
        if let Some(root) = self.root {
            dict.set("Root", root);
        }
        if let Some(info) = self.info {
            dict.set("Info", info);
        }
        if let Some(encrypt) = self.encrypt {
            dict.set("Encrypt", encrypt);
        }
        if !self.id.is_empty() {
            let ids = self.id.iter().map(|id| Object::hex_string(id.clone())).collect::<Vec<_>>();
            dict.set("ID", ids);
        }
        dict
    }
}

/// Storage for one indirect object; parsed objects fill the cell on first access
#[derive(Debug, Clone)]
struct Slot {
    generation: u16,
    offset: Option<usize>,
    cell: OnceCell<Object>,
}

impl Slot {
    fn loaded(generation: u16, object: Object) -> Self {
        Self {
            generation,
            offset: None,
            cell: OnceCell::with_value(object),
        }
    }
}

/// PDF document: every indirect object plus the trailer
///
/// References between objects are plain identities looked up here, so
/// cyclic structures such as `/Parent` back-pointers need no special care.
#[derive(Debug, Clone)]
pub struct Document {
    version: String,
    objects: IndexMap<u32, Slot>,
    trailer: Trailer,
    xref: XRefTable,
    source: Vec<u8>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            objects: IndexMap::new(),
            trailer: Trailer::default(),
            xref: XRefTable::new(),
            source: Vec::new(),
        }
    }

    /// Parse a document from bytes
    pub fn load(data: Vec<u8>) -> PDFResult<Self> {
        PDFParser::new().parse(data)
    }

    /// Read and parse a document from disk
    pub fn load_file(path: impl AsRef<Path>) -> PDFResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| PDFError::io(path, e))?;
        Self::load(data)
    }

    pub(crate) fn from_parsed(
        version: String,
        source: Vec<u8>,
        xref: XRefTable,
        trailer_dict: &Dictionary,
    ) -> PDFResult<Self> {
        let mut objects = IndexMap::new();
        for (number, entry) in xref.in_use() {
            if number == 0 {
                warn!("Ignoring in-use xref entry for object 0");
                continue;
            }
            objects.insert(
                number,
                Slot {
                    generation: entry.generation,
                    offset: Some(entry.offset),
                    cell: OnceCell::new(),
                },
            );
        }

        let mut document = Self {
            version,
            objects,
            trailer: Trailer::from_dict(trailer_dict)?,
            xref,
            source,
        };

        if let Some(Object::Dictionary(encrypt)) = trailer_dict.get("Encrypt") {
            debug!("Lifting direct /Encrypt dictionary into an indirect object");
            let id = document.add_object(encrypt.clone());
            document.trailer.encrypt = Some(id);
        }

        Ok(document)
    }

    /// PDF version from the header
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    /// Raise the version to at least `minimum`; never lowers it
    pub fn ensure_min_version(&mut self, minimum: &str) {
        if version_key(&self.version) < version_key(minimum) {
            debug!("Raising PDF version {} to {}", self.version, minimum);
            self.version = minimum.to_string();
        }
    }

    /// Cross-reference table the document was parsed from; empty when built fresh
    pub fn xref(&self) -> &XRefTable {
        &self.xref
    }

    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    pub fn trailer_mut(&mut self) -> &mut Trailer {
        &mut self.trailer
    }

    /// Check for an `/Encrypt` entry in the trailer
    pub fn is_encrypted(&self) -> bool {
        self.trailer.encrypt.is_some()
    }

    /// Number of indirect objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Identities in store order
    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects
            .iter()
            .map(|(&number, slot)| ObjectId::new(number, slot.generation))
            .collect()
    }

    /// Highest object number in use, 0 for an empty store
    pub fn max_object_number(&self) -> u32 {
        self.objects.keys().copied().max().unwrap_or(0)
    }

    /// Identity the next `add_object` will use
    pub fn next_object_id(&self) -> ObjectId {
        ObjectId::new(self.max_object_number() + 1, 0)
    }

    /// Add an object under the next free number, generation 0
    pub fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        let id = self.next_object_id();
        self.objects.insert(id.number(), Slot::loaded(0, object.into()));
        trace!("Added object {}", id);
        id
    }

    /// Insert or replace the object with this identity
    pub fn insert_object(&mut self, id: ObjectId, object: impl Into<Object>) {
        self.objects
            .insert(id.number(), Slot::loaded(id.generation(), object.into()));
    }

    /// Remove an object, returning it if it was loaded
    pub fn remove_object(&mut self, id: ObjectId) -> Option<Object> {
        match self.objects.get(&id.number()) {
            Some(slot) if slot.generation == id.generation() => {}
            _ => return None,
        }
        self.objects
            .shift_remove(&id.number())
            .and_then(|slot| slot.cell.into_inner())
    }

    /// Get an object, parsing it on first access
    ///
    /// Unknown identities, generation mismatches, offsets outside the file
    /// and objects whose header names another identity are all reported as
    /// `ObjectNotFound`.
    pub fn get_object(&self, id: ObjectId) -> PDFResult<&Object> {
        let slot = self
            .objects
            .get(&id.number())
            .filter(|slot| slot.generation == id.generation())
            .ok_or(PDFError::ObjectNotFound(id))?;

        slot.cell.get_or_try_init(|| self.read_object(id, slot.offset))
    }

    /// Mutable access, parsing on first access
    pub fn get_object_mut(&mut self, id: ObjectId) -> PDFResult<&mut Object> {
        self.get_object(id)?;
        self.objects
            .get_mut(&id.number())
            .and_then(|slot| slot.cell.get_mut())
            .ok_or(PDFError::ObjectNotFound(id))
    }

    fn read_object(&self, id: ObjectId, offset: Option<usize>) -> PDFResult<Object> {
        let offset = match offset {
            Some(offset) if offset > 0 && offset < self.source.len() => offset,
            _ => {
                warn!("Object {} has no readable offset ({:?})", id, offset);
                return Err(PDFError::ObjectNotFound(id));
            }
        };

        let (found, object) =
            parse_indirect_object(&self.source, offset, &|length_id| self.read_length(length_id))?;
        if found != id {
            warn!("Offset {} holds object {}, expected {}", offset, found, id);
            return Err(PDFError::ObjectNotFound(id));
        }
        Ok(object)
    }

    /// Integer value of an indirect `/Length`, read without touching the cache
    fn read_length(&self, id: ObjectId) -> Option<usize> {
        let slot = self.objects.get(&id.number())?;
        let value = match slot.cell.get() {
            Some(object) => object.as_i64(),
            None => {
                let offset = slot.offset.filter(|o| *o < self.source.len())?;
                parse_indirect_object(&self.source, offset, &|_| None)
                    .ok()
                    .and_then(|(_, object)| object.as_i64())
            }
        };
        value.and_then(|v| usize::try_from(v).ok())
    }

    /// Follow one Reference hop
    ///
    /// Non-references are returned as-is. A reference to a missing object
    /// resolves to `null`; any other failure propagates.
    pub fn resolve<'a>(&'a self, object: &'a Object) -> PDFResult<&'a Object> {
        match object {
            Object::Reference(id) => self.get_or_null(*id),
            other => Ok(other),
        }
    }

    /// Object by identity, `null` when it does not exist
    pub fn get_or_null(&self, id: ObjectId) -> PDFResult<&Object> {
        match self.get_object(id) {
            Ok(target) => Ok(target),
            Err(PDFError::ObjectNotFound(_)) => {
                warn!("Reference {} points to a missing object, using null", id);
                Ok(&NULL)
            }
            Err(e) => Err(e),
        }
    }

    /// Document catalog
    pub fn catalog(&self) -> PDFResult<&Dictionary> {
        let root = self
            .trailer
            .root
            .ok_or_else(|| PDFError::MissingDictionaryEntry("Root".to_string()))?;
        self.get_object(root)?.expect_dict()
    }

    /// Document information dictionary, if any
    pub fn info(&self) -> PDFResult<Option<&Dictionary>> {
        match self.trailer.info {
            Some(id) => match self.get_or_null(id)? {
                Object::Null => Ok(None),
                object => object.expect_dict().map(Some),
            },
            None => Ok(None),
        }
    }

    /// Page objects in document order
    ///
    /// The tree walk keeps a visited set, so a `/Kids` entry pointing back up
    /// the tree is skipped instead of looping.
    pub fn pages(&self) -> PDFResult<Vec<ObjectId>> {
        let root = match self.catalog()?.get("Pages") {
            Some(Object::Reference(id)) => *id,
            Some(other) => {
                return Err(PDFError::invalid_dict_value(
                    "Pages",
                    format!("expected reference, found {}", other.type_name()),
                ))
            }
            None => return Err(PDFError::MissingDictionaryEntry("Pages".to_string())),
        };

        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                warn!("Page tree revisits {}, skipping", id);
                continue;
            }

            let node = match self.get_or_null(id)? {
                Object::Null => continue,
                object => object.expect_dict()?,
            };

            let is_page = node.has_type("Page") || (!node.has_type("Pages") && !node.contains_key("Kids"));
            if is_page {
                pages.push(id);
                continue;
            }

            if let Some(kids) = node.get_array("Kids") {
                // Reverse so the first kid is visited first
                for kid in kids.iter().rev() {
                    match kid.as_reference() {
                        Some(kid) => stack.push(kid),
                        None => warn!("Ignoring non-reference /Kids entry in {}", id),
                    }
                }
            }
        }

        Ok(pages)
    }

    /// Number of pages
    pub fn page_count(&self) -> PDFResult<usize> {
        self.pages().map(|pages| pages.len())
    }

    /// Page dictionary by zero-based index
    pub fn get_page(&self, index: usize) -> PDFResult<&Dictionary> {
        let pages = self.pages()?;
        let id = pages.get(index).copied().ok_or_else(|| {
            PDFError::InvalidState(format!("page {} out of range ({} pages)", index, pages.len()))
        })?;
        self.get_object(id)?.expect_dict()
    }

    /// Parse every object now, dropping those that cannot be found
    ///
    /// Structural errors in an object still fail the whole call.
    pub fn load_all(&mut self) -> PDFResult<()> {
        let mut missing = Vec::new();
        for id in self.object_ids() {
            match self.get_object(id) {
                Ok(_) => {}
                Err(PDFError::ObjectNotFound(_)) => missing.push(id),
                Err(e) => return Err(e),
            }
        }

        for id in missing {
            warn!("Dropping unreadable object {}", id);
            self.objects.shift_remove(&id.number());
        }
        debug!("Loaded {} objects", self.objects.len());
        Ok(())
    }

    /// FlateDecode every loaded, unfiltered stream where that saves space
    ///
    /// Returns how many streams were compressed.
    pub fn compress_streams(&mut self) -> PDFResult<usize> {
        let mut count = 0;
        for slot in self.objects.values_mut() {
            if let Some(Object::Stream(stream)) = slot.cell.get_mut() {
                if stream.compress()? {
                    count += 1;
                }
            }
        }
        trace!("Compressed {} streams", count);
        Ok(count)
    }

    /// Renumber objects densely from 1 in ascending order, generation 0
    ///
    /// Every Reference in every object and in the trailer is rewritten;
    /// references to objects that do not exist become `null`. Returns the
    /// old-to-new mapping.
    pub fn renumber_objects(&mut self) -> PDFResult<BTreeMap<ObjectId, ObjectId>> {
        self.load_all()?;

        let mut old_ids = self.object_ids();
        old_ids.sort();
        let mapping: BTreeMap<ObjectId, ObjectId> = old_ids
            .iter()
            .zip(1u32..)
            .map(|(&old, new)| (old, ObjectId::new(new, 0)))
            .collect();

        let mut renumbered = IndexMap::with_capacity(self.objects.len());
        for old in old_ids {
            if let Some(slot) = self.objects.shift_remove(&old.number()) {
                let mut object = slot.cell.into_inner().unwrap_or_default();
                remap_references(&mut object, &mapping);
                renumbered.insert(mapping[&old].number(), Slot::loaded(0, object));
            }
        }
        self.objects = renumbered;

        let remap = |id: Option<ObjectId>| id.and_then(|id| mapping.get(&id).copied());
        self.trailer.root = remap(self.trailer.root);
        self.trailer.info = remap(self.trailer.info);
        self.trailer.encrypt = remap(self.trailer.encrypt);

        debug!("Renumbered {} objects", mapping.len());
        Ok(mapping)
    }
}

fn remap_references(object: &mut Object, mapping: &BTreeMap<ObjectId, ObjectId>) {
    match object {
        Object::Reference(id) => match mapping.get(id).copied() {
            Some(new) => *id = new,
            None => {
                warn!("Dangling reference {} replaced by null", id);
                *object = Object::Null;
            }
        },
        Object::Array(items) => items.iter_mut().for_each(|item| remap_references(item, mapping)),
        Object::Dictionary(dict) => dict
            .iter_mut()
            .for_each(|(_, value)| remap_references(value, mapping)),
        Object::Stream(stream) => stream
            .dict_mut()
            .iter_mut()
            .for_each(|(_, value)| remap_references(value, mapping)),
        _ => {}
    }
}

/// `major.minor` as a comparable pair; unparsable versions sort first
fn version_key(version: &str) -> (u32, u32) {
    version
        .split_once('.')
        .and_then(|(major, minor)| Some((major.parse().ok()?, minor.parse().ok()?)))
        .unwrap_or((0, 0))
}

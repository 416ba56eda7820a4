//! Indirect object table.
//!
//! Maps object numbers to [`IndirectObject`] slots. Slots loaded from a file
//! start unresolved and are parsed from the backing bytes on first access;
//! the parsed value is then kept on the slot. Deleted slots are threaded
//! into a free chain whose head lives in the table and whose last link
//! points back to object 0.

use super::{Dictionary, Object, Stream, StreamKind};
use crate::error::{PdfError, Result};
use crate::io::object_stream::ObjectStream;
use crate::io::parser::{ObjectResolver, Parser};
use crate::notification::{NotificationCollection, NotificationType};
use crate::types::ObjectId;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TABLE_UID: AtomicU64 = AtomicU64::new(1);

/// Where an object lives, as recorded by a cross-reference entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// Deleted; `next` links the free chain, `generation` is the one the
    /// slot gets when reused
    Free { next: u32, generation: u16 },
    /// Standalone `N G obj` at a byte offset
    InUse { offset: u64, generation: u16 },
    /// Packed at `index` inside object stream `stream`
    Compressed { stream: u32, index: u32 },
}

impl Location {
    /// Generation carried by the entry; packed objects are always 0
    pub fn generation(&self) -> u16 {
        match *self {
            Location::Free { generation, .. } | Location::InUse { generation, .. } => generation,
            Location::Compressed { .. } => 0,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, Location::Free { .. })
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, Location::Compressed { .. })
    }
}

/// One slot of the table
#[derive(Debug, Clone)]
pub struct IndirectObject {
    id: ObjectId,
    value: Option<Object>,
    dirty: bool,
    original: bool,
    location: Location,
}

impl IndirectObject {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Value, if resolved or created in memory
    pub fn value(&self) -> Option<&Object> {
        self.value.as_ref()
    }

    /// Changed since load (or never written)
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Came from the loaded file
    pub fn is_original(&self) -> bool {
        self.original
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn is_free(&self) -> bool {
        self.location.is_free()
    }
}

/// Registry of the indirect objects of one document
#[derive(Debug)]
pub struct ObjectTable {
    uid: u64,
    source: Option<Arc<[u8]>>,
    entries: BTreeMap<u32, IndirectObject>,
    free_head: u32,
    free_chain_changed: bool,
    next_number: u32,
    object_streams: HashMap<u32, ObjectStream>,
    xref_streams: BTreeSet<u32>,
    resolving: HashSet<u32>,
    failsafe: bool,
    notifications: NotificationCollection,
}

/// A clone is a separate session: it gets its own uid, so objects cloned
/// between the two are deep-copied.
impl Clone for ObjectTable {
    fn clone(&self) -> Self {
        ObjectTable {
            uid: NEXT_TABLE_UID.fetch_add(1, Ordering::Relaxed),
            source: self.source.clone(),
            entries: self.entries.clone(),
            free_head: self.free_head,
            free_chain_changed: self.free_chain_changed,
            next_number: self.next_number,
            object_streams: self.object_streams.clone(),
            xref_streams: self.xref_streams.clone(),
            resolving: HashSet::new(),
            failsafe: self.failsafe,
            notifications: self.notifications.clone(),
        }
    }
}

impl Default for ObjectTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectTable {
    /// Empty table with no backing bytes
    pub fn new() -> Self {
        ObjectTable {
            uid: NEXT_TABLE_UID.fetch_add(1, Ordering::Relaxed),
            source: None,
            entries: BTreeMap::new(),
            free_head: 0,
            free_chain_changed: false,
            next_number: 1,
            object_streams: HashMap::new(),
            xref_streams: BTreeSet::new(),
            resolving: HashSet::new(),
            failsafe: false,
            notifications: NotificationCollection::new(),
        }
    }

    /// Table over loaded bytes. `locations` is the merged cross-reference
    /// data; `size` the trailer `/Size`. Free slots are re-threaded in
    /// ascending order.
    pub fn from_source(
        source: Arc<[u8]>,
        locations: BTreeMap<u32, Location>,
        size: u32,
        failsafe: bool,
    ) -> Self {
        let mut table = ObjectTable::new();
        table.source = Some(source);
        table.failsafe = failsafe;

        for (number, location) in locations {
            if number == 0 {
                continue;
            }
            table.entries.insert(
                number,
                IndirectObject {
                    id: ObjectId::new(number, location.generation()),
                    value: None,
                    dirty: false,
                    original: true,
                    location,
                },
            );
        }

        let last = table.entries.keys().next_back().copied().unwrap_or(0);
        table.next_number = size.max(last.saturating_add(1)).max(1);
        table.relink_free_chain();
        table.free_chain_changed = false;
        table
    }

    fn relink_free_chain(&mut self) {
        let free: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_free())
            .map(|(&n, _)| n)
            .collect();
        self.free_head = free.first().copied().unwrap_or(0);
        for (i, number) in free.iter().enumerate() {
            let next = free.get(i + 1).copied().unwrap_or(0);
            if let Some(entry) = self.entries.get_mut(number) {
                let generation = entry.location.generation();
                entry.location = Location::Free { next, generation };
            }
        }
    }

    /// Identity of this editing session; every table, clones included, has
    /// its own
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// Bytes the table was loaded from
    pub fn source(&self) -> Option<&[u8]> {
        self.source.as_deref()
    }

    /// One past the highest object number in use
    pub fn size(&self) -> u32 {
        self.next_number
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, number: u32) -> Option<&IndirectObject> {
        self.entries.get(&number)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &IndirectObject)> {
        self.entries.iter()
    }

    pub fn location(&self, number: u32) -> Option<Location> {
        self.entries.get(&number).map(|e| e.location)
    }

    pub fn is_dirty(&self, number: u32) -> bool {
        self.entries.get(&number).map(|e| e.dirty).unwrap_or(false)
    }

    /// Object number at the head of the free chain (0 when empty)
    pub fn free_head(&self) -> u32 {
        self.free_head
    }

    /// Whether deletions or slot reuse changed the free chain since load
    pub fn free_chain_changed(&self) -> bool {
        self.free_chain_changed
    }

    /// Free object numbers in chain order, starting at the head
    pub fn free_numbers(&self) -> Vec<u32> {
        let mut numbers = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.free_head;
        while current != 0 && seen.insert(current) {
            match self.entries.get(&current).map(|e| e.location) {
                Some(Location::Free { next, .. }) => {
                    numbers.push(current);
                    current = next;
                }
                _ => break,
            }
        }
        numbers
    }

    /// Objects that held cross-reference streams in the loaded file
    pub fn xref_streams(&self) -> &BTreeSet<u32> {
        &self.xref_streams
    }

    pub(crate) fn set_xref_streams(&mut self, numbers: BTreeSet<u32>) {
        self.xref_streams = numbers;
    }

    /// Recoveries made while resolving objects
    pub fn notifications(&self) -> &NotificationCollection {
        &self.notifications
    }

    pub(crate) fn notifications_mut(&mut self) -> &mut NotificationCollection {
        &mut self.notifications
    }

    fn live_entry(&self, id: ObjectId) -> Result<&IndirectObject> {
        match self.entries.get(&id.number) {
            Some(entry) if !entry.is_free() && entry.id == id => Ok(entry),
            _ => Err(PdfError::contract(format!("object {} does not exist", id))),
        }
    }

    fn live_entry_mut(&mut self, id: ObjectId) -> Result<&mut IndirectObject> {
        match self.entries.get_mut(&id.number) {
            Some(entry) if !entry.is_free() && entry.id == id => Ok(entry),
            _ => Err(PdfError::contract(format!("object {} does not exist", id))),
        }
    }

    // ------------------------------------------------------------------
    // Registration and resolution
    // ------------------------------------------------------------------

    /// Add a new indirect object, reusing a free slot when one is
    /// available.
    pub fn register(&mut self, value: impl Into<Object>) -> ObjectId {
        let id = self.allocate();
        self.entries.insert(
            id.number,
            IndirectObject {
                id,
                value: Some(value.into()),
                dirty: true,
                original: false,
                location: Location::InUse {
                    offset: 0,
                    generation: id.generation,
                },
            },
        );
        tracing::trace!(%id, "registered object");
        id
    }

    fn allocate(&mut self) -> ObjectId {
        let mut previous: Option<u32> = None;
        let mut current = self.free_head;
        let mut steps = 0;
        while current != 0 && steps <= self.entries.len() {
            steps += 1;
            let (next, generation) = match self.entries.get(&current).map(|e| e.location) {
                Some(Location::Free { next, generation }) => (next, generation),
                _ => break,
            };
            if generation < ObjectId::MAX_GENERATION {
                match previous {
                    None => self.free_head = next,
                    Some(p) => {
                        if let Some(entry) = self.entries.get_mut(&p) {
                            let generation = entry.location.generation();
                            entry.location = Location::Free { next, generation };
                        }
                    }
                }
                self.free_chain_changed = true;
                return ObjectId::new(current, generation);
            }
            previous = Some(current);
            current = next;
        }

        let number = self.next_number;
        self.next_number += 1;
        ObjectId::new(number, 0)
    }

    /// Resolve a reference. Free slots, unknown numbers and generation
    /// mismatches give `None`.
    pub fn resolve(&mut self, id: ObjectId) -> Result<Option<&Object>> {
        if !self.load(id)? {
            return Ok(None);
        }
        Ok(self.entries.get(&id.number).and_then(|e| e.value.as_ref()))
    }

    /// Resolve for editing; the object is marked dirty.
    pub fn resolve_mut(&mut self, id: ObjectId) -> Result<Option<&mut Object>> {
        if !self.load(id)? {
            return Ok(None);
        }
        Ok(self.entries.get_mut(&id.number).and_then(|e| {
            e.dirty = true;
            e.value.as_mut()
        }))
    }

    /// Follow a reference, or hand back a direct value unchanged
    pub fn deref<'a>(&'a mut self, object: &'a Object) -> Result<Option<&'a Object>> {
        match object {
            Object::Reference(id) => self.resolve(*id),
            direct => Ok(Some(direct)),
        }
    }

    /// Make sure the value of `id` is cached. Returns false when `id` does
    /// not designate a live object.
    fn load(&mut self, id: ObjectId) -> Result<bool> {
        let (location, cached) = match self.entries.get(&id.number) {
            Some(entry) if !entry.is_free() && entry.id == id => {
                (entry.location, entry.value.is_some())
            }
            _ => return Ok(false),
        };
        if cached {
            return Ok(true);
        }

        if !self.resolving.insert(id.number) {
            return Err(PdfError::contract(format!(
                "resolution cycle while loading object {}",
                id
            )));
        }
        let loaded = match location {
            Location::InUse { offset, .. } => self.parse_at(id, offset),
            Location::Compressed { stream, index } => self.parse_packed(id, stream, index),
            Location::Free { .. } => Ok(Object::Null),
        };
        self.resolving.remove(&id.number);
        let value = loaded?;

        tracing::trace!(%id, kind = value.type_name(), "resolved object");
        if let Some(entry) = self.entries.get_mut(&id.number) {
            entry.value = Some(value);
        }
        Ok(true)
    }

    fn parse_at(&mut self, id: ObjectId, offset: u64) -> Result<Object> {
        let source = self
            .source
            .clone()
            .ok_or_else(|| PdfError::contract(format!("object {} has no backing bytes", id)))?;
        let offset = usize::try_from(offset)
            .ok()
            .filter(|&o| o < source.len())
            .ok_or_else(|| {
                PdfError::format(
                    source.len(),
                    format!("object {} offset {} out of range", id, offset),
                )
            })?;

        let failsafe = self.failsafe;
        let mut parser = Parser::at(&source[..], offset)
            .with_resolver(self)
            .with_failsafe(failsafe);
        let (found, value) = parser.parse_indirect_object()?;
        let warnings = parser.take_warnings();
        drop(parser);

        for warning in warnings {
            tracing::warn!("{}", warning);
            self.notifications.notify(NotificationType::Warning, warning);
        }
        if found.number != id.number {
            return Err(PdfError::format(
                offset,
                format!("expected object {}, found {}", id, found),
            ));
        }
        Ok(value)
    }

    fn parse_packed(&mut self, id: ObjectId, stream: u32, index: u32) -> Result<Object> {
        self.ensure_object_stream(stream)?;
        let container = self
            .object_streams
            .get(&stream)
            .ok_or_else(|| PdfError::contract(format!("object stream {} is missing", stream)))?;
        match container.get(index)? {
            Some((number, value)) if number == id.number => Ok(value),
            Some((number, _)) => Err(PdfError::contract(format!(
                "object stream {} entry {} holds object {}, expected {}",
                stream, index, number, id.number
            ))),
            None => Err(PdfError::contract(format!(
                "object stream {} has no entry {}",
                stream, index
            ))),
        }
    }

    fn ensure_object_stream(&mut self, number: u32) -> Result<()> {
        if self.object_streams.contains_key(&number) {
            return Ok(());
        }
        let id = match self.entries.get(&number) {
            Some(entry) if !entry.is_free() => entry.id,
            _ => {
                return Err(PdfError::contract(format!(
                    "object stream {} does not exist",
                    number
                )))
            }
        };
        let container = match self.resolve(id)? {
            Some(Object::Stream(stream)) => ObjectStream::from_stream(number, stream)?,
            Some(other) => {
                return Err(PdfError::contract(format!(
                    "object {} is a {}, not an object stream",
                    id,
                    other.type_name()
                )))
            }
            None => {
                return Err(PdfError::contract(format!(
                    "object stream {} does not exist",
                    number
                )))
            }
        };
        self.object_streams.insert(number, container);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Replace the value of a live object. A packed object leaves its
    /// object stream.
    pub fn set_value(&mut self, id: ObjectId, value: impl Into<Object>) -> Result<()> {
        if let Location::Compressed { stream, .. } = self.live_entry(id)?.location {
            self.leave_object_stream(id, stream)?;
        }
        let entry = self.live_entry_mut(id)?;
        entry.value = Some(value.into());
        entry.dirty = true;
        Ok(())
    }

    /// Flag an object as changed
    pub fn mark_updated(&mut self, id: ObjectId) -> Result<()> {
        self.live_entry_mut(id)?.dirty = true;
        Ok(())
    }

    /// Delete an object. Its slot joins the free chain with a bumped
    /// generation, so older references to it resolve to `None`.
    pub fn delete(&mut self, id: ObjectId) -> Result<()> {
        if id.is_null() {
            return Err(PdfError::contract("object 0 cannot be deleted"));
        }
        let location = self.live_entry(id)?.location;
        if !self.packed_members(id.number).is_empty() {
            return Err(PdfError::contract(format!(
                "object stream {} still has members",
                id
            )));
        }
        if let Location::Compressed { stream, .. } = location {
            self.leave_object_stream(id, stream)?;
        }

        let generation = id.generation.saturating_add(1);
        let head = self.free_head;
        let entry = self.live_entry_mut(id)?;
        entry.value = None;
        entry.dirty = true;
        entry.id = ObjectId::new(id.number, generation);
        entry.location = Location::Free {
            next: head,
            generation,
        };
        self.free_head = id.number;
        self.free_chain_changed = true;
        self.object_streams.remove(&id.number);
        tracing::trace!(%id, "deleted object");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Object streams
    // ------------------------------------------------------------------

    /// Register an empty object stream to pack objects into
    pub fn new_object_stream(&mut self) -> Result<ObjectId> {
        let stream = ObjectStream::build(&[], None)?;
        let id = self.register(stream);
        self.object_streams.insert(id.number, ObjectStream::new(id.number));
        Ok(id)
    }

    /// Numbers of the objects currently packed in `stream`, in index order
    pub fn packed_members(&self, stream: u32) -> Vec<u32> {
        let mut members: Vec<(u32, u32)> = self
            .entries
            .iter()
            .filter_map(|(&n, e)| match e.location {
                Location::Compressed { stream: s, index } if s == stream => Some((index, n)),
                _ => None,
            })
            .collect();
        members.sort_unstable();
        members.into_iter().map(|(_, n)| n).collect()
    }

    /// Move an object into the object stream `container`.
    pub fn compress(&mut self, id: ObjectId, container: ObjectId) -> Result<()> {
        if id == container {
            return Err(PdfError::contract("an object stream cannot contain itself"));
        }
        let location = self.live_entry(id)?.location;
        if let Location::Compressed { stream, .. } = location {
            if stream == container.number {
                return Ok(());
            }
        }
        if id.generation != 0 {
            return Err(PdfError::contract(format!(
                "object {} has a non-zero generation and cannot be packed",
                id
            )));
        }
        match self.resolve(id)? {
            Some(Object::Stream(stream)) => {
                let what = match stream.kind() {
                    StreamKind::XrefStream => "cross-reference stream",
                    StreamKind::ObjectStream => "object stream",
                    StreamKind::Generic => "stream",
                };
                return Err(PdfError::contract(format!(
                    "object {} is a {} and cannot be packed",
                    id, what
                )));
            }
            Some(_) => {}
            None => return Err(PdfError::contract(format!("object {} does not exist", id))),
        }
        match self.resolve(container)? {
            Some(Object::Stream(s)) if s.kind() == StreamKind::ObjectStream => {}
            _ => {
                return Err(PdfError::contract(format!(
                    "object {} is not an object stream",
                    container
                )))
            }
        }
        self.ensure_object_stream(container.number)?;

        if let Location::Compressed { stream, .. } = location {
            self.leave_object_stream(id, stream)?;
        }
        self.materialize_members(container.number)?;
        if let Some(objstm) = self.object_streams.get_mut(&container.number) {
            objstm.insert(id.number)?;
        }
        let index = self.packed_members(container.number).len() as u32;

        let entry = self.live_entry_mut(id)?;
        entry.location = Location::Compressed {
            stream: container.number,
            index,
        };
        entry.dirty = true;
        self.mark_updated(container)?;
        Ok(())
    }

    /// Move a packed object back to standalone storage. Standalone objects
    /// are left as they are.
    pub fn uncompress(&mut self, id: ObjectId) -> Result<()> {
        let stream = match self.live_entry(id)?.location {
            Location::Compressed { stream, .. } => stream,
            _ => return Ok(()),
        };
        self.leave_object_stream(id, stream)?;
        self.live_entry_mut(id)?.dirty = true;
        Ok(())
    }

    /// Take `id` out of its container and give it a standalone location.
    /// The member values are loaded first because inner indices shift.
    fn leave_object_stream(&mut self, id: ObjectId, stream: u32) -> Result<()> {
        self.ensure_object_stream(stream)?;
        self.materialize_members(stream)?;
        if let Some(objstm) = self.object_streams.get_mut(&stream) {
            objstm.remove(id.number)?;
        }
        if let Some(entry) = self.entries.get_mut(&id.number) {
            entry.location = Location::InUse {
                offset: 0,
                generation: id.generation,
            };
        }
        self.renumber(stream);
        if let Some(container) = self.entries.get_mut(&stream) {
            container.dirty = true;
        }
        Ok(())
    }

    fn materialize_members(&mut self, stream: u32) -> Result<()> {
        for number in self.packed_members(stream) {
            if let Some(id) = self.entries.get(&number).map(|e| e.id) {
                self.load(id)?;
            }
        }
        Ok(())
    }

    /// Close the gaps in the inner indices of `stream`
    fn renumber(&mut self, stream: u32) {
        for (index, number) in self.packed_members(stream).into_iter().enumerate() {
            if let Some(entry) = self.entries.get_mut(&number) {
                entry.location = Location::Compressed {
                    stream,
                    index: index as u32,
                };
            }
        }
    }

    // ------------------------------------------------------------------
    // Cloning
    // ------------------------------------------------------------------

    /// Copy the object `id` of `source`, together with everything it
    /// references, into this table. Only a source with this table's own uid
    /// hands back `id` unchanged; any other table, a clone of this one
    /// included, is deep-copied.
    pub fn clone_object(&mut self, source: &mut ObjectTable, id: ObjectId) -> Result<ObjectId> {
        if source.uid == self.uid {
            return Ok(id);
        }
        let mut visited = HashMap::new();
        self.clone_into(source, id, &mut visited)
    }

    fn clone_into(
        &mut self,
        source: &mut ObjectTable,
        id: ObjectId,
        visited: &mut HashMap<u32, ObjectId>,
    ) -> Result<ObjectId> {
        if let Some(&copy) = visited.get(&id.number) {
            return Ok(copy);
        }
        let target = self.register(Object::Null);
        visited.insert(id.number, target);

        let value = match source.resolve(id)? {
            Some(value) => value.clone(),
            None => return Ok(target),
        };
        let copied = self.copy_value(source, value, visited)?;
        self.set_value(target, copied)?;
        Ok(target)
    }

    fn copy_value(
        &mut self,
        source: &mut ObjectTable,
        value: Object,
        visited: &mut HashMap<u32, ObjectId>,
    ) -> Result<Object> {
        Ok(match value {
            Object::Reference(id) => Object::Reference(self.clone_into(source, id, visited)?),
            Object::Array(items) => Object::Array(
                items
                    .into_iter()
                    .map(|item| self.copy_value(source, item, visited))
                    .collect::<Result<_>>()?,
            ),
            Object::Dictionary(dict) => {
                Object::Dictionary(self.copy_dictionary(source, dict, visited)?)
            }
            Object::Stream(stream) => {
                let kind = stream.kind();
                if kind != StreamKind::Generic {
                    return Err(PdfError::unsupported(format!(
                        "cloning a {:?} stream into another document",
                        kind
                    )));
                }
                let dict = self.copy_dictionary(source, stream.dict, visited)?;
                Object::Stream(Stream::from_parts(dict, stream.content))
            }
            scalar => scalar,
        })
    }

    fn copy_dictionary(
        &mut self,
        source: &mut ObjectTable,
        dict: Dictionary,
        visited: &mut HashMap<u32, ObjectId>,
    ) -> Result<Dictionary> {
        let mut copy = Dictionary::new();
        for (key, value) in dict {
            let value = self.copy_value(source, value, visited)?;
            copy.set(key, value);
        }
        Ok(copy)
    }
}

impl ObjectResolver for ObjectTable {
    fn resolve_length(&mut self, id: ObjectId) -> Result<Option<i64>> {
        Ok(match self.resolve(id)? {
            Some(Object::Integer(n)) => Some(*n),
            _ => None,
        })
    }
}

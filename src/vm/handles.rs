// Handle heap: host objects (files, timers, maps, arrays) referenced by opaque ids

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::PathBuf;
use std::time::Instant;

use crate::common::value::{HandleId, Value};

#[derive(Debug)]
pub struct OpenFile {
    pub file: File,
    pub path: PathBuf,
    pub mode: i64,
}

#[derive(Debug)]
pub enum HeapObject {
    File(OpenFile),
    Timer(Instant),
    /// Keys are case-sensitive and iterate in sorted order
    Map(BTreeMap<String, Value>),
    Array(Vec<Value>),
}

impl HeapObject {
    pub fn kind(&self) -> &'static str {
        match self {
            HeapObject::File(_) => "file",
            HeapObject::Timer(_) => "timer",
            HeapObject::Map(_) => "map",
            HeapObject::Array(_) => "array",
        }
    }
}

/// Arena shared by every scope of one VM tree. Handles stay valid until
/// destroyed explicitly; ids are never reused.
#[derive(Debug)]
pub struct HandleTable {
    objects: HashMap<HandleId, HeapObject>,
    next_id: u64,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn add(&mut self, object: HeapObject) -> HandleId {
        let id = HandleId(self.next_id);
        self.next_id += 1;
        self.objects.insert(id, object);
        id
    }

    pub fn get(&self, id: HandleId) -> Option<&HeapObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: HandleId) -> Option<&mut HeapObject> {
        self.objects.get_mut(&id)
    }

    pub fn destroy(&mut self, id: HandleId) -> Option<HeapObject> {
        self.objects.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

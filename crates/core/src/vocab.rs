//! String interning for string columns.
//!
//! A `Vocab` is a bidirectional dictionary between strings and small integer
//! ids. String columns intern every value they store so equal strings share
//! one allocation.

use alloc::sync::Arc;
use alloc::vec::Vec;
use hashbrown::HashMap;

/// Bidirectional `str` <-> `u32` dictionary.
#[derive(Clone, Debug, Default)]
pub struct Vocab {
    ids: HashMap<Arc<str>, u32>,
    strings: Vec<Arc<str>>,
}

impl Vocab {
    /// Creates an empty vocabulary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `s`, returning its id. Repeated calls return the same id.
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&id) = self.ids.get(s) {
            return id;
        }
        let id = self.strings.len() as u32;
        let shared: Arc<str> = Arc::from(s);
        self.strings.push(shared.clone());
        self.ids.insert(shared, id);
        id
    }

    /// Interns `s` and returns the shared string.
    pub fn intern_shared(&mut self, s: &str) -> Arc<str> {
        let id = self.intern(s);
        self.strings[id as usize].clone()
    }

    /// Looks up the id of an already interned string.
    pub fn id_of(&self, s: &str) -> Option<u32> {
        self.ids.get(s).copied()
    }

    /// Returns the string for an id.
    pub fn get(&self, id: u32) -> Option<&Arc<str>> {
        self.strings.get(id as usize)
    }

    /// Number of distinct strings interned.
    #[inline]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns true if nothing has been interned.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

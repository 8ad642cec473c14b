use std::collections::HashMap;
use std::sync::RwLock;

/// Read access to a string <-> id table.
pub trait StringTable {
    /// The string registered under `id`.
    fn to_str(&self, id: u32) -> Option<&str>;
    /// The id of `s`, or `None` if `s` was never registered.
    fn to_id(&self, s: &str) -> Option<u32>;
    /// Number of registered strings.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Assigns ids to strings on first sight.
pub trait TextVectorizer {
    fn find_or_insert(&mut self, key: &str) -> u32;
}

/// Bidirectional string/id dictionary with dense ids starting at 0.
///
/// A `Quark` handed out by shared reference (as [`crate::Model`] does for its
/// labels and attributes) cannot grow; lookups need no locking. Growing it
/// requires `&mut`, or a [`SharedQuark`] when several writers are involved.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Quark {
    v: Vec<String>,
    m: HashMap<String, u32>,
}

impl From<Vec<String>> for Quark {
    fn from(value: Vec<String>) -> Self {
        let mut quark = Self::default();
        for s in &value {
            quark.find_or_insert(s);
        }
        quark
    }
}

impl StringTable for Quark {
    fn to_str(&self, id: u32) -> Option<&str> {
        self.v.get(id as usize).map(|x| x.as_str())
    }

    fn to_id(&self, s: &str) -> Option<u32> {
        self.m.get(s).copied()
    }

    fn len(&self) -> usize {
        self.v.len()
    }
}

impl TextVectorizer for Quark {
    fn find_or_insert(&mut self, key: &str) -> u32 {
        if let Some(&id) = self.m.get(key) {
            return id;
        }
        let id = self.v.len() as u32;
        self.m.insert(key.to_string(), id);
        self.v.push(key.to_string());
        id
    }
}

impl Quark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate over `(id, string)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.v.iter().enumerate().map(|(i, s)| (i as u32, s.as_str()))
    }
}

/// A [`Quark`] that several threads may grow at once.
///
/// Id assignment happens under a write lock, so racing writers that insert
/// the same new string all receive the same id.
#[derive(Debug, Default)]
pub struct SharedQuark {
    inner: RwLock<Quark>,
}

impl SharedQuark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_or_insert(&self, key: &str) -> u32 {
        if let Some(id) = self.to_id(key) {
            return id;
        }
        // another writer may have inserted `key` between the two locks
        let mut quark = self.inner.write().unwrap_or_else(|e| e.into_inner());
        quark.find_or_insert(key)
    }

    pub fn to_id(&self, key: &str) -> Option<u32> {
        let quark = self.inner.read().unwrap_or_else(|e| e.into_inner());
        quark.to_id(key)
    }

    pub fn to_str(&self, id: u32) -> Option<String> {
        let quark = self.inner.read().unwrap_or_else(|e| e.into_inner());
        quark.to_str(id).map(str::to_string)
    }

    pub fn len(&self) -> usize {
        let quark = self.inner.read().unwrap_or_else(|e| e.into_inner());
        quark.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finish the session and hand back the plain dictionary.
    pub fn into_inner(self) -> Quark {
        self.inner.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl From<Quark> for SharedQuark {
    fn from(value: Quark) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }
}

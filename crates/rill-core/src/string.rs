//! Interned, immutable byte strings.
//!
//! Every string in the interpreter passes through the intern table, so
//! two equal literals share one [`StrId`] and value equality reduces to
//! handle identity. Each string carries a precomputed 32-bit FNV-1a hash
//! and a reference count; the table itself holds one retained reference
//! per distinct string, released only when the interpreter tears down.

use std::collections::HashMap;
use std::fmt;

/// An opaque handle to an interned string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct StrId(pub u32);

/// 32-bit FNV-1a.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

struct Interned {
    bytes: Box<[u8]>,
    hash: u32,
    rc: u32,
}

/// The intern table: owns every string and deduplicates by content.
pub struct StringInterner {
    strings: Vec<Interned>,
    /// hash -> candidate ids (collisions resolved by byte comparison).
    buckets: HashMap<u32, Vec<u32>>,
}

impl StringInterner {
    pub fn new() -> Self {
        StringInterner {
            strings: Vec::new(),
            buckets: HashMap::new(),
        }
    }

    /// Intern a byte string, returning the shared handle. The table's
    /// own reference keeps the string alive until teardown; callers that
    /// store the handle retain it separately.
    pub fn intern(&mut self, bytes: &[u8]) -> StrId {
        let hash = fnv1a(bytes);
        if let Some(ids) = self.buckets.get(&hash) {
            for &id in ids {
                if &*self.strings[id as usize].bytes == bytes {
                    return StrId(id);
                }
            }
        }
        let id = self.strings.len() as u32;
        self.strings.push(Interned {
            bytes: bytes.into(),
            hash,
            rc: 1,
        });
        self.buckets.entry(hash).or_default().push(id);
        StrId(id)
    }

    /// Look up an already-interned string without creating one.
    pub fn lookup(&self, bytes: &[u8]) -> Option<StrId> {
        let hash = fnv1a(bytes);
        let ids = self.buckets.get(&hash)?;
        ids.iter()
            .find(|&&id| &*self.strings[id as usize].bytes == bytes)
            .map(|&id| StrId(id))
    }

    pub fn get_bytes(&self, id: StrId) -> &[u8] {
        &self.strings[id.0 as usize].bytes
    }

    /// Lossy UTF-8 view, for diagnostics and display.
    pub fn get_str(&self, id: StrId) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.get_bytes(id))
    }

    pub fn hash(&self, id: StrId) -> u32 {
        self.strings[id.0 as usize].hash
    }

    pub fn retain(&mut self, id: StrId) {
        self.strings[id.0 as usize].rc += 1;
    }

    /// Drop one reference. The table's own reference is the floor; a
    /// release that would go below it indicates an unbalanced caller.
    pub fn release(&mut self, id: StrId) {
        let s = &mut self.strings[id.0 as usize];
        debug_assert!(s.rc > 1, "string released past the intern table's reference");
        if s.rc > 1 {
            s.rc -= 1;
        }
    }

    /// Current reference count (including the table's own).
    pub fn refcount(&self, id: StrId) -> u32 {
        self.strings[id.0 as usize].rc
    }

    /// Number of distinct strings interned.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StringInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringInterner")
            .field("strings", &self.strings.len())
            .finish()
    }
}

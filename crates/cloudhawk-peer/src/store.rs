use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use cloudhawk_frame::{Frame, ResponseKey};
use parking_lot::RwLock;

/// Latest observed response of one family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEntry {
    pub key: ResponseKey,
    /// Frame body: tags followed by data.
    pub body: Bytes,
    /// Complete notification as received.
    pub raw: Bytes,
    pub received_at: DateTime<Utc>,
}

impl ResponseEntry {
    /// Build an entry from a frame that carries both tags.
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        Some(Self {
            key: frame.key()?,
            body: frame.body.clone(),
            raw: frame.raw.clone(),
            received_at: Utc::now(),
        })
    }

    /// Body bytes after the two tags.
    pub fn data(&self) -> &[u8] {
        self.body.get(2..).unwrap_or_default()
    }
}

/// Map from response family to its most recent entry.
///
/// Clones share the same map. Entries are replaced whole, so a reader never
/// observes a partially written entry. Nothing is evicted: an entry stays
/// until a newer response of the same family replaces it, including across
/// reconnects.
#[derive(Debug, Clone, Default)]
pub struct ResponseStore {
    entries: Arc<RwLock<HashMap<ResponseKey, Arc<ResponseEntry>>>>,
}

impl ResponseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `entry`, replacing any previous entry for its key.
    pub fn put(&self, entry: ResponseEntry) -> Option<Arc<ResponseEntry>> {
        self.entries.write().insert(entry.key, Arc::new(entry))
    }

    pub fn get(&self, key: ResponseKey) -> Option<Arc<ResponseEntry>> {
        self.entries.read().get(&key).cloned()
    }

    pub fn contains(&self, key: ResponseKey) -> bool {
        self.entries.read().contains_key(&key)
    }

    /// Stored keys in ascending order.
    pub fn keys(&self) -> Vec<ResponseKey> {
        let mut keys: Vec<_> = self.entries.read().keys().copied().collect();
        keys.sort();
        keys
    }

    /// All entries ordered by key.
    pub fn entries(&self) -> Vec<Arc<ResponseEntry>> {
        let mut entries: Vec<_> = self.entries.read().values().cloned().collect();
        entries.sort_by_key(|entry| entry.key);
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use cloudhawk_frame::decode_frame;

    use super::*;

    fn entry(raw: &'static [u8]) -> ResponseEntry {
        let frame = decode_frame(raw).expect("frame should decode");
        ResponseEntry::from_frame(&frame).expect("frame should carry tags")
    }

    #[test]
    fn last_write_wins() {
        let store = ResponseStore::new();
        store.put(entry(&[0x55, 0xaa, 0x03, 0x80, 0x0b, 0x01]));
        let previous = store.put(entry(&[0x55, 0xaa, 0x03, 0x80, 0x0b, 0x03]));

        assert_eq!(previous.map(|e| e.data().to_vec()), Some(vec![0x01]));
        let current = store.get(ResponseKey::SIGNAL).expect("entry should exist");
        assert_eq!(current.data(), &[0x03]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn families_are_independent() {
        let store = ResponseStore::new();
        store.put(entry(&[0x55, 0xaa, 0x03, 0x80, 0x0b, 0x02]));
        store.put(entry(&[0x55, 0xaa, 0x03, 0x80, 0x07, 0x01]));

        assert_eq!(
            store.keys(),
            vec![ResponseKey::TRIMMING, ResponseKey::SIGNAL]
        );
        assert!(store.contains(ResponseKey::SIGNAL));
        assert!(!store.contains(ResponseKey::BATTERY));
        assert!(store.get(ResponseKey::BATTERY).is_none());
    }

    #[test]
    fn clones_share_entries() {
        let writer = ResponseStore::new();
        let reader = writer.clone();
        writer.put(entry(&[0x55, 0xaa, 0x03, 0x80, 0x81, 0x38]));
        assert_eq!(reader.len(), 1);

        reader.clear();
        assert!(writer.is_empty());
    }

    #[test]
    fn entry_keeps_raw_frame() {
        let e = entry(&[0x55, 0xaa, 0x03, 0x80, 0x81, 0x38, 0xf0]);
        assert_eq!(e.raw.len(), 7);
        assert_eq!(e.body.as_ref(), &[0x80, 0x81, 0x38]);
    }

    #[test]
    fn frame_without_tags_has_no_entry() {
        let frame = decode_frame(Bytes::from_static(&[0x55, 0xaa, 0x01, 0x80])).unwrap();
        assert!(ResponseEntry::from_frame(&frame).is_none());
    }
}

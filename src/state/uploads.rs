/// The upload registry: files the user has queued for conversion
///
/// The registry is plain ordered state. It never reads file contents itself;
/// it hands out `FileHandle`s that materialize bytes on demand when a
/// preview or convert request actually needs them.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Where a handle's bytes come from
#[derive(Debug, Clone)]
enum ByteSource {
    /// A file on disk, read when a request materializes it
    Disk(PathBuf),
    /// Bytes already in memory (drag-drop payloads, tests)
    Memory(Arc<Vec<u8>>),
}

/// Opaque handle to one queued file
///
/// Cloning a handle is cheap and keeps the underlying source alive, so an
/// in-flight request that cloned its handle is unaffected by the item later
/// being removed from the registry.
#[derive(Debug, Clone)]
pub struct FileHandle {
    name: String,
    size: u64,
    modified_ms: i64,
    source: ByteSource,
}

impl FileHandle {
    /// Build a handle for a file on disk, reading only its metadata
    pub fn from_path(path: PathBuf) -> std::io::Result<Self> {
        let meta = std::fs::metadata(&path)?;
        let modified_ms = meta
            .modified()
            .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
            .unwrap_or(0);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Ok(Self {
            name,
            size: meta.len(),
            modified_ms,
            source: ByteSource::Disk(path),
        })
    }

    /// Build a handle over bytes that are already in memory
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self {
            name: name.into(),
            size,
            modified_ms: 0,
            source: ByteSource::Memory(Arc::new(bytes)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Materialize the file's bytes
    ///
    /// This is a suspension point: disk sources go through tokio's async
    /// file IO so a large file doesn't stall the UI thread.
    pub async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            ByteSource::Disk(path) => tokio::fs::read(path).await,
            ByteSource::Memory(bytes) => Ok(bytes.as_ref().clone()),
        }
    }

    /// Session-unique id: content-ish fields plus a random component, so two
    /// selections of the same file still get distinct ids
    fn fresh_id(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.name,
            self.size,
            self.modified_ms,
            Uuid::new_v4()
        )
    }
}

/// One registry entry
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub id: String,
    pub file: FileHandle,
}

/// Ordered set of queued files with session-unique ids
#[derive(Debug, Default)]
pub struct UploadRegistry {
    items: Vec<UploadItem>,
}

impl UploadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append handles in input order, one fresh id per handle
    ///
    /// Never deduplicates: adding the same file twice queues it twice.
    pub fn add_files(&mut self, incoming: Vec<FileHandle>) {
        for file in incoming {
            let id = file.fresh_id();
            self.items.push(UploadItem { id, file });
        }
    }

    /// Remove the item with this id; silently does nothing if it is gone
    pub fn remove(&mut self, id: &str) {
        self.items.retain(|item| item.id != id);
    }

    /// Drop every queued item
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, id: &str) -> Option<&UploadItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UploadItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str, bytes: &[u8]) -> FileHandle {
        FileHandle::from_bytes(name, bytes.to_vec())
    }

    #[test]
    fn test_add_preserves_input_order_across_calls() {
        let mut registry = UploadRegistry::new();
        registry.add_files(vec![handle("a.png", b"aa"), handle("b.jpg", b"bb")]);
        registry.add_files(vec![handle("c.webp", b"cc")]);

        let names: Vec<&str> = registry.iter().map(|i| i.file.name()).collect();
        assert_eq!(names, vec!["a.png", "b.jpg", "c.webp"]);
    }

    #[test]
    fn test_identical_files_get_distinct_ids() {
        let mut registry = UploadRegistry::new();
        // Byte-for-byte identical inputs, same name, same size
        registry.add_files(vec![handle("dup.png", b"same"), handle("dup.png", b"same")]);

        assert_eq!(registry.len(), 2);
        let ids: Vec<&str> = registry.iter().map(|i| i.id.as_str()).collect();
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_readd_after_remove_gets_a_new_id() {
        let mut registry = UploadRegistry::new();
        registry.add_files(vec![handle("x.png", b"xx")]);
        let first_id = registry.iter().next().unwrap().id.clone();

        registry.remove(&first_id);
        registry.add_files(vec![handle("x.png", b"xx")]);
        let second_id = registry.iter().next().unwrap().id.clone();

        assert_ne!(first_id, second_id);
    }

    #[test]
    fn test_remove_unknown_id_is_a_noop() {
        let mut registry = UploadRegistry::new();
        registry.add_files(vec![handle("a.png", b"aa"), handle("b.png", b"bb")]);

        registry.remove("not-an-id");

        assert_eq!(registry.len(), 2);
        let names: Vec<&str> = registry.iter().map(|i| i.file.name()).collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_clear_leaves_cloned_handles_usable() {
        let mut registry = UploadRegistry::new();
        registry.add_files(vec![handle("a.png", b"payload")]);
        let in_flight = registry.iter().next().unwrap().file.clone();

        registry.clear();
        assert!(registry.is_empty());

        // A request that grabbed its handle before the clear still reads fine
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let bytes = rt.block_on(in_flight.read_bytes()).unwrap();
        assert_eq!(bytes, b"payload");
    }
}

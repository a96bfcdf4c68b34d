//! Physical persistence channels.
//!
//! A channel is a dumb string key/value surface modeled on the browser's
//! storage primitives: one unbounded channel whose TTL is managed by the
//! [`super::LocalStore`] layer, and one small size-capped channel with an
//! explicit per-entry expiry attribute. Channels never error; like browser
//! storage they degrade silently, and concurrent writers from two tabs are
//! last-write-wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// A physical key/value persistence surface.
///
/// Implementations use interior mutability so one channel can be shared
/// behind an `Arc` by every subsystem. All operations are synchronous and
/// atomic from the caller's point of view.
pub trait PersistenceChannel: Send + Sync {
    /// Read the raw value stored under `key`, if present and unexpired.
    fn read(&self, key: &str) -> Option<String>;

    /// Write `value` under `key`.
    ///
    /// `expires_at` is an advisory expiry attribute; channels without
    /// native expiry ignore it and rely on the store layer's TTL check.
    fn write(&self, key: &str, value: &str, expires_at: Option<DateTime<Utc>>);

    /// Remove the entry under `key`, if any.
    fn remove(&self, key: &str);

    /// Hard per-entry byte ceiling, if this channel has one.
    fn byte_ceiling(&self) -> Option<usize> {
        None
    }
}

impl<C: PersistenceChannel + ?Sized> PersistenceChannel for std::sync::Arc<C> {
    fn read(&self, key: &str) -> Option<String> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str, expires_at: Option<DateTime<Utc>>) {
        (**self).write(key, value, expires_at);
    }

    fn remove(&self, key: &str) {
        (**self).remove(key);
    }

    fn byte_ceiling(&self) -> Option<usize> {
        (**self).byte_ceiling()
    }
}

/// Entry held by the in-memory channel.
struct MemoryEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

/// In-memory channel.
///
/// Session-lifetime storage: nothing survives the process. Also the
/// channel of choice in tests.
#[derive(Default)]
pub struct MemoryChannel {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryChannel {
    /// Create an empty in-memory channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceChannel for MemoryChannel {
    fn read(&self, key: &str) -> Option<String> {
        let mut entries = lock(&self.entries);
        if let Some(entry) = entries.get(key) {
            if let Some(expires_at) = entry.expires_at {
                if expires_at <= Utc::now() {
                    entries.remove(key);
                    return None;
                }
            }
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    fn write(&self, key: &str, value: &str, expires_at: Option<DateTime<Utc>>) {
        lock(&self.entries).insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    fn remove(&self, key: &str) {
        lock(&self.entries).remove(key);
    }
}

/// File-backed channel: one JSON document per key under a root directory.
///
/// The unbounded persistent channel. Expiry attributes are ignored; the
/// store layer enforces TTL on read. I/O failures are logged and swallowed,
/// matching browser storage that silently refuses writes when full.
pub struct FileChannel {
    root: PathBuf,
}

impl FileChannel {
    /// Open a file channel rooted at `root`, creating the directory if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the directory cannot be created.
    pub fn open(root: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Filesystem path for a channel key.
    ///
    /// Keys contain `:` separators that are not portable in file names.
    fn path_for(&self, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{sanitized}.json"))
    }
}

impl PersistenceChannel for FileChannel {
    fn read(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path_for(key)).ok()
    }

    fn write(&self, key: &str, value: &str, _expires_at: Option<DateTime<Utc>>) {
        if let Err(e) = std::fs::write(self.path_for(key), value) {
            tracing::warn!(key, error = %e, "file channel write failed; entry dropped");
        }
    }

    fn remove(&self, key: &str) {
        let path = self.path_for(key);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(key, error = %e, "file channel remove failed");
            }
        }
    }
}

/// Size-capped channel wrapping another channel.
///
/// Models the cookie channel: a hard per-entry byte ceiling and an explicit
/// expiry attribute. Oversized payloads are truncated at a character
/// boundary rather than rejected; readers of this channel must tolerate
/// partial data. This is a known, accepted lossy path.
pub struct CappedChannel<C> {
    inner: C,
    ceiling: usize,
}

impl<C: PersistenceChannel> CappedChannel<C> {
    /// Wrap `inner` with a hard per-entry byte ceiling.
    #[must_use]
    pub const fn new(inner: C, ceiling: usize) -> Self {
        Self { inner, ceiling }
    }
}

impl<C: PersistenceChannel> PersistenceChannel for CappedChannel<C> {
    fn read(&self, key: &str) -> Option<String> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &str, expires_at: Option<DateTime<Utc>>) {
        if value.len() <= self.ceiling {
            self.inner.write(key, value, expires_at);
            return;
        }
        // Truncate to the last character boundary at or below the ceiling.
        let mut end = self.ceiling;
        while end > 0 && !value.is_char_boundary(end) {
            end -= 1;
        }
        let truncated = value.get(..end).unwrap_or("");
        tracing::debug!(
            key,
            original_bytes = value.len(),
            stored_bytes = truncated.len(),
            "payload exceeds channel ceiling; truncated"
        );
        self.inner.write(key, truncated, expires_at);
    }

    fn remove(&self, key: &str) {
        self.inner.remove(key);
    }

    fn byte_ceiling(&self) -> Option<usize> {
        Some(self.ceiling)
    }
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_memory_round_trip() {
        let channel = MemoryChannel::new();
        channel.write("k", "v", None);
        assert_eq!(channel.read("k").as_deref(), Some("v"));
        channel.remove("k");
        assert_eq!(channel.read("k"), None);
    }

    #[test]
    fn test_memory_honors_expiry_attribute() {
        let channel = MemoryChannel::new();
        channel.write("gone", "v", Some(Utc::now() - Duration::seconds(1)));
        channel.write("kept", "v", Some(Utc::now() + Duration::hours(1)));
        assert_eq!(channel.read("gone"), None);
        assert_eq!(channel.read("kept").as_deref(), Some("v"));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileChannel::open(dir.path()).unwrap();
        channel.write("cb:cart:guest", "{\"a\":1}", None);
        assert_eq!(channel.read("cb:cart:guest").as_deref(), Some("{\"a\":1}"));
        channel.remove("cb:cart:guest");
        assert_eq!(channel.read("cb:cart:guest"), None);
    }

    #[test]
    fn test_file_remove_missing_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileChannel::open(dir.path()).unwrap();
        channel.remove("never-written");
    }

    #[test]
    fn test_capped_truncates_instead_of_rejecting() {
        let channel = CappedChannel::new(MemoryChannel::new(), 10);
        channel.write("k", "0123456789abcdef", None);
        assert_eq!(channel.read("k").as_deref(), Some("0123456789"));
        assert_eq!(channel.byte_ceiling(), Some(10));
    }

    #[test]
    fn test_capped_truncates_at_char_boundary() {
        let channel = CappedChannel::new(MemoryChannel::new(), 5);
        // 'é' is two bytes; a naive byte cut at 5 would split it.
        channel.write("k", "aaaéé", None);
        let stored = channel.read("k").unwrap();
        assert!(stored.len() <= 5);
        assert_eq!(stored, "aaaé");
    }

    #[test]
    fn test_capped_passes_small_payloads_through() {
        let channel = CappedChannel::new(MemoryChannel::new(), 100);
        channel.write("k", "small", None);
        assert_eq!(channel.read("k").as_deref(), Some("small"));
    }
}

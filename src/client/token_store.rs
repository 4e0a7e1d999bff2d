//! Durable holder for the current access token.
//!
//! Stores never fail from the caller's point of view: I/O problems are logged
//! and the operation degrades to "no token".

use std::path::PathBuf;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::warn;

/// Fixed key the access token is persisted under.
pub const TOKEN_KEY: &str = "token";

pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: &str);
    fn clear(&self);
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self { slot: RwLock::new(Some(token.into())) }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> { self.slot.read().clone() }
    fn set(&self, token: &str) { *self.slot.write() = Some(token.to_string()); }
    fn clear(&self) { *self.slot.write() = None; }
}

/// Key/value JSON file, the desktop analogue of browser local storage.
/// Other keys in the file, whatever their JSON type, are preserved on write.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: RwLock::new(()) }
    }

    fn read_map(&self) -> Map<String, Value> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Map::new(),
            Err(e) => {
                warn!(target: "taskdesk::token_store", "read {:?} failed: {}", self.path, e);
                return Map::new();
            }
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(m)) => m,
            Ok(_) => {
                warn!(target: "taskdesk::token_store", "ignoring non-object store {:?}", self.path);
                Map::new()
            }
            Err(e) => {
                warn!(target: "taskdesk::token_store", "ignoring corrupt store {:?}: {}", self.path, e);
                Map::new()
            }
        }
    }

    fn write_map(&self, map: &Map<String, Value>) {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!(target: "taskdesk::token_store", "create {:?} failed: {}", parent, e);
                    return;
                }
            }
        }
        let text = match serde_json::to_string_pretty(map) {
            Ok(t) => t,
            Err(e) => {
                warn!(target: "taskdesk::token_store", "serialize store failed: {}", e);
                return;
            }
        };
        // write-then-rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("tmp");
        let res = std::fs::write(&tmp, text).and_then(|_| std::fs::rename(&tmp, &self.path));
        if let Err(e) = res {
            warn!(target: "taskdesk::token_store", "write {:?} failed: {}", self.path, e);
        }
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<String> {
        let _g = self.lock.read();
        match self.read_map().remove(TOKEN_KEY) {
            Some(Value::String(t)) if !t.is_empty() => Some(t),
            _ => None,
        }
    }

    fn set(&self, token: &str) {
        let _g = self.lock.write();
        let mut map = self.read_map();
        map.insert(TOKEN_KEY.to_string(), Value::String(token.to_string()));
        self.write_map(&map);
    }

    fn clear(&self) {
        let _g = self.lock.write();
        let mut map = self.read_map();
        if map.remove(TOKEN_KEY).is_some() {
            self.write_map(&map);
        }
    }
}

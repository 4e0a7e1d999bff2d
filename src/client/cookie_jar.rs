//! Cookie jar that survives restarts.
//!
//! Wraps reqwest's in-memory [`Jar`] and mirrors every `Set-Cookie` the
//! backend sends into a JSON file, keyed by cookie name. On startup the saved
//! headers are replayed into a fresh jar, so expiry and path attributes apply
//! exactly as the server set them. This is what lets a later process refresh
//! with the cookie obtained at login.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SavedCookie {
    url: String,
    set_cookie: String,
}

pub struct PersistentCookieJar {
    jar: Jar,
    path: PathBuf,
    saved: Mutex<BTreeMap<String, SavedCookie>>,
}

impl PersistentCookieJar {
    /// A missing or unreadable file yields an empty jar.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let saved = read_saved(&path);
        let jar = Jar::default();
        for (name, c) in &saved {
            match Url::parse(&c.url) {
                Ok(url) => jar.add_cookie_str(&c.set_cookie, &url),
                Err(e) => warn!(target: "taskdesk::cookies", "skipping saved cookie {}: bad url: {}", name, e),
            }
        }
        debug!(target: "taskdesk::cookies", "loaded {} cookie(s) from {:?}", saved.len(), path);
        Self { jar, path, saved: Mutex::new(saved) }
    }

    fn persist(&self, saved: &BTreeMap<String, SavedCookie>) {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!(target: "taskdesk::cookies", "create {:?} failed: {}", parent, e);
                    return;
                }
            }
        }
        let text = match serde_json::to_string_pretty(saved) {
            Ok(t) => t,
            Err(e) => {
                warn!(target: "taskdesk::cookies", "serialize cookies failed: {}", e);
                return;
            }
        };
        let tmp = self.path.with_extension("tmp");
        let res = std::fs::write(&tmp, text).and_then(|_| std::fs::rename(&tmp, &self.path));
        if let Err(e) = res {
            warn!(target: "taskdesk::cookies", "write {:?} failed: {}", self.path, e);
        }
    }
}

fn read_saved(path: &Path) -> BTreeMap<String, SavedCookie> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!(target: "taskdesk::cookies", "read {:?} failed: {}", path, e);
            return BTreeMap::new();
        }
    };
    serde_json::from_str(&text).unwrap_or_else(|e| {
        warn!(target: "taskdesk::cookies", "ignoring corrupt cookie file {:?}: {}", path, e);
        BTreeMap::new()
    })
}

fn cookie_name(set_cookie: &str) -> Option<&str> {
    let (name, _) = set_cookie.split_once('=')?;
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}

impl CookieStore for PersistentCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let headers: Vec<HeaderValue> = cookie_headers.cloned().collect();
        if headers.is_empty() {
            return;
        }
        self.jar.set_cookies(&mut headers.iter(), url);

        let mut saved = self.saved.lock();
        for h in &headers {
            let Ok(text) = h.to_str() else { continue };
            if let Some(name) = cookie_name(text) {
                // latest wins, including the expiring header a logout sends
                saved.insert(name.to_string(), SavedCookie { url: url.to_string(), set_cookie: text.to_string() });
            }
        }
        self.persist(&saved);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar.cookies(url)
    }
}

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, USER_AGENT};
use serde::{Deserialize, Serialize};

const CACHE_VERSION: u32 = 1;
const CACHE_DIR: &str = "transferopt";
const CACHE_FILE: &str = "http_cache.json";

static CACHE: Mutex<Option<BodyCache>> = Mutex::new(None);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct BodyCache {
    version: u32,
    entries: HashMap<String, CachedBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedBody {
    body: String,
    etag: Option<String>,
    last_modified: Option<String>,
    fetched_at: u64,
}

/// GET a text body through the on-disk validator cache. A 304 revalidation
/// serves the cached body; anything non-2xx is an error.
pub fn fetch_text_cached(client: &Client, url: &str) -> Result<String> {
    let cached = {
        let mut guard = CACHE.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let cache = guard.get_or_insert_with(load_cache);
        cache.entries.get(url).cloned()
    };

    let mut req = client.get(url).header(USER_AGENT, "Mozilla/5.0");
    if let Some(entry) = cached.as_ref() {
        if let Some(etag) = entry.etag.as_ref() {
            req = req.header(IF_NONE_MATCH, etag);
        }
        if let Some(stamp) = entry.last_modified.as_ref() {
            req = req.header(IF_MODIFIED_SINCE, stamp);
        }
    }

    let resp = req.send().with_context(|| format!("request failed: {url}"))?;
    let status = resp.status();
    let headers = resp.headers().clone();

    if status == StatusCode::NOT_MODIFIED {
        if let Some(entry) = cached {
            store(url, entry.clone());
            return Ok(entry.body);
        }
        anyhow::bail!("received 304 for {url} without a cached body");
    }

    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        anyhow::bail!("http {status}: {url}");
    }

    let header_str = |name| {
        headers
            .get(name)
            .and_then(|v: &reqwest::header::HeaderValue| v.to_str().ok())
            .map(str::to_string)
    };
    store(
        url,
        CachedBody {
            body: body.clone(),
            etag: header_str(ETAG),
            last_modified: header_str(LAST_MODIFIED),
            fetched_at: now_secs(),
        },
    );
    Ok(body)
}

fn store(url: &str, entry: CachedBody) {
    let mut guard = CACHE.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let cache = guard.get_or_insert_with(load_cache);
    cache.version = CACHE_VERSION;
    cache.entries.insert(url.to_string(), entry);
    persist(cache);
}

fn load_cache() -> BodyCache {
    let Some(path) = cache_path() else {
        return BodyCache::default();
    };
    let Ok(raw) = fs::read_to_string(path) else {
        return BodyCache::default();
    };
    let cache = serde_json::from_str::<BodyCache>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return BodyCache::default();
    }
    cache
}

fn persist(cache: &BodyCache) {
    let Some(path) = cache_path() else {
        return;
    };
    let Some(dir) = path.parent() else {
        return;
    };
    let _ = fs::create_dir_all(dir);
    let tmp = path.with_extension("json.tmp");
    if let Ok(json) = serde_json::to_string(cache) {
        if fs::write(&tmp, json).is_ok() {
            let _ = fs::rename(&tmp, &path);
        }
    }
}

fn cache_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR).join(CACHE_FILE));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".cache")
            .join(CACHE_DIR)
            .join(CACHE_FILE),
    )
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

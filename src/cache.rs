//! Content-addressed provider response cache with single-flight misses.
//!
//! The cache is the only owner of provider responses. For a fixed
//! fingerprint the fetch closure runs at most once per run: concurrent
//! callers on the same fingerprint block on the one in-flight fetch and all
//! receive its result, while misses on different fingerprints proceed in
//! parallel. Failed fetches are not stored, so a later call may retry.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CacheError, FetchError, ProviderError};

/// A raw provider response and when it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub body: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

type Outcome = Result<Arc<CachedResponse>, FetchError>;

/// Rendezvous for callers waiting on one in-flight fetch.
struct InFlight {
    outcome: Mutex<Option<Outcome>>,
    done: Condvar,
}

impl InFlight {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn complete(&self, outcome: Outcome) {
        let mut slot = lock(&self.outcome);
        if slot.is_none() {
            *slot = Some(outcome);
        }
        self.done.notify_all();
    }

    fn wait(&self) -> Outcome {
        let mut slot = lock(&self.outcome);
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self.done.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

enum Slot {
    Ready(Arc<CachedResponse>),
    InFlight(Arc<InFlight>),
}

/// One line of the persisted cache file.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    fingerprint: String,
    fetched_at: DateTime<Utc>,
    response: serde_json::Value,
}

#[derive(Default)]
pub struct ResponseCache {
    slots: Mutex<HashMap<String, Slot>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached response for `fingerprint`, or run `fetch` exactly
    /// once to obtain it.
    pub fn get_or_fetch<F>(&self, fingerprint: &str, fetch: F) -> Outcome
    where
        F: FnOnce() -> Result<serde_json::Value, FetchError>,
    {
        let flight = {
            let mut slots = lock(&self.slots);
            match slots.get(fingerprint) {
                Some(Slot::Ready(response)) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(fingerprint, "cache hit");
                    return Ok(Arc::clone(response));
                }
                Some(Slot::InFlight(flight)) => {
                    let flight = Arc::clone(flight);
                    drop(slots);
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(fingerprint, "joining in-flight fetch");
                    return flight.wait();
                }
                None => {
                    let flight = Arc::new(InFlight::new());
                    slots.insert(fingerprint.to_string(), Slot::InFlight(Arc::clone(&flight)));
                    flight
                }
            }
        };

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(fingerprint, "cache miss");

        let guard = FlightGuard {
            cache: self,
            fingerprint,
            flight,
            finished: false,
        };
        let outcome = fetch().map(|body| {
            Arc::new(CachedResponse {
                body,
                fetched_at: Utc::now(),
            })
        });
        guard.finish(outcome)
    }

    /// Drop `response` if it is still the stored entry for `fingerprint`.
    /// An entry replaced or being refetched in the meantime is left alone.
    pub fn invalidate(&self, fingerprint: &str, response: &Arc<CachedResponse>) -> bool {
        let mut slots = lock(&self.slots);
        let stale = matches!(
            slots.get(fingerprint),
            Some(Slot::Ready(current)) if Arc::ptr_eq(current, response)
        );
        if stale {
            slots.remove(fingerprint);
            debug!(fingerprint, "cache entry invalidated");
        }
        stale
    }

    pub fn len(&self) -> usize {
        lock(&self.slots)
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    /// Load a persisted cache. A missing file is an empty cache; corrupt
    /// lines are skipped and logged.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let cache = Self::new();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(cache),
            Err(err) => return Err(err.into()),
        };

        let mut loaded = 0usize;
        {
            let mut slots = lock(&cache.slots);
            for (index, line) in BufReader::new(file).lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<PersistedEntry>(&line) {
                    Ok(entry) => {
                        slots.insert(
                            entry.fingerprint,
                            Slot::Ready(Arc::new(CachedResponse {
                                body: entry.response,
                                fetched_at: entry.fetched_at,
                            })),
                        );
                        loaded += 1;
                    }
                    Err(err) => {
                        let corruption = CacheError::Corruption {
                            line: index + 1,
                            reason: err.to_string(),
                        };
                        warn!(path = %path.display(), error = %corruption, "skipping cache entry");
                    }
                }
            }
        }

        debug!(path = %path.display(), entries = loaded, "loaded response cache");
        Ok(cache)
    }

    /// Write every completed entry to `path`, replacing it atomically.
    pub fn flush(&self, path: &Path) -> Result<usize, CacheError> {
        let mut entries: Vec<PersistedEntry> = lock(&self.slots)
            .iter()
            .filter_map(|(fingerprint, slot)| match slot {
                Slot::Ready(response) => Some(PersistedEntry {
                    fingerprint: fingerprint.clone(),
                    fetched_at: response.fetched_at,
                    response: response.body.clone(),
                }),
                Slot::InFlight(_) => None,
            })
            .collect();
        entries.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp");
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        for entry in &entries {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        drop(writer);
        fs::rename(tmp_path, path)?;

        debug!(path = %path.display(), entries = entries.len(), "flushed response cache");
        Ok(entries.len())
    }
}

/// Publishes the outcome of a miss. If the fetch unwinds before finishing,
/// waiters are released with an error instead of blocking forever.
struct FlightGuard<'a> {
    cache: &'a ResponseCache,
    fingerprint: &'a str,
    flight: Arc<InFlight>,
    finished: bool,
}

impl FlightGuard<'_> {
    fn finish(mut self, outcome: Outcome) -> Outcome {
        self.publish(outcome.clone());
        self.finished = true;
        outcome
    }

    fn publish(&self, outcome: Outcome) {
        {
            let mut slots = lock(&self.cache.slots);
            match &outcome {
                Ok(response) => {
                    slots.insert(self.fingerprint.to_string(), Slot::Ready(Arc::clone(response)));
                }
                Err(_) => {
                    slots.remove(self.fingerprint);
                }
            }
        }
        self.flight.complete(outcome);
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.publish(Err(FetchError::Provider(ProviderError::Api(
                "fetch aborted".to_string(),
            ))));
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Process-wide cache of diverted native modules

use crate::error::Result;
use dashmap::{DashMap, DashSet};
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use tokio::sync::OnceCell;

/// A native module that was bundled and shimmed successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeModuleRecord {
    /// Bare specifier the module was imported with
    pub module_name: String,
    /// Absolute path of the generated CommonJS bundle
    pub bundle_file_path: PathBuf,
    /// Generated ES module shim
    pub shim_source: String,
}

type Slot = Arc<OnceCell<Arc<NativeModuleRecord>>>;

static SHARED: LazyLock<Arc<NativesCache>> = LazyLock::new(|| Arc::new(NativesCache::new()));

/// Thread-safe cache keyed by module name.
///
/// Each module owns a once-cell slot. A slot is filled only after its build
/// succeeded; concurrent callers for the same module wait on the one build in
/// flight, and a failed build leaves the slot empty so the next import retries.
#[derive(Debug, Default)]
pub struct NativesCache {
    slots: DashMap<String, Slot>,
    not_native: DashSet<String>,
}

impl NativesCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by every plugin instance in this process
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED)
    }

    /// Get a finished record by module name
    pub fn get(&self, module_name: &str) -> Option<Arc<NativeModuleRecord>> {
        self.slots
            .get(module_name)
            .and_then(|slot| slot.value().get().cloned())
    }

    /// Check if a module has a finished record
    pub fn has(&self, module_name: &str) -> bool {
        self.get(module_name).is_some()
    }

    /// Return the record for `module_name`, running `init` if there is none.
    ///
    /// At most one `init` runs per module at a time. Errors are returned to
    /// the caller whose `init` failed and nothing is stored.
    pub async fn get_or_try_insert_with<F, Fut>(&self, module_name: &str, init: F) -> Result<Arc<NativeModuleRecord>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<NativeModuleRecord>>,
    {
        // Clone the slot out so no map guard is held across the await
        let slot: Slot = self
            .slots
            .entry(module_name.to_string())
            .or_default()
            .clone();

        slot.get_or_try_init(|| async move { init().await.map(Arc::new) })
            .await
            .cloned()
    }

    /// Remember that a package has no native binary
    pub fn mark_not_native(&self, module_name: &str) {
        self.not_native.insert(module_name.to_string());
    }

    /// Check if a package was recorded as having no native binary
    pub fn is_not_native(&self, module_name: &str) -> bool {
        self.not_native.contains(module_name)
    }

    /// Names of all modules with a finished record
    pub fn module_names(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Get the number of finished records
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|entry| entry.value().initialized()).count()
    }

    /// Check if the cache holds no finished record
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NativesError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn record(name: &str) -> NativeModuleRecord {
        NativeModuleRecord {
            module_name: name.to_string(),
            bundle_file_path: PathBuf::from(format!("/out/.natives/{name}.cjs")),
            shim_source: format!("// {name}\n"),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = NativesCache::new();
        assert!(cache.is_empty());

        let inserted = cache
            .get_or_try_insert_with("sqlite3", || async { Ok(record("sqlite3")) })
            .await
            .unwrap();

        assert_eq!(inserted.module_name, "sqlite3");
        assert!(cache.has("sqlite3"));
        assert_eq!(cache.get("sqlite3").unwrap(), inserted);
        assert_eq!(cache.module_names(), vec!["sqlite3".to_string()]);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_init_leaves_no_record() {
        let cache = NativesCache::new();

        let result = cache
            .get_or_try_insert_with("broken-native", || async {
                Err(NativesError::build("broken-native", "boom"))
            })
            .await;

        assert!(result.is_err());
        assert!(!cache.has("broken-native"));
        assert!(cache.is_empty());

        // The next attempt retries
        let retried = cache
            .get_or_try_insert_with("broken-native", || async { Ok(record("broken-native")) })
            .await;
        assert!(retried.is_ok());
        assert!(cache.has("broken-native"));
    }

    #[tokio::test]
    async fn test_concurrent_inits_share_one_build() {
        let cache = Arc::new(NativesCache::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let builds = Arc::clone(&builds);
                tokio::spawn(async move {
                    cache
                        .get_or_try_insert_with("fsevents", || async move {
                            builds.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok(record("fsevents"))
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_not_native_marks() {
        let cache = NativesCache::new();
        assert!(!cache.is_not_native("lodash"));
        cache.mark_not_native("lodash");
        assert!(cache.is_not_native("lodash"));
        assert!(!cache.has("lodash"));
    }
}

//! Test utilities for unit testing the reconciler and scheduler
//!
//! Provides an in-memory [`EndpointStore`] that records every write, plus
//! helpers for building intents and slices.

use crate::intent::{PublishIntent, ServiceRecord};
use crate::resolver::parse_service_url;
use crate::store::{EndpointStore, StoreError};
use ceph_client::MgrService;
use k8s_openapi::api::discovery::v1::EndpointSlice;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// A write recorded by [`MockEndpointStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Create(EndpointSlice),
    Replace(EndpointSlice),
}

/// Concurrent change applied by [`MockEndpointStore`] right after a get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterGet {
    /// Another client deletes the slice
    Delete,
    /// Another client writes the slice, bumping its resourceVersion
    Modify,
}

/// In-memory EndpointStore for testing
///
/// Clones share state. Replaces enforce `resourceVersion` like the API
/// server does, so stale writes fail with a conflict.
#[derive(Debug, Clone, Default)]
pub struct MockEndpointStore {
    slices: Arc<Mutex<HashMap<(String, String), EndpointSlice>>>,
    services: Arc<Mutex<HashMap<(String, String), String>>>,
    writes: Arc<Mutex<Vec<Write>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    fail_service_lookup: Arc<Mutex<bool>>,
    after_get: Arc<Mutex<HashMap<String, AfterGet>>>,
    conflicts: Arc<Mutex<usize>>,
    next_version: Arc<Mutex<u64>>,
}

impl MockEndpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `slice` as if it already existed (for test setup)
    pub fn add_slice(&self, namespace: &str, mut slice: EndpointSlice) {
        let name = slice.metadata.name.clone().unwrap_or_default();
        slice.metadata.resource_version = Some(self.bump_version());
        self.slices
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name), slice);
    }

    /// Register a Service with `uid` (for test setup)
    pub fn add_service(&self, namespace: &str, name: &str, uid: &str) {
        self.services
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), uid.to_string());
    }

    /// Make every operation on slice `name` fail
    pub fn fail_slice(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    /// Make Service lookups fail
    pub fn fail_service_lookup(&self) {
        *self.fail_service_lookup.lock().unwrap() = true;
    }

    /// Simulate another writer touching slice `name` after the next get
    pub fn after_get(&self, name: &str, change: AfterGet) {
        self.after_get.lock().unwrap().insert(name.to_string(), change);
    }

    pub fn slice(&self, namespace: &str, name: &str) -> Option<EndpointSlice> {
        self.slices
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    /// Number of replaces rejected for a stale resourceVersion
    pub fn conflicts(&self) -> usize {
        *self.conflicts.lock().unwrap()
    }

    fn bump_version(&self) -> String {
        let mut version = self.next_version.lock().unwrap();
        *version += 1;
        version.to_string()
    }

    fn check_failing(&self, name: &str) -> Result<(), StoreError> {
        if self.failing.lock().unwrap().contains(name) {
            return Err(StoreError::Api(format!("simulated API error for {name}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EndpointStore for MockEndpointStore {
    async fn get_slice(&self, namespace: &str, name: &str) -> Result<Option<EndpointSlice>, StoreError> {
        self.check_failing(name)?;
        let found = self.slice(namespace, name);
        let change = self.after_get.lock().unwrap().remove(name);
        let key = (namespace.to_string(), name.to_string());
        match change {
            Some(AfterGet::Delete) => {
                self.slices.lock().unwrap().remove(&key);
            }
            Some(AfterGet::Modify) => {
                let version = self.bump_version();
                if let Some(stored) = self.slices.lock().unwrap().get_mut(&key) {
                    stored.metadata.resource_version = Some(version);
                }
            }
            None => {}
        }
        Ok(found)
    }

    async fn create_slice(&self, namespace: &str, slice: &EndpointSlice) -> Result<EndpointSlice, StoreError> {
        let name = slice.metadata.name.clone().unwrap_or_default();
        self.check_failing(&name)?;
        let key = (namespace.to_string(), name.clone());
        if self.slices.lock().unwrap().contains_key(&key) {
            return Err(StoreError::Api(format!("endpointslices \"{name}\" already exists")));
        }
        self.writes.lock().unwrap().push(Write::Create(slice.clone()));
        let mut stored = slice.clone();
        stored.metadata.resource_version = Some(self.bump_version());
        self.slices.lock().unwrap().insert(key, stored.clone());
        Ok(stored)
    }

    async fn replace_slice(&self, namespace: &str, name: &str, slice: &EndpointSlice) -> Result<EndpointSlice, StoreError> {
        self.check_failing(name)?;
        let key = (namespace.to_string(), name.to_string());
        let current = self.slices.lock().unwrap().get(&key).cloned();
        let Some(current) = current else {
            return Err(StoreError::NotFound(format!("endpointslices \"{name}\"")));
        };
        if current.metadata.resource_version != slice.metadata.resource_version {
            *self.conflicts.lock().unwrap() += 1;
            return Err(StoreError::Api(format!(
                "Operation cannot be fulfilled on endpointslices \"{name}\": the object has been modified"
            )));
        }
        self.writes.lock().unwrap().push(Write::Replace(slice.clone()));
        let mut stored = slice.clone();
        stored.metadata.resource_version = Some(self.bump_version());
        self.slices.lock().unwrap().insert(key, stored.clone());
        Ok(stored)
    }

    async fn get_service_uid(&self, namespace: &str, name: &str) -> Result<Option<String>, StoreError> {
        if *self.fail_service_lookup.lock().unwrap() {
            return Err(StoreError::Api("simulated service lookup failure".to_string()));
        }
        Ok(self
            .services
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

/// Helper to create a test PublishIntent
pub fn create_test_intent(service: MgrService, target: &str, url: &str) -> PublishIntent {
    PublishIntent {
        record: ServiceRecord {
            service,
            target: target.to_string(),
        },
        address: parse_service_url(url).unwrap(),
    }
}

// src/cluster/mock.rs

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use super::{ClusterClient, ClusterFuture};
use crate::errors::ChaosError;

#[derive(Debug, Clone)]
struct MockTarget {
    name: String,
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct MockState {
    /// Targets per namespace, in insertion (listing) order.
    namespaces: BTreeMap<String, Vec<MockTarget>>,
    /// Names whose deletion is rejected.
    failing: HashSet<String>,
    deleted: Vec<String>,
    list_calls: usize,
    /// Latency added to every deletion.
    delete_delay: Duration,
}

/// In-memory cluster used for development mode and tests.
///
/// Selectors are comma-separated `key=value` / `key!=value` / `key` terms,
/// all of which must hold.
#[derive(Debug, Clone, Default)]
pub struct MockCluster {
    state: Arc<Mutex<MockState>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_target(&self, namespace: &str, name: &str, labels: &[(&str, &str)]) {
        let target = MockTarget {
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        self.state()
            .namespaces
            .entry(namespace.to_string())
            .or_default()
            .push(target);
    }

    /// Make deletion of `name` fail from now on.
    pub fn fail_deletion_of(&self, name: &str) {
        self.state().failing.insert(name.to_string());
    }

    /// Make every deletion take `delay` before it is applied.
    pub fn set_delete_delay(&self, delay: Duration) {
        self.state().delete_delay = delay;
    }

    /// Names deleted so far, in deletion order.
    pub fn deleted(&self) -> Vec<String> {
        self.state().deleted.clone()
    }

    /// How many times targets were listed.
    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    pub fn remaining(&self, namespace: &str) -> Vec<String> {
        self.state()
            .namespaces
            .get(namespace)
            .map(|targets| targets.iter().map(|t| t.name.clone()).collect())
            .unwrap_or_default()
    }
}

fn selector_matches(selector: &str, labels: &BTreeMap<String, String>) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| {
            if let Some((key, value)) = term.split_once("!=") {
                labels.get(key.trim()).map(String::as_str) != Some(value.trim())
            } else if let Some((key, value)) = term.split_once('=') {
                let value = value.trim_start_matches('=').trim();
                labels.get(key.trim()).map(String::as_str) == Some(value)
            } else {
                labels.contains_key(term)
            }
        })
}

impl ClusterClient for MockCluster {
    fn list_matching<'a>(
        &'a self,
        namespace: &'a str,
        selector: &'a str,
    ) -> ClusterFuture<'a, Vec<String>> {
        Box::pin(async move {
            let mut state = self.state();
            state.list_calls += 1;
            let names = state
                .namespaces
                .get(namespace)
                .map(|targets| {
                    targets
                        .iter()
                        .filter(|t| selector_matches(selector, &t.labels))
                        .map(|t| t.name.clone())
                        .collect()
                })
                .unwrap_or_default();
            Ok(names)
        })
    }

    fn delete<'a>(&'a self, namespace: &'a str, name: &'a str) -> ClusterFuture<'a, ()> {
        Box::pin(async move {
            let delay = self.state().delete_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let mut state = self.state();
            if state.failing.contains(name) {
                return Err(ChaosError::Cluster(format!(
                    "deletion of {namespace}/{name} rejected"
                )));
            }
            let targets = state.namespaces.get_mut(namespace).ok_or_else(|| {
                ChaosError::Cluster(format!("namespace {namespace} not found"))
            })?;
            let before = targets.len();
            targets.retain(|t| t.name != name);
            if targets.len() == before {
                return Err(ChaosError::Cluster(format!(
                    "target {namespace}/{name} not found"
                )));
            }
            state.deleted.push(name.to_string());
            debug!(namespace, name, "mock target deleted");
            Ok(())
        })
    }
}

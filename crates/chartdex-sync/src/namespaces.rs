//! Namespace visibility filtering
//!
//! Narrows a namespace list to the ones a caller may use: those their
//! credentials can access, and those not being torn down.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

use crate::error::Result;

/// Lifecycle phase of a namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NamespacePhase {
    #[default]
    Active,
    Terminating,
}

/// A cluster namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub name: String,
    pub phase: NamespacePhase,
}

impl Namespace {
    pub fn new(name: impl Into<String>, phase: NamespacePhase) -> Self {
        Self {
            name: name.into(),
            phase,
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == NamespacePhase::Active
    }
}

/// Answers whether the current caller may access a namespace
#[async_trait]
pub trait NamespaceAccessChecker: Send + Sync {
    async fn can_access(&self, namespace: &str) -> Result<bool>;
}

/// Keep the namespaces the checker allows, in input order
///
/// Checks run concurrently on `min(len, max_workers)` workers. A failed check
/// is logged and the namespace is dropped.
pub async fn filter_allowed_namespaces(
    checker: Arc<dyn NamespaceAccessChecker>,
    max_workers: usize,
    namespaces: Vec<Namespace>,
) -> Vec<Namespace> {
    if namespaces.is_empty() {
        return namespaces;
    }
    let workers = namespaces.len().min(max_workers).max(1);

    let mut checked: Vec<(usize, Namespace, bool)> = stream::iter(namespaces.into_iter().enumerate())
        .map(|(position, namespace)| {
            let checker = checker.clone();
            async move {
                let allowed = match checker.can_access(&namespace.name).await {
                    Ok(allowed) => allowed,
                    Err(e) => {
                        tracing::error!(namespace = %namespace.name, error = %e, "namespace access check failed");
                        false
                    }
                };
                (position, namespace, allowed)
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    checked.sort_by_key(|(position, _, _)| *position);
    checked
        .into_iter()
        .filter_map(|(_, namespace, allowed)| allowed.then_some(namespace))
        .collect()
}

/// Keep only active namespaces
pub fn filter_active_namespaces(namespaces: Vec<Namespace>) -> Vec<Namespace> {
    namespaces.into_iter().filter(Namespace::is_active).collect()
}

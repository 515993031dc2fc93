//! Token registry: owns every live token and the inbox bound to it.

use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{CaptureError, CaptureResult},
    inbox::{RequestInbox, DEFAULT_CAPACITY},
};

/// Source of fresh, globally unique token strings.
pub trait TokenSource: Send + Sync {
    /// Next identifier, or `None` when no more can be produced.
    fn next_token(&self) -> Option<String>;
}

/// Random v4 UUIDs in hyphenated form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidTokenSource;

impl TokenSource for UuidTokenSource {
    fn next_token(&self) -> Option<String> {
        Some(Uuid::new_v4().to_string())
    }
}

struct TokenEntry {
    inbox: Arc<RequestInbox>,
    created_seq: u64,
}

/// Concurrent map from token to inbox.
///
/// Membership is guarded by the map's own sharded locks; each inbox carries
/// an independent lock for its contents, so work on one token never blocks
/// another. Handles returned by [`TokenRegistry::lookup`] are meant for a
/// single operation and must be re-resolved on the next call.
pub struct TokenRegistry {
    tokens: DashMap<String, TokenEntry>,
    source: Box<dyn TokenSource>,
    inbox_capacity: usize,
    next_seq: AtomicU64,
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::with_source(UuidTokenSource, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inbox_capacity: usize) -> Self {
        Self::with_source(UuidTokenSource, inbox_capacity)
    }

    pub fn with_source(source: impl TokenSource + 'static, inbox_capacity: usize) -> Self {
        Self {
            tokens: DashMap::new(),
            source: Box::new(source),
            inbox_capacity,
            next_seq: AtomicU64::new(0),
        }
    }

    /// Allocate a fresh token with an empty inbox.
    ///
    /// A source that returns nothing, an empty string, or a token that is
    /// already live counts as exhausted.
    pub fn create(&self) -> CaptureResult<String> {
        let token = self
            .source
            .next_token()
            .filter(|token| !token.is_empty())
            .ok_or(CaptureError::IdentitySourceExhausted)?;

        match self.tokens.entry(token.clone()) {
            Entry::Occupied(_) => Err(CaptureError::IdentitySourceExhausted),
            Entry::Vacant(slot) => {
                slot.insert(TokenEntry {
                    inbox: Arc::new(RequestInbox::with_capacity(
                        token.clone(),
                        self.inbox_capacity,
                    )),
                    created_seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                });
                Ok(token)
            }
        }
    }

    /// Remove a token and release its inbox.
    pub fn delete(&self, token: &str) -> CaptureResult<()> {
        ensure_non_empty(token)?;
        self.tokens
            .remove(token)
            .map(|_| ())
            .ok_or_else(|| CaptureError::not_found(token))
    }

    /// Resolve a token to its inbox. Never creates.
    pub fn lookup(&self, token: &str) -> CaptureResult<Arc<RequestInbox>> {
        ensure_non_empty(token)?;
        self.tokens
            .get(token)
            .map(|entry| entry.inbox.clone())
            .ok_or_else(|| CaptureError::not_found(token))
    }

    /// Snapshot of live tokens, oldest first.
    pub fn list_tokens(&self) -> Vec<String> {
        let mut tokens: Vec<(u64, String)> = self
            .tokens
            .iter()
            .map(|entry| (entry.value().created_seq, entry.key().clone()))
            .collect();
        tokens.sort_unstable_by_key(|(seq, _)| *seq);
        tokens.into_iter().map(|(_, token)| token).collect()
    }

    pub fn contains(&self, token: &str) -> bool {
        !token.is_empty() && self.tokens.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn inbox_capacity(&self) -> usize {
        self.inbox_capacity
    }
}

fn ensure_non_empty(token: &str) -> CaptureResult<()> {
    if token.is_empty() {
        Err(CaptureError::EmptyToken)
    } else {
        Ok(())
    }
}

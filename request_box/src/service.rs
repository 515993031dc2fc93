//! Capture coordinator: resolves a token's inbox and applies one operation.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::{
    error::CaptureResult,
    registry::TokenRegistry,
    request::{CapturedRequest, IncomingRequest},
};

/// Source of capture timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Stateless front for capture, retrieval and clearing.
///
/// Every call re-resolves the token so a deleted token is never written to
/// through a stale handle.
#[derive(Clone)]
pub struct CaptureService {
    registry: Arc<TokenRegistry>,
    clock: Arc<dyn Clock>,
}

impl CaptureService {
    pub fn new(registry: Arc<TokenRegistry>) -> Self {
        Self::with_clock(registry, SystemClock)
    }

    pub fn with_clock(registry: Arc<TokenRegistry>, clock: impl Clock + 'static) -> Self {
        Self {
            registry,
            clock: Arc::new(clock),
        }
    }

    pub fn registry(&self) -> &Arc<TokenRegistry> {
        &self.registry
    }

    /// Stamp `request` and store it in the token's inbox.
    ///
    /// Returns the stored snapshot.
    pub fn capture(&self, token: &str, request: IncomingRequest) -> CaptureResult<CapturedRequest> {
        let inbox = self.registry.lookup(token)?;
        let captured = request.stamp(self.clock.now());
        inbox.add(captured.clone());
        Ok(captured)
    }

    /// Most recent captures for the token, newest first.
    pub fn recent(&self, token: &str) -> CaptureResult<Vec<CapturedRequest>> {
        Ok(self.registry.lookup(token)?.list())
    }

    pub fn clear_token(&self, token: &str) -> CaptureResult<()> {
        self.registry.lookup(token)?.clear();
        Ok(())
    }
}

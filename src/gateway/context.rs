use std::time::Instant;
use tracing::Span;
use uuid::Uuid;

use crate::cache::{CacheTag, CacheTagRecorder};
use crate::types::Identity;

/// Per-request state threaded through every gateway call.
///
/// Created when a request is admitted and dropped once its response has
/// been emitted. The tag recorder lives here, so two requests can never
/// see each other's tags.
#[derive(Debug)]
pub struct RequestContext {
    pub identity: Identity,
    pub tags: CacheTagRecorder,
    pub request_id: Uuid,
    pub start_time: Instant,
    span: Span,
}

impl RequestContext {
    pub fn new(identity: Identity) -> Self {
        Self::with_request_id(identity, Uuid::new_v4())
    }

    pub fn with_request_id(identity: Identity, request_id: Uuid) -> Self {
        let span = tracing::info_span!("request", %request_id, identity = identity.id, admin = identity.admin);
        Self {
            identity,
            tags: CacheTagRecorder::new(),
            request_id,
            start_time: Instant::now(),
            span,
        }
    }

    /// Span every log line of this request should be recorded under
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Hand the recorded tags to the response layer, leaving the recorder empty
    pub fn take_tags(&mut self) -> Vec<CacheTag> {
        self.tags.drain()
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_carries_the_request_id() {
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let id = Uuid::new_v4();
            let ctx = RequestContext::with_request_id(Identity::user(3), id);
            let meta = ctx.span().metadata().expect("span metadata");
            assert_eq!(meta.name(), "request");
            for field in ["request_id", "identity", "admin"] {
                assert!(meta.fields().field(field).is_some(), "missing field {}", field);
            }
            assert_eq!(ctx.request_id, id);
        });
    }
}

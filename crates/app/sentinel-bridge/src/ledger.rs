//! FIFO of requests written to the channel and not yet answered.
//!
//! The wire protocol has no correlation ids, so entries must be enqueued in
//! exactly the order their messages were written. Each inbound message
//! resolves the head of the queue, whatever its kind.

use std::collections::VecDeque;

use serde_json::Value;
use strum_macros::Display;
use tokio::sync::oneshot;

use crate::protocol::TabId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RequestKind {
    NavigationCheck,
    ConfigUpdate,
}

pub enum PendingRequest {
    NavigationCheck {
        tab: Option<TabId>,
        url: String,
    },
    ConfigUpdate {
        responder: Option<oneshot::Sender<Value>>,
    },
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PendingRequest::NavigationCheck { tab, url } => f
                .debug_struct("NavigationCheck")
                .field("tab", tab)
                .field("url", url)
                .finish(),
            PendingRequest::ConfigUpdate { responder } => f
                .debug_struct("ConfigUpdate")
                .field("responder", &responder.as_ref().map(|_| "oneshot::Sender<Value>"))
                .finish(),
        }
    }
}

impl PendingRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            PendingRequest::NavigationCheck { .. } => RequestKind::NavigationCheck,
            PendingRequest::ConfigUpdate { .. } => RequestKind::ConfigUpdate,
        }
    }
}

#[derive(Debug, Default)]
pub struct Ledger {
    entries: VecDeque<PendingRequest>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, request: PendingRequest) {
        self.entries.push_back(request);
    }

    /// Pops the oldest outstanding request. `None` means the inbound message
    /// was unsolicited and should be dropped.
    pub fn match_next(&mut self) -> Option<PendingRequest> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = RequestKind> + '_ {
        self.entries.iter().map(PendingRequest::kind)
    }
}

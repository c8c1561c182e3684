//! Focus Sentinel browser bridge
//!
//! Keeps exactly one native-messaging channel open to the local policy host,
//! forwards navigation checks and config updates over it, and applies the
//! host's replies back to the browser. Replies carry no request identifier:
//! each inbound message is attributed to the oldest request still waiting.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod framing;
pub mod ledger;
pub mod manager;
pub mod manifest;
pub mod protocol;
pub mod service;
pub mod transport;

pub use config::BridgeConfig;
pub use dispatch::{Dispatcher, TabController};
pub use error::{BridgeError, BridgeResult};
pub use ledger::{Ledger, PendingRequest, RequestKind};
pub use manager::{ChannelManager, ChannelState};
pub use manifest::HostManifest;
pub use protocol::{NavigationEvent, OutboundMessage, TabId, Verdict};
pub use sentinel_settings::FocusConfig;
pub use service::{BridgeHandle, BridgeService, ConfigReply, Reply};
pub use transport::{ChannelEvent, Generation, NativeConnector, NativePort, ProcessConnector};

/// Name the native host is registered under.
pub const HOST_NAME: &str = "com.focussentinel";

/// Largest frame accepted from the host (the browser's host-to-extension cap).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Extension-relative page shown instead of a blocked site.
pub const BLOCKED_PAGE: &str = "blocked.html";

/// `action` value the host uses to block a navigation.
pub const BLOCK_ACTION: &str = "BLOCK";

/// Reply given to config updates made while no channel exists.
pub const HOST_DISCONNECTED: &str = "Host disconnected";

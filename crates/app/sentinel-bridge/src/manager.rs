//! Channel lifecycle, request bookkeeping and reply routing.
//!
//! The manager is driven from a single task (see [`crate::service`]); every
//! method takes `&mut self` and runs to completion, so a send and its ledger
//! entry always land together.

use sentinel_settings::FocusConfig;
use serde_json::{Value, json};
use strum_macros::Display;
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::{
    BridgeConfig, BridgeError, BridgeResult, HOST_DISCONNECTED,
    dispatch::{Dispatcher, TabController},
    ledger::{Ledger, PendingRequest},
    protocol::{NavigationEvent, OutboundMessage},
    transport::{ChannelEvent, Generation, NativeConnector, NativePort},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ChannelState {
    Disconnected,
    Connected,
}

pub struct ChannelManager<C, T> {
    connector: C,
    dispatcher: Dispatcher<T>,
    config: BridgeConfig,
    events: mpsc::UnboundedSender<ChannelEvent>,
    port: Option<NativePort>,
    generation: Generation,
    ledger: Ledger,
    reconnect_at: Option<Instant>,
    state: watch::Sender<ChannelState>,
}

impl<C: NativeConnector, T: TabController> ChannelManager<C, T> {
    /// Channel events produced by `connector` are delivered on `events`; the
    /// owner feeds them back through [`ChannelManager::handle_event`].
    pub fn new(
        connector: C,
        tabs: T,
        config: BridgeConfig,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Self {
        let (state, _) = watch::channel(ChannelState::Disconnected);
        Self {
            connector,
            dispatcher: Dispatcher::new(tabs, config.blocked_page_url.clone()),
            config,
            events,
            port: None,
            generation: Generation::default(),
            ledger: Ledger::new(),
            reconnect_at: None,
            state,
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Nothing more can arrive for the current ledger: either every request
    /// was answered or there is no channel to answer them.
    pub fn is_idle(&self) -> bool {
        self.port.is_none() || self.ledger.is_empty()
    }

    /// Opens a channel unless one already exists.
    pub fn connect(&mut self) {
        if self.port.is_some() {
            debug!("Native host channel already open; connect is a no-op");
            return;
        }

        self.generation = self.generation.next();
        match self.connector.open(self.generation, self.events.clone()) {
            Ok(port) => {
                info!("Connected to native host {}", self.config.host_name);
                self.port = Some(port);
                self.set_state(ChannelState::Connected);
            }
            Err(e) => {
                warn!("Failed to connect to native host {}: {:#}", self.config.host_name, e);
                self.schedule_reconnect();
            }
        }
    }

    /// Writes `message` on the live channel. Does not touch the ledger.
    pub fn send(&mut self, message: OutboundMessage) -> BridgeResult<()> {
        let Some(port) = self.port.as_ref() else {
            return Err(BridgeError::ChannelUnavailable);
        };
        port.post(message)
    }

    /// Forwards a navigation to the host for a verdict.
    ///
    /// Returns whether a check was sent. With no channel the navigation is
    /// left alone (fail-open).
    pub fn check_navigation(&mut self, event: NavigationEvent) -> bool {
        if !event.is_top_level_frame || self.config.is_internal_url(&event.url) {
            return false;
        }

        let tab = event.tab();
        match self.send(OutboundMessage::CheckUrl {
            url: event.url.clone(),
        }) {
            Ok(()) => {
                self.ledger.enqueue(PendingRequest::NavigationCheck {
                    tab,
                    url: event.url,
                });
                true
            }
            Err(e) => {
                debug!("Not checking {}: {}", event.url, e);
                false
            }
        }
    }

    /// Sends a config update; `responder` receives the host's
    /// acknowledgement, or an immediate error object if no channel exists.
    pub fn update_config(&mut self, config: FocusConfig, responder: oneshot::Sender<Value>) {
        match self.send(OutboundMessage::UpdateConfig { payload: config }) {
            Ok(()) => self.ledger.enqueue(PendingRequest::ConfigUpdate {
                responder: Some(responder),
            }),
            Err(e) => {
                debug!("Config update not sent: {}", e);
                let _ = responder.send(json!({ "error": HOST_DISCONNECTED }));
            }
        }
    }

    pub fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Message {
                generation,
                message,
            } => {
                if !self.is_current(generation) {
                    debug!("Dropping message from closed channel {}", generation);
                    return;
                }
                self.handle_inbound(message);
            }
            ChannelEvent::Disconnected { generation, reason } => {
                self.handle_disconnect(generation, &reason)
            }
        }
    }

    /// Attributes `message` to the oldest pending request.
    pub fn handle_inbound(&mut self, message: Value) {
        let Some(request) = self.ledger.match_next() else {
            debug!("Ignoring unsolicited message from native host: {}", message);
            return;
        };
        debug!(
            "Matched host reply to {} ({} still pending)",
            request.kind(),
            self.ledger.len()
        );
        self.dispatcher.dispatch(request, message);
    }

    /// Drops the channel and schedules the one reconnect attempt. Pending
    /// requests stay in the ledger.
    pub fn handle_disconnect(&mut self, generation: Generation, reason: &str) {
        if !self.is_current(generation) {
            debug!("Ignoring disconnect from stale channel {}", generation);
            return;
        }

        info!("Disconnected from native host: {}", reason);
        self.port = None;
        self.set_state(ChannelState::Disconnected);
        if !self.ledger.is_empty() {
            warn!(
                "{} request(s) left unanswered by the closed channel: {:?}",
                self.ledger.len(),
                self.ledger.kinds().collect::<Vec<_>>()
            );
        }
        self.schedule_reconnect();
    }

    /// Runs the scheduled reconnect. Call once the deadline has passed.
    pub fn reconnect_due(&mut self) {
        self.reconnect_at = None;
        self.connect();
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect_at.is_some() {
            return;
        }
        let at = Instant::now() + self.config.reconnect_delay;
        debug!(
            "Reconnecting to native host in {:?}",
            self.config.reconnect_delay
        );
        self.reconnect_at = Some(at);
    }

    fn set_state(&self, state: ChannelState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Native host channel {} -> {}", previous, state);
        }
    }

    fn is_current(&self, generation: Generation) -> bool {
        self.port
            .as_ref()
            .is_some_and(|port| port.generation() == generation)
    }
}

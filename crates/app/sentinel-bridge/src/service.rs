//! The bridge's event loop.
//!
//! One task owns the [`ChannelManager`] and is the only thing that touches the
//! channel or the ledger. Callers talk to it through a [`BridgeHandle`].

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use sentinel_settings::FocusConfig;
use serde_json::Value;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tracing::{debug, info};

use crate::{
    BridgeConfig, BridgeError, BridgeResult,
    dispatch::TabController,
    manager::{ChannelManager, ChannelState},
    protocol::NavigationEvent,
    transport::{ChannelEvent, NativeConnector},
};

#[derive(Debug)]
enum Command {
    Navigate(NavigationEvent),
    UpdateConfig {
        config: FocusConfig,
        reply: oneshot::Sender<Value>,
    },
    Drain(oneshot::Sender<()>),
    Shutdown,
}

/// Resolves once the service answers; fails with
/// [`BridgeError::ServiceStopped`] if it stops first.
#[derive(Debug)]
pub struct Reply<T> {
    rx: oneshot::Receiver<T>,
}

/// Resolves to the host's acknowledgement of a config update.
///
/// Never resolves if the channel closes before the host answers.
pub type ConfigReply = Reply<Value>;

impl<T> Future for Reply<T> {
    type Output = BridgeResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| BridgeError::ServiceStopped))
    }
}

#[derive(Clone, Debug)]
pub struct BridgeHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ChannelState>,
}

impl BridgeHandle {
    /// Reports an imminent navigation. Returns once queued; a block verdict
    /// is applied later through the tab controller.
    pub fn navigate(&self, event: NavigationEvent) -> BridgeResult<()> {
        self.commands
            .send(Command::Navigate(event))
            .map_err(|_| BridgeError::ServiceStopped)
    }

    pub fn update_config(&self, config: FocusConfig) -> ConfigReply {
        let (reply, rx) = oneshot::channel();
        // A stopped service drops `reply`, which resolves the future with an error.
        let _ = self.commands.send(Command::UpdateConfig { config, reply });
        Reply { rx }
    }

    /// Resolves once every request sent so far has been answered, or the
    /// channel has closed and left the rest unanswered.
    pub fn drain(&self) -> Reply<()> {
        let (reply, rx) = oneshot::channel();
        let _ = self.commands.send(Command::Drain(reply));
        Reply { rx }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

pub struct BridgeService;

impl BridgeService {
    /// Starts the event loop and makes the first connection attempt.
    pub fn spawn<C, T>(connector: C, tabs: T, config: BridgeConfig) -> (BridgeHandle, JoinHandle<()>)
    where
        C: NativeConnector,
        T: TabController + 'static,
    {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let manager = ChannelManager::new(connector, tabs, config, events_tx);
        let handle = BridgeHandle {
            commands: commands_tx,
            state: manager.subscribe_state(),
        };

        let task = tokio::spawn(run(manager, commands_rx, events_rx));
        (handle, task)
    }
}

async fn run<C, T>(
    mut manager: ChannelManager<C, T>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: mpsc::UnboundedReceiver<ChannelEvent>,
) where
    C: NativeConnector,
    T: TabController,
{
    info!("Bridge service started");
    manager.connect();

    let mut drains: Vec<oneshot::Sender<()>> = Vec::new();

    loop {
        let reconnect_at = manager.reconnect_deadline();

        tokio::select! {
            biased;

            Some(event) = events.recv() => manager.handle_event(event),

            _ = wait_until(reconnect_at), if reconnect_at.is_some() => {
                debug!("Reconnect delay elapsed");
                manager.reconnect_due();
            }

            command = commands.recv() => match command {
                Some(Command::Navigate(event)) => {
                    manager.check_navigation(event);
                }
                Some(Command::UpdateConfig { config, reply }) => {
                    manager.update_config(config, reply);
                }
                Some(Command::Drain(reply)) => drains.push(reply),
                Some(Command::Shutdown) | None => break,
            },
        }

        if !drains.is_empty() && manager.is_idle() {
            debug!("Bridge drained");
            for reply in drains.drain(..) {
                let _ = reply.send(());
            }
        }
    }

    info!(
        "Bridge service stopped with {} request(s) pending",
        manager.ledger().len()
    );
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

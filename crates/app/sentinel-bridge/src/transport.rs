//! Native channel plumbing: how a channel is opened and how its traffic and
//! end-of-stream reach the channel manager.

use std::{path::PathBuf, process::Stdio};

use serde_json::Value;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    process::{Child, Command},
    sync::mpsc,
};
use tracing::{debug, info};

use crate::{
    BridgeError, BridgeResult, HostManifest,
    framing::{read_framed, write_framed},
    protocol::OutboundMessage,
};

/// Identity of one opened channel. Only one channel is live at a time; the
/// generation lets late signals from a closed channel be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Message {
        generation: Generation,
        message: Value,
    },
    Disconnected {
        generation: Generation,
        reason: String,
    },
}

/// Sending half of an open channel.
pub struct NativePort {
    generation: Generation,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    _child: Option<Child>,
}

impl std::fmt::Debug for NativePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativePort")
            .field("generation", &self.generation)
            .field("closed", &self.outbound.is_closed())
            .finish()
    }
}

impl NativePort {
    pub fn new(generation: Generation, outbound: mpsc::UnboundedSender<OutboundMessage>) -> Self {
        Self {
            generation,
            outbound,
            _child: None,
        }
    }

    /// Keeps `child` alive for as long as the port; it is killed on drop.
    pub fn with_child(mut self, child: Child) -> Self {
        self._child = Some(child);
        self
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Queues a message for the writer. Never blocks.
    pub fn post(&self, message: OutboundMessage) -> BridgeResult<()> {
        self.outbound
            .send(message)
            .map_err(|_| BridgeError::ChannelUnavailable)
    }
}

/// Opens channels to the native host.
///
/// Opening is synchronous. Anything that goes wrong after the channel is
/// handed out must be reported as [`ChannelEvent::Disconnected`].
pub trait NativeConnector: Send + 'static {
    fn open(
        &mut self,
        generation: Generation,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> BridgeResult<NativePort>;
}

/// Wires a reader and writer onto an already-open byte stream pair.
pub fn spawn_stream_tasks<R, W>(
    generation: Generation,
    mut reader: R,
    mut writer: W,
    max_frame_size: usize,
    events: mpsc::UnboundedSender<ChannelEvent>,
) -> NativePort
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundMessage>();

    let writer_events = events.clone();
    tokio::spawn(async move {
        debug!("Native messaging writer task started ({})", generation);
        while let Some(message) = outbound_rx.recv().await {
            if let Err(err) = write_framed(&mut writer, &message).await {
                info!("Native host write error: {err:#}");
                let _ = writer_events.send(ChannelEvent::Disconnected {
                    generation,
                    reason: format!("write failed: {err}"),
                });
                break;
            }
        }
        debug!("Native messaging writer task stopped ({})", generation);
    });

    tokio::spawn(async move {
        debug!("Native messaging reader task started ({})", generation);
        let reason = loop {
            match read_framed::<_, Value>(&mut reader, max_frame_size).await {
                Ok(Some(message)) => {
                    if events
                        .send(ChannelEvent::Message {
                            generation,
                            message,
                        })
                        .is_err()
                    {
                        debug!("Channel manager is gone; stopping reader");
                        return;
                    }
                }
                Ok(None) => break "native host closed the channel".to_string(),
                Err(err) => break format!("read failed: {err}"),
            }
        };
        info!("Native host disconnected ({}): {}", generation, reason);
        let _ = events.send(ChannelEvent::Disconnected { generation, reason });
    });

    NativePort::new(generation, outbound_tx)
}

/// Launches the native host as a child process speaking over stdin/stdout.
#[derive(Debug, Clone)]
pub struct ProcessConnector {
    program: PathBuf,
    args: Vec<String>,
    max_frame_size: usize,
}

impl ProcessConnector {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, max_frame_size: usize) -> Self {
        Self {
            program: program.into(),
            args,
            max_frame_size,
        }
    }

    /// Uses the host binary registered in the browser's manifest.
    pub fn from_manifest(manifest: &HostManifest, max_frame_size: usize) -> Self {
        Self::new(&manifest.path, Vec::new(), max_frame_size)
    }
}

impl NativeConnector for ProcessConnector {
    fn open(
        &mut self,
        generation: Generation,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> BridgeResult<NativePort> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BridgeError::Launch {
                program: self.program.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(BridgeError::Launch {
                program: self.program.clone(),
                source: std::io::Error::other("native host stdio was not captured"),
            });
        };

        info!(
            "Connected to native host {:?} (pid {:?}, {})",
            self.program,
            child.id(),
            generation
        );

        Ok(spawn_stream_tasks(generation, stdout, stdin, self.max_frame_size, events).with_child(child))
    }
}

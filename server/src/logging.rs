//! Framed logging channel between a room worker and the hub (§4.7), and the
//! HANDSHAKE / HANDSHAKE-ACK / CLOSE / CLOSE-ACK state machine that
//! establishes and tears it down reliably (Design Notes: "make it
//! explicit, with timeouts").

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// The method codes a log frame's envelope carries (spec §4.7: "codes
/// enumerate debug/info/warn/error/fatal/handleError/handleFatal/
/// sender-side-error/sender-side-debug").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodCode {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    HandleError,
    HandleFatal,
    SenderError,
    SenderDebug,
    Handshake,
    HandshakeAck,
    Close,
    CloseAck,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFrame {
    pub method: MethodCode,
    pub payload: String,
}

impl LogFrame {
    pub fn new(method: MethodCode, payload: impl Into<String>) -> Self {
        LogFrame { method, payload: payload.into() }
    }

    /// Mirror the frame into the room worker's own process log, so the
    /// local log captures everything forwarded to the hub too.
    pub fn emit_local(&self) {
        match self.method {
            MethodCode::Debug | MethodCode::SenderDebug => log::debug!("{}", self.payload),
            MethodCode::Info | MethodCode::Handshake | MethodCode::HandshakeAck => {
                log::info!("{}", self.payload)
            }
            MethodCode::Warn => log::warn!("{}", self.payload),
            MethodCode::Error | MethodCode::HandleError | MethodCode::SenderError => {
                log::error!("{}", self.payload)
            }
            MethodCode::Fatal | MethodCode::HandleFatal => log::error!("FATAL: {}", self.payload),
            MethodCode::Close | MethodCode::CloseAck => log::info!("{}", self.payload),
        }
    }
}

/// The logging-link handshake state machine (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    AwaitingAck,
    Open,
    Closing,
    Closed,
}

/// One side's view of the framed log channel. Holds the state machine;
/// callers drive it by feeding received frames and asking it what to send.
pub struct LogChannel {
    state: HandshakeState,
    tx: mpsc::Sender<LogFrame>,
}

impl LogChannel {
    pub fn new(tx: mpsc::Sender<LogFrame>) -> Self {
        LogChannel { state: HandshakeState::Idle, tx }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Initiate the handshake: send HANDSHAKE and wait up to
    /// `HANDSHAKE_TIMEOUT` for the ack to flow back through `rx`.
    pub async fn open(&mut self, rx: &mut mpsc::Receiver<LogFrame>) -> bool {
        if self.tx.send(LogFrame::new(MethodCode::Handshake, "")).await.is_err() {
            return false;
        }
        self.state = HandshakeState::AwaitingAck;

        let ack = timeout(HANDSHAKE_TIMEOUT, async {
            while let Some(frame) = rx.recv().await {
                if frame.method == MethodCode::HandshakeAck {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);

        self.state = if ack { HandshakeState::Open } else { HandshakeState::Closed };
        ack
    }

    /// Respond to a received HANDSHAKE with a HANDSHAKE-ACK.
    pub async fn acknowledge(&mut self) -> bool {
        let sent = self.tx.send(LogFrame::new(MethodCode::HandshakeAck, "")).await.is_ok();
        if sent {
            self.state = HandshakeState::Open;
        }
        sent
    }

    pub async fn send(&mut self, frame: LogFrame) -> bool {
        if self.state != HandshakeState::Open {
            return false;
        }
        frame.emit_local();
        self.tx.send(frame).await.is_ok()
    }

    /// Tear down the link: send CLOSE, wait up to `CLOSE_TIMEOUT` for
    /// CLOSE-ACK, then mark the channel closed regardless of whether the
    /// ack arrived (room shutdown must not hang on a dead peer).
    pub async fn close(&mut self, rx: &mut mpsc::Receiver<LogFrame>) {
        self.state = HandshakeState::Closing;
        let _ = self.tx.send(LogFrame::new(MethodCode::Close, "")).await;

        let _ = timeout(CLOSE_TIMEOUT, async {
            while let Some(frame) = rx.recv().await {
                if frame.method == MethodCode::CloseAck {
                    return;
                }
            }
        })
        .await;

        self.state = HandshakeState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handshake_reaches_open_when_peer_acks() {
        // a's outgoing frames are b's incoming, and vice versa.
        let (a_to_b_tx, mut a_to_b_rx) = mpsc::channel(8);
        let (b_to_a_tx, mut b_to_a_rx) = mpsc::channel(8);
        let mut a = LogChannel::new(a_to_b_tx);
        let mut b = LogChannel::new(b_to_a_tx);

        let b_task = tokio::spawn(async move {
            let frame = a_to_b_rx.recv().await.unwrap();
            assert_eq!(frame.method, MethodCode::Handshake);
            b.acknowledge().await;
        });

        let opened = a.open(&mut b_to_a_rx).await;
        b_task.await.unwrap();
        assert!(opened);
        assert_eq!(a.state(), HandshakeState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_times_out_without_a_peer() {
        let (tx_a, _rx_never_acks) = mpsc::channel(8);
        let (_tx_unused, mut rx_a) = mpsc::channel::<LogFrame>(8);
        let mut a = LogChannel::new(tx_a);
        let opened = a.open(&mut rx_a).await;
        assert!(!opened);
        assert_eq!(a.state(), HandshakeState::Closed);
    }

    #[tokio::test]
    async fn send_before_handshake_is_rejected() {
        let (tx, _rx) = mpsc::channel(8);
        let mut channel = LogChannel::new(tx);
        let sent = channel.send(LogFrame::new(MethodCode::Info, "hi")).await;
        assert!(!sent);
    }
}

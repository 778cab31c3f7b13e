//! # Player Session
//!
//! One task per connection. The session decodes keys into inputs and
//! commands, turns frames from the host into terminal bytes, and pushes
//! them through an [`OutputPump`] in front of the socket.
//!
//! ```text
//! socket ─read─► KeyDecoder ─► InputSender / HostCommand
//! host ─SessionEvent─► TerminalRenderer ─► OutputPump ─► SocketBuffer ─write─► socket
//! ```
//!
//! The socket is written only as fast as it accepts data; when it falls
//! behind, the pump drops old frames instead of queueing them.

use crossterm::cursor::{MoveTo, Show};
use crossterm::queue;
use crossterm::style::ResetColor;
use crossterm::terminal::{Clear, ClearType};
use glyphworld_render::{PixelGrid, RenderMode, TerminalRenderer};
use glyphworld_shared::WorldConfig;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::art::{ArtGenerator, SpriteForge};
use crate::auth::{Authenticator, Identity};
use crate::error::ServerResult;
use crate::host::HostHandle;
use crate::keys::{KeyAction, KeyDecoder};
use crate::protocol::{session_channel, HostCommand, SessionEvent, ViewerSettings};
use crate::pump::{OutputPump, PumpMetrics};
use crate::transport::{SocketBuffer, Transport};

const READ_BUFFER: usize = 256;
const BELL: &[u8] = b"\x07";

/// How long a notice replaces the status line.
const NOTICE_FRAMES: u32 = 60;

/// Per-session limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Queued output bytes before old frames are dropped.
    pub pump_ceiling: usize,
    /// Staged socket bytes before the pump pauses.
    pub high_water_mark: usize,
    /// Initial viewport.
    pub settings: ViewerSettings,
}

impl SessionConfig {
    /// Limits from the world configuration.
    #[must_use]
    pub fn from_config(config: &WorldConfig) -> Self {
        Self {
            pump_ceiling: config.pump_ceiling_bytes,
            high_water_mark: config.socket_high_water_mark,
            settings: ViewerSettings {
                cols: config.viewport_cols,
                rows: config.viewport_rows + 1,
                mode: RenderMode::from(config.render_mode),
            },
        }
    }
}

/// What a finished session did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    /// Who was connected.
    pub identity: Identity,
    /// Output counters at the end.
    pub metrics: PumpMetrics,
}

struct Overlay {
    prompt: Option<String>,
    notice: Option<(String, u32)>,
}

impl Overlay {
    fn status(&mut self, base: &str) -> String {
        if let Some(prompt) = &self.prompt {
            return format!(" say: {prompt}_");
        }
        if let Some((text, frames)) = &mut self.notice {
            let line = format!(" {text}");
            *frames = frames.saturating_sub(1);
            if *frames == 0 {
                self.notice = None;
            }
            return line;
        }
        base.to_owned()
    }
}

/// Runs one player session over `stream` until the player quits, the
/// connection drops or the world stops.
///
/// # Errors
///
/// Authentication failed, the world is gone, or the socket failed.
pub async fn run_session<IO, A, G>(
    stream: IO,
    fingerprint: &str,
    requested_name: &str,
    host: HostHandle,
    auth: &A,
    forge: SpriteForge<G>,
    config: SessionConfig,
) -> ServerResult<SessionSummary>
where
    IO: AsyncRead + AsyncWrite + Unpin,
    A: Authenticator + ?Sized,
    G: ArtGenerator,
{
    let identity = auth.authenticate(fingerprint, requested_name)?;
    let player_id = identity.user_id.clone();
    let session_id = host.next_session_id();
    let (events_tx, mut events) = session_channel();
    let notices = events_tx.downgrade();

    let mut settings = config.settings;
    host.send(HostCommand::Connect {
        identity: identity.clone(),
        session_id,
        settings,
        events: events_tx,
    })?;
    info!(player = %player_id, session_id, "Session started");

    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut pump = OutputPump::new(SocketBuffer::new(config.high_water_mark), config.pump_ceiling);
    let mut renderer = TerminalRenderer::new(settings.mode);
    let mut decoder = KeyDecoder::new();
    let mut overlay = Overlay {
        prompt: None,
        notice: None,
    };
    let mut read_buf = [0u8; READ_BUFFER];
    let mut actions = Vec::new();

    let outcome: ServerResult<()> = loop {
        let pending = pump.transport().pending();
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    debug!(player = %player_id, "World closed the session");
                    break Ok(());
                };
                match event {
                    SessionEvent::Frame(frame) => {
                        let status = overlay.status(&frame.status);
                        if let Err(e) = push_frame(&mut renderer, &mut pump, &frame.pixels, &status) {
                            break Err(e);
                        }
                    }
                    SessionEvent::Chat(_) => {
                        if let Err(e) = pump.write_immediate(BELL) {
                            break Err(e.into());
                        }
                    }
                    SessionEvent::Notice(text) => {
                        overlay.notice = Some((text, NOTICE_FRAMES));
                    }
                }
            }
            read = reader.read(&mut read_buf) => {
                let n = match read {
                    Ok(0) => break Ok(()),
                    Ok(n) => n,
                    Err(e) => break Err(e.into()),
                };
                actions.clear();
                decoder.feed(&read_buf[..n], &mut actions);
                if read_buf[..n] == [0x1b] {
                    decoder.flush(&mut actions);
                }
                let mut quit = false;
                for action in actions.drain(..) {
                    match action {
                        KeyAction::Move { dx, dy } => {
                            host.inputs().send_move(&player_id, dx, dy);
                        }
                        KeyAction::ChatOpened => overlay.prompt = Some(String::new()),
                        KeyAction::ChatEdited(text) => overlay.prompt = Some(text),
                        KeyAction::ChatCancelled => overlay.prompt = None,
                        KeyAction::Chat(text) => {
                            overlay.prompt = None;
                            host.send(HostCommand::Chat {
                                player_id: player_id.clone(),
                                text,
                            })?;
                        }
                        KeyAction::Describe(description) => {
                            overlay.prompt = None;
                            if let Some(tx) = notices.upgrade() {
                                let forge = forge.clone();
                                let key = player_id.clone();
                                tokio::spawn(async move {
                                    let outcome = forge.forge(&key, &description).await;
                                    let _ = tx.send(SessionEvent::Notice(outcome.message)).await;
                                });
                            }
                        }
                        KeyAction::SetMode(mode) => {
                            settings.mode = mode;
                            renderer.set_mode(mode);
                            host.send(HostCommand::Resize {
                                player_id: player_id.clone(),
                                settings,
                            })?;
                        }
                        KeyAction::Redraw => renderer.invalidate(),
                        KeyAction::Quit => quit = true,
                    }
                }
                if quit {
                    break Ok(());
                }
            }
            written = writer.write(pending), if !pending.is_empty() => {
                let n = match written {
                    Ok(0) => break Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into()),
                    Ok(n) => n,
                    Err(e) => break Err(e.into()),
                };
                if pump.transport_mut().consume(n) {
                    if let Err(e) = pump.on_drain() {
                        break Err(e.into());
                    }
                }
            }
        }
    };

    // The world may already be gone; nothing left to tell it then.
    let _ = host.send(HostCommand::Disconnect {
        player_id: player_id.clone(),
        session_id,
    });

    let metrics = *pump.metrics();
    pump.destroy();
    if outcome.is_ok() {
        restore_terminal(&mut writer).await;
    }
    match &outcome {
        Ok(()) => info!(
            player = %player_id,
            frames = metrics.frames_written,
            dropped = metrics.frames_dropped,
            "Session ended"
        ),
        Err(e) => warn!(player = %player_id, error = %e, "Session failed"),
    }
    outcome.map(|()| SessionSummary { identity, metrics })
}

/// Renders `pixels` and queues the bytes.
///
/// Queued diffs are relative to frames the client may never get. When
/// the ceiling drops anything, the backlog is replaced by a full redraw
/// of this frame.
fn push_frame<T: Transport>(
    renderer: &mut TerminalRenderer,
    pump: &mut OutputPump<T>,
    pixels: &PixelGrid,
    status: &str,
) -> ServerResult<()> {
    let bytes = renderer.render_with_status(pixels, status)?;
    let dropped = pump.metrics().frames_dropped;
    pump.enqueue(bytes)?;
    if pump.metrics().frames_dropped > dropped {
        renderer.invalidate();
        let full = renderer.render_with_status(pixels, status)?;
        pump.replace_queued(full)?;
    }
    Ok(())
}

async fn restore_terminal<W: AsyncWrite + Unpin>(writer: &mut W) {
    let mut bytes = Vec::new();
    if queue!(bytes, ResetColor, Clear(ClearType::All), MoveTo(0, 0), Show).is_err() {
        return;
    }
    if writer.write_all(&bytes).await.is_ok() {
        let _ = writer.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyphworld_render::Rgb;

    #[test]
    fn test_notice_expires() {
        let mut overlay = Overlay {
            prompt: None,
            notice: Some(("hello".into(), 2)),
        };
        assert_eq!(overlay.status("base"), " hello");
        assert_eq!(overlay.status("base"), " hello");
        assert_eq!(overlay.status("base"), "base");
    }

    #[test]
    fn test_prompt_wins() {
        let mut overlay = Overlay {
            prompt: Some("hi".into()),
            notice: Some(("hello".into(), 2)),
        };
        assert_eq!(overlay.status("base"), " say: hi_");
    }

    #[test]
    fn test_dropped_frames_leave_a_full_redraw() {
        let mode = RenderMode::HalfBlock;
        let mut renderer = TerminalRenderer::new(mode);
        let mut pump = OutputPump::new(SocketBuffer::new(1), 1);

        let first = PixelGrid::filled(8, 8, Rgb::new(10, 120, 10));
        push_frame(&mut renderer, &mut pump, &first, "s").expect("first");
        let seen_first = pump.transport().pending().len();
        assert!(pump.is_blocked());

        let mut second = first.clone();
        second.set(0, 0, Some(Rgb::new(200, 0, 0)));
        push_frame(&mut renderer, &mut pump, &second, "s").expect("second");

        let mut third = second.clone();
        third.set(7, 7, Some(Rgb::new(0, 0, 200)));
        push_frame(&mut renderer, &mut pump, &third, "s").expect("third");
        assert_eq!(pump.metrics().frames_dropped, 1);

        pump.transport_mut().consume(seen_first);
        pump.on_drain().expect("drain");

        // Only the first frame reached the client, so it needs every
        // cell of the third, including the one only the second changed.
        let mut fresh = TerminalRenderer::new(mode);
        let expected = fresh.render_with_status(&third, "s").expect("full");
        assert_eq!(pump.transport().pending(), expected.as_slice());
        assert_eq!(pump.queued_chunks(), 0);
    }

    #[test]
    fn test_config_reserves_status_row() {
        let config = WorldConfig::default();
        let session = SessionConfig::from_config(&config);
        assert_eq!(session.settings.rows, config.viewport_rows + 1);
        assert_eq!(session.pump_ceiling, config.pump_ceiling_bytes);
    }
}

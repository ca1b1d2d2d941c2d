//! Async host glue: background decoding and a timer driven player loop.

use log::{debug, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::compositor::Canvas;
use crate::document::{self, GifDocument};
use crate::error::{Error, Result};
use crate::player::{Player, PlayerEvent, SeekTarget};

fn spawn_decode(bytes: Vec<u8>) -> JoinHandle<Result<GifDocument>> {
    tokio::task::spawn_blocking(move || document::decode(&bytes))
}

/// Decodes `bytes` on the blocking thread pool.
pub async fn decode_in_background(bytes: Vec<u8>) -> Result<GifDocument> {
    spawn_decode(bytes)
        .await
        .map_err(|err| Error::DecodeTask(err.to_string()))?
}

#[derive(Debug)]
pub enum Command {
    Load(Vec<u8>),
    LoadDocument(Box<GifDocument>),
    Play,
    Pause,
    Stop,
    Toggle,
    Seek(SeekTarget),
    UserInput,
    SetRawMode(bool),
    SetBackgroundRenderMode(bool),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Player(PlayerEvent),
    DecodeError(String),
}

/// Cloneable control surface of a running [`PlayerDriver`]. Every method
/// returns `false` once the driver has shut down.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    commands: UnboundedSender<Command>,
}

impl PlayerHandle {
    fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Decodes `bytes` in the background, then shows the result. Replaces any
    /// decode still in flight.
    pub fn load(&self, bytes: Vec<u8>) -> bool {
        self.send(Command::Load(bytes))
    }

    pub fn load_document(&self, document: GifDocument) -> bool {
        self.send(Command::LoadDocument(Box::new(document)))
    }

    pub fn play(&self) -> bool {
        self.send(Command::Play)
    }

    pub fn pause(&self) -> bool {
        self.send(Command::Pause)
    }

    pub fn stop(&self) -> bool {
        self.send(Command::Stop)
    }

    pub fn toggle(&self) -> bool {
        self.send(Command::Toggle)
    }

    pub fn seek(&self, target: SeekTarget) -> bool {
        self.send(Command::Seek(target))
    }

    pub fn user_input(&self) -> bool {
        self.send(Command::UserInput)
    }

    pub fn set_raw_mode(&self, raw: bool) -> bool {
        self.send(Command::SetRawMode(raw))
    }

    pub fn set_background_render_mode(&self, render_background: bool) -> bool {
        self.send(Command::SetBackgroundRenderMode(render_background))
    }

    pub fn shutdown(&self) -> bool {
        self.send(Command::Shutdown)
    }
}

/// Owns a [`Player`] and supplies its clock. Spawn [`PlayerDriver::run`] on
/// a tokio runtime and steer it through the [`PlayerHandle`].
pub struct PlayerDriver<C: Canvas> {
    player: Player<C>,
    commands: UnboundedReceiver<Command>,
    notifications: UnboundedSender<Notification>,
    decode: Option<JoinHandle<Result<GifDocument>>>,
    origin: Instant,
}

pub fn channel<C: Canvas>(player: Player<C>) -> (PlayerHandle, PlayerDriver<C>, UnboundedReceiver<Notification>) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (notification_tx, notification_rx) = mpsc::unbounded_channel();

    let driver = PlayerDriver {
        player,
        commands: command_rx,
        notifications: notification_tx,
        decode: None,
        origin: Instant::now(),
    };

    (PlayerHandle { commands: command_tx }, driver, notification_rx)
}

impl<C: Canvas> PlayerDriver<C> {
    /// Runs until shut down or every handle is dropped, then hands the player back.
    pub async fn run(mut self) -> Player<C> {
        loop {
            let deadline = self.player.deadline().map(|deadline| self.origin + deadline);

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                result = wait_for(&mut self.decode) => {
                    self.decode = None;
                    self.finish_decode(result);
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let now = self.now();
                    self.player.advance(now);
                }
            }

            self.flush();
        }

        self.abort_decode();
        self.flush();
        debug!("player driver shut down");
        self.player
    }

    fn now(&self) -> std::time::Duration {
        self.origin.elapsed()
    }

    fn handle(&mut self, command: Command) {
        debug!("handling command {:?}", CommandName(&command));
        let now = self.now();

        match command {
            Command::Load(bytes) => {
                self.abort_decode();
                self.player.unload();
                self.decode = Some(spawn_decode(bytes));
            }
            Command::LoadDocument(document) => {
                self.abort_decode();
                self.player.load(*document);
            }
            Command::Play => {
                self.player.play(now);
            }
            Command::Pause => self.player.pause(),
            Command::Stop => self.player.stop(),
            Command::Toggle => {
                self.player.toggle(now);
            }
            Command::Seek(target) => self.player.seek(target),
            Command::UserInput => {
                self.player.user_input(now);
            }
            Command::SetRawMode(raw) => self.player.set_raw_mode(raw),
            Command::SetBackgroundRenderMode(render_background) => {
                self.player.set_background_render_mode(render_background)
            }
            Command::Shutdown => {}
        }
    }

    fn finish_decode(&mut self, result: Result<GifDocument>) {
        match result {
            Ok(document) => self.player.load(document),
            Err(err) => {
                warn!("failed to decode: {}", err);
                self.notify(Notification::DecodeError(err.to_string()));
            }
        }
    }

    fn abort_decode(&mut self) {
        if let Some(decode) = self.decode.take() {
            debug!("abandoning in-flight decode");
            decode.abort();
        }
    }

    fn flush(&mut self) {
        for event in self.player.take_events() {
            self.notify(Notification::Player(event));
        }
    }

    fn notify(&self, notification: Notification) {
        if self.notifications.send(notification).is_err() {
            debug!("notification receiver is gone");
        }
    }
}

async fn wait_for(decode: &mut Option<JoinHandle<Result<GifDocument>>>) -> Result<GifDocument> {
    match decode {
        Some(handle) => handle
            .await
            .map_err(|err| Error::DecodeTask(err.to_string()))?,
        None => std::future::pending().await,
    }
}

// loaded bytes would flood the log
struct CommandName<'c>(&'c Command);

impl std::fmt::Debug for CommandName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Command::Load(bytes) => write!(f, "Load({} bytes)", bytes.len()),
            Command::LoadDocument(_) => f.write_str("LoadDocument"),
            command => write!(f, "{:?}", command),
        }
    }
}

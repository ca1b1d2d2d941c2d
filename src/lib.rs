//! GIF87a/89a decoding and frame accurate playback.
//!
//! [`decode`] turns a complete file into a [`GifDocument`]. A [`Player`]
//! draws that document onto any [`Canvas`], honouring disposal methods,
//! delays, loop counts and user input flags. [`runtime`] wires both up to
//! tokio for hosts that want a ready made timer and background decoding.

pub mod compositor;
pub mod document;
pub mod error;
pub mod parser;
pub mod player;
pub mod reader;
pub mod runtime;

#[cfg(test)]
mod test_utils;

pub use compositor::{BlockGlyphs, Canvas, GlyphPlacement, GlyphRasterizer, NoGlyphs, Rect, Surface};
pub use document::{decode, DelayPolicy, Frame, GifDocument};
pub use error::{Anomaly, Error, ErrorKind, Result};
pub use parser::{Block, Decoder, DisposalMethod, LoopCount};
pub use player::{PlaybackState, Player, PlayerEvent, PlayerOptions, Schedule, SeekTarget, WaitOutcome};
pub use runtime::{channel, decode_in_background, Notification, PlayerDriver, PlayerHandle};

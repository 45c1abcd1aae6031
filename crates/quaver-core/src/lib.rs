//! Quaver Core - Audio playback engine
//!
//! This crate provides the pieces of a pull-driven audio player:
//! interchangeable decoder backends selected by name, an adaptive tick
//! scheduler, the output and callback sink contracts, and a playlist
//! with a shuffle order that stays stable while tracks are added and
//! removed.

pub mod callbacks;
pub mod command;
pub mod decoder;
pub mod library;
pub mod output;
pub mod player;
pub mod playlist;
pub mod scheduler;

#[cfg( test )]
mod testing;

pub use callbacks::{ CallbackSink, ChannelCallbacks, PlayerEvent };
pub use command::{ Command, CommandError };
pub use decoder::{ registry, Backend, BackendState, Control, DecoderContext, DecoderOps, SoftvolOp };
pub use output::{ CpalOutput, OutputSink, SampleFormat };
pub use player::{ NowPlaying, PlaybackState, Player, PlayerError };
pub use playlist::{ Playlist, PlaylistEntry, PlaylistError };
pub use scheduler::{ PlaybackScheduler, TickPlan };

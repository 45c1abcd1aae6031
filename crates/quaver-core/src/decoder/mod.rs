//! Decoder backends
//!
//! A backend wraps one decoding engine behind the [`DecoderOps`]
//! operation set. Backends are a closed set of variants collected in
//! [`Backend`]; the [`registry`] picks one by name. The engines that
//! produce audio plug a [`TrackSource`] into the shared [`PullBackend`].
//!
//! Every backend owns a [`DecoderContext`] holding the host's callback
//! sink and the output sink. Tearing a backend down with
//! [`Backend::shutdown`] stops the output and hands the context back,
//! and a new backend can only be built from a context. This way an
//! output sink is never bound to two backends at once.

use std::fmt;
use std::path::{ Path, PathBuf };

use thiserror::Error;

use crate::callbacks::CallbackSink;
use crate::output::{ OutputError, OutputSink };

mod hound_backend;
mod null;
mod pull;
pub mod registry;
mod symphonia_backend;

pub use hound_backend::{ HoundBackend, WavTrack };
pub use null::NullBackend;
pub use pull::{ PullBackend, TrackSource, TrackTags };
pub use symphonia_backend::{ SymphoniaBackend, SymphoniaTrack };


/// Highest softvol value, a 1.3x gain boost.
pub const SOFTVOL_MAX: u32 = 130;

/// Softvol value for unity gain.
pub const SOFTVOL_UNITY: u32 = 100;


/// Playback control.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Control {
    /// Start or resume playback.
    Play,
    /// Pause playback.
    Pause,
}


/// Software volume operation.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum SoftvolOp {
    Get,
    /// Sets the volume, clamped to `0..=SOFTVOL_MAX`.
    Set( u32 ),
}


/// Lifecycle of a backend.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum BackendState {
    Uninitialized,
    /// Constructed, or a track has just been loaded.
    Ready,
    Playing,
    Paused,
    /// The decode stream of the current track ran out.
    Finished,
}


/// Errors that can occur while loading a track.
#[derive( Debug, Error )]
pub enum LoadError {
    #[error( "Failed to open {path:?}: {source}" )]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error( "Unsupported format" )]
    UnsupportedFormat,

    #[error( "No audio tracks found" )]
    NoAudioTrack,

    #[error( "Decoder creation failed: {0}" )]
    DecoderCreation( String ),

    #[error( "Output setup failed: {0}" )]
    Output( #[from] OutputError ),

    #[error( "Backend '{0}' can't play anything" )]
    NoDecoder( &'static str ),
}


/// Errors that can occur while seeking.
#[derive( Debug, Error )]
pub enum SeekError {
    #[error( "No track loaded" )]
    NoTrack,

    #[error( "Seek failed: {0}" )]
    Engine( String ),
}


/// A packet or sample block the engine could not decode.
#[derive( Debug, Error )]
#[error( "Decode failed: {0}" )]
pub struct DecodeError( pub String );


/// Errors that can occur while constructing a backend.
#[derive( Debug, Error )]
pub enum BackendError {
    #[error( "No output sink available" )]
    NoOutput,

    #[error( "Output error: {0}" )]
    Output( #[from] OutputError ),
}


/// A failed construction, handing the context back to the caller.
#[derive( Debug, Error )]
#[error( "{error}" )]
pub struct ConstructError {
    #[source]
    pub error: BackendError,
    pub context: DecoderContext,
}


/// The operation set every backend implements.
pub trait DecoderOps {
    /// Registry name of the backend.
    fn name( &self ) -> &'static str;

    fn state( &self ) -> BackendState;

    /// Loads a track. On success the backend is [`BackendState::Ready`]
    /// and has reported duration, track info and (if any) cover art.
    fn load( &mut self, path: &Path ) -> Result<(), LoadError>;

    /// Seeks to `offset_ms` from the start of the track.
    fn seek( &mut self, offset_ms: i64 ) -> Result<(), SeekError>;

    /// Play/pause. Repeating the current state is a no-op.
    fn control( &mut self, ctrl: Control );

    /// Gets or sets the software volume, returns the current value.
    fn softvol( &mut self, op: SoftvolOp ) -> u32;

    /// Does a bounded slice of work, returns the delay in milliseconds
    /// before the next call.
    fn tick( &mut self ) -> u64;
}


/// State a backend is bound to for its whole lifetime.
pub struct DecoderContext {
    callbacks: Box<dyn CallbackSink>,
    output: Option<Box<dyn OutputSink>>,
}


impl fmt::Debug for DecoderContext {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.debug_struct( "DecoderContext" )
            .field( "has_output", &self.output.is_some() )
            .finish_non_exhaustive()
    }
}


impl DecoderContext {
    /// Creates a context without an output sink; only backends that
    /// don't produce samples themselves can be built from it.
    pub fn new( callbacks: Box<dyn CallbackSink> ) -> Self {
        Self { callbacks, output: None }
    }


    /// Attaches an output sink.
    pub fn with_output( mut self, output: Box<dyn OutputSink> ) -> Self {
        self.output = Some( output );
        self
    }


    pub fn has_output( &self ) -> bool {
        self.output.is_some()
    }


    pub( crate ) fn take_output( &mut self ) -> Option<Box<dyn OutputSink>> {
        self.output.take()
    }


    pub( crate ) fn attach_output( &mut self, output: Box<dyn OutputSink> ) {
        self.output = Some( output );
    }


    pub( crate ) fn track_info( &mut self, artist: Option<&str>, album: Option<&str>, title: Option<&str> ) {
        self.callbacks.on_track_info( artist, album, title );
    }


    pub( crate ) fn track_duration( &mut self, duration_ms: u64 ) {
        self.callbacks.on_duration( duration_ms );
    }


    /// Reports the end of the current track.
    pub( crate ) fn track_finished( &mut self ) {
        self.callbacks.on_duration( 0 );
    }


    pub( crate ) fn track_pos( &mut self, position_ms: u64 ) {
        self.callbacks.on_position( position_ms );
    }


    pub( crate ) fn track_art( &mut self, data: &[u8] ) {
        self.callbacks.on_art( data );
    }
}


/// Clamps a requested softvol value into range.
pub fn clamp_softvol( value: u32 ) -> u32 {
    value.min( SOFTVOL_MAX )
}


/// Converts a millisecond offset into frames at `sample_rate`.
///
/// Negative offsets map to the start of the track; offsets past what a
/// `u64` frame count can hold saturate, the engine clamps them to the
/// track.
pub fn ms_to_frames( offset_ms: i64, sample_rate: u32 ) -> u64 {
    let ms = u128::try_from( offset_ms ).unwrap_or( 0 );
    u64::try_from( ms * u128::from( sample_rate ) / 1000 ).unwrap_or( u64::MAX )
}


/// Converts a frame count at `sample_rate` into rounded milliseconds.
pub fn frames_to_ms( frames: u64, sample_rate: u32 ) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    let rate = u128::from( sample_rate );
    u64::try_from( ( u128::from( frames ) * 1000 + rate / 2 ) / rate ).unwrap_or( u64::MAX )
}


/// The active backend, one of the registered variants.
#[derive( Debug )]
pub enum Backend {
    Symphonia( SymphoniaBackend ),
    Hound( HoundBackend ),
    Null( NullBackend ),
}


impl Backend {
    /// Tears the backend down and returns its context.
    ///
    /// The output sink is stopped and the decoder handle released
    /// before the context is handed back.
    pub fn shutdown( self ) -> DecoderContext {
        let context = match self {
            Backend::Symphonia( b ) => b.shutdown(),
            Backend::Hound( b ) => b.shutdown(),
            Backend::Null( b ) => b.shutdown(),
        };
        tracing::debug!( "Backend torn down" );
        context
    }


    fn ops( &self ) -> &dyn DecoderOps {
        match self {
            Backend::Symphonia( b ) => b,
            Backend::Hound( b ) => b,
            Backend::Null( b ) => b,
        }
    }


    fn ops_mut( &mut self ) -> &mut dyn DecoderOps {
        match self {
            Backend::Symphonia( b ) => b,
            Backend::Hound( b ) => b,
            Backend::Null( b ) => b,
        }
    }
}


impl DecoderOps for Backend {
    fn name( &self ) -> &'static str {
        self.ops().name()
    }


    fn state( &self ) -> BackendState {
        self.ops().state()
    }


    fn load( &mut self, path: &Path ) -> Result<(), LoadError> {
        self.ops_mut().load( path )
    }


    fn seek( &mut self, offset_ms: i64 ) -> Result<(), SeekError> {
        self.ops_mut().seek( offset_ms )
    }


    fn control( &mut self, ctrl: Control ) {
        self.ops_mut().control( ctrl )
    }


    fn softvol( &mut self, op: SoftvolOp ) -> u32 {
        self.ops_mut().softvol( op )
    }


    fn tick( &mut self ) -> u64 {
        self.ops_mut().tick()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_clamp_softvol() {
        assert_eq!( clamp_softvol( 0 ), 0 );
        assert_eq!( clamp_softvol( 100 ), 100 );
        assert_eq!( clamp_softvol( 131 ), SOFTVOL_MAX );
        assert_eq!( clamp_softvol( u32::MAX ), SOFTVOL_MAX );
    }


    #[test]
    fn test_time_base_conversion() {
        assert_eq!( ms_to_frames( 1500, 44100 ), 66150 );
        assert_eq!( ms_to_frames( -20, 44100 ), 0 );
        assert_eq!( frames_to_ms( 66150, 44100 ), 1500 );
        assert_eq!( frames_to_ms( 80_000, 8000 ), 10_000 );
        assert_eq!( frames_to_ms( 5, 0 ), 0 );
    }


    #[test]
    fn test_huge_offsets_saturate() {
        assert_eq!( ms_to_frames( i64::MAX, 44100 ), u64::MAX );
        assert_eq!( ms_to_frames( i64::MAX, 1000 ), i64::MAX as u64 );
        assert_eq!( frames_to_ms( u64::MAX, 1 ), u64::MAX );
    }
}

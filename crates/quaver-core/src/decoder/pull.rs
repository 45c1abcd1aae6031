//! Pull-driven backend shared by the decoding engines
//!
//! Decoding happens on the control thread, inside `tick()`. Each tick
//! asks the output sink how much room it has, lets the
//! [`PlaybackScheduler`] decide whether to pull at all, and then decodes
//! just enough from the [`TrackSource`] to fill that room.

use std::fmt;
use std::path::Path;

use super::{
    clamp_softvol, frames_to_ms, ms_to_frames, BackendError, BackendState, ConstructError, Control,
    DecodeError, DecoderContext, DecoderOps, LoadError, SeekError, SoftvolOp, SOFTVOL_UNITY,
};
use crate::output::{ OutputSink, SampleFormat };
use crate::scheduler::{ PlaybackScheduler, TickPlan, MAX_INTERVAL_MS };


/// Tags pulled out of a track on load.
#[derive( Debug, Clone, Default, PartialEq, Eq )]
pub struct TrackTags {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    /// Encoded cover image.
    pub art: Option<Vec<u8>>,
}


/// One open track of a decoding engine.
pub trait TrackSource: Sized {
    /// Registry name of the backend built on this engine.
    const NAME: &'static str;

    fn open( path: &Path ) -> Result<Self, LoadError>;

    fn sample_rate( &self ) -> u32;

    fn channels( &self ) -> u16;

    fn format( &self ) -> SampleFormat;

    /// Track length in milliseconds, 0 when unknown.
    fn duration_ms( &self ) -> u64;

    fn tags( &mut self ) -> TrackTags;

    /// Decodes the next block and appends its interleaved samples,
    /// scaled by `gain`, to `out`.
    ///
    /// Returns false at the end of the stream.
    fn decode_into( &mut self, out: &mut Vec<f32>, gain: f32 ) -> Result<bool, DecodeError>;

    /// Seeks to a frame offset, returns the frame actually landed on.
    fn seek( &mut self, frames: u64 ) -> Result<u64, SeekError>;
}


/// Backend decoding with `S` and writing to an [`OutputSink`].
pub struct PullBackend<S> {
    context: DecoderContext,
    output: Box<dyn OutputSink>,
    track: Option<S>,
    state: BackendState,
    scheduler: PlaybackScheduler,
    /// Decoded samples that didn't fit into the sink yet.
    pending: Vec<f32>,
    /// Frames handed to the sink since the start of the track.
    position: u64,
    softvol: u32,
}


impl<S: TrackSource> fmt::Debug for PullBackend<S> {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.debug_struct( "PullBackend" )
            .field( "engine", &S::NAME )
            .field( "state", &self.state )
            .field( "has_track", &self.track.is_some() )
            .field( "position", &self.position )
            .field( "softvol", &self.softvol )
            .field( "scheduler", &self.scheduler )
            .finish_non_exhaustive()
    }
}


impl<S: TrackSource> PullBackend<S> {
    pub const NAME: &'static str = S::NAME;


    /// Builds the backend, taking over the context's output sink.
    pub fn construct( mut context: DecoderContext ) -> Result<Self, ConstructError> {
        let Some( output ) = context.take_output() else {
            return Err( ConstructError { error: BackendError::NoOutput, context } );
        };

        tracing::debug!( "{} backend ready", S::NAME );

        Ok( Self {
            context,
            output,
            track: None,
            state: BackendState::Ready,
            scheduler: PlaybackScheduler::new(),
            pending: Vec::new(),
            position: 0,
            softvol: SOFTVOL_UNITY,
        })
    }


    pub( super ) fn shutdown( self ) -> DecoderContext {
        let Self { mut context, mut output, track, .. } = self;

        if let Err( e ) = output.stop() {
            tracing::warn!( "Failed to stop output: {}", e );
        }
        drop( track );

        context.attach_output( output );
        context
    }


    fn gain( &self ) -> f32 {
        self.softvol as f32 / SOFTVOL_UNITY as f32
    }


    /// Reports a freshly loaded track: duration, then track info, then
    /// the cover art if there is one.
    fn announce( &mut self, duration_ms: u64, tags: &TrackTags ) {
        self.context.track_duration( duration_ms );
        self.context.track_info( tags.artist.as_deref(), tags.album.as_deref(), tags.title.as_deref() );
        if let Some( art ) = tags.art.as_deref() {
            self.context.track_art( art );
        }
    }


    /// Stops and restarts the sink after a failed write or a seek,
    /// dropping whatever it had buffered.
    fn reprime_output( &mut self ) {
        if let Err( e ) = self.output.stop().and_then( |_| self.output.start() ) {
            tracing::warn!( "Failed to reprime output: {}", e );
        }
    }


    /// Decodes and writes up to `headroom` samples.
    ///
    /// Returns false once the decode stream is exhausted.
    fn fill( &mut self, headroom: usize ) -> bool {
        let gain = self.gain();
        let Some( track ) = self.track.as_mut() else {
            return false;
        };

        let channels = usize::from( track.channels().max( 1 ) );
        let budget = headroom - headroom % channels;
        let mut written = 0;
        let mut more = true;
        let mut write_failed = false;

        while written < budget {
            if self.pending.is_empty() {
                match track.decode_into( &mut self.pending, gain ) {
                    Ok( true ) => continue,
                    Ok( false ) => {
                        more = false;
                        break;
                    }
                    Err( e ) => {
                        tracing::warn!( "{}, ending track", e );
                        more = false;
                        break;
                    }
                }
            }

            let chunk = ( budget - written ).min( self.pending.len() );
            match self.output.write( &self.pending[ ..chunk ] ) {
                Ok( accepted ) => {
                    self.pending.drain( ..accepted );
                    written += accepted;
                    self.position += ( accepted / channels ) as u64;
                    if accepted < chunk {
                        break;
                    }
                }
                Err( e ) => {
                    tracing::warn!( "Output write failed, repriming: {}", e );
                    write_failed = true;
                    break;
                }
            }
        }

        let position_ms = frames_to_ms( self.position, track.sample_rate() );
        if write_failed {
            self.reprime_output();
        }
        self.context.track_pos( position_ms );
        more
    }
}


impl<S: TrackSource> DecoderOps for PullBackend<S> {
    fn name( &self ) -> &'static str {
        S::NAME
    }


    fn state( &self ) -> BackendState {
        self.state
    }


    fn load( &mut self, path: &Path ) -> Result<(), LoadError> {
        let mut track = S::open( path )?;

        // Nothing is touched until the sink accepted the new stream
        self.output.configure( track.channels(), track.format(), track.sample_rate() )?;

        // Old audio must not bleed into the new track
        if let Err( e ) = self.output.stop() {
            tracing::warn!( "Failed to stop output: {}", e );
        }

        let tags = track.tags();
        let duration_ms = track.duration_ms();

        self.track = Some( track );
        self.pending.clear();
        self.position = 0;
        self.scheduler.reset();
        self.state = BackendState::Ready;

        self.announce( duration_ms, &tags );
        Ok(())
    }


    fn seek( &mut self, offset_ms: i64 ) -> Result<(), SeekError> {
        let track = self.track.as_mut().ok_or( SeekError::NoTrack )?;
        let sample_rate = track.sample_rate();

        let landed = track.seek( ms_to_frames( offset_ms, sample_rate ) )?;
        self.pending.clear();
        self.position = landed;

        match self.state {
            BackendState::Playing => self.reprime_output(),
            BackendState::Finished => self.state = BackendState::Paused,
            _ => {}
        }

        tracing::debug!( "Seeked to {}ms (frame {})", offset_ms, landed );
        self.context.track_pos( frames_to_ms( landed, sample_rate ) );
        Ok(())
    }


    fn control( &mut self, ctrl: Control ) {
        match ( ctrl, self.state ) {
            ( Control::Play, BackendState::Ready | BackendState::Paused ) if self.track.is_some() => {
                if let Err( e ) = self.output.start() {
                    tracing::warn!( "Failed to start output: {}", e );
                }
                self.state = BackendState::Playing;
                self.scheduler.set_playing( true );
            }
            ( Control::Pause, BackendState::Playing ) => {
                if let Err( e ) = self.output.stop() {
                    tracing::warn!( "Failed to stop output: {}", e );
                }
                self.state = BackendState::Paused;
                self.scheduler.set_playing( false );
            }
            _ => {}
        }
    }


    fn softvol( &mut self, op: SoftvolOp ) -> u32 {
        if let SoftvolOp::Set( value ) = op {
            self.softvol = clamp_softvol( value );
        }
        self.softvol
    }


    fn tick( &mut self ) -> u64 {
        if !self.scheduler.is_playing() {
            return MAX_INTERVAL_MS;
        }

        let headroom = self.output.available_headroom();
        if self.scheduler.plan( headroom ) == TickPlan::Backoff {
            return self.scheduler.interval_ms();
        }

        if !self.fill( headroom ) {
            tracing::info!( "Track finished" );
            self.state = BackendState::Finished;
            self.scheduler.set_playing( false );
            self.context.track_finished();
        }

        self.scheduler.interval_ms()
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::callbacks::{ self, PlayerEvent };
    use crate::decoder::SymphoniaTrack;
    use crate::testing::{ write_wav, MockOutput };
    use std::sync::mpsc::Receiver;


    type Engine = PullBackend<SymphoniaTrack>;


    fn backend_with( output: &MockOutput ) -> ( Engine, Receiver<PlayerEvent> ) {
        let ( cbs, rx ) = callbacks::channel();
        let context = DecoderContext::new( Box::new( cbs ) ).with_output( Box::new( output.clone() ) );
        ( Engine::construct( context ).unwrap(), rx )
    }


    #[test]
    fn test_construct_needs_output() {
        let ( cbs, _rx ) = callbacks::channel();
        let err = Engine::construct( DecoderContext::new( Box::new( cbs ) ) ).unwrap_err();
        assert!( matches!( err.error, BackendError::NoOutput ) );
        assert!( !err.context.has_output() );
    }


    #[test]
    fn test_load_failure_keeps_state() {
        let output = MockOutput::with_headroom( 4096 );
        let ( mut backend, rx ) = backend_with( &output );

        let err = backend.load( Path::new( "/definitely/not/here.mp3" ) ).unwrap_err();
        assert!( matches!( err, LoadError::Open { .. } ) );
        assert_eq!( backend.state(), BackendState::Ready );
        assert!( rx.try_iter().next().is_none() );
    }


    #[test]
    fn test_rejected_stream_keeps_current_track_playing() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join( "a.wav" );
        let b = dir.path().join( "b.wav" );
        write_wav( &a, 8000, 1, 2000 );
        write_wav( &b, 8000, 2, 2000 );

        let output = MockOutput::with_headroom( 4096 );
        let ( mut backend, rx ) = backend_with( &output );
        backend.load( &a ).unwrap();
        backend.control( Control::Play );
        backend.tick();
        rx.try_iter().for_each( drop );

        output.state_mut().fail_configure = true;
        let stops = output.state().stops;
        let err = backend.load( &b ).unwrap_err();
        assert!( matches!( err, LoadError::Output( _ ) ) );

        assert_eq!( backend.state(), BackendState::Playing );
        assert!( output.state().running );
        assert_eq!( output.state().stops, stops );
        assert_eq!( output.state().configured, Some(( 1, SampleFormat::S16, 8000 )) );
        assert!( rx.try_iter().next().is_none() );

        let written = output.state().written;
        backend.tick();
        assert!( output.state().written > written );
    }


    #[test]
    fn test_announce_order_and_single_art() {
        let output = MockOutput::with_headroom( 4096 );
        let ( mut backend, rx ) = backend_with( &output );

        let tags = TrackTags {
            artist: Some( "Artist".into() ),
            album: None,
            title: Some( "Title".into() ),
            art: Some( vec![ 0x89, 0x50 ] ),
        };
        backend.announce( 1234, &tags );

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!( events, vec![
            PlayerEvent::Duration( 1234 ),
            PlayerEvent::TrackInfo {
                artist: Some( "Artist".into() ),
                album: None,
                title: Some( "Title".into() ),
            },
            PlayerEvent::Art( vec![ 0x89, 0x50 ] ),
        ]);

        backend.announce( 0, &TrackTags::default() );
        assert!( rx.try_iter().all( |e| !matches!( e, PlayerEvent::Art( _ ) ) ) );
    }


    #[test]
    fn test_low_headroom_backs_off_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join( "tone.wav" );
        write_wav( &wav, 8000, 1, 1000 );

        let output = MockOutput::with_headroom( 500 );
        let ( mut backend, _rx ) = backend_with( &output );
        backend.load( &wav ).unwrap();
        backend.control( Control::Play );

        assert_eq!( backend.tick(), 2 );
        assert_eq!( backend.tick(), 4 );
        assert_eq!( output.state().writes, 0 );
    }


    #[test]
    fn test_control_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join( "tone.wav" );
        write_wav( &wav, 8000, 2, 500 );

        let output = MockOutput::with_headroom( 4096 );
        let ( mut backend, _rx ) = backend_with( &output );

        // Nothing to play yet
        backend.control( Control::Play );
        assert_eq!( backend.state(), BackendState::Ready );
        assert_eq!( output.state().starts, 0 );

        backend.load( &wav ).unwrap();
        backend.control( Control::Play );
        backend.control( Control::Play );
        assert_eq!( output.state().starts, 1 );

        let stops = output.state().stops;
        backend.control( Control::Pause );
        backend.control( Control::Pause );
        assert_eq!( backend.state(), BackendState::Paused );
        assert_eq!( output.state().stops, stops + 1 );
        assert_eq!( backend.tick(), MAX_INTERVAL_MS );
    }


    #[test]
    fn test_seek_past_the_end_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join( "tone.wav" );
        write_wav( &wav, 44100, 1, 1000 );

        let output = MockOutput::with_headroom( 4096 );
        let ( mut backend, rx ) = backend_with( &output );
        backend.load( &wav ).unwrap();
        rx.try_iter().for_each( drop );

        backend.seek( i64::MAX ).unwrap();
        match rx.try_iter().last() {
            Some( PlayerEvent::Position( ms ) ) => assert!( ms <= 1000 ),
            other => panic!( "expected a position, got {other:?}" ),
        }
    }


    #[test]
    fn test_softvol_clamps_and_scales() {
        let output = MockOutput::with_headroom( 4096 );
        let ( mut backend, _rx ) = backend_with( &output );

        assert_eq!( backend.softvol( SoftvolOp::Get ), SOFTVOL_UNITY );
        assert_eq!( backend.softvol( SoftvolOp::Set( 400 ) ), 130 );
        assert_eq!( backend.softvol( SoftvolOp::Get ), 130 );
        assert!(( backend.gain() - 1.3 ).abs() < 1e-6 );
        backend.softvol( SoftvolOp::Set( 0 ) );
        assert_eq!( backend.gain(), 0.0 );
    }


    #[test]
    fn test_write_failure_reprimes_output() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join( "tone.wav" );
        write_wav( &wav, 8000, 1, 1000 );

        let output = MockOutput::with_headroom( 4096 );
        let ( mut backend, _rx ) = backend_with( &output );
        backend.load( &wav ).unwrap();
        backend.control( Control::Play );

        output.state_mut().fail_writes = true;
        let starts = output.state().starts;
        backend.tick();
        assert_eq!( backend.state(), BackendState::Playing );
        assert_eq!( output.state().starts, starts + 1 );

        output.state_mut().fail_writes = false;
        backend.tick();
        assert!( output.state().written > 0 );
    }


    #[test]
    fn test_shutdown_hands_back_stopped_output() {
        let output = MockOutput::with_headroom( 4096 );
        let ( backend, _rx ) = backend_with( &output );

        let context = backend.shutdown();
        assert!( context.has_output() );
        assert!( !output.state().running );
    }
}

//! Fallback backend that plays nothing.

use std::path::Path;

use super::{
    clamp_softvol, BackendState, Control, DecoderContext, DecoderOps, LoadError, SeekError, SoftvolOp,
    SOFTVOL_UNITY,
};

/// Re-arm delay while idle.
const IDLE_TICK_MS: u64 = 100;


/// The always-available no-op backend.
///
/// Used when nothing better can be constructed. Every load fails, so the
/// host keeps showing the previous state instead of pretending to play.
#[derive( Debug )]
pub struct NullBackend {
    context: DecoderContext,
    softvol: u32,
}


impl NullBackend {
    pub const NAME: &'static str = "null";


    pub fn new( context: DecoderContext ) -> Self {
        Self {
            context,
            softvol: SOFTVOL_UNITY,
        }
    }


    pub( super ) fn shutdown( mut self ) -> DecoderContext {
        if let Some( mut output ) = self.context.take_output() {
            if let Err( e ) = output.stop() {
                tracing::warn!( "Failed to stop output: {}", e );
            }
            self.context.attach_output( output );
        }
        self.context
    }
}


impl DecoderOps for NullBackend {
    fn name( &self ) -> &'static str {
        Self::NAME
    }


    fn state( &self ) -> BackendState {
        BackendState::Ready
    }


    fn load( &mut self, path: &Path ) -> Result<(), LoadError> {
        tracing::warn!( "No decoder available for {:?}", path );
        Err( LoadError::NoDecoder( Self::NAME ) )
    }


    fn seek( &mut self, _offset_ms: i64 ) -> Result<(), SeekError> {
        Err( SeekError::NoTrack )
    }


    fn control( &mut self, _ctrl: Control ) {}


    fn softvol( &mut self, op: SoftvolOp ) -> u32 {
        if let SoftvolOp::Set( value ) = op {
            self.softvol = clamp_softvol( value );
        }
        self.softvol
    }


    fn tick( &mut self ) -> u64 {
        IDLE_TICK_MS
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::callbacks;


    fn backend() -> NullBackend {
        let ( cbs, _rx ) = callbacks::channel();
        NullBackend::new( DecoderContext::new( Box::new( cbs ) ) )
    }


    #[test]
    fn test_load_fails_quietly() {
        let mut b = backend();
        assert!( matches!( b.load( Path::new( "/x.mp3" ) ), Err( LoadError::NoDecoder( "null" ) ) ) );
        assert_eq!( b.state(), BackendState::Ready );
    }


    #[test]
    fn test_softvol_is_remembered() {
        let mut b = backend();
        assert_eq!( b.softvol( SoftvolOp::Get ), 100 );
        assert_eq!( b.softvol( SoftvolOp::Set( 200 ) ), 130 );
        assert_eq!( b.softvol( SoftvolOp::Get ), 130 );
    }


    #[test]
    fn test_idle_tick() {
        let mut b = backend();
        b.control( Control::Play );
        assert_eq!( b.tick(), IDLE_TICK_MS );
        assert!( matches!( b.seek( 10 ), Err( SeekError::NoTrack ) ) );
    }
}

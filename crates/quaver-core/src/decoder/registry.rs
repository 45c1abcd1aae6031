//! Backend registry
//!
//! Backends are registered by name in a fixed, ordered table. The first
//! entry is the default and also the fallback for unknown names.

use super::{ hound_backend, symphonia_backend, Backend, ConstructError, DecoderContext, HoundBackend, NullBackend, SymphoniaBackend };


/// A named backend constructor.
pub struct Registration {
    pub name: &'static str,
    pub construct: fn( DecoderContext ) -> Result<Backend, ConstructError>,
}


fn construct_null( context: DecoderContext ) -> Result<Backend, ConstructError> {
    Ok( Backend::Null( NullBackend::new( context ) ) )
}


/// All backends, in preference order.
pub static REGISTERED: &[Registration] = &[
    Registration { name: SymphoniaBackend::NAME, construct: symphonia_backend::construct },
    Registration { name: HoundBackend::NAME, construct: hound_backend::construct },
    Registration { name: NullBackend::NAME, construct: construct_null },
];


/// Name of the backend used when none is configured.
pub const DEFAULT: &str = SymphoniaBackend::NAME;


/// Names of all registered backends.
pub fn names() -> impl Iterator<Item = &'static str> {
    REGISTERED.iter().map( |r| r.name )
}


/// Looks up a registration by exact name.
pub fn find( name: &str ) -> Option<&'static Registration> {
    REGISTERED.iter().find( |r| r.name == name )
}


/// Builds the backend called `name`.
///
/// A missing or empty name selects the first registration; an unknown
/// name does too, with a warning. If construction fails the context is
/// recovered and the null backend is returned instead, so this always
/// yields a usable backend.
pub fn init( name: Option<&str>, context: DecoderContext ) -> Backend {
    let registration = match name.filter( |n| !n.is_empty() ) {
        None => &REGISTERED[ 0 ],
        Some( wanted ) => find( wanted ).unwrap_or_else( || {
            tracing::warn!( "Unknown decoder '{}', using '{}'", wanted, REGISTERED[ 0 ].name );
            &REGISTERED[ 0 ]
        }),
    };

    match ( registration.construct )( context ) {
        Ok( backend ) => {
            tracing::info!( "Using decoder '{}'", registration.name );
            backend
        }
        Err( ConstructError { error, context } ) => {
            tracing::warn!( "Decoder '{}' failed to start: {}", registration.name, error );
            Backend::Null( NullBackend::new( context ) )
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::callbacks::{ self, PlayerEvent };
    use crate::decoder::{ BackendState, Control, DecoderOps };
    use crate::testing::MockOutput;


    fn context( with_output: bool ) -> DecoderContext {
        let ( cbs, _rx ) = callbacks::channel();
        let ctx = DecoderContext::new( Box::new( cbs ) );
        if with_output {
            ctx.with_output( Box::new( MockOutput::with_headroom( 4096 ) ) )
        } else {
            ctx
        }
    }


    #[test]
    fn test_names_in_order() {
        assert_eq!( names().collect::<Vec<_>>(), vec![ "symphonia", "hound", "null" ] );
        assert_eq!( DEFAULT, REGISTERED[ 0 ].name );
    }


    #[test]
    fn test_default_pick() {
        assert_eq!( init( None, context( true ) ).name(), "symphonia" );
        assert_eq!( init( Some( "" ), context( true ) ).name(), "symphonia" );
    }


    #[test]
    fn test_pick_by_name() {
        assert_eq!( init( Some( "null" ), context( true ) ).name(), "null" );
        assert!( matches!( init( Some( "hound" ), context( true ) ), Backend::Hound( _ ) ) );
    }


    #[test]
    fn test_unknown_name_falls_back_to_first() {
        assert_eq!( init( Some( "mpv" ), context( true ) ).name(), "symphonia" );
    }


    #[test]
    fn test_failed_construction_falls_back_to_null() {
        let backend = init( Some( "symphonia" ), context( false ) );
        assert_eq!( backend.name(), "null" );
        assert!( !backend.shutdown().has_output() );
        assert_eq!( init( Some( "hound" ), context( false ) ).name(), "null" );
    }


    #[test]
    fn test_output_survives_backend_switch() {
        let backend = init( None, context( true ) );
        let ctx = backend.shutdown();
        assert!( ctx.has_output() );

        let backend = init( Some( "null" ), ctx );
        let ctx = backend.shutdown();
        assert!( ctx.has_output() );

        let backend = init( Some( "hound" ), ctx );
        assert_eq!( backend.name(), "hound" );
        let ctx = backend.shutdown();
        assert!( ctx.has_output() );
        assert_eq!( init( None, ctx ).name(), "symphonia" );
    }


    #[test]
    fn test_engines_play_the_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join( "tone.wav" );
        crate::testing::write_wav( &wav, 8000, 1, 250 );

        for name in [ "symphonia", "hound" ] {
            let output = MockOutput::with_headroom( 4096 );
            let ( cbs, rx ) = callbacks::channel();
            let ctx = DecoderContext::new( Box::new( cbs ) ).with_output( Box::new( output.clone() ) );
            let mut backend = init( Some( name ), ctx );
            backend.load( &wav ).unwrap();
            backend.control( Control::Play );
            for _ in 0..100 {
                if backend.state() == BackendState::Finished {
                    break;
                }
                backend.tick();
            }
            assert_eq!( backend.state(), BackendState::Finished, "{name}" );
            assert_eq!( output.state().written, 2000, "{name}" );
            assert!( rx.try_iter().any( |e| e == PlayerEvent::Duration( 250 ) ), "{name}" );
        }
    }
}

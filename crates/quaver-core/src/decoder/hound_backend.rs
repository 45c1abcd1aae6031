//! Hound decoding engine
//!
//! Reads RIFF/WAVE files straight from the PCM data, integer or float.
//! WAV carries no tags this engine understands, so tracks report empty
//! track info and no art. Seeks are sample exact.

use std::fs::File;
use std::io::{ self, BufReader };
use std::path::Path;

use hound::{ WavReader, WavSpec };

use super::{
    frames_to_ms, Backend, ConstructError, DecodeError, DecoderContext, LoadError, PullBackend, SeekError,
    TrackSource, TrackTags,
};
use crate::library;
use crate::output::SampleFormat;


/// Frames decoded per call.
const BLOCK_FRAMES: usize = 1024;


/// Backend decoding WAV files with Hound.
pub type HoundBackend = PullBackend<WavTrack>;


/// Registry constructor.
pub( super ) fn construct( context: DecoderContext ) -> Result<Backend, ConstructError> {
    HoundBackend::construct( context ).map( Backend::Hound )
}


/// An open WAV file.
pub struct WavTrack {
    reader: WavReader<BufReader<File>>,
    spec: WavSpec,
    n_frames: u64,
    /// The data chunk ended early.
    truncated: bool,
}


impl WavTrack {
    /// Pulls up to `wanted` samples of type `T` into `out`.
    ///
    /// Returns false if the data chunk was cut short.
    fn read_block<T, F>( &mut self, wanted: usize, out: &mut Vec<f32>, convert: F ) -> Result<bool, DecodeError>
    where
        T: hound::Sample,
        F: Fn( T ) -> f32,
    {
        for sample in self.reader.samples::<T>().take( wanted ) {
            match sample {
                Ok( s ) => out.push( convert( s ) ),
                Err( hound::Error::IoError( ref e ) ) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok( false );
                }
                Err( e ) => return Err( DecodeError( e.to_string() ) ),
            }
        }
        Ok( true )
    }
}


impl TrackSource for WavTrack {
    const NAME: &'static str = "hound";


    fn open( path: &Path ) -> Result<Self, LoadError> {
        let buffer_len = if library::is_network_path( path ) {
            256 * 1024
        } else {
            64 * 1024
        };

        let file = File::open( path ).map_err( |source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let reader = WavReader::new( BufReader::with_capacity( buffer_len, file ) )
            .map_err( |_| LoadError::UnsupportedFormat )?;

        let spec = reader.spec();
        if spec.channels == 0 {
            return Err( LoadError::NoAudioTrack );
        }
        let supported = match spec.sample_format {
            hound::SampleFormat::Int => ( 1..=32 ).contains( &spec.bits_per_sample ),
            hound::SampleFormat::Float => spec.bits_per_sample == 32,
        };
        if !supported {
            return Err( LoadError::DecoderCreation(
                format!( "{}-bit {:?} samples", spec.bits_per_sample, spec.sample_format )
            ));
        }

        let n_frames = u64::from( reader.duration() );

        tracing::info!(
            "Opened {:?}: {} Hz, {} channels, {} frames",
            path,
            spec.sample_rate,
            spec.channels,
            n_frames
        );

        Ok( Self {
            reader,
            spec,
            n_frames,
            truncated: false,
        })
    }


    fn sample_rate( &self ) -> u32 {
        self.spec.sample_rate
    }


    fn channels( &self ) -> u16 {
        self.spec.channels
    }


    fn format( &self ) -> SampleFormat {
        match self.spec.sample_format {
            hound::SampleFormat::Float => SampleFormat::F32,
            hound::SampleFormat::Int => SampleFormat::from_bits( Some( u32::from( self.spec.bits_per_sample ) ) ),
        }
    }


    fn duration_ms( &self ) -> u64 {
        frames_to_ms( self.n_frames, self.spec.sample_rate )
    }


    fn tags( &mut self ) -> TrackTags {
        TrackTags::default()
    }


    fn decode_into( &mut self, out: &mut Vec<f32>, gain: f32 ) -> Result<bool, DecodeError> {
        if self.truncated {
            return Ok( false );
        }

        let channels = usize::from( self.spec.channels );
        let start = out.len();

        let complete = match self.spec.sample_format {
            hound::SampleFormat::Float => {
                self.read_block::<f32, _>( BLOCK_FRAMES * channels, out, |s| s * gain )?
            }
            hound::SampleFormat::Int => {
                let scale = gain / ( 1_i64 << ( self.spec.bits_per_sample - 1 ) ) as f32;
                self.read_block::<i32, _>( BLOCK_FRAMES * channels, out, |s| s as f32 * scale )?
            }
        };

        if !complete {
            tracing::warn!( "WAV data ends early" );
            self.truncated = true;
        }

        // Only whole frames go out
        let read = out.len() - start;
        out.truncate( start + read - read % channels );
        Ok( out.len() > start )
    }


    fn seek( &mut self, frames: u64 ) -> Result<u64, SeekError> {
        let target = frames.min( self.n_frames.saturating_sub( 1 ) );
        let time = u32::try_from( target ).unwrap_or( u32::MAX );

        self.reader
            .seek( time )
            .map_err( |e| SeekError::Engine( e.to_string() ) )?;

        self.truncated = false;
        Ok( u64::from( time ) )
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::callbacks::{ self, PlayerEvent };
    use crate::decoder::{ BackendState, Control, DecoderOps };
    use crate::testing::{ write_wav, MockOutput };
    use std::sync::mpsc::Receiver;


    fn backend_with( output: &MockOutput ) -> ( HoundBackend, Receiver<PlayerEvent> ) {
        let ( cbs, rx ) = callbacks::channel();
        let context = DecoderContext::new( Box::new( cbs ) ).with_output( Box::new( output.clone() ) );
        match construct( context ) {
            Ok( Backend::Hound( b ) ) => ( b, rx ),
            other => panic!( "unexpected construction result: {other:?}" ),
        }
    }


    #[test]
    fn test_load_reports_format_and_duration() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join( "tone.wav" );
        write_wav( &wav, 8000, 2, 1500 );

        let output = MockOutput::with_headroom( 4096 );
        let ( mut backend, rx ) = backend_with( &output );
        backend.load( &wav ).unwrap();

        assert_eq!( backend.name(), "hound" );
        assert_eq!( output.state().configured, Some(( 2, SampleFormat::S16, 8000 )) );
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!( events, vec![
            PlayerEvent::Duration( 1500 ),
            PlayerEvent::TrackInfo { artist: None, album: None, title: None },
        ]);
    }


    #[test]
    fn test_rejects_other_formats() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join( "song.mp3" );
        std::fs::write( &fake, b"ID3\x04\x00\x00\x00\x00\x00\x00not a wave file" ).unwrap();

        let output = MockOutput::with_headroom( 4096 );
        let ( mut backend, rx ) = backend_with( &output );
        assert!( matches!( backend.load( &fake ), Err( LoadError::UnsupportedFormat ) ) );
        assert!( matches!( backend.load( &dir.path().join( "gone.wav" ) ), Err( LoadError::Open { .. } ) ) );
        assert_eq!( backend.state(), BackendState::Ready );
        assert!( output.state().configured.is_none() );
        assert!( rx.try_iter().next().is_none() );
    }


    #[test]
    fn test_plays_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join( "tone.wav" );
        write_wav( &wav, 8000, 1, 10_000 );

        let output = MockOutput::with_headroom( 4096 );
        let ( mut backend, rx ) = backend_with( &output );
        backend.load( &wav ).unwrap();
        rx.try_iter().for_each( drop );
        backend.control( Control::Play );

        let mut positions = Vec::new();
        let mut finished = 0;
        for _ in 0..1000 {
            backend.tick();
            for event in rx.try_iter() {
                match event {
                    PlayerEvent::Position( ms ) => positions.push( ms ),
                    PlayerEvent::Duration( 0 ) => finished += 1,
                    other => panic!( "unexpected event {other:?}" ),
                }
            }
            if backend.state() == BackendState::Finished {
                break;
            }
        }

        assert_eq!( finished, 1 );
        assert!( positions.windows( 2 ).all( |w| w[ 0 ] <= w[ 1 ] ) );
        assert_eq!( positions.last().copied(), Some( 10_000 ) );
        assert_eq!( output.state().written, 80_000 );
    }


    #[test]
    fn test_seek_is_sample_exact() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join( "tone.wav" );
        write_wav( &wav, 8000, 1, 10_000 );

        let output = MockOutput::with_headroom( 4096 );
        let ( mut backend, rx ) = backend_with( &output );
        assert!( matches!( backend.seek( 100 ), Err( SeekError::NoTrack ) ) );

        backend.load( &wav ).unwrap();
        rx.try_iter().for_each( drop );

        backend.seek( 5000 ).unwrap();
        assert_eq!( rx.try_iter().last(), Some( PlayerEvent::Position( 5000 ) ) );

        // Clamped to the last frame
        backend.seek( i64::MAX ).unwrap();
        assert_eq!( rx.try_iter().last(), Some( PlayerEvent::Position( 10_000 ) ) );

        backend.seek( -3 ).unwrap();
        assert_eq!( rx.try_iter().last(), Some( PlayerEvent::Position( 0 ) ) );
    }


    #[test]
    fn test_float_samples_are_scaled_by_softvol() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join( "float.wav" );
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create( &wav, spec ).unwrap();
        for _ in 0..16 {
            writer.write_sample( 0.5_f32 ).unwrap();
        }
        writer.finalize().unwrap();

        let mut track = WavTrack::open( &wav ).unwrap();
        assert_eq!( track.format(), SampleFormat::F32 );

        let mut out = Vec::new();
        assert!( track.decode_into( &mut out, 0.5 ).unwrap() );
        assert_eq!( out, vec![ 0.25; 16 ] );
        assert!( !track.decode_into( &mut out, 0.5 ).unwrap() );
    }


    #[test]
    fn test_int_samples_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join( "int.wav" );
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create( &wav, spec ).unwrap();
        for sample in [ i16::MIN, 16384_i16 ] {
            writer.write_sample( sample ).unwrap();
        }
        writer.finalize().unwrap();

        let mut track = WavTrack::open( &wav ).unwrap();
        let mut out = Vec::new();
        assert!( track.decode_into( &mut out, 1.0 ).unwrap() );
        assert_eq!( out, vec![ -1.0, 0.5 ] );
    }
}

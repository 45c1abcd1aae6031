//! Symphonia decoding engine
//!
//! Probes the container, picks the first audio track and decodes it
//! packet by packet. Tags and cover art come from the probe metadata and
//! the container's own metadata log.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{ Decoder, DecoderOptions, CODEC_TYPE_NULL };
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{ FormatOptions, FormatReader, SeekMode, SeekTo };
use symphonia::core::io::{ MediaSourceStream, MediaSourceStreamOptions };
use symphonia::core::meta::{ MetadataOptions, MetadataRevision, StandardTagKey, StandardVisualKey };
use symphonia::core::probe::{ Hint, ProbedMetadata };

use super::{
    frames_to_ms, Backend, ConstructError, DecodeError, DecoderContext, LoadError, PullBackend, SeekError,
    TrackSource, TrackTags,
};
use crate::library;
use crate::output::SampleFormat;


/// Backend decoding with Symphonia.
pub type SymphoniaBackend = PullBackend<SymphoniaTrack>;


/// Registry constructor.
pub( super ) fn construct( context: DecoderContext ) -> Result<Backend, ConstructError> {
    SymphoniaBackend::construct( context ).map( Backend::Symphonia )
}


/// Fills in whatever `tags` is still missing from a metadata revision.
///
/// For art the front cover wins, any other picture is taken otherwise.
fn absorb( tags: &mut TrackTags, revision: &MetadataRevision ) {
    for tag in revision.tags() {
        let slot = match tag.std_key {
            Some( StandardTagKey::Artist ) => &mut tags.artist,
            Some( StandardTagKey::Album ) => &mut tags.album,
            Some( StandardTagKey::TrackTitle ) => &mut tags.title,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some( tag.value.to_string() );
        }
    }

    if tags.art.is_none() {
        let visuals = revision.visuals();
        tags.art = visuals
            .iter()
            .find( |v| v.usage == Some( StandardVisualKey::FrontCover ) )
            .or_else( || visuals.first() )
            .map( |v| v.data.to_vec() );
    }
}


/// The Symphonia handle for one open track.
pub struct SymphoniaTrack {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
    format: SampleFormat,
    n_frames: Option<u64>,
    sample_buf: Option<SampleBuffer<f32>>,
    probed: ProbedMetadata,
}


impl TrackSource for SymphoniaTrack {
    const NAME: &'static str = "symphonia";


    fn open( path: &Path ) -> Result<Self, LoadError> {
        // Larger reads for network paths (SMB)
        let buffer_len = if library::is_network_path( path ) {
            256 * 1024
        } else {
            64 * 1024
        };

        let file = File::open( path ).map_err( |source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mss = MediaSourceStream::new( Box::new( file ), MediaSourceStreamOptions { buffer_len } );

        let mut hint = Hint::new();
        if let Some( ext ) = path.extension().and_then( |e| e.to_str() ) {
            hint.with_extension( ext );
        }

        let probed = symphonia::default::get_probe()
            .format( &hint, mss, &FormatOptions::default(), &MetadataOptions::default() )
            .map_err( |_| LoadError::UnsupportedFormat )?;

        let reader = probed.format;
        let track = reader
            .tracks()
            .iter()
            .find( |t| t.codec_params.codec != CODEC_TYPE_NULL )
            .ok_or( LoadError::NoAudioTrack )?;

        let params = &track.codec_params;
        let track_id = track.id;
        let sample_rate = params.sample_rate.unwrap_or( 44100 );
        let channels = params.channels.map( |c| c.count() as u16 ).unwrap_or( 2 );
        let format = SampleFormat::from_bits( params.bits_per_sample );
        let n_frames = params.n_frames;

        let decoder = symphonia::default::get_codecs()
            .make( params, &DecoderOptions::default() )
            .map_err( |e| LoadError::DecoderCreation( e.to_string() ) )?;

        tracing::info!(
            "Opened {:?}: {} Hz, {} channels, {:?} frames",
            path,
            sample_rate,
            channels,
            n_frames
        );

        Ok( Self {
            reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            format,
            n_frames,
            sample_buf: None,
            probed: probed.metadata,
        })
    }


    fn sample_rate( &self ) -> u32 {
        self.sample_rate
    }


    fn channels( &self ) -> u16 {
        self.channels
    }


    fn format( &self ) -> SampleFormat {
        self.format
    }


    fn duration_ms( &self ) -> u64 {
        self.n_frames.map_or( 0, |n| frames_to_ms( n, self.sample_rate ) )
    }


    /// Artist/album/title and cover art, probe metadata first.
    fn tags( &mut self ) -> TrackTags {
        let mut tags = TrackTags::default();

        if let Some( log ) = self.probed.get() {
            if let Some( revision ) = log.current() {
                absorb( &mut tags, revision );
            }
        }

        if let Some( revision ) = self.reader.metadata().current() {
            absorb( &mut tags, revision );
        }

        tags
    }


    fn decode_into( &mut self, out: &mut Vec<f32>, gain: f32 ) -> Result<bool, DecodeError> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok( packet ) => packet,
                Err( SymphoniaError::IoError( ref e ) ) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok( false );
                }
                Err( e ) => return Err( DecodeError( e.to_string() ) ),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode( &packet ) {
                Ok( decoded ) => decoded,
                Err( SymphoniaError::DecodeError( e ) ) => {
                    tracing::debug!( "Skipping undecodable packet: {}", e );
                    continue;
                }
                Err( e ) => return Err( DecodeError( e.to_string() ) ),
            };

            let spec = *decoded.spec();
            let frames = decoded.frames();
            if frames == 0 {
                continue;
            }

            let needed = frames * spec.channels.count();
            if self.sample_buf.as_ref().map_or( true, |b| b.capacity() < needed ) {
                self.sample_buf = Some( SampleBuffer::new( frames as u64, spec ) );
            }
            let Some( buf ) = self.sample_buf.as_mut() else {
                continue;
            };

            buf.copy_interleaved_ref( decoded );
            if gain == 1.0 {
                out.extend_from_slice( buf.samples() );
            } else {
                out.extend( buf.samples().iter().map( |s| s * gain ) );
            }
            return Ok( true );
        }
    }


    fn seek( &mut self, frames: u64 ) -> Result<u64, SeekError> {
        let ts = match self.n_frames {
            Some( n ) => frames.min( n.saturating_sub( 1 ) ),
            None => frames,
        };

        let seeked = self.reader
            .seek( SeekMode::Accurate, SeekTo::TimeStamp { ts, track_id: self.track_id } )
            .map_err( |e| SeekError::Engine( e.to_string() ) )?;

        self.decoder.reset();
        Ok( seeked.actual_ts )
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::callbacks::{ self, PlayerEvent };
    use crate::decoder::{ BackendState, Control, DecoderOps };
    use crate::testing::{ write_wav, MockOutput };
    use std::sync::mpsc::Receiver;
    use symphonia::core::meta::{ MetadataBuilder, Tag, Value, Visual };


    fn backend_with( output: &MockOutput ) -> ( SymphoniaBackend, Receiver<PlayerEvent> ) {
        let ( cbs, rx ) = callbacks::channel();
        let context = DecoderContext::new( Box::new( cbs ) ).with_output( Box::new( output.clone() ) );
        match construct( context ) {
            Ok( Backend::Symphonia( b ) ) => ( b, rx ),
            other => panic!( "unexpected construction result: {other:?}" ),
        }
    }


    fn tag( key: StandardTagKey, value: &str ) -> Tag {
        Tag::new( Some( key ), "", Value::String( value.to_string() ) )
    }


    fn picture( usage: Option<StandardVisualKey>, data: &[u8] ) -> Visual {
        Visual {
            media_type: "image/png".to_string(),
            dimensions: None,
            bits_per_pixel: None,
            color_mode: None,
            usage,
            tags: Vec::new(),
            data: data.to_vec().into_boxed_slice(),
        }
    }


    #[test]
    fn test_absorb_takes_fields_independently() {
        let mut builder = MetadataBuilder::new();
        builder.add_tag( tag( StandardTagKey::Artist, "Boards" ) );
        builder.add_tag( tag( StandardTagKey::Genre, "Ambient" ) );
        let revision = builder.metadata();

        let mut tags = TrackTags::default();
        absorb( &mut tags, &revision );
        assert_eq!( tags.artist.as_deref(), Some( "Boards" ) );
        assert_eq!( tags.album, None );
        assert_eq!( tags.title, None );
        assert_eq!( tags.art, None );

        // Later revisions only fill the gaps
        let mut builder = MetadataBuilder::new();
        builder.add_tag( tag( StandardTagKey::Artist, "Someone Else" ) );
        builder.add_tag( tag( StandardTagKey::TrackTitle, "Roygbiv" ) );
        absorb( &mut tags, &builder.metadata() );
        assert_eq!( tags.artist.as_deref(), Some( "Boards" ) );
        assert_eq!( tags.title.as_deref(), Some( "Roygbiv" ) );
        assert_eq!( tags.album, None );
    }


    #[test]
    fn test_absorb_prefers_front_cover() {
        let mut builder = MetadataBuilder::new();
        builder.add_visual( picture( Some( StandardVisualKey::BackCover ), &[ 1, 2 ] ) );
        builder.add_visual( picture( Some( StandardVisualKey::FrontCover ), &[ 3, 4 ] ) );

        let mut tags = TrackTags::default();
        absorb( &mut tags, &builder.metadata() );
        assert_eq!( tags.art, Some( vec![ 3, 4 ] ) );

        // Art already found is kept
        let mut builder = MetadataBuilder::new();
        builder.add_visual( picture( Some( StandardVisualKey::FrontCover ), &[ 9 ] ) );
        absorb( &mut tags, &builder.metadata() );
        assert_eq!( tags.art, Some( vec![ 3, 4 ] ) );
    }


    #[test]
    fn test_absorb_falls_back_to_first_picture() {
        let mut builder = MetadataBuilder::new();
        builder.add_visual( picture( None, &[ 7 ] ) );
        builder.add_visual( picture( Some( StandardVisualKey::BackCover ), &[ 8 ] ) );

        let mut tags = TrackTags::default();
        absorb( &mut tags, &builder.metadata() );
        assert_eq!( tags.art, Some( vec![ 7 ] ) );
    }


    #[test]
    fn test_load_reports_duration_then_info() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join( "tone.wav" );
        write_wav( &wav, 8000, 1, 10_000 );

        let output = MockOutput::with_headroom( 4096 );
        let ( mut backend, rx ) = backend_with( &output );

        backend.load( &wav ).unwrap();
        assert_eq!( backend.state(), BackendState::Ready );
        assert_eq!( output.state().configured, Some(( 1, SampleFormat::S16, 8000 )) );

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!( events, vec![
            PlayerEvent::Duration( 10_000 ),
            PlayerEvent::TrackInfo { artist: None, album: None, title: None },
        ]);
    }


    #[test]
    fn test_plays_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join( "tone.wav" );
        write_wav( &wav, 8000, 1, 10_000 );

        let output = MockOutput::with_headroom( 4096 );
        let ( mut backend, rx ) = backend_with( &output );
        backend.load( &wav ).unwrap();
        let loaded: Vec<_> = rx.try_iter().collect();
        assert_eq!( loaded.first(), Some( &PlayerEvent::Duration( 10_000 ) ) );

        backend.control( Control::Play );
        assert_eq!( backend.state(), BackendState::Playing );

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
        assert!( !positions.is_empty() );
        assert!( positions.windows( 2 ).all( |w| w[ 0 ] <= w[ 1 ] ) );
        assert_eq!( positions.last().copied(), Some( 10_000 ) );
        assert_eq!( output.state().written, 80_000 );

        // Finished backends stay quiet
        backend.tick();
        assert!( rx.try_iter().next().is_none() );
    }


    #[test]
    fn test_seek_converts_to_frames() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join( "tone.wav" );
        write_wav( &wav, 8000, 1, 10_000 );

        let output = MockOutput::with_headroom( 4096 );
        let ( mut backend, rx ) = backend_with( &output );
        assert!( matches!( backend.seek( 100 ), Err( SeekError::NoTrack ) ) );

        backend.load( &wav ).unwrap();
        rx.try_iter().for_each( drop );

        backend.seek( 5000 ).unwrap();
        match rx.try_iter().last() {
            Some( PlayerEvent::Position( ms ) ) => assert!(( 4800..=5000 ).contains( &ms ) ),
            other => panic!( "expected a position, got {other:?}" ),
        }

        backend.control( Control::Play );
        backend.tick();
        match rx.try_iter().last() {
            Some( PlayerEvent::Position( ms ) ) => assert!( ms > 5000 ),
            other => panic!( "expected a position, got {other:?}" ),
        }
    }
}

//! Output sinks
//!
//! The decoder backends push interleaved `f32` samples into an
//! [`OutputSink`] and use its free buffer space as scheduling feedback.
//! [`CpalOutput`] is the sink used on a real system audio device.

use std::collections::VecDeque;
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError };
use std::sync::atomic::{ AtomicBool, Ordering };

use cpal::traits::{ DeviceTrait, HostTrait, StreamTrait };
use rubato::{ FastFixedOut, PolynomialDegree, Resampler as _ };
use thiserror::Error;


/// Errors that can occur with audio output.
#[derive( Debug, Error )]
pub enum OutputError {
    #[error( "No output device available" )]
    NoDevice,

    #[error( "Output is not configured" )]
    NotConfigured,

    #[error( "Failed to get stream config: {0}" )]
    StreamConfig( String ),

    #[error( "Failed to build output stream: {0}" )]
    BuildStream( String ),

    #[error( "Failed to control stream: {0}" )]
    PlayStream( String ),

    #[error( "Failed to create resampler: {0}" )]
    Resampler( String ),
}


/// Sample format of the decoded stream feeding a sink.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum SampleFormat {
    S16,
    S32,
    F32,
}


impl SampleFormat {
    /// Guesses the stream format from the codec's bits per sample.
    pub fn from_bits( bits: Option<u32> ) -> Self {
        match bits {
            Some( 1..=16 ) => SampleFormat::S16,
            Some( 17..=32 ) => SampleFormat::S32,
            _ => SampleFormat::F32,
        }
    }

}


/// A device the decoder backends write decoded audio to.
///
/// Headroom and writes are counted in interleaved samples, i.e. one
/// stereo frame is two samples.
pub trait OutputSink {
    /// Sets up the sink for a stream. Re-configuring with the same
    /// parameters is a no-op, and a failed call leaves the previous
    /// stream in place.
    fn configure( &mut self, channels: u16, format: SampleFormat, sample_rate: u32 ) -> Result<(), OutputError>;

    /// Number of samples that can be written without blocking.
    fn available_headroom( &self ) -> usize;

    /// Queues samples for playback, returns how many were accepted.
    fn write( &mut self, samples: &[f32] ) -> Result<usize, OutputError>;

    /// Starts (or resumes) the device.
    fn start( &mut self ) -> Result<(), OutputError>;

    /// Stops the device and drops any buffered audio.
    fn stop( &mut self ) -> Result<(), OutputError>;
}


/// Ring buffer shared between the control thread and the cpal callback.
///
/// Handles channel conversion between the decoded stream and the device.
pub struct SampleBuffer {
    buffer: Mutex<VecDeque<f32>>,
    capacity: usize,
    paused: AtomicBool,
    source_channels: usize,
    output_channels: usize,
}


impl SampleBuffer {
    /// Creates a buffer holding at most `capacity` source samples.
    pub fn new( capacity: usize, source_channels: u16, output_channels: u16 ) -> Self {
        Self {
            buffer: Mutex::new( VecDeque::with_capacity( capacity ) ),
            capacity,
            paused: AtomicBool::new( true ),
            source_channels: usize::from( source_channels.max( 1 ) ),
            output_channels: usize::from( output_channels.max( 1 ) ),
        }
    }


    fn lock( &self ) -> MutexGuard<'_, VecDeque<f32>> {
        self.buffer.lock().unwrap_or_else( PoisonError::into_inner )
    }


    /// Pushes samples, returns the number actually queued.
    pub fn push( &self, samples: &[f32] ) -> usize {
        let mut buf = self.lock();
        let to_push = samples.len().min( self.capacity.saturating_sub( buf.len() ) );
        buf.extend( samples[ ..to_push ].iter().copied() );
        to_push
    }


    /// Fills `output` with device frames, padding with silence.
    ///
    /// Returns the number of output samples taken from the buffer.
    pub fn pop( &self, output: &mut [f32] ) -> usize {
        if self.paused.load( Ordering::Relaxed ) {
            output.fill( 0.0 );
            return 0;
        }

        let src_ch = self.source_channels;
        let out_ch = self.output_channels;
        let mut buf = self.lock();
        let frames = ( output.len() / out_ch ).min( buf.len() / src_ch );
        let mut frame = [ 0.0_f32; 8 ];

        for out_frame in output.chunks_exact_mut( out_ch ).take( frames ) {
            let taken = src_ch.min( frame.len() );
            for slot in frame.iter_mut().take( taken ) {
                *slot = buf.pop_front().unwrap_or( 0.0 );
            }
            // Channels beyond what we keep are dropped
            for _ in taken..src_ch {
                buf.pop_front();
            }

            if out_ch == 1 && taken > 1 {
                out_frame[ 0 ] = frame[ ..taken ].iter().sum::<f32>() / taken as f32;
            } else {
                for ( ch, sample ) in out_frame.iter_mut().enumerate() {
                    *sample = frame[ ch.min( taken - 1 ) ];
                }
            }
        }

        let written = frames * out_ch;
        output[ written.. ].fill( 0.0 );
        written
    }


    /// Free space in source samples.
    pub fn free( &self ) -> usize {
        self.capacity.saturating_sub( self.lock().len() )
    }


    /// Returns the number of queued samples.
    pub fn len( &self ) -> usize {
        self.lock().len()
    }


    /// Returns true if nothing is queued.
    pub fn is_empty( &self ) -> bool {
        self.lock().is_empty()
    }


    /// Drops all queued samples.
    pub fn clear( &self ) {
        self.lock().clear();
    }


    /// Sets paused state; a paused buffer renders silence.
    pub fn set_paused( &self, paused: bool ) {
        self.paused.store( paused, Ordering::Relaxed );
    }
}


/// Converts planar samples back to interleaved format.
fn interleave( channels: &[Vec<f32>] ) -> Vec<f32> {
    let frames = channels.first().map_or( 0, Vec::len );
    let mut out = Vec::with_capacity( frames * channels.len() );
    for f in 0..frames {
        for ch in channels {
            out.push( ch[ f ] );
        }
    }
    out
}


/// Sample rate converter for devices that can't run at the track's rate.
struct RateConverter {
    inner: FastFixedOut<f32>,
    pending: Vec<Vec<f32>>,
}


impl RateConverter {
    fn new( from: u32, to: u32, channels: usize ) -> Result<Self, OutputError> {
        let inner = FastFixedOut::<f32>::new(
            f64::from( to ) / f64::from( from ),
            2.0,
            PolynomialDegree::Cubic,
            1024,
            channels,
        ).map_err( |e| OutputError::Resampler( e.to_string() ) )?;

        Ok( Self {
            inner,
            pending: vec![ Vec::new(); channels ],
        })
    }


    /// Feeds interleaved samples, returns whatever output is ready.
    fn process( &mut self, samples: &[f32] ) -> Vec<f32> {
        let channels = self.pending.len();
        for frame in samples.chunks_exact( channels ) {
            for ( ch, sample ) in frame.iter().enumerate() {
                self.pending[ ch ].push( *sample );
            }
        }

        let mut out = Vec::new();
        while self.pending[ 0 ].len() >= self.inner.input_frames_next() {
            let needed = self.inner.input_frames_next();
            let chunk: Vec<Vec<f32>> = self.pending
                .iter_mut()
                .map( |ch| ch.drain( ..needed ).collect() )
                .collect();

            match self.inner.process( &chunk, None ) {
                Ok( resampled ) => out.extend( interleave( &resampled ) ),
                Err( e ) => {
                    tracing::warn!( "Resample error: {}", e );
                    break;
                }
            }
        }
        out
    }


    fn reset( &mut self ) {
        self.inner.reset();
        for ch in &mut self.pending {
            ch.clear();
        }
    }
}


/// Parameters of the stream a sink is configured for.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
struct StreamFormat {
    channels: u16,
    format: SampleFormat,
    sample_rate: u32,
}


/// Output sink on the default cpal device.
///
/// Not Send: cpal streams must stay on the thread that built them,
/// which is the control thread driving the backend.
pub struct CpalOutput {
    device: cpal::Device,
    stream: Option<cpal::Stream>,
    buffer: Arc<SampleBuffer>,
    converter: Option<RateConverter>,
    format: Option<StreamFormat>,
    device_rate: u32,
}


impl CpalOutput {
    /// Opens the default output device. No stream is built until
    /// [`OutputSink::configure`] is called.
    pub fn open() -> Result<Self, OutputError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or( OutputError::NoDevice )?;

        tracing::info!( "Using output device: {:?}", device.name() );

        Ok( Self {
            device,
            stream: None,
            buffer: Arc::new( SampleBuffer::new( 0, 2, 2 ) ),
            converter: None,
            format: None,
            device_rate: 0,
        })
    }


    /// Picks a device config for the stream.
    ///
    /// Priority: exact channels + rate, any channels at our rate, device default.
    fn pick_config( &self, channels: u16, sample_rate: u32 ) -> Result<cpal::StreamConfig, OutputError> {
        let supported: Vec<_> = self.device
            .supported_output_configs()
            .map_err( |e| OutputError::StreamConfig( e.to_string() ) )?
            .collect();

        let rate_fits = |c: &cpal::SupportedStreamConfigRange| {
            c.min_sample_rate().0 <= sample_rate && c.max_sample_rate().0 >= sample_rate
        };

        if let Some( c ) = supported.iter().find( |c| c.channels() == channels && rate_fits( c ) ) {
            return Ok( c.clone().with_sample_rate( cpal::SampleRate( sample_rate ) ).config() );
        }

        if let Some( c ) = supported.iter().find( |c| rate_fits( c ) ) {
            tracing::info!(
                "Channel conversion: stream has {} channels, device uses {}",
                channels,
                c.channels()
            );
            return Ok( c.clone().with_sample_rate( cpal::SampleRate( sample_rate ) ).config() );
        }

        let default = self.device
            .default_output_config()
            .map_err( |e| OutputError::StreamConfig( e.to_string() ) )?;
        tracing::info!(
            "Device can't run at {} Hz, resampling to {} Hz",
            sample_rate,
            default.sample_rate().0
        );
        Ok( default.config() )
    }
}


impl OutputSink for CpalOutput {
    fn configure( &mut self, channels: u16, format: SampleFormat, sample_rate: u32 ) -> Result<(), OutputError> {
        let requested = StreamFormat { channels, format, sample_rate };
        if self.format == Some( requested ) {
            return Ok(());
        }

        tracing::debug!(
            "Setting output format ({} channels, {} Hz, {:?})",
            channels,
            sample_rate,
            format
        );

        // The current stream keeps running until its replacement is built
        let config = self.pick_config( channels, sample_rate )?;

        // ~500ms of source audio
        let capacity = sample_rate as usize * usize::from( channels ) / 2;
        let buffer = Arc::new( SampleBuffer::new( capacity, channels, config.channels ) );
        let callback_buffer = Arc::clone( &buffer );

        let stream = self.device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback_buffer.pop( data );
                },
                |err| {
                    tracing::warn!( "Audio output error: {}", err );
                },
                None,
            )
            .map_err( |e| OutputError::BuildStream( e.to_string() ) )?;

        // Some hosts start streams right away
        if let Err( e ) = stream.pause() {
            tracing::debug!( "Initial pause failed: {}", e );
        }

        let converter = if config.sample_rate.0 != sample_rate {
            Some( RateConverter::new( sample_rate, config.sample_rate.0, usize::from( channels ) )? )
        } else {
            None
        };

        tracing::info!(
            "Audio output config: {} Hz, {} channels",
            config.sample_rate.0,
            config.channels
        );

        self.converter = converter;
        self.device_rate = config.sample_rate.0;
        self.buffer = buffer;
        self.stream = Some( stream );
        self.format = Some( requested );
        Ok(())
    }


    fn available_headroom( &self ) -> usize {
        let Some( format ) = self.format else {
            return 0;
        };

        let free = self.buffer.free();
        if self.converter.is_some() && self.device_rate > 0 {
            ( free as u64 * u64::from( format.sample_rate ) / u64::from( self.device_rate ) ) as usize
        } else {
            free
        }
    }


    fn write( &mut self, samples: &[f32] ) -> Result<usize, OutputError> {
        if self.stream.is_none() {
            return Err( OutputError::NotConfigured );
        }

        let pushed = match self.converter.as_mut() {
            Some( converter ) => {
                let converted = converter.process( samples );
                let pushed = self.buffer.push( &converted );
                if pushed < converted.len() {
                    tracing::warn!( "Output buffer overrun, dropped {} samples", converted.len() - pushed );
                }
                samples.len()
            }
            None => self.buffer.push( samples ),
        };

        Ok( pushed )
    }


    fn start( &mut self ) -> Result<(), OutputError> {
        let stream = self.stream.as_ref().ok_or( OutputError::NotConfigured )?;
        self.buffer.set_paused( false );
        stream.play().map_err( |e| OutputError::PlayStream( e.to_string() ) )
    }


    fn stop( &mut self ) -> Result<(), OutputError> {
        self.buffer.set_paused( true );
        self.buffer.clear();
        if let Some( converter ) = self.converter.as_mut() {
            converter.reset();
        }

        match self.stream.as_ref() {
            Some( stream ) => stream.pause().map_err( |e| OutputError::PlayStream( e.to_string() ) ),
            None => Ok(()),
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_push_respects_capacity() {
        let buf = SampleBuffer::new( 4, 2, 2 );
        assert_eq!( buf.push( &[ 0.1; 6 ] ), 4 );
        assert_eq!( buf.free(), 0 );
        assert_eq!( buf.push( &[ 0.1 ] ), 0 );
    }


    #[test]
    fn test_paused_buffer_renders_silence() {
        let buf = SampleBuffer::new( 8, 2, 2 );
        buf.push( &[ 0.5; 4 ] );

        let mut out = [ 1.0; 4 ];
        assert_eq!( buf.pop( &mut out ), 0 );
        assert_eq!( out, [ 0.0; 4 ] );
        assert_eq!( buf.len(), 4 );
    }


    #[test]
    fn test_pop_mono_to_stereo() {
        let buf = SampleBuffer::new( 8, 1, 2 );
        buf.set_paused( false );
        buf.push( &[ 0.25, 0.5 ] );

        let mut out = [ 9.0; 6 ];
        assert_eq!( buf.pop( &mut out ), 4 );
        assert_eq!( out, [ 0.25, 0.25, 0.5, 0.5, 0.0, 0.0 ] );
        assert!( buf.is_empty() );
    }


    #[test]
    fn test_pop_stereo_to_mono() {
        let buf = SampleBuffer::new( 8, 2, 1 );
        buf.set_paused( false );
        buf.push( &[ 0.2, 0.4, 1.0, 0.0 ] );

        let mut out = [ 0.0; 2 ];
        assert_eq!( buf.pop( &mut out ), 2 );
        assert!(( out[ 0 ] - 0.3 ).abs() < 1e-6 );
        assert!(( out[ 1 ] - 0.5 ).abs() < 1e-6 );
    }


    #[test]
    fn test_clear_frees_space() {
        let buf = SampleBuffer::new( 4, 1, 1 );
        buf.push( &[ 0.0; 4 ] );
        buf.clear();
        assert_eq!( buf.free(), 4 );
    }


    #[test]
    fn test_sample_format_from_bits() {
        assert_eq!( SampleFormat::from_bits( Some( 16 ) ), SampleFormat::S16 );
        assert_eq!( SampleFormat::from_bits( Some( 24 ) ), SampleFormat::S32 );
        assert_eq!( SampleFormat::from_bits( None ), SampleFormat::F32 );
    }


    #[test]
    fn test_interleave() {
        let planar = vec![ vec![ 1.0, 2.0 ], vec![ 3.0, 4.0 ] ];
        assert_eq!( interleave( &planar ), vec![ 1.0, 3.0, 2.0, 4.0 ] );
        assert!( interleave( &[] ).is_empty() );
    }
}

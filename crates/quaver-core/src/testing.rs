//! Test helpers: a recording output sink and a WAV generator.

use std::cell::{ Ref, RefCell, RefMut };
use std::path::Path;
use std::rc::Rc;

use hound::{ WavSpec, WavWriter };

use crate::output::{ OutputError, OutputSink, SampleFormat };


#[derive( Debug, Default )]
pub struct MockState {
    /// Headroom reported on every query; the fake device drains instantly.
    pub headroom: usize,
    /// Total samples accepted.
    pub written: usize,
    /// Number of successful writes.
    pub writes: usize,
    pub configured: Option<( u16, SampleFormat, u32 )>,
    pub running: bool,
    pub starts: usize,
    pub stops: usize,
    pub fail_writes: bool,
    pub fail_configure: bool,
}


/// Output sink that records what it's asked to do.
///
/// Clones share state, so a test can keep one handle while the backend
/// owns the other.
#[derive( Debug, Clone, Default )]
pub struct MockOutput( Rc<RefCell<MockState>> );


impl MockOutput {
    pub fn with_headroom( headroom: usize ) -> Self {
        let output = Self::default();
        output.state_mut().headroom = headroom;
        output
    }


    pub fn state( &self ) -> Ref<'_, MockState> {
        self.0.borrow()
    }


    pub fn state_mut( &self ) -> RefMut<'_, MockState> {
        self.0.borrow_mut()
    }
}


impl OutputSink for MockOutput {
    fn configure( &mut self, channels: u16, format: SampleFormat, sample_rate: u32 ) -> Result<(), OutputError> {
        if self.state().fail_configure {
            return Err( OutputError::StreamConfig( "format not supported".into() ) );
        }
        self.state_mut().configured = Some(( channels, format, sample_rate ));
        Ok(())
    }


    fn available_headroom( &self ) -> usize {
        self.state().headroom
    }


    fn write( &mut self, samples: &[f32] ) -> Result<usize, OutputError> {
        let mut state = self.state_mut();
        if state.fail_writes {
            return Err( OutputError::PlayStream( "device lost".into() ) );
        }
        state.written += samples.len();
        state.writes += 1;
        Ok( samples.len() )
    }


    fn start( &mut self ) -> Result<(), OutputError> {
        let mut state = self.state_mut();
        state.running = true;
        state.starts += 1;
        Ok(())
    }


    fn stop( &mut self ) -> Result<(), OutputError> {
        let mut state = self.state_mut();
        state.running = false;
        state.stops += 1;
        Ok(())
    }
}


/// Writes a 16-bit PCM WAV file holding a sawtooth of the given length.
pub fn write_wav( path: &Path, sample_rate: u32, channels: u16, duration_ms: u64 ) {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = WavWriter::create( path, spec ).unwrap();

    let frames = u64::from( sample_rate ) * duration_ms / 1000;
    for i in 0..frames {
        let value = ( ( i % 100 ) as i16 - 50 ) * 200;
        for _ in 0..channels {
            writer.write_sample( value ).unwrap();
        }
    }

    writer.finalize().unwrap();
}

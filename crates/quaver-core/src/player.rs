//! Host-side player
//!
//! The Player owns the active decoder backend and the playlist. The host
//! calls [`Player::tick`] from its event loop and sleeps for the returned
//! interval; everything else is a direct request (play, pause, seek...).

use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use thiserror::Error;

use crate::callbacks::{ self, PlayerEvent };
use crate::decoder::{
    registry, Backend, BackendState, Control, DecoderContext, DecoderOps, LoadError, SeekError, SoftvolOp,
    SOFTVOL_UNITY,
};
use crate::output::OutputSink;
use crate::playlist::Playlist;
use crate::scheduler::MAX_INTERVAL_MS;


/// Errors that can occur during playback.
#[derive( Debug, Error )]
pub enum PlayerError {
    #[error( "Playlist is empty" )]
    EmptyPlaylist,

    #[error( "No decoder backend" )]
    NoBackend,

    #[error( "Load failed: {0}" )]
    Load( #[from] LoadError ),

    #[error( "{0}" )]
    Seek( #[from] SeekError ),
}


/// Current playback state.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}


/// What the backend last told us about the current track.
#[derive( Debug, Clone, Default, PartialEq, Eq )]
pub struct NowPlaying {
    pub path: Option<PathBuf>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    /// Zero when unknown.
    pub duration_ms: u64,
    pub position_ms: u64,
    /// Encoded cover image, if the track has one.
    pub art: Option<Vec<u8>>,
}


/// Core audio player.
pub struct Player {
    /// Only `None` while a backend switch is in progress.
    backend: Option<Backend>,
    events: Receiver<PlayerEvent>,
    playlist: Playlist,
    now: NowPlaying,
    state: PlaybackState,
    softvol: u32,
}


impl Player {
    /// Creates a player with the named decoder backend.
    ///
    /// @param decoder - Backend name, `None` for the default
    /// @param output - Output sink the backend writes to
    /// @param playlist - Initial playlist
    pub fn new( decoder: Option<&str>, output: Option<Box<dyn OutputSink>>, playlist: Playlist ) -> Self {
        let ( callbacks, events ) = callbacks::channel();
        let mut context = DecoderContext::new( Box::new( callbacks ) );
        if let Some( output ) = output {
            context = context.with_output( output );
        }

        Self {
            backend: Some( registry::init( decoder, context ) ),
            events,
            playlist,
            now: NowPlaying::default(),
            state: PlaybackState::Stopped,
            softvol: SOFTVOL_UNITY,
        }
    }


    /// Replaces the active backend with the one called `name`.
    ///
    /// The old backend is torn down first; the current track is dropped
    /// and playback stops. The softvol setting carries over.
    pub fn switch_backend( &mut self, name: &str ) {
        let Some( old ) = self.backend.take() else {
            return;
        };

        let previous = old.name();
        let mut backend = registry::init( Some( name ), old.shutdown() );
        backend.softvol( SoftvolOp::Set( self.softvol ) );
        tracing::info!( "Switched decoder from '{}' to '{}'", previous, backend.name() );

        self.backend = Some( backend );
        self.state = PlaybackState::Stopped;
        self.now.position_ms = 0;
    }


    /// Loads and starts the playlist's current entry.
    pub fn play_current( &mut self ) -> Result<(), PlayerError> {
        let path = self.playlist
            .current_path()
            .ok_or( PlayerError::EmptyPlaylist )?
            .to_path_buf();

        let backend = self.backend.as_mut().ok_or( PlayerError::NoBackend )?;
        backend.load( &path )?;
        backend.control( Control::Play );

        tracing::info!( "Playing: {:?}", path );
        self.now = NowPlaying { path: Some( path ), ..NowPlaying::default() };
        self.state = PlaybackState::Playing;
        self.drain_events();
        Ok(())
    }


    /// Plays the entry at `pos` (insertion order).
    pub fn play_index( &mut self, pos: usize ) -> Result<(), PlayerError> {
        if !self.playlist.set( pos ) {
            return Err( PlayerError::EmptyPlaylist );
        }
        self.play_current()
    }


    /// Plays the next track in the playlist.
    /// Returns Ok(false) if there is no next track.
    pub fn next( &mut self ) -> Result<bool, PlayerError> {
        if !self.playlist.next() {
            return Ok( false );
        }
        self.play_current().map( |_| true )
    }


    /// Plays the previous track in the playlist.
    /// Returns Ok(false) if there is no previous track.
    pub fn prev( &mut self ) -> Result<bool, PlayerError> {
        if !self.playlist.prev() {
            return Ok( false );
        }
        self.play_current().map( |_| true )
    }


    /// Pauses, resumes, or starts the current entry when stopped.
    pub fn toggle_pause( &mut self ) -> Result<(), PlayerError> {
        match self.state {
            PlaybackState::Playing => {
                self.control( Control::Pause );
                self.state = PlaybackState::Paused;
            }
            PlaybackState::Paused => {
                self.control( Control::Play );
                self.state = PlaybackState::Playing;
            }
            PlaybackState::Stopped => self.play_current()?,
        }
        Ok(())
    }


    /// Pauses and rewinds the current track.
    pub fn stop( &mut self ) {
        self.control( Control::Pause );
        if let Some( backend ) = self.backend.as_mut() {
            match backend.seek( 0 ) {
                Ok(()) | Err( SeekError::NoTrack ) => {}
                Err( e ) => tracing::warn!( "Failed to rewind: {}", e ),
            }
        }
        self.drain_events();
        self.state = PlaybackState::Stopped;
    }


    /// Seeks to an absolute position in the current track.
    pub fn seek_to( &mut self, position: Duration ) -> Result<(), PlayerError> {
        let ms = i64::try_from( position.as_millis() ).unwrap_or( i64::MAX );
        self.seek_ms( ms )
    }


    /// Seeks relative to the last reported position.
    pub fn seek_relative( &mut self, delta_ms: i64 ) -> Result<(), PlayerError> {
        let current = i64::try_from( self.now.position_ms ).unwrap_or( i64::MAX );
        self.seek_ms( current.saturating_add( delta_ms ) )
    }


    fn seek_ms( &mut self, offset_ms: i64 ) -> Result<(), PlayerError> {
        let backend = self.backend.as_mut().ok_or( PlayerError::NoBackend )?;
        backend.seek( offset_ms )?;
        if backend.state() == BackendState::Paused && self.state == PlaybackState::Stopped {
            self.state = PlaybackState::Paused;
        }
        self.drain_events();
        Ok(())
    }


    /// Sets the software volume, returns the clamped value.
    pub fn set_softvol( &mut self, value: u32 ) -> u32 {
        if let Some( backend ) = self.backend.as_mut() {
            self.softvol = backend.softvol( SoftvolOp::Set( value ) );
        }
        self.softvol
    }


    pub fn softvol( &self ) -> u32 {
        self.softvol
    }


    /// Runs one backend cycle and handles what it reported.
    ///
    /// Returns how long to wait before calling again.
    pub fn tick( &mut self ) -> Duration {
        let interval = self.backend.as_mut().map_or( MAX_INTERVAL_MS, |b| b.tick() );

        if self.drain_events() {
            self.advance();
        }

        Duration::from_millis( interval )
    }


    /// Applies queued backend notifications to [`NowPlaying`].
    ///
    /// Returns true if the track finished.
    fn drain_events( &mut self ) -> bool {
        let finished_state = self.backend_state() == Some( BackendState::Finished );
        let mut finished = false;

        while let Ok( event ) = self.events.try_recv() {
            match event {
                PlayerEvent::TrackInfo { artist, album, title } => {
                    self.now.artist = artist;
                    self.now.album = album;
                    self.now.title = title;
                }
                // A zero duration after a load only means "unknown"
                PlayerEvent::Duration( 0 ) if finished_state => finished = true,
                PlayerEvent::Duration( ms ) => self.now.duration_ms = ms,
                PlayerEvent::Position( ms ) => self.now.position_ms = ms,
                PlayerEvent::Art( data ) => self.now.art = Some( data ),
            }
        }

        finished
    }


    /// Moves on to the next entry after a track ended.
    fn advance( &mut self ) {
        if !self.playlist.next() {
            tracing::info!( "End of playlist" );
            self.state = PlaybackState::Stopped;
            return;
        }

        if let Err( e ) = self.play_current() {
            tracing::warn!( "Can't play next track: {}", e );
            self.state = PlaybackState::Stopped;
        }
    }


    fn control( &mut self, ctrl: Control ) {
        if let Some( backend ) = self.backend.as_mut() {
            backend.control( ctrl );
        }
    }


    /// Gets the current playback state.
    pub fn state( &self ) -> PlaybackState {
        self.state
    }


    pub fn backend_state( &self ) -> Option<BackendState> {
        self.backend.as_ref().map( |b| b.state() )
    }


    /// Name of the active decoder backend.
    pub fn backend_name( &self ) -> &'static str {
        self.backend.as_ref().map_or( "none", |b| b.name() )
    }


    pub fn now_playing( &self ) -> &NowPlaying {
        &self.now
    }


    pub fn playlist( &self ) -> &Playlist {
        &self.playlist
    }


    pub fn playlist_mut( &mut self ) -> &mut Playlist {
        &mut self.playlist
    }


    /// Tears the backend down and hands the playlist back for saving.
    pub fn shutdown( mut self ) -> Playlist {
        if let Some( backend ) = self.backend.take() {
            drop( backend.shutdown() );
        }
        self.playlist
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::testing::{ write_wav, MockOutput };
    use std::path::Path;


    fn player_with( tracks: &[ &Path ], output: &MockOutput ) -> Player {
        let mut playlist = Playlist::with_seed( 7 );
        for track in tracks {
            playlist.add( *track );
        }
        Player::new( None, Some( Box::new( output.clone() ) ), playlist )
    }


    fn tick_until( player: &mut Player, done: impl Fn( &Player ) -> bool ) {
        for _ in 0..1000 {
            if done( player ) {
                return;
            }
            player.tick();
        }
        panic!( "condition never reached" );
    }


    #[test]
    fn test_empty_playlist() {
        let output = MockOutput::with_headroom( 4096 );
        let mut player = player_with( &[], &output );
        assert!( matches!( player.play_current(), Err( PlayerError::EmptyPlaylist ) ) );
        assert_eq!( player.state(), PlaybackState::Stopped );

        // Nothing loaded to rewind
        player.stop();
        assert_eq!( player.state(), PlaybackState::Stopped );
        assert!( player.playlist().current_index().is_none() );
    }


    #[test]
    fn test_plays_through_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join( "a.wav" );
        let b = dir.path().join( "b.wav" );
        write_wav( &a, 8000, 1, 300 );
        write_wav( &b, 8000, 2, 500 );

        let output = MockOutput::with_headroom( 4096 );
        let mut player = player_with( &[ &a, &b ], &output );

        player.play_current().unwrap();
        assert_eq!( player.state(), PlaybackState::Playing );
        assert_eq!( player.now_playing().duration_ms, 300 );
        assert_eq!( player.now_playing().path.as_deref(), Some( a.as_path() ) );

        tick_until( &mut player, |p| p.now_playing().path.as_deref() == Some( b.as_path() ) );
        assert_eq!( player.now_playing().duration_ms, 500 );
        assert_eq!( player.state(), PlaybackState::Playing );

        tick_until( &mut player, |p| p.state() == PlaybackState::Stopped );
        assert_eq!( player.now_playing().position_ms, 500 );
        assert_eq!( player.playlist().current_index(), Some( 1 ) );
    }


    #[test]
    fn test_repeat_wraps_to_first() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join( "a.wav" );
        write_wav( &a, 8000, 1, 200 );

        let output = MockOutput::with_headroom( 4096 );
        let mut player = player_with( &[ &a ], &output );
        player.playlist_mut().set_repeat( true );

        player.play_current().unwrap();
        let starts = output.state().starts;
        tick_until( &mut player, |_| output.state().starts > starts );
        assert_eq!( player.state(), PlaybackState::Playing );
    }


    #[test]
    fn test_failed_load_keeps_previous_track() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join( "a.wav" );
        write_wav( &a, 8000, 1, 1000 );
        let missing = dir.path().join( "gone.mp3" );

        let output = MockOutput::with_headroom( 4096 );
        let mut player = player_with( &[ &a, &missing ], &output );
        player.play_current().unwrap();
        let before = player.now_playing().clone();

        assert!( matches!( player.next(), Err( PlayerError::Load( _ ) ) ) );
        assert_eq!( player.now_playing(), &before );
        assert_eq!( player.state(), PlaybackState::Playing );
    }


    #[test]
    fn test_rejected_output_format_keeps_playing() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join( "a.wav" );
        let b = dir.path().join( "b.wav" );
        write_wav( &a, 8000, 1, 1000 );
        write_wav( &b, 44100, 2, 1000 );

        let output = MockOutput::with_headroom( 4096 );
        let mut player = player_with( &[ &a, &b ], &output );
        player.play_current().unwrap();

        output.state_mut().fail_configure = true;
        assert!( matches!( player.next(), Err( PlayerError::Load( LoadError::Output( _ ) ) ) ) );
        assert_eq!( player.state(), PlaybackState::Playing );
        assert_eq!( player.backend_state(), Some( BackendState::Playing ) );
        assert_eq!( player.now_playing().path.as_deref(), Some( a.as_path() ) );
        assert!( output.state().running );
    }


    #[test]
    fn test_toggle_pause_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join( "a.wav" );
        write_wav( &a, 8000, 1, 2000 );

        let output = MockOutput::with_headroom( 2048 );
        let mut player = player_with( &[ &a ], &output );

        player.toggle_pause().unwrap();
        assert_eq!( player.state(), PlaybackState::Playing );
        player.tick();
        assert!( player.now_playing().position_ms > 0 );

        player.toggle_pause().unwrap();
        assert_eq!( player.state(), PlaybackState::Paused );
        assert_eq!( player.backend_state(), Some( BackendState::Paused ) );

        player.stop();
        assert_eq!( player.state(), PlaybackState::Stopped );
        assert_eq!( player.now_playing().position_ms, 0 );
    }


    #[test]
    fn test_seek_relative_clamps_at_start() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join( "a.wav" );
        write_wav( &a, 8000, 1, 4000 );

        let output = MockOutput::with_headroom( 4096 );
        let mut player = player_with( &[ &a ], &output );
        assert!( matches!( player.seek_relative( 1000 ), Err( PlayerError::Seek( SeekError::NoTrack ) ) ) );

        player.play_current().unwrap();
        player.seek_to( Duration::from_secs( 2 ) ).unwrap();
        // Lands on a packet boundary at or before the target
        assert!(( 1800..=2000 ).contains( &player.now_playing().position_ms ) );

        player.seek_relative( -5000 ).unwrap();
        assert_eq!( player.now_playing().position_ms, 0 );

        // Far past the end lands inside the track
        player.seek_to( Duration::from_secs( 500_000_000_000 ) ).unwrap();
        assert!( player.now_playing().position_ms <= 4000 );
        player.seek_relative( i64::MAX ).unwrap();
        assert!( player.now_playing().position_ms <= 4000 );
    }


    #[test]
    fn test_switch_backend_keeps_softvol_and_output() {
        let output = MockOutput::with_headroom( 4096 );
        let mut player = player_with( &[], &output );
        assert_eq!( player.backend_name(), "symphonia" );
        assert_eq!( player.set_softvol( 250 ), 130 );

        player.switch_backend( "null" );
        assert_eq!( player.backend_name(), "null" );
        assert_eq!( player.set_softvol( 130 ), 130 );

        player.switch_backend( "symphonia" );
        assert_eq!( player.backend_name(), "symphonia" );
        assert_eq!( player.softvol(), 130 );
        assert!( output.state().stops >= 2 );
    }


    #[test]
    fn test_shutdown_returns_playlist() {
        let output = MockOutput::with_headroom( 4096 );
        let player = player_with( &[ Path::new( "/m/a.mp3" ) ], &output );
        let playlist = player.shutdown();
        assert_eq!( playlist.len(), 1 );
        assert!( !output.state().running );
    }
}

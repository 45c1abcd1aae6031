//! Quaver CLI - Terminal UI music player

mod cli;
mod input;
mod settings;
mod view;

use std::fs::{ self, File };
use std::io;
use std::path::{ Path, PathBuf };
use std::time::{ Duration, Instant };

use anyhow::{ Context, Result };
use clap::Parser;
use crossterm::{
    event::{ self, Event, KeyCode, KeyEventKind, KeyModifiers },
    terminal::{ disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen },
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{ Block, Borders, List, ListItem, ListState, Paragraph, Wrap },
};
use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt };

use cli::Args;
use input::{ InputBuffer, InputMode };
use settings::Settings;
use view::ViewMode;

use quaver_core::{
    command,
    decoder::registry,
    library,
    output::{ CpalOutput, OutputSink },
    player::PlaybackState,
    Command, Player, Playlist,
};


/// Minimum time between two redraws.
const DRAW_INTERVAL: Duration = Duration::from_millis( 50 );

/// Softvol step for `+`/`-`.
const SOFTVOL_STEP: u32 = 5;

/// Seek step for the arrow keys, in milliseconds.
const SEEK_STEP_MS: i64 = 5000;


/// Application state.
struct App {
    player: Player,
    settings: Settings,
    should_quit: bool,

    // View state
    view_mode: ViewMode,
    playlist_state: ListState,
    help_scroll: u16,

    // Input state
    input_mode: InputMode,
    input_buffer: InputBuffer,

    // Status message (shown in status bar)
    status_message: Option<String>,
    status_clear_at: Option<Instant>,

    /// When the player wants its next tick
    next_tick: Instant,

    /// Where the playlist is persisted, if anywhere
    playlist_file: Option<PathBuf>,
    no_save: bool,
}


impl App {
    /// Creates a new App instance.
    fn new( args: &Args ) -> Self {
        let settings = Settings::load();

        let output: Option<Box<dyn OutputSink>> = match CpalOutput::open() {
            Ok( output ) => Some( Box::new( output ) ),
            Err( e ) => {
                tracing::warn!( "No audio output: {}", e );
                None
            }
        };

        let playlist_file = args.playlist.clone().or_else( Playlist::default_file );
        let mut playlist = Playlist::new();
        if let Some( file ) = playlist_file.as_deref().filter( |f| f.exists() ) {
            match playlist.load( file ) {
                Ok(()) => playlist.log_entries(),
                Err( e ) => tracing::warn!( "Failed to load playlist {:?}: {}", file, e ),
            }
        }
        playlist.set_shuffle( settings.shuffle );
        playlist.set_repeat( settings.repeat );

        // Files given on the command line are appended and played
        let first_new = playlist.len();
        for file in &args.files {
            if let Err( e ) = playlist.add_path( file ) {
                tracing::warn!( "Can't add {:?}: {}", file, e );
            }
        }
        let autoplay = playlist.len() > first_new;

        let decoder = args.decoder.as_deref().unwrap_or( &settings.decoder );
        let mut player = Player::new( Some( decoder ), output, playlist );
        player.set_softvol( u32::from( settings.softvol ) );

        let mut app = Self {
            player,
            settings,
            should_quit: false,
            view_mode: ViewMode::Playlist,
            playlist_state: ListState::default(),
            help_scroll: 0,
            input_mode: InputMode::Normal,
            input_buffer: InputBuffer::new(),
            status_message: None,
            status_clear_at: None,
            next_tick: Instant::now(),
            playlist_file,
            no_save: args.no_save,
        };

        if autoplay {
            app.playlist_state.select( Some( first_new ) );
            app.play_selected();
        } else if !app.player.playlist().is_empty() {
            app.playlist_state.select( Some( 0 ) );
        }

        app
    }


    /// Sets a status message that auto-clears after a delay.
    fn set_status( &mut self, msg: impl Into<String> ) {
        self.status_message = Some( msg.into() );
        self.status_clear_at = Some( Instant::now() + Duration::from_secs( 3 ) );
    }


    /// Runs the player if its interval elapsed and clears expired messages.
    fn tick( &mut self ) {
        let now = Instant::now();

        if now >= self.next_tick {
            let wait = self.player.tick();
            self.next_tick = now + wait;
        }

        if self.status_clear_at.is_some_and( |at| now >= at ) {
            self.status_message = None;
            self.status_clear_at = None;
        }
    }


    fn handle_key( &mut self, code: KeyCode, modifiers: KeyModifiers ) {
        match self.input_mode {
            InputMode::Normal => self.handle_normal_key( code, modifiers ),
            InputMode::Command => self.handle_command_key( code ),
        }
    }


    fn handle_normal_key( &mut self, code: KeyCode, modifiers: KeyModifiers ) {
        // Global keys (work in any view)
        match code {
            KeyCode::Char( '/' ) => {
                self.input_mode = InputMode::Command;
                self.input_buffer.clear();
                return;
            }
            KeyCode::Tab => {
                self.view_mode = self.view_mode.next_tab();
                return;
            }
            KeyCode::Char( '?' ) => {
                self.view_mode = ViewMode::Help;
                return;
            }
            KeyCode::Esc => {
                self.view_mode = ViewMode::Playlist;
                return;
            }
            KeyCode::Char( 'q' ) => {
                self.should_quit = true;
                return;
            }
            KeyCode::Char( ' ' ) => {
                if let Err( e ) = self.player.toggle_pause() {
                    self.set_status( format!( "Play error: {}", e ) );
                }
                return;
            }
            KeyCode::Char( 'n' ) => {
                self.play_next();
                return;
            }
            KeyCode::Char( 'p' ) => {
                self.play_previous();
                return;
            }
            KeyCode::Char( '+' ) | KeyCode::Char( '=' ) => {
                self.change_softvol( SOFTVOL_STEP as i64 );
                return;
            }
            KeyCode::Char( '-' ) => {
                self.change_softvol( -( SOFTVOL_STEP as i64 ) );
                return;
            }
            KeyCode::Left => {
                self.seek_by( -SEEK_STEP_MS );
                return;
            }
            KeyCode::Right => {
                self.seek_by( SEEK_STEP_MS );
                return;
            }
            _ => {}
        }

        // View-specific keys
        match self.view_mode {
            ViewMode::Playlist => self.handle_playlist_key( code, modifiers ),
            ViewMode::Help => self.handle_help_key( code ),
            ViewMode::TrackInfo => {}
        }
    }


    fn handle_playlist_key( &mut self, code: KeyCode, modifiers: KeyModifiers ) {
        let shift = modifiers.contains( KeyModifiers::SHIFT );
        match code {
            KeyCode::Enter => self.play_selected(),
            KeyCode::Char( 'K' ) => self.move_track_up(),
            KeyCode::Char( 'J' ) => self.move_track_down(),
            KeyCode::Up if shift => self.move_track_up(),
            KeyCode::Down if shift => self.move_track_down(),
            KeyCode::Up | KeyCode::Char( 'k' ) => self.playlist_select_previous(),
            KeyCode::Down | KeyCode::Char( 'j' ) => self.playlist_select_next(),
            KeyCode::Char( 'd' ) | KeyCode::Delete => self.delete_selected_track(),
            KeyCode::Char( 's' ) => self.toggle_shuffle(),
            KeyCode::Char( 'r' ) => self.set_repeat( None ),
            KeyCode::Char( 'x' ) => self.player.stop(),
            _ => {}
        }
    }


    fn handle_help_key( &mut self, code: KeyCode ) {
        match code {
            KeyCode::Up | KeyCode::Char( 'k' ) => {
                self.help_scroll = self.help_scroll.saturating_sub( 1 );
            }
            KeyCode::Down | KeyCode::Char( 'j' ) => {
                self.help_scroll = self.help_scroll.saturating_add( 1 );
            }
            _ => {}
        }
    }


    fn handle_command_key( &mut self, code: KeyCode ) {
        match code {
            KeyCode::Enter => {
                let input = self.input_buffer.submit();
                self.input_mode = InputMode::Normal;
                self.execute_command( &input );
            }
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.input_buffer.clear();
            }
            KeyCode::Backspace => {
                if self.input_buffer.is_empty() {
                    self.input_mode = InputMode::Normal;
                } else {
                    self.input_buffer.backspace();
                }
            }
            KeyCode::Delete => self.input_buffer.delete(),
            KeyCode::Left => self.input_buffer.move_left(),
            KeyCode::Right => self.input_buffer.move_right(),
            KeyCode::Home => self.input_buffer.move_home(),
            KeyCode::End => self.input_buffer.move_end(),
            KeyCode::Up => self.input_buffer.recall_older(),
            KeyCode::Down => self.input_buffer.recall_newer(),
            KeyCode::Char( c ) => self.input_buffer.insert( c ),
            _ => {}
        }
    }


    fn execute_command( &mut self, input: &str ) {
        match Command::parse( input ) {
            Ok( cmd ) => {
                if let Err( e ) = self.run_command( cmd ) {
                    self.set_status( format!( "Error: {:#}", e ) );
                }
            }
            Err( e ) => {
                self.set_status( format!( "{}", e ) );
            }
        }
    }


    fn run_command( &mut self, cmd: Command ) -> Result<()> {
        match cmd {
            Command::Add { path } => {
                let path = library::absolute( &self.settings.resolve_add_path( &path ) );
                let count = self.player.playlist_mut().add_path( &path )?;
                let dir = if path.is_dir() { Some( path.as_path() ) } else { path.parent() };
                if let Some( dir ) = dir {
                    self.settings.set_last_dir( dir.to_path_buf() );
                }
                if self.playlist_state.selected().is_none() && count > 0 {
                    self.playlist_state.select( Some( 0 ) );
                }
                self.set_status( format!( "Added {} tracks", count ) );
            }
            Command::Remove => self.delete_selected_track(),
            Command::Clear => {
                self.player.stop();
                self.player.playlist_mut().clear();
                self.playlist_state.select( None );
                self.set_status( "Playlist cleared" );
            }
            Command::Save { path } => {
                let path = self.playlist_target( path )?;
                self.player.playlist().save( &path )?;
                self.set_status( format!( "Saved playlist to {}", path.display() ) );
            }
            Command::Load { path } => {
                let path = self.playlist_target( path )?;
                self.player.stop();
                self.player.playlist_mut().load( &path )?;
                self.player.playlist().log_entries();
                let len = self.player.playlist().len();
                self.playlist_state.select( if len == 0 { None } else { Some( 0 ) } );
                self.set_status( format!( "Loaded {} tracks", len ) );
            }
            Command::Shuffle => self.toggle_shuffle(),
            Command::Repeat { on } => self.set_repeat( on ),
            Command::Play => self.play_selected(),
            Command::Pause => self.player.toggle_pause()?,
            Command::Stop => self.player.stop(),
            Command::Next => self.play_next(),
            Command::Prev => self.play_previous(),
            Command::Seek { position } => self.player.seek_to( position )?,
            Command::Volume { level: Some( level ) } => {
                let value = self.player.set_softvol( level );
                self.settings.set_softvol( value );
                self.set_status( format!( "Volume {}%", value ) );
            }
            Command::Volume { level: None } => {
                self.set_status( format!( "Volume {}%", self.player.softvol() ) );
            }
            Command::Decoder { name: Some( name ) } => {
                self.player.switch_backend( &name );
                let active = self.player.backend_name();
                self.settings.set_decoder( active );
                self.set_status( format!( "Decoder: {}", active ) );
            }
            Command::Decoder { name: None } => {
                let available = registry::names().collect::<Vec<_>>().join( ", " );
                self.set_status( format!( "Decoder: {} (available: {})", self.player.backend_name(), available ) );
            }
            Command::Help => self.view_mode = ViewMode::Help,
            Command::Quit => self.should_quit = true,
        }
        Ok(())
    }


    /// Resolves the file a `/save` or `/load` works on.
    fn playlist_target( &self, path: Option<PathBuf> ) -> Result<PathBuf> {
        path.map( |p| library::absolute( &p ) )
            .or_else( || self.playlist_file.clone() )
            .context( "No playlist file" )
    }


    fn playlist_select_next( &mut self ) {
        let len = self.player.playlist().len();
        if len == 0 {
            return;
        }

        let i = match self.playlist_state.selected() {
            Some( i ) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.playlist_state.select( Some( i ) );
    }


    fn playlist_select_previous( &mut self ) {
        let len = self.player.playlist().len();
        if len == 0 {
            return;
        }

        let i = match self.playlist_state.selected() {
            Some( i ) if i > 0 => i - 1,
            _ => len - 1,
        };
        self.playlist_state.select( Some( i ) );
    }


    fn play_selected( &mut self ) {
        let idx = self.playlist_state.selected().unwrap_or( 0 );
        if let Err( e ) = self.player.play_index( idx ) {
            self.set_status( format!( "Play error: {}", e ) );
        }
    }


    fn play_next( &mut self ) {
        match self.player.next() {
            Ok( true ) => self.playlist_state.select( self.player.playlist().current_index() ),
            Ok( false ) => self.set_status( "End of playlist" ),
            Err( e ) => self.set_status( format!( "Play error: {}", e ) ),
        }
    }


    fn play_previous( &mut self ) {
        match self.player.prev() {
            Ok( true ) => self.playlist_state.select( self.player.playlist().current_index() ),
            Ok( false ) => self.set_status( "Start of playlist" ),
            Err( e ) => self.set_status( format!( "Play error: {}", e ) ),
        }
    }


    fn seek_by( &mut self, delta_ms: i64 ) {
        if let Err( e ) = self.player.seek_relative( delta_ms ) {
            self.set_status( format!( "Seek error: {}", e ) );
        }
    }


    fn change_softvol( &mut self, delta: i64 ) {
        let target = ( i64::from( self.player.softvol() ) + delta ).max( 0 ) as u32;
        let value = self.player.set_softvol( target );
        self.settings.set_softvol( value );
        self.set_status( format!( "Volume {}%", value ) );
    }


    fn toggle_shuffle( &mut self ) {
        let shuffle = !self.player.playlist().shuffle();
        self.player.playlist_mut().set_shuffle( shuffle );
        self.settings.set_shuffle( shuffle );
        self.set_status( if shuffle { "Shuffle on" } else { "Shuffle off" } );
    }


    /// Sets repeat, or toggles it when `on` is `None`.
    fn set_repeat( &mut self, on: Option<bool> ) {
        let repeat = on.unwrap_or( !self.player.playlist().repeat() );
        self.player.playlist_mut().set_repeat( repeat );
        self.settings.set_repeat( repeat );
        self.set_status( if repeat { "Repeat on" } else { "Repeat off" } );
    }


    fn move_track_up( &mut self ) {
        if let Some( idx ) = self.playlist_state.selected() {
            if self.player.playlist_mut().move_up( idx ) {
                self.playlist_state.select( Some( idx - 1 ) );
            }
        }
    }


    fn move_track_down( &mut self ) {
        if let Some( idx ) = self.playlist_state.selected() {
            if self.player.playlist_mut().move_down( idx ) {
                self.playlist_state.select( Some( idx + 1 ) );
            }
        }
    }


    fn delete_selected_track( &mut self ) {
        if let Some( idx ) = self.playlist_state.selected() {
            let playlist = self.player.playlist_mut();
            playlist.remove( idx, 1 );
            let len = playlist.len();

            if len == 0 {
                self.playlist_state.select( None );
            } else if idx >= len {
                self.playlist_state.select( Some( len - 1 ) );
            }
            self.set_status( "Track removed" );
        }
    }


    /// Stops playback and writes the playlist and settings back.
    fn shutdown( self ) {
        let Self { player, mut settings, playlist_file, no_save, .. } = self;
        let playlist = player.shutdown();

        if no_save {
            return;
        }

        if let Some( file ) = playlist_file {
            if let Err( e ) = playlist.save( &file ) {
                tracing::warn!( "Failed to save playlist {:?}: {}", file, e );
            }
        }
        settings.save();
    }
}


/// Routes tracing output to a log file; the terminal belongs to the TUI.
fn init_logging( verbose: bool ) {
    let Some( dir ) = dirs::data_local_dir().map( |d| d.join( "quaver" ) ) else {
        return;
    };
    if fs::create_dir_all( &dir ).is_err() {
        return;
    }
    let Ok( file ) = File::create( dir.join( "quaver.log" ) ) else {
        return;
    };

    let default_filter = if verbose {
        "quaver=debug,quaver_core=debug"
    } else {
        "quaver=info,quaver_core=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else( |_| default_filter.into() ),
        )
        .with( tracing_subscriber::fmt::layer().with_ansi( false ).with_writer( std::sync::Mutex::new( file ) ) )
        .init();
}


fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_decoders {
        for name in registry::names() {
            println!( "{}", name );
        }
        return Ok(());
    }

    init_logging( args.verbose );
    tracing::info!( "Quaver {} starting", env!( "CARGO_PKG_VERSION" ) );

    let mut app = App::new( &args );

    // Setup terminal
    enable_raw_mode()?;
    io::stdout().execute( EnterAlternateScreen )?;
    let mut terminal = Terminal::new( CrosstermBackend::new( io::stdout() ) )?;

    let result = run( &mut terminal, &mut app );

    // Cleanup
    disable_raw_mode()?;
    io::stdout().execute( LeaveAlternateScreen )?;

    app.shutdown();
    result
}


/// Main loop: tick the player at its own cadence, redraw at a capped
/// rate, and handle input in between.
fn run( terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App ) -> Result<()> {
    let mut next_draw = Instant::now();

    while !app.should_quit {
        app.tick();

        if Instant::now() >= next_draw {
            terminal.draw( |frame| draw_ui( frame, app ) )?;
            next_draw = Instant::now() + DRAW_INTERVAL;
        }

        let timeout = app.next_tick.min( next_draw ).saturating_duration_since( Instant::now() );
        if event::poll( timeout )? {
            if let Event::Key( key ) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key( key.code, key.modifiers );
                    next_draw = Instant::now();
                }
            }
        }
    }

    Ok(())
}


/// Formats milliseconds as M:SS.
fn format_ms( ms: u64 ) -> String {
    let secs = ms / 1000;
    format!( "{}:{:02}", secs / 60, secs % 60 )
}


/// Filename of a path for display.
fn display_name( path: &Path ) -> String {
    path.file_name()
        .map( |n| n.to_string_lossy().to_string() )
        .unwrap_or_else( || path.display().to_string() )
}


/// Draws the main UI.
fn draw_ui( frame: &mut Frame, app: &mut App ) {
    let chunks = Layout::default()
        .direction( Direction::Vertical )
        .constraints([
            Constraint::Length( 2 ),  // Header
            Constraint::Min( 0 ),     // Main content
            Constraint::Length( 5 ),  // Now playing
            Constraint::Length( 1 ),  // Status bar
        ])
        .split( frame.area() );

    let header = Paragraph::new( format!( "  QUAVER - {}", app.view_mode.label() ) )
        .style( Style::default().fg( Color::Cyan ).bold() )
        .block( Block::default().borders( Borders::BOTTOM ) );
    frame.render_widget( header, chunks[0] );

    match app.view_mode {
        ViewMode::Playlist => draw_playlist( frame, app, chunks[1] ),
        ViewMode::TrackInfo => draw_track_info( frame, app, chunks[1] ),
        ViewMode::Help => draw_help( frame, app, chunks[1] ),
    }

    draw_now_playing( frame, app, chunks[2] );
    draw_status_bar( frame, app, chunks[3] );
}


fn draw_playlist( frame: &mut Frame, app: &mut App, area: Rect ) {
    let playlist = app.player.playlist();
    let playing_index = playlist.current_index();

    let items: Vec<ListItem> = playlist
        .entries()
        .iter()
        .enumerate()
        .map( |( i, entry )| {
            let prefix = if Some( i ) == playing_index { "▶ " } else { "  " };
            ListItem::new( format!( "{}{}", prefix, display_name( entry.path() ) ) )
        })
        .collect();

    let title = format!(
        " Playlist ({}) {}{}",
        playlist.len(),
        if playlist.shuffle() { "[S]" } else { "" },
        if playlist.repeat() { "[R] " } else { "" },
    );

    let widget = List::new( items )
        .block( Block::default().title( title ).borders( Borders::ALL ) )
        .highlight_style( Style::default().bg( Color::DarkGray ) )
        .highlight_symbol( ">> " );

    frame.render_stateful_widget( widget, area, &mut app.playlist_state );
}


fn draw_track_info( frame: &mut Frame, app: &App, area: Rect ) {
    let now = app.player.now_playing();
    let field = |v: &Option<String>| v.clone().unwrap_or_else( || "-".to_string() );

    let lines = vec![
        Line::from( format!( " Path:     {}", now.path.as_ref().map_or( "-".to_string(), |p| p.display().to_string() ) ) ),
        Line::from( format!( " Title:    {}", field( &now.title ) ) ),
        Line::from( format!( " Artist:   {}", field( &now.artist ) ) ),
        Line::from( format!( " Album:    {}", field( &now.album ) ) ),
        Line::from( format!( " Duration: {}", format_ms( now.duration_ms ) ) ),
        Line::from( format!(
            " Cover:    {}",
            now.art.as_ref().map_or( "none".to_string(), |a| format!( "{} bytes", a.len() ) )
        )),
        Line::from( "" ),
        Line::from( format!( " Decoder:  {} ({:?})", app.player.backend_name(), app.player.backend_state() ) ),
        Line::from( format!( " Volume:   {}%", app.player.softvol() ) ),
    ];

    let info = Paragraph::new( lines )
        .block( Block::default().title( " Track Info " ).borders( Borders::ALL ) );
    frame.render_widget( info, area );
}


fn draw_help( frame: &mut Frame, app: &mut App, area: Rect ) {
    let help_text = command::help_text();
    let line_count = help_text.lines().count() as u16;
    let visible_height = area.height.saturating_sub( 2 );

    // Clamp scroll to valid range
    let max_scroll = line_count.saturating_sub( visible_height );
    app.help_scroll = app.help_scroll.min( max_scroll );

    let help = Paragraph::new( help_text )
        .block( Block::default().title( " Help " ).borders( Borders::ALL ) )
        .wrap( Wrap { trim: false } )
        .scroll(( app.help_scroll, 0 ));

    frame.render_widget( help, area );
}


fn draw_now_playing( frame: &mut Frame, app: &App, area: Rect ) {
    let now = app.player.now_playing();
    let state_str = match app.player.state() {
        PlaybackState::Playing => "▶",
        PlaybackState::Paused => "⏸",
        PlaybackState::Stopped => "■",
    };

    let title = now.title.clone()
        .or_else( || now.path.as_deref().map( display_name ) )
        .unwrap_or_else( || "No track".to_string() );

    let artist_album = match ( &now.artist, &now.album ) {
        ( Some( artist ), Some( album ) ) => format!( "{} - {}", artist, album ),
        ( Some( artist ), None ) => artist.clone(),
        ( None, Some( album ) ) => album.clone(),
        ( None, None ) => String::new(),
    };

    let progress_width = 20;
    let progress = if now.duration_ms > 0 {
        ( now.position_ms as f64 / now.duration_ms as f64 ).min( 1.0 )
    } else {
        0.0
    };
    let filled = ( progress * progress_width as f64 ).round() as usize;
    let bar = format!( "[{}{}]", "━".repeat( filled ), "─".repeat( progress_width - filled ) );

    let mut lines = vec![
        Line::from( Span::styled( format!( " {} {} ", state_str, title ), Style::default().bold() ) ),
    ];
    if !artist_album.is_empty() {
        lines.push( Line::from( Span::styled( format!( "   {} ", artist_album ), Style::default().fg( Color::Gray ) ) ) );
    }
    lines.push( Line::from( format!(
        " {} {} / {}  vol {}%  [{}]",
        bar,
        format_ms( now.position_ms ),
        format_ms( now.duration_ms ),
        app.player.softvol(),
        app.player.backend_name()
    )));

    let now_playing = Paragraph::new( lines )
        .block( Block::default().title( " Now Playing " ).borders( Borders::ALL ) );
    frame.render_widget( now_playing, area );
}


fn draw_status_bar( frame: &mut Frame, app: &App, area: Rect ) {
    let ( text, style ) = match app.input_mode {
        InputMode::Command => {
            ( format!( "/{}", app.input_buffer.content() ), Style::default().fg( Color::Yellow ) )
        }
        InputMode::Normal => match app.status_message {
            Some( ref msg ) => ( msg.clone(), Style::default().fg( Color::Green ) ),
            None => ( app.view_mode.hint().to_string(), Style::default().fg( Color::DarkGray ) ),
        },
    };

    frame.render_widget( Paragraph::new( text ).style( style ), area );

    // Show cursor in command mode
    if app.input_mode == InputMode::Command {
        let cursor_x = area.x + 1 + app.input_buffer.cursor_char_pos() as u16;
        frame.set_cursor_position(( cursor_x, area.y ));
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_format_ms() {
        assert_eq!( format_ms( 0 ), "0:00" );
        assert_eq!( format_ms( 61_999 ), "1:01" );
        assert_eq!( format_ms( 600_000 ), "10:00" );
    }


    #[test]
    fn test_display_name() {
        assert_eq!( display_name( Path::new( "/music/a.mp3" ) ), "a.mp3" );
    }
}

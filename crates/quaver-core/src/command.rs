//! Slash command parsing.
//!
//! Commands typed into the TUI's command line (after the leading `/`)
//! are parsed here; the front end executes them against the player.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::decoder::SOFTVOL_MAX;


/// Errors that can occur during command parsing.
#[derive( Debug, Error )]
pub enum CommandError {
    #[error( "Unknown command: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),
}


/// Parsed slash command.
#[derive( Debug, Clone, PartialEq )]
pub enum Command {
    // Playlist commands
    Add { path: PathBuf },
    Remove,
    Clear,
    Save { path: Option<PathBuf> },
    Load { path: Option<PathBuf> },
    Shuffle,
    Repeat { on: Option<bool> },

    // Playback commands
    Play,
    Pause,
    Stop,
    Next,
    Prev,
    Seek { position: Duration },
    Volume { level: Option<u32> },
    Decoder { name: Option<String> },

    // UI commands
    Help,
    Quit,
}


impl Command {
    /// Parses a command string (without the leading `/`).
    ///
    /// @param input - The command string to parse
    ///
    /// @returns The parsed command or an error
    pub fn parse( input: &str ) -> Result<Self, CommandError> {
        let input = input.trim();
        let mut parts = input.splitn( 2, ' ' );
        let cmd = parts.next().unwrap_or( "" ).to_lowercase();
        let args = parts.next().map( |s| s.trim() ).filter( |s| !s.is_empty() );

        match cmd.as_str() {
            // Playlist commands
            "add" | "a" => {
                let path = args
                    .ok_or_else( || CommandError::MissingArgument( "path".into() ) )?;
                Ok( Command::Add { path: PathBuf::from( path ) } )
            }
            "remove" | "rm" | "del" => Ok( Command::Remove ),
            "clear" | "cl" => Ok( Command::Clear ),
            "save" => Ok( Command::Save { path: args.map( PathBuf::from ) } ),
            "load" => Ok( Command::Load { path: args.map( PathBuf::from ) } ),
            "shuffle" | "sh" => Ok( Command::Shuffle ),
            "repeat" | "rep" => {
                let on = args.map( parse_switch ).transpose()?;
                Ok( Command::Repeat { on } )
            }

            // Playback commands
            "play" | "p" => Ok( Command::Play ),
            "pause" | "pa" => Ok( Command::Pause ),
            "stop" | "st" => Ok( Command::Stop ),
            "next" | "n" => Ok( Command::Next ),
            "prev" | "previous" | "pr" => Ok( Command::Prev ),
            "seek" | "sk" => {
                let time_str = args
                    .ok_or_else( || CommandError::MissingArgument( "time position".into() ) )?;
                let position = parse_time( time_str )?;
                Ok( Command::Seek { position } )
            }
            "vol" | "volume" => {
                let level = args.map( parse_volume ).transpose()?;
                Ok( Command::Volume { level } )
            }
            "decoder" | "dec" => Ok( Command::Decoder { name: args.map( str::to_string ) } ),

            // UI commands
            "help" | "h" => Ok( Command::Help ),
            "quit" | "q" | "exit" => Ok( Command::Quit ),

            "" => Err( CommandError::Unknown( "empty command".into() ) ),
            other => Err( CommandError::Unknown( other.to_string() ) ),
        }
    }


    /// Returns a brief description of the command for help text.
    pub fn description( &self ) -> &'static str {
        match self {
            Command::Add { .. } => "Add file/folder to playlist",
            Command::Remove => "Remove selected track",
            Command::Clear => "Clear playlist",
            Command::Save { .. } => "Save playlist",
            Command::Load { .. } => "Load playlist",
            Command::Shuffle => "Toggle shuffle",
            Command::Repeat { .. } => "Toggle or set repeat",
            Command::Play => "Play selected track",
            Command::Pause => "Pause/resume playback",
            Command::Stop => "Stop playback",
            Command::Next => "Next track",
            Command::Prev => "Previous track",
            Command::Seek { .. } => "Seek to position",
            Command::Volume { .. } => "Set softvol (0-130)",
            Command::Decoder { .. } => "Show or switch decoder",
            Command::Help => "Show help",
            Command::Quit => "Quit application",
        }
    }
}


/// Parses an on/off switch argument.
fn parse_switch( s: &str ) -> Result<bool, CommandError> {
    match s.to_lowercase().as_str() {
        "on" | "1" | "yes" => Ok( true ),
        "off" | "0" | "no" => Ok( false ),
        _ => Err( CommandError::InvalidArgument(
            format!( "Invalid switch: '{}'. Use 'on' or 'off'", s )
        )),
    }
}


/// Parses a softvol level, rejecting values above the maximum.
fn parse_volume( s: &str ) -> Result<u32, CommandError> {
    s.parse::<u32>()
        .ok()
        .filter( |v| *v <= SOFTVOL_MAX )
        .ok_or_else( || CommandError::InvalidArgument(
            format!( "Invalid volume: '{}'. Use 0-{}", s, SOFTVOL_MAX )
        ))
}


/// Parses a time string like "1:30" or "90" into a Duration.
///
/// @param s - Time string in format "MM:SS", "M:SS", or just seconds
///
/// @returns Duration or error
fn parse_time( s: &str ) -> Result<Duration, CommandError> {
    let s = s.trim();

    if let Some(( min, sec )) = s.split_once( ':' ) {
        let minutes: u64 = min.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid minutes: {}", min ) ) )?;
        let seconds: u64 = sec.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid seconds: {}", sec ) ) )?;
        let total = minutes
            .checked_mul( 60 )
            .and_then( |m| m.checked_add( seconds ) )
            .ok_or_else( || CommandError::InvalidArgument( format!( "Time out of range: {}", s ) ) )?;
        Ok( Duration::from_secs( total ) )
    } else {
        let seconds: u64 = s.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid time: {}", s ) ) )?;
        Ok( Duration::from_secs( seconds ) )
    }
}


/// Returns help text listing all available commands.
pub fn help_text() -> &'static str {
    r#"Playlist Commands:
  /add <path>      Add file/folder to playlist
  /remove          Remove selected track      [d]
  /clear           Clear playlist
  /save [file]     Save playlist
  /load [file]     Load playlist
  /shuffle         Toggle shuffle mode        [s]
  /repeat [on|off] Toggle or set repeat       [r]

Playback Commands:
  /play            Play selected track        [Enter]
  /pause           Pause/resume playback      [Space]
  /stop            Stop playback
  /next            Next track                 [n]
  /prev            Previous track             [p]
  /seek <time>     Seek to position (1:30)    [Left/Right]
  /vol [0-130]     Set softvol                [+/-]
  /decoder [name]  Show or switch decoder

Other Commands:
  /help            Show this help             [?]
  /quit            Exit quaver                [q]"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_add() {
        let cmd = Command::parse( "add /path/to/file.mp3" ).unwrap();
        assert_eq!( cmd, Command::Add { path: PathBuf::from( "/path/to/file.mp3" ) } );
    }


    #[test]
    fn test_parse_add_alias() {
        let cmd = Command::parse( "a /music" ).unwrap();
        assert_eq!( cmd, Command::Add { path: PathBuf::from( "/music" ) } );
    }


    #[test]
    fn test_parse_seek() {
        let cmd = Command::parse( "seek 1:30" ).unwrap();
        assert_eq!( cmd, Command::Seek { position: Duration::from_secs( 90 ) } );
    }


    #[test]
    fn test_parse_seek_seconds() {
        let cmd = Command::parse( "seek 45" ).unwrap();
        assert_eq!( cmd, Command::Seek { position: Duration::from_secs( 45 ) } );
    }


    #[test]
    fn test_parse_repeat_switch() {
        assert_eq!( Command::parse( "repeat on" ).unwrap(), Command::Repeat { on: Some( true ) } );
        assert_eq!( Command::parse( "rep OFF" ).unwrap(), Command::Repeat { on: Some( false ) } );
        assert_eq!( Command::parse( "repeat" ).unwrap(), Command::Repeat { on: None } );
        assert!( matches!( Command::parse( "repeat all" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_volume_range() {
        assert_eq!( Command::parse( "vol 130" ).unwrap(), Command::Volume { level: Some( 130 ) } );
        assert_eq!( Command::parse( "vol" ).unwrap(), Command::Volume { level: None } );
        assert!( matches!( Command::parse( "vol 131" ), Err( CommandError::InvalidArgument( _ ) ) ) );
        assert!( matches!( Command::parse( "vol loud" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_decoder() {
        assert_eq!(
            Command::parse( "decoder null" ).unwrap(),
            Command::Decoder { name: Some( "null".into() ) }
        );
        assert_eq!( Command::parse( "dec" ).unwrap(), Command::Decoder { name: None } );
    }


    #[test]
    fn test_parse_save_optional_path() {
        assert_eq!( Command::parse( "save" ).unwrap(), Command::Save { path: None } );
        assert_eq!(
            Command::parse( "load  /tmp/list.txt " ).unwrap(),
            Command::Load { path: Some( PathBuf::from( "/tmp/list.txt" ) ) }
        );
    }


    #[test]
    fn test_parse_seek_out_of_range() {
        assert!( matches!(
            Command::parse( "seek 999999999999999999:0" ),
            Err( CommandError::InvalidArgument( _ ) )
        ));
        assert!( matches!(
            Command::parse( "seek 0:18446744073709551615" ),
            Ok( Command::Seek { .. } )
        ));
        assert!( matches!(
            Command::parse( "seek 1:18446744073709551615" ),
            Err( CommandError::InvalidArgument( _ ) )
        ));
    }


    #[test]
    fn test_parse_unknown() {
        let result = Command::parse( "foobar" );
        assert!( matches!( result, Err( CommandError::Unknown( _ ) ) ) );
    }


    #[test]
    fn test_parse_missing_arg() {
        let result = Command::parse( "add" );
        assert!( matches!( result, Err( CommandError::MissingArgument( _ ) ) ) );
        assert!( matches!( Command::parse( "add   " ), Err( CommandError::MissingArgument( _ ) ) ) );
    }
}

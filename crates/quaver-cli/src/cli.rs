//! Command-line argument parsing for Quaver.

use std::path::PathBuf;

use clap::Parser;


/// Quaver - A small terminal music player.
#[derive( Parser, Debug )]
#[command( name = "quaver" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Decoder backend to use (overrides the saved setting).
    #[arg( short, long )]
    pub decoder: Option<String>,

    /// Playlist file to load instead of the default one.
    #[arg( short, long )]
    pub playlist: Option<PathBuf>,

    /// Don't write the playlist or settings back on exit.
    #[arg( long )]
    pub no_save: bool,

    /// Log at debug level.
    #[arg( short, long )]
    pub verbose: bool,

    /// List the available decoder backends and exit.
    #[arg( long )]
    pub list_decoders: bool,

    /// Add files/directories to the playlist and start playing.
    #[arg( trailing_var_arg = true )]
    pub files: Vec<PathBuf>,
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_flags_and_files() {
        let args = Args::parse_from( [ "quaver", "--decoder", "null", "--no-save", "a.mp3", "music/" ] );
        assert_eq!( args.decoder.as_deref(), Some( "null" ) );
        assert!( args.no_save );
        assert!( !args.verbose );
        assert_eq!( args.files, vec![ PathBuf::from( "a.mp3" ), PathBuf::from( "music/" ) ] );
    }


    #[test]
    fn test_defaults() {
        let args = Args::parse_from( [ "quaver" ] );
        assert!( args.decoder.is_none() );
        assert!( args.playlist.is_none() );
        assert!( args.files.is_empty() );
    }
}

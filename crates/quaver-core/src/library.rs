//! Audio file discovery
//!
//! Used when a directory is added to the playlist: its audio files are
//! collected (one level deep) and returned in path order.

use std::path::{ Path, PathBuf };

use thiserror::Error;


/// Supported audio file extensions.
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "wav", "m4a", "aac", "opus", "aiff", "alac", "mka", "webm",
];


/// Errors that can occur while scanning.
#[derive( Debug, Error )]
pub enum LibraryError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Path not found: {0}" )]
    NotFound( PathBuf ),
}


/// Lists audio files directly inside `dir`, sorted by path.
///
/// Subdirectories are not descended into. Unreadable directories yield
/// an empty list with a warning.
pub fn scan_directory( dir: &Path ) -> Result<Vec<PathBuf>, LibraryError> {
    let entries = match std::fs::read_dir( dir ) {
        Ok( e ) => e,
        Err( e ) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            tracing::warn!( "Access denied: {:?}", dir );
            return Ok( Vec::new() );
        }
        Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err( LibraryError::NotFound( dir.to_path_buf() ) );
        }
        Err( e ) => return Err( LibraryError::Io( e ) ),
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map( |entry| entry.path() )
        .filter( |path| path.is_file() && is_audio_file( path ) )
        .collect();

    files.sort();
    tracing::debug!( "Found {} audio files in {:?}", files.len(), dir );
    Ok( files )
}


/// Checks if a file has a supported audio extension.
pub fn is_audio_file( path: &Path ) -> bool {
    path.extension()
        .and_then( |e| e.to_str() )
        .map( |e| SUPPORTED_EXTENSIONS.contains( &e.to_lowercase().as_str() ) )
        .unwrap_or( false )
}


/// Checks if a path is a network/SMB path.
pub fn is_network_path( path: &Path ) -> bool {
    path.to_str()
        .map( |s| s.starts_with( r"\\" ) || s.starts_with( "//" ) )
        .unwrap_or( false )
}


/// Makes a path absolute against the current directory.
///
/// Falls back to the path as given if the current directory is unknown.
pub fn absolute( path: &Path ) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    match std::env::current_dir() {
        Ok( cwd ) => cwd.join( path ),
        Err( e ) => {
            tracing::warn!( "Can't resolve {:?}: {}", path, e );
            path.to_path_buf()
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::fs;


    #[test]
    fn test_is_audio_file() {
        assert!( is_audio_file( Path::new( "/music/a.mp3" ) ) );
        assert!( is_audio_file( Path::new( "/music/B.FLAC" ) ) );
        assert!( !is_audio_file( Path::new( "/music/cover.jpg" ) ) );
        assert!( !is_audio_file( Path::new( "/music/README" ) ) );
    }


    #[test]
    fn test_scan_directory_is_sorted_and_shallow() {
        let dir = tempfile::tempdir().unwrap();
        fs::write( dir.path().join( "b.ogg" ), b"" ).unwrap();
        fs::write( dir.path().join( "a.mp3" ), b"" ).unwrap();
        fs::write( dir.path().join( "notes.txt" ), b"" ).unwrap();
        fs::create_dir( dir.path().join( "sub" ) ).unwrap();
        fs::write( dir.path().join( "sub" ).join( "c.mp3" ), b"" ).unwrap();

        let files = scan_directory( dir.path() ).unwrap();
        assert_eq!( files, vec![ dir.path().join( "a.mp3" ), dir.path().join( "b.ogg" ) ] );
    }


    #[test]
    fn test_scan_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join( "nope" );
        assert!( matches!( scan_directory( &missing ), Err( LibraryError::NotFound( _ ) ) ) );
    }


    #[test]
    fn test_network_path() {
        assert!( is_network_path( Path::new( r"\\server\share\a.mp3" ) ) );
        assert!( !is_network_path( Path::new( "/home/a.mp3" ) ) );
    }


    #[test]
    fn test_absolute_keeps_absolute_paths() {
        let abs = std::env::temp_dir().join( "x.mp3" );
        assert_eq!( absolute( &abs ), abs );
        assert!( absolute( Path::new( "x.mp3" ) ).is_absolute() );
    }
}

//! Application settings management
//!
//! Persists the decoder choice, softvol, shuffle/repeat and the last
//! directory something was added from. The file is only rewritten when
//! one of these actually changed.

use std::fs;
use std::path::{ Path, PathBuf };

use serde::{ Deserialize, Serialize };

use quaver_core::decoder::{ registry, SOFTVOL_MAX, SOFTVOL_UNITY };


/// Application settings.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
#[serde( default )]
pub struct Settings {
    /// Name of the decoder backend
    pub decoder: String,

    /// Software volume, 0-130
    pub softvol: u8,

    pub shuffle: bool,

    pub repeat: bool,

    /// Directory the last track or folder was added from
    pub last_dir: Option<PathBuf>,

    #[serde( skip )]
    dirty: bool,
}


impl Default for Settings {
    fn default() -> Self {
        Self {
            decoder: registry::DEFAULT.to_string(),
            softvol: SOFTVOL_UNITY as u8,
            shuffle: false,
            repeat: false,
            last_dir: None,
            dirty: false,
        }
    }
}


impl Settings {
    /// Returns the path to the settings file.
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "quaver" ).join( "settings.json" ) )
    }


    /// Loads settings from disk, or returns defaults if not found.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some( path ) => Self::load_from( &path ),
            None => Self::default(),
        }
    }


    /// Loads settings from a specific file, falling back to defaults.
    pub fn load_from( path: &Path ) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let mut settings = match fs::read_to_string( path ) {
            Ok( contents ) => serde_json::from_str::<Self>( &contents ).unwrap_or_else( |e| {
                tracing::warn!( "Ignoring corrupt settings {:?}: {}", path, e );
                Self::default()
            }),
            Err( e ) => {
                tracing::warn!( "Failed to read settings: {}", e );
                Self::default()
            }
        };

        settings.softvol = settings.softvol.min( SOFTVOL_MAX as u8 );
        settings
    }


    /// Saves settings to disk if anything changed.
    pub fn save( &mut self ) {
        if let Some( path ) = Self::settings_path() {
            self.save_to( &path );
        }
    }


    /// Saves settings to a specific file if anything changed.
    pub fn save_to( &mut self, path: &Path ) {
        if !self.dirty {
            return;
        }

        // Create parent directory if needed
        if let Some( parent ) = path.parent() {
            if let Err( e ) = fs::create_dir_all( parent ) {
                tracing::warn!( "Failed to create settings directory: {}", e );
                return;
            }
        }

        match serde_json::to_string_pretty( self ) {
            Ok( json ) => match fs::write( path, json ) {
                Ok(()) => self.dirty = false,
                Err( e ) => tracing::warn!( "Failed to save settings: {}", e ),
            },
            Err( e ) => {
                tracing::warn!( "Failed to serialize settings: {}", e );
            }
        }
    }


    pub fn is_dirty( &self ) -> bool {
        self.dirty
    }


    pub fn set_decoder( &mut self, name: &str ) {
        if self.decoder != name {
            self.decoder = name.to_string();
            self.dirty = true;
        }
    }


    /// Stores a softvol value, clamped to the valid range.
    pub fn set_softvol( &mut self, value: u32 ) {
        let value = value.min( SOFTVOL_MAX ) as u8;
        if self.softvol != value {
            self.softvol = value;
            self.dirty = true;
        }
    }


    pub fn set_shuffle( &mut self, shuffle: bool ) {
        if self.shuffle != shuffle {
            self.shuffle = shuffle;
            self.dirty = true;
        }
    }


    pub fn set_repeat( &mut self, repeat: bool ) {
        if self.repeat != repeat {
            self.repeat = repeat;
            self.dirty = true;
        }
    }


    pub fn set_last_dir( &mut self, dir: PathBuf ) {
        if self.last_dir.as_ref() != Some( &dir ) {
            self.last_dir = Some( dir );
            self.dirty = true;
        }
    }


    /// Resolves a path typed into `/add`.
    ///
    /// Relative paths that don't exist in the working directory are
    /// looked up in the directory something was last added from.
    pub fn resolve_add_path( &self, path: &Path ) -> PathBuf {
        if path.is_relative() && !path.exists() {
            if let Some( candidate ) = self.last_dir.as_ref().map( |dir| dir.join( path ) ) {
                if candidate.exists() {
                    return candidate;
                }
            }
        }
        path.to_path_buf()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!( settings.decoder, "symphonia" );
        assert_eq!( settings.softvol, 100 );
        assert!( !settings.is_dirty() );
    }


    #[test]
    fn test_missing_and_corrupt_files_give_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        assert_eq!( Settings::load_from( &path ), Settings::default() );

        fs::write( &path, "{ not json" ).unwrap();
        assert_eq!( Settings::load_from( &path ), Settings::default() );
    }


    #[test]
    fn test_softvol_is_clamped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        fs::write( &path, r#"{ "softvol": 250, "decoder": "null" }"# ).unwrap();

        let settings = Settings::load_from( &path );
        assert_eq!( settings.softvol, 130 );
        assert_eq!( settings.decoder, "null" );
        assert!( !settings.shuffle );
    }


    #[test]
    fn test_set_softvol_clamps() {
        let mut settings = Settings::default();
        settings.set_softvol( 1000 );
        assert_eq!( settings.softvol, 130 );
        assert!( settings.is_dirty() );
    }


    #[test]
    fn test_saves_only_when_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "quaver" ).join( "settings.json" );

        let mut settings = Settings::default();
        settings.set_repeat( false );
        settings.save_to( &path );
        assert!( !path.exists() );

        settings.set_shuffle( true );
        settings.set_last_dir( PathBuf::from( "/music" ) );
        settings.save_to( &path );
        assert!( path.exists() );
        assert!( !settings.is_dirty() );

        let loaded = Settings::load_from( &path );
        assert!( loaded.shuffle );
        assert_eq!( loaded.last_dir, Some( PathBuf::from( "/music" ) ) );
    }


    #[test]
    fn test_add_path_falls_back_to_last_dir() {
        let dir = tempfile::tempdir().unwrap();
        let album = dir.path().join( "album-only-here" );
        fs::create_dir( &album ).unwrap();

        let mut settings = Settings::default();
        let relative = Path::new( "album-only-here" );
        assert_eq!( settings.resolve_add_path( relative ), relative );

        settings.set_last_dir( dir.path().to_path_buf() );
        assert_eq!( settings.resolve_add_path( relative ), album );

        let missing = Path::new( "nowhere-at-all" );
        assert_eq!( settings.resolve_add_path( missing ), missing );
        assert_eq!( settings.resolve_add_path( &album ), album );
    }
}

//! Playlist with a shuffle permutation that survives edits
//!
//! Entries are stored in insertion order and never physically reordered
//! by shuffle, so row indices handed to a UI stay valid when shuffle is
//! toggled. Every entry carries a `shuffle_slot`; across the playlist the
//! slots always form a permutation of `0..len`.
//!
//! The cursor lives in insertion-order space. With shuffle on, the track
//! that is actually "current" is `entries[entries[cursor].shuffle_slot]`,
//! so walking the cursor `0, 1, 2, ...` visits the tracks in shuffled
//! order.

use std::fs::{ self, File };
use std::io::{ BufRead, BufReader, BufWriter, Write };
use std::path::{ Path, PathBuf };

use rand::rngs::StdRng;
use rand::{ Rng, SeedableRng };
use thiserror::Error;

use crate::library::{ self, LibraryError };


/// Errors that can occur with playlist operations.
#[derive( Debug, Error )]
pub enum PlaylistError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Scan failed: {0}" )]
    Library( #[from] LibraryError ),
}


/// A single playlist entry.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct PlaylistEntry {
    path: PathBuf,
    shuffle_slot: usize,
}


impl PlaylistEntry {
    pub fn path( &self ) -> &Path {
        &self.path
    }


    /// Position of this entry's slot in the shuffle permutation.
    pub fn shuffle_slot( &self ) -> usize {
        self.shuffle_slot
    }
}


/// Ordered track list with cursor, shuffle and repeat.
#[derive( Debug )]
pub struct Playlist {
    entries: Vec<PlaylistEntry>,
    cursor: usize,
    shuffle: bool,
    repeat: bool,
    rng: StdRng,
}


impl Default for Playlist {
    fn default() -> Self {
        Self::new()
    }
}


impl Playlist {
    /// Creates a new empty playlist.
    pub fn new() -> Self {
        Self::with_rng( StdRng::from_entropy() )
    }


    /// Creates an empty playlist with a reproducible shuffle.
    pub fn with_seed( seed: u64 ) -> Self {
        Self::with_rng( StdRng::seed_from_u64( seed ) )
    }


    fn with_rng( rng: StdRng ) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            shuffle: false,
            repeat: false,
            rng,
        }
    }


    /// Appends a track.
    ///
    /// The new entry swaps slots with a uniformly picked existing entry,
    /// which extends the shuffle permutation the same way an inside-out
    /// Fisher-Yates shuffle would.
    pub fn add( &mut self, path: impl Into<PathBuf> ) {
        let n = self.entries.len();
        let mut slot = n;

        if n > 0 {
            let r = self.rng.gen_range( 0..n );
            slot = self.entries[ r ].shuffle_slot;
            self.entries[ r ].shuffle_slot = n;
        }

        self.entries.push( PlaylistEntry { path: path.into(), shuffle_slot: slot } );
        debug_assert!( self.is_consistent() );
    }


    /// Adds a file, or all audio files directly inside a directory.
    ///
    /// Relative paths are resolved against the current directory and
    /// directory contents are appended in path order.
    ///
    /// @returns The number of tracks added
    pub fn add_path( &mut self, path: &Path ) -> Result<usize, PlaylistError> {
        let path = library::absolute( path );

        if path.is_dir() {
            let files = library::scan_directory( &path )?;
            let count = files.len();
            for file in files {
                self.add( file );
            }
            return Ok( count );
        }

        self.add( path );
        Ok( 1 )
    }


    /// Removes up to `count` entries starting at `offset`.
    ///
    /// For every removed entry the entry holding the highest slot among
    /// those still present takes over the removed entry's slot, which
    /// keeps the slots dense without renumbering anything else.
    pub fn remove( &mut self, offset: usize, count: usize ) {
        if offset >= self.entries.len() {
            return;
        }

        let count = count.min( self.entries.len() - offset );
        if count == 0 {
            return;
        }

        for i in 0..count {
            let removed = offset + i;
            let Some( max_idx ) = self.max_slot_index( offset, removed ) else {
                continue;
            };
            self.entries[ max_idx ].shuffle_slot = self.entries[ removed ].shuffle_slot;
        }

        self.entries.drain( offset..offset + count );

        if self.cursor >= offset + count {
            self.cursor -= count;
        } else if self.cursor >= offset {
            self.cursor = offset;
        }
        self.cursor = self.cursor.min( self.entries.len().saturating_sub( 1 ) );

        debug_assert!( self.is_consistent() );
    }


    /// Index of the entry with the highest slot, ignoring entries in
    /// `skip_from..skip_to` that were already given up.
    fn max_slot_index( &self, skip_from: usize, skip_to: usize ) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter( |( i, _ )| !( skip_from..skip_to ).contains( i ) )
            .max_by_key( |( _, e )| e.shuffle_slot )
            .map( |( i, _ )| i )
    }


    /// Clears the playlist.
    pub fn clear( &mut self ) {
        self.entries.clear();
        self.cursor = 0;
    }


    /// Swaps the track at `pos` with the one above it.
    ///
    /// Only paths move, shuffle slots stay with their rows.
    pub fn move_up( &mut self, pos: usize ) -> bool {
        if pos == 0 || pos >= self.entries.len() {
            return false;
        }

        self.swap_paths( pos - 1, pos );
        true
    }


    /// Swaps the track at `pos` with the one below it.
    pub fn move_down( &mut self, pos: usize ) -> bool {
        if pos + 1 >= self.entries.len() {
            return false;
        }

        self.swap_paths( pos, pos + 1 );
        true
    }


    fn swap_paths( &mut self, a: usize, b: usize ) {
        let tmp = std::mem::take( &mut self.entries[ a ].path );
        self.entries[ a ].path = std::mem::replace( &mut self.entries[ b ].path, tmp );
    }


    /// Moves the cursor forward.
    ///
    /// Wraps to the start only with repeat on. Returns false (cursor
    /// untouched) when there is nowhere to go.
    pub fn next( &mut self ) -> bool {
        if self.entries.is_empty() {
            return false;
        }

        if self.cursor + 1 < self.entries.len() {
            self.cursor += 1;
            return true;
        }

        if self.repeat {
            self.cursor = 0;
            return true;
        }

        false
    }


    /// Moves the cursor back, wrapping to the end only with repeat on.
    pub fn prev( &mut self ) -> bool {
        if self.entries.is_empty() {
            return false;
        }

        if self.cursor > 0 {
            self.cursor -= 1;
            return true;
        }

        if self.repeat {
            self.cursor = self.entries.len() - 1;
            return true;
        }

        false
    }


    /// Jumps to a position.
    ///
    /// With shuffle on `pos` is a shuffle-order position; the entry whose
    /// slot equals `pos` becomes the cursor, which makes `entries[pos]`
    /// the current track. Without shuffle it is a plain row index.
    pub fn set( &mut self, pos: usize ) -> bool {
        if pos >= self.entries.len() {
            return false;
        }

        if self.shuffle {
            match self.entries.iter().position( |e| e.shuffle_slot == pos ) {
                Some( idx ) => self.cursor = idx,
                None => return false,
            }
        } else {
            self.cursor = pos;
        }

        true
    }


    /// Row index of the current track.
    pub fn current_index( &self ) -> Option<usize> {
        let entry = self.entries.get( self.cursor )?;
        Some( if self.shuffle { entry.shuffle_slot } else { self.cursor } )
    }


    /// Path of the current track.
    pub fn current_path( &self ) -> Option<&Path> {
        self.current_index().map( |i| self.entries[ i ].path.as_path() )
    }


    /// Raw cursor in insertion-order space.
    pub fn cursor( &self ) -> Option<usize> {
        ( !self.entries.is_empty() ).then_some( self.cursor )
    }


    /// Sets shuffle mode, staying on the current track.
    pub fn set_shuffle( &mut self, shuffle: bool ) {
        if shuffle == self.shuffle {
            return;
        }

        if !self.entries.is_empty() {
            if shuffle {
                if let Some( idx ) = self.entries.iter().position( |e| e.shuffle_slot == self.cursor ) {
                    self.cursor = idx;
                }
            } else {
                self.cursor = self.entries[ self.cursor ].shuffle_slot;
            }
        }

        self.shuffle = shuffle;
    }


    /// Gets shuffle mode.
    pub fn shuffle( &self ) -> bool {
        self.shuffle
    }


    /// Sets repeat mode.
    pub fn set_repeat( &mut self, repeat: bool ) {
        self.repeat = repeat;
    }


    /// Gets repeat mode.
    pub fn repeat( &self ) -> bool {
        self.repeat
    }


    /// Entries in insertion order.
    pub fn entries( &self ) -> &[PlaylistEntry] {
        &self.entries
    }


    /// Gets the number of tracks.
    pub fn len( &self ) -> usize {
        self.entries.len()
    }


    /// Returns true if the playlist is empty.
    pub fn is_empty( &self ) -> bool {
        self.entries.is_empty()
    }


    /// Paths in the order shuffle playback visits them.
    pub fn shuffle_order( &self ) -> Vec<&Path> {
        self.entries
            .iter()
            .map( |e| self.entries[ e.shuffle_slot ].path.as_path() )
            .collect()
    }


    /// Checks that the shuffle slots form a permutation of `0..len`.
    pub fn is_consistent( &self ) -> bool {
        let mut seen = vec![ false; self.entries.len() ];
        for entry in &self.entries {
            match seen.get_mut( entry.shuffle_slot ) {
                Some( s ) if !*s => *s = true,
                _ => return false,
            }
        }
        true
    }


    /// Dumps the playlist to the debug log.
    pub fn log_entries( &self ) {
        tracing::debug!( "Playlist: {} entries, cursor {}", self.entries.len(), self.cursor );
        for ( i, entry ) in self.entries.iter().enumerate() {
            tracing::debug!( "- (c={:3} s={:3}) {:?}", i, entry.shuffle_slot, entry.path );
        }
    }


    /// Replaces the contents with the paths listed in `reader`.
    ///
    /// One path per line; blank lines are skipped and a missing final
    /// newline is fine.
    pub fn load_from( &mut self, reader: impl BufRead ) -> Result<(), PlaylistError> {
        self.clear();

        for line in reader.lines() {
            let line = line?;
            let line = line.strip_suffix( '\r' ).unwrap_or( &line );
            if line.trim().is_empty() {
                continue;
            }
            self.add( PathBuf::from( line ) );
        }

        Ok(())
    }


    /// Writes the paths in insertion order, one per line.
    ///
    /// Shuffle state is never written.
    pub fn save_to( &self, mut writer: impl Write ) -> Result<(), PlaylistError> {
        for entry in &self.entries {
            writeln!( writer, "{}", entry.path.to_string_lossy() )?;
        }
        writer.flush()?;
        Ok(())
    }


    /// Loads the playlist from a file, replacing the current contents.
    pub fn load( &mut self, path: &Path ) -> Result<(), PlaylistError> {
        let file = File::open( path )?;
        self.load_from( BufReader::new( file ) )?;
        tracing::info!( "Loaded {} tracks from {:?}", self.entries.len(), path );
        Ok(())
    }


    /// Saves the playlist to a file, creating parent directories.
    pub fn save( &self, path: &Path ) -> Result<(), PlaylistError> {
        if let Some( parent ) = path.parent() {
            fs::create_dir_all( parent )?;
        }
        self.save_to( BufWriter::new( File::create( path )? ) )
    }


    /// Gets the default playlist directory.
    /// Uses Music/Quaver on Windows, or ~/.local/share/quaver/playlists elsewhere.
    pub fn playlist_dir() -> Option<PathBuf> {
        #[cfg( target_os = "windows" )]
        {
            dirs::audio_dir().map( |d| d.join( "Quaver" ) )
        }
        #[cfg( not( target_os = "windows" ) )]
        {
            dirs::data_local_dir().map( |d| d.join( "quaver" ).join( "playlists" ) )
        }
    }


    /// File the running playlist is persisted to between sessions.
    pub fn default_file() -> Option<PathBuf> {
        Self::playlist_dir().map( |d| d.join( "playlist.txt" ) )
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use proptest::prelude::*;


    fn playlist_of( paths: &[&str] ) -> Playlist {
        let mut playlist = Playlist::with_seed( 7 );
        for p in paths {
            playlist.add( *p );
        }
        playlist
    }


    fn paths( playlist: &Playlist ) -> Vec<&str> {
        playlist.entries().iter().map( |e| e.path().to_str().unwrap() ).collect()
    }


    #[test]
    fn test_first_entry_takes_slot_zero() {
        let playlist = playlist_of( &[ "a" ] );
        assert_eq!( playlist.entries()[ 0 ].shuffle_slot(), 0 );
    }


    #[test]
    fn test_append_keeps_insertion_order() {
        let playlist = playlist_of( &[ "a", "b", "c" ] );
        assert_eq!( playlist.len(), 3 );
        assert_eq!( paths( &playlist ), vec![ "a", "b", "c" ] );

        let mut out = Vec::new();
        playlist.save_to( &mut out ).unwrap();
        assert_eq!( String::from_utf8( out ).unwrap(), "a\nb\nc\n" );
    }


    #[test]
    fn test_save_ignores_shuffle() {
        let mut playlist = playlist_of( &[ "a", "b", "c", "d" ] );
        playlist.set_shuffle( true );

        let mut out = Vec::new();
        playlist.save_to( &mut out ).unwrap();
        assert_eq!( String::from_utf8( out ).unwrap(), "a\nb\nc\nd\n" );
    }


    #[test]
    fn test_repeat_wraparound() {
        let mut playlist = playlist_of( &[ "a", "b", "c" ] );
        assert!( playlist.set( 2 ) );

        playlist.set_repeat( false );
        assert!( !playlist.next() );
        assert_eq!( playlist.cursor(), Some( 2 ) );

        playlist.set_repeat( true );
        assert!( playlist.next() );
        assert_eq!( playlist.cursor(), Some( 0 ) );
    }


    #[test]
    fn test_prev_wraparound() {
        let mut playlist = playlist_of( &[ "a", "b", "c" ] );
        assert!( !playlist.prev() );
        assert_eq!( playlist.cursor(), Some( 0 ) );

        playlist.set_repeat( true );
        assert!( playlist.prev() );
        assert_eq!( playlist.cursor(), Some( 2 ) );
        assert!( playlist.prev() );
        assert_eq!( playlist.current_path(), Some( Path::new( "b" ) ) );
    }


    #[test]
    fn test_empty_playlist() {
        let mut playlist = Playlist::with_seed( 1 );
        assert!( !playlist.next() );
        assert!( !playlist.prev() );
        assert!( !playlist.set( 0 ) );
        assert_eq!( playlist.current_path(), None );
        assert_eq!( playlist.cursor(), None );
        playlist.set_shuffle( true );
        assert_eq!( playlist.current_index(), None );
    }


    #[test]
    fn test_move_boundaries() {
        let mut playlist = playlist_of( &[ "a", "b", "c" ] );
        let before = playlist.entries().to_vec();

        assert!( !playlist.move_up( 0 ) );
        assert!( !playlist.move_down( 2 ) );
        assert!( !playlist.move_up( 3 ) );
        assert!( !playlist.move_down( 7 ) );
        assert_eq!( playlist.entries(), before.as_slice() );
    }


    #[test]
    fn test_move_swaps_paths_not_slots() {
        let mut playlist = playlist_of( &[ "a", "b", "c" ] );
        let slots: Vec<_> = playlist.entries().iter().map( PlaylistEntry::shuffle_slot ).collect();

        assert!( playlist.move_up( 1 ) );
        assert_eq!( paths( &playlist ), vec![ "b", "a", "c" ] );
        assert!( playlist.move_down( 1 ) );
        assert_eq!( paths( &playlist ), vec![ "b", "c", "a" ] );

        let after: Vec<_> = playlist.entries().iter().map( PlaylistEntry::shuffle_slot ).collect();
        assert_eq!( slots, after );
    }


    #[test]
    fn test_set_in_shuffle_mode_selects_row() {
        let mut playlist = playlist_of( &[ "a", "b", "c", "d", "e" ] );
        playlist.set_shuffle( true );

        for row in 0..5 {
            assert!( playlist.set( row ) );
            assert_eq!( playlist.current_index(), Some( row ) );
            assert_eq!( playlist.current_path(), Some( playlist.entries()[ row ].path() ) );
        }
        assert!( !playlist.set( 5 ) );
    }


    #[test]
    fn test_shuffle_traversal_visits_every_track() {
        let mut playlist = playlist_of( &[ "a", "b", "c", "d", "e", "f" ] );
        playlist.set_shuffle( true );
        playlist.set( 0 );
        while playlist.prev() {}

        let mut seen = vec![ playlist.current_path().unwrap().to_path_buf() ];
        while playlist.next() {
            seen.push( playlist.current_path().unwrap().to_path_buf() );
        }

        let order: Vec<PathBuf> = playlist.shuffle_order().iter().map( |p| p.to_path_buf() ).collect();
        assert_eq!( seen, order );
        seen.sort();
        assert_eq!( seen.len(), 6 );
        seen.dedup();
        assert_eq!( seen.len(), 6 );
    }


    #[test]
    fn test_shuffle_toggle_keeps_current_track() {
        for seed in 0..32 {
            let mut playlist = Playlist::with_seed( seed );
            for p in [ "a", "b", "c", "d", "e", "f", "g" ] {
                playlist.add( p );
            }

            for pos in 0..7 {
                playlist.set_shuffle( false );
                playlist.set( pos );
                let before = playlist.current_path().unwrap().to_path_buf();

                playlist.set_shuffle( true );
                assert_eq!( playlist.current_path(), Some( before.as_path() ) );
                playlist.set_shuffle( false );
                assert_eq!( playlist.current_path(), Some( before.as_path() ) );
            }
        }
    }


    #[test]
    fn test_remove_keeps_permutation() {
        let mut playlist = playlist_of( &[ "a", "b", "c", "d", "e" ] );
        playlist.remove( 1, 2 );
        assert_eq!( paths( &playlist ), vec![ "a", "d", "e" ] );
        assert!( playlist.is_consistent() );

        playlist.remove( 0, 100 );
        assert!( playlist.is_empty() );
        assert_eq!( playlist.cursor(), None );
    }


    #[test]
    fn test_remove_out_of_range_is_noop() {
        let mut playlist = playlist_of( &[ "a", "b" ] );
        playlist.remove( 2, 1 );
        playlist.remove( 0, 0 );
        assert_eq!( paths( &playlist ), vec![ "a", "b" ] );
    }


    #[test]
    fn test_remove_adjusts_cursor() {
        let mut playlist = playlist_of( &[ "a", "b", "c", "d", "e" ] );
        playlist.set( 4 );
        playlist.remove( 0, 2 );
        assert_eq!( playlist.current_path(), Some( Path::new( "e" ) ) );

        playlist.set( 1 );
        playlist.remove( 1, 1 );
        assert_eq!( playlist.cursor(), Some( 1 ) );
        assert_eq!( playlist.current_path(), Some( Path::new( "e" ) ) );

        playlist.remove( 1, 1 );
        assert_eq!( playlist.cursor(), Some( 0 ) );
        assert_eq!( playlist.current_path(), Some( Path::new( "c" ) ) );
    }


    #[test]
    fn test_load_skips_blank_lines() {
        let mut playlist = playlist_of( &[ "old" ] );
        playlist.load_from( "/m/a.mp3\n\n/m/b.mp3\r\n/m/c.mp3".as_bytes() ).unwrap();
        assert_eq!( paths( &playlist ), vec![ "/m/a.mp3", "/m/b.mp3", "/m/c.mp3" ] );
        assert_eq!( playlist.cursor(), Some( 0 ) );
        assert!( playlist.is_consistent() );
    }


    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join( "lists" ).join( "playlist.txt" );

        let playlist = playlist_of( &[ "/m/a.mp3", "/m/b b.flac" ] );
        playlist.save( &file ).unwrap();

        let mut loaded = Playlist::with_seed( 3 );
        loaded.load( &file ).unwrap();
        assert_eq!( paths( &loaded ), vec![ "/m/a.mp3", "/m/b b.flac" ] );
    }


    #[test]
    fn test_add_path_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write( dir.path().join( "2.mp3" ), b"" ).unwrap();
        fs::write( dir.path().join( "1.flac" ), b"" ).unwrap();
        fs::write( dir.path().join( "cover.png" ), b"" ).unwrap();

        let mut playlist = Playlist::with_seed( 5 );
        assert_eq!( playlist.add_path( dir.path() ).unwrap(), 2 );
        assert_eq!( playlist.entries()[ 0 ].path(), dir.path().join( "1.flac" ) );
        assert_eq!( playlist.entries()[ 1 ].path(), dir.path().join( "2.mp3" ) );
        assert!( playlist.is_consistent() );
    }


    #[derive( Debug, Clone )]
    enum Op {
        Add,
        Remove( usize, usize ),
    }


    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => Just( Op::Add ),
            1 => ( 0usize..24, 0usize..6 ).prop_map( |( off, n )| Op::Remove( off, n ) ),
        ]
    }


    proptest! {
        #[test]
        fn prop_slots_stay_a_permutation( seed in any::<u64>(), ops in proptest::collection::vec( op(), 0..120 ) ) {
            let mut playlist = Playlist::with_seed( seed );
            let mut counter = 0;

            for op in ops {
                match op {
                    Op::Add => {
                        playlist.add( format!( "track-{counter}" ) );
                        counter += 1;
                    }
                    Op::Remove( off, n ) => playlist.remove( off, n ),
                }

                let mut slots: Vec<usize> = playlist.entries().iter().map( PlaylistEntry::shuffle_slot ).collect();
                slots.sort_unstable();
                prop_assert_eq!( slots, ( 0..playlist.len() ).collect::<Vec<_>>() );
                if let Some( cursor ) = playlist.cursor() {
                    prop_assert!( cursor < playlist.len() );
                }
            }
        }


        #[test]
        fn prop_shuffle_toggle_is_stable( seed in any::<u64>(), len in 1usize..30, pos in 0usize..30, start_shuffled in any::<bool>() ) {
            let mut playlist = Playlist::with_seed( seed );
            for i in 0..len {
                playlist.add( format!( "t{i}" ) );
            }
            playlist.set_shuffle( start_shuffled );
            playlist.set( pos % len );

            let before = playlist.current_path().map( Path::to_path_buf );
            playlist.set_shuffle( !start_shuffled );
            playlist.set_shuffle( start_shuffled );
            prop_assert_eq!( playlist.current_path().map( Path::to_path_buf ), before );
        }
    }
}

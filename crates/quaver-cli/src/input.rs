//! Command line editing for the TUI.
//!
//! Holds the slash-command being typed and a short history of the
//! commands that were run.


/// Maximum number of remembered commands.
const HISTORY_LEN: usize = 50;


/// Current input mode of the application.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum InputMode {
    /// Normal mode - keyboard shortcuts active.
    #[default]
    Normal,

    /// Command mode - typing a slash command.
    Command,
}


/// Input buffer for command entry.
#[derive( Debug, Default )]
pub struct InputBuffer {
    content: String,
    cursor: usize,
    history: Vec<String>,
    /// Position while browsing history, `None` when editing fresh input.
    recall: Option<usize>,
}


impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }


    /// Inserts a character at the cursor position.
    pub fn insert( &mut self, c: char ) {
        self.content.insert( self.cursor, c );
        self.cursor += c.len_utf8();
    }


    /// Deletes the character before the cursor.
    pub fn backspace( &mut self ) {
        if let Some( prev ) = self.prev_boundary() {
            self.content.remove( prev );
            self.cursor = prev;
        }
    }


    /// Deletes the character at the cursor position.
    pub fn delete( &mut self ) {
        if self.cursor < self.content.len() {
            self.content.remove( self.cursor );
        }
    }


    /// Clears the buffer and leaves history browsing.
    pub fn clear( &mut self ) {
        self.content.clear();
        self.cursor = 0;
        self.recall = None;
    }


    /// Takes the typed command out of the buffer and remembers it.
    pub fn submit( &mut self ) -> String {
        let line = std::mem::take( &mut self.content );
        self.clear();

        let trimmed = line.trim();
        if !trimmed.is_empty() && self.history.last().map( String::as_str ) != Some( trimmed ) {
            if self.history.len() == HISTORY_LEN {
                self.history.remove( 0 );
            }
            self.history.push( trimmed.to_string() );
        }
        line
    }


    /// Replaces the content with the previous history entry.
    pub fn recall_older( &mut self ) {
        let idx = match self.recall {
            Some( 0 ) => return,
            Some( i ) => i - 1,
            None if self.history.is_empty() => return,
            None => self.history.len() - 1,
        };
        self.show_history( idx );
    }


    /// Replaces the content with the next history entry, or clears it
    /// when stepping past the newest one.
    pub fn recall_newer( &mut self ) {
        match self.recall {
            Some( i ) if i + 1 < self.history.len() => self.show_history( i + 1 ),
            Some( _ ) => self.clear(),
            None => {}
        }
    }


    fn show_history( &mut self, idx: usize ) {
        self.content = self.history[ idx ].clone();
        self.cursor = self.content.len();
        self.recall = Some( idx );
    }


    pub fn content( &self ) -> &str {
        &self.content
    }


    /// Gets the cursor position as character count (for display).
    pub fn cursor_char_pos( &self ) -> usize {
        self.content[ ..self.cursor ].chars().count()
    }


    fn prev_boundary( &self ) -> Option<usize> {
        self.content[ ..self.cursor ].char_indices().last().map( |( i, _ )| i )
    }


    /// Moves cursor left by one character.
    pub fn move_left( &mut self ) {
        if let Some( prev ) = self.prev_boundary() {
            self.cursor = prev;
        }
    }


    /// Moves cursor right by one character.
    pub fn move_right( &mut self ) {
        if let Some( c ) = self.content[ self.cursor.. ].chars().next() {
            self.cursor += c.len_utf8();
        }
    }


    pub fn move_home( &mut self ) {
        self.cursor = 0;
    }


    pub fn move_end( &mut self ) {
        self.cursor = self.content.len();
    }


    pub fn is_empty( &self ) -> bool {
        self.content.is_empty()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn typed( s: &str ) -> InputBuffer {
        let mut buf = InputBuffer::new();
        s.chars().for_each( |c| buf.insert( c ) );
        buf
    }


    #[test]
    fn test_editing_multibyte() {
        let mut buf = typed( "vol 1é" );
        assert_eq!( buf.cursor_char_pos(), 6 );
        buf.backspace();
        assert_eq!( buf.content(), "vol 1" );

        buf.move_home();
        buf.delete();
        buf.move_right();
        buf.insert( 'X' );
        assert_eq!( buf.content(), "oXl 1" );
    }


    #[test]
    fn test_history_recall() {
        let mut buf = typed( "next" );
        assert_eq!( buf.submit(), "next" );
        "vol 80".chars().for_each( |c| buf.insert( c ) );
        buf.submit();
        assert!( buf.is_empty() );

        buf.recall_older();
        assert_eq!( buf.content(), "vol 80" );
        buf.recall_older();
        assert_eq!( buf.content(), "next" );
        buf.recall_older();
        assert_eq!( buf.content(), "next" );

        buf.recall_newer();
        assert_eq!( buf.content(), "vol 80" );
        buf.recall_newer();
        assert!( buf.is_empty() );
    }


    #[test]
    fn test_history_skips_blank_and_repeats() {
        let mut buf = typed( "  " );
        buf.submit();
        for _ in 0..2 {
            "play".chars().for_each( |c| buf.insert( c ) );
            buf.submit();
        }
        buf.recall_older();
        buf.recall_older();
        assert_eq!( buf.content(), "play" );
    }
}

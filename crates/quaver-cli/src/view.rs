//! View mode management for the TUI.


/// Main content view of the application.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum ViewMode {
    /// Playlist (default)
    #[default]
    Playlist,

    /// Details of the current track and backend
    TrackInfo,

    /// Command reference
    Help,
}


impl ViewMode {
    /// Returns the next view in tab order.
    pub fn next_tab( self ) -> Self {
        match self {
            ViewMode::Playlist => ViewMode::TrackInfo,
            ViewMode::TrackInfo => ViewMode::Help,
            ViewMode::Help => ViewMode::Playlist,
        }
    }


    /// Returns the header label of the view.
    pub fn label( self ) -> &'static str {
        match self {
            ViewMode::Playlist => "PLAYLIST",
            ViewMode::TrackInfo => "TRACK INFO",
            ViewMode::Help => "HELP",
        }
    }


    /// Returns the key hints shown in the status bar.
    pub fn hint( self ) -> &'static str {
        match self {
            ViewMode::Playlist => " [/]Cmd [Tab]Views [Space]Play [n/p]Skip [s]Shuffle [r]Repeat [?]Help [q]Quit ",
            ViewMode::TrackInfo => " [Tab]Views [Space]Play [n/p]Skip [Esc]Close ",
            ViewMode::Help => " [Up/Down]Scroll [Esc]Close ",
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_tab_cycle_returns_home() {
        let mut view = ViewMode::default();
        for _ in 0..3 {
            view = view.next_tab();
        }
        assert_eq!( view, ViewMode::Playlist );
        assert_eq!( ViewMode::TrackInfo.label(), "TRACK INFO" );
    }
}

//! Notifications flowing from a decoder backend to the host
//!
//! Backends never talk to the UI directly. They report track info,
//! duration, position and cover art through a [`CallbackSink`] that the
//! host hands over when the backend is constructed.

use std::sync::mpsc::{ self, Receiver, Sender };


/// Receiver of decoder notifications, implemented by the host.
pub trait CallbackSink {
    /// Track info of a freshly loaded track. Any field may be missing.
    fn on_track_info( &mut self, artist: Option<&str>, album: Option<&str>, title: Option<&str> );

    /// Track duration in milliseconds.
    ///
    /// Zero means either "not known yet" right after a load, or
    /// "the track has finished" when sent during playback.
    fn on_duration( &mut self, duration_ms: u64 );

    /// Offset from the start of the track in milliseconds.
    fn on_position( &mut self, position_ms: u64 );

    /// Raw, still encoded, image embedded in the track.
    fn on_art( &mut self, data: &[u8] );
}


/// A single decoder notification, as delivered by [`ChannelCallbacks`].
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum PlayerEvent {
    TrackInfo {
        artist: Option<String>,
        album: Option<String>,
        title: Option<String>,
    },
    Duration( u64 ),
    Position( u64 ),
    Art( Vec<u8> ),
}


/// Callback sink that forwards every notification over an mpsc channel.
///
/// The host keeps the [`Receiver`] and drains it from its event loop.
#[derive( Debug, Clone )]
pub struct ChannelCallbacks {
    tx: Sender<PlayerEvent>,
}


impl ChannelCallbacks {
    fn send( &self, event: PlayerEvent ) {
        if self.tx.send( event ).is_err() {
            tracing::trace!( "Player event dropped, receiver is gone" );
        }
    }
}


impl CallbackSink for ChannelCallbacks {
    fn on_track_info( &mut self, artist: Option<&str>, album: Option<&str>, title: Option<&str> ) {
        self.send( PlayerEvent::TrackInfo {
            artist: artist.map( str::to_owned ),
            album: album.map( str::to_owned ),
            title: title.map( str::to_owned ),
        });
    }


    fn on_duration( &mut self, duration_ms: u64 ) {
        self.send( PlayerEvent::Duration( duration_ms ) );
    }


    fn on_position( &mut self, position_ms: u64 ) {
        self.send( PlayerEvent::Position( position_ms ) );
    }


    fn on_art( &mut self, data: &[u8] ) {
        self.send( PlayerEvent::Art( data.to_vec() ) );
    }
}


/// Creates a channel-backed callback sink and the matching event receiver.
pub fn channel() -> ( ChannelCallbacks, Receiver<PlayerEvent> ) {
    let ( tx, rx ) = mpsc::channel();
    ( ChannelCallbacks { tx }, rx )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_events_arrive_in_order() {
        let ( mut cbs, rx ) = channel();

        cbs.on_duration( 1500 );
        cbs.on_track_info( Some( "Artist" ), None, Some( "Title" ) );
        cbs.on_art( &[ 0x89, 0x50 ] );
        cbs.on_position( 20 );

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!( events, vec![
            PlayerEvent::Duration( 1500 ),
            PlayerEvent::TrackInfo {
                artist: Some( "Artist".into() ),
                album: None,
                title: Some( "Title".into() ),
            },
            PlayerEvent::Art( vec![ 0x89, 0x50 ] ),
            PlayerEvent::Position( 20 ),
        ]);
    }


    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let ( mut cbs, rx ) = channel();
        drop( rx );
        cbs.on_position( 10 );
    }
}

//! Adaptive tick interval
//!
//! Decides how soon a pulling backend wants its next tick, using the
//! output sink's free buffer space as the only feedback signal.
//!
//! When headroom drops below the low-water mark the interval is doubled
//! and nothing is pulled that cycle, letting the device drain before we
//! poll again. When headroom rises above the high-water mark the
//! interval is halved. The interval always stays within
//! `[MIN_INTERVAL_MS, MAX_INTERVAL_MS]`.


/// Headroom (in samples) below which a cycle backs off.
pub const LOW_WATER: usize = 1024;

/// Headroom (in samples) above which the interval shrinks.
pub const HIGH_WATER: usize = 8196;

pub const MIN_INTERVAL_MS: u64 = 1;
pub const MAX_INTERVAL_MS: u64 = 100;


/// What a backend should do this cycle.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum TickPlan {
    /// Headroom too low, skip pulling and retry after `interval_ms`.
    Backoff,
    /// Decode up to the sampled headroom and write it out.
    Pull,
}


/// Per-backend scheduling state.
#[derive( Debug, Clone )]
pub struct PlaybackScheduler {
    interval_ms: u64,
    playing: bool,
    low_water: usize,
    high_water: usize,
}


impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self::new()
    }
}


impl PlaybackScheduler {
    /// Creates a scheduler with the default water marks, starting at
    /// the shortest interval.
    pub fn new() -> Self {
        Self::with_water_marks( LOW_WATER, HIGH_WATER )
    }


    pub fn with_water_marks( low_water: usize, high_water: usize ) -> Self {
        Self {
            interval_ms: MIN_INTERVAL_MS,
            playing: false,
            low_water,
            high_water,
        }
    }


    /// Runs one controller step on a headroom sample.
    ///
    /// After this returns, [`interval_ms`](Self::interval_ms) is the
    /// delay the host should wait before the next tick.
    pub fn plan( &mut self, headroom: usize ) -> TickPlan {
        if headroom < self.low_water {
            self.interval_ms = ( self.interval_ms * 2 ).min( MAX_INTERVAL_MS );
            tracing::debug!( "Autotune tick to {}ms (headroom={})", self.interval_ms, headroom );
            return TickPlan::Backoff;
        }

        if headroom > self.high_water {
            let halved = ( self.interval_ms / 2 ).max( MIN_INTERVAL_MS );
            if halved != self.interval_ms {
                self.interval_ms = halved;
                tracing::debug!( "Autotune tick to {}ms (headroom={})", self.interval_ms, headroom );
            }
        }

        TickPlan::Pull
    }


    /// Current re-arm delay in milliseconds.
    pub fn interval_ms( &self ) -> u64 {
        self.interval_ms
    }


    pub fn is_playing( &self ) -> bool {
        self.playing
    }


    pub fn set_playing( &mut self, playing: bool ) {
        self.playing = playing;
    }


    /// Forgets the tuned interval, e.g. when a new track is loaded.
    pub fn reset( &mut self ) {
        self.interval_ms = MIN_INTERVAL_MS;
        self.playing = false;
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use proptest::prelude::*;


    #[test]
    fn test_low_headroom_backs_off_by_doubling() {
        let mut sched = PlaybackScheduler::new();
        assert_eq!( sched.interval_ms(), 1 );

        assert_eq!( sched.plan( 500 ), TickPlan::Backoff );
        // Interval going into the second cycle
        assert_eq!( sched.interval_ms(), 2 );

        assert_eq!( sched.plan( 500 ), TickPlan::Backoff );
        assert_eq!( sched.interval_ms(), 4 );
    }


    #[test]
    fn test_backoff_saturates_at_max() {
        let mut sched = PlaybackScheduler::new();
        for _ in 0..20 {
            sched.plan( 0 );
        }
        assert_eq!( sched.interval_ms(), MAX_INTERVAL_MS );
    }


    #[test]
    fn test_high_headroom_halves_and_pulls() {
        let mut sched = PlaybackScheduler::new();
        for _ in 0..7 {
            sched.plan( 10 );
        }
        assert_eq!( sched.interval_ms(), 100 );

        assert_eq!( sched.plan( 10_000 ), TickPlan::Pull );
        assert_eq!( sched.interval_ms(), 50 );
        sched.plan( 10_000 );
        assert_eq!( sched.interval_ms(), 25 );
    }


    #[test]
    fn test_mid_headroom_keeps_interval() {
        let mut sched = PlaybackScheduler::new();
        sched.plan( 0 );
        sched.plan( 0 );
        assert_eq!( sched.interval_ms(), 4 );

        assert_eq!( sched.plan( LOW_WATER ), TickPlan::Pull );
        assert_eq!( sched.plan( HIGH_WATER ), TickPlan::Pull );
        assert_eq!( sched.interval_ms(), 4 );
    }


    #[test]
    fn test_halving_never_goes_below_min() {
        let mut sched = PlaybackScheduler::new();
        sched.plan( 100_000 );
        assert_eq!( sched.interval_ms(), MIN_INTERVAL_MS );
    }


    #[test]
    fn test_reset() {
        let mut sched = PlaybackScheduler::new();
        sched.set_playing( true );
        sched.plan( 0 );
        sched.reset();
        assert_eq!( sched.interval_ms(), MIN_INTERVAL_MS );
        assert!( !sched.is_playing() );
    }


    proptest! {
        #[test]
        fn prop_interval_stays_in_bounds( samples in proptest::collection::vec( 0usize..20_000, 0..200 ) ) {
            let mut sched = PlaybackScheduler::new();
            for headroom in samples {
                sched.plan( headroom );
                prop_assert!( ( MIN_INTERVAL_MS..=MAX_INTERVAL_MS ).contains( &sched.interval_ms() ) );
            }
        }
    }
}

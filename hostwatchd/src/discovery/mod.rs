//! Discovery backends feeding the aggregator.
//!
//! A backend runs on its own tasks and pushes the full set of currently
//! resolved services over a channel on every change. The aggregator only
//! drives its lifecycle through [`Discovery`].

pub mod advertise;
pub mod browser;
pub mod fixture;

use shared::types::RawService;

pub use browser::MdnsDiscovery;
pub use fixture::FixtureDiscovery;

/// Complete set of resolved services at one moment
pub type DiscoveryBatch = Vec<RawService>;

pub trait Discovery: Send {
    /// Begin or resume discovery.
    fn start(&mut self);

    /// Pause discovery. Results still in flight are dropped.
    fn stop(&mut self);

    /// Forget everything resolved so far.
    fn reset(&mut self);
}

impl<D: Discovery + ?Sized> Discovery for Box<D> {
    fn start(&mut self) {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

//! Process-lifetime hooks around a codec session.
//!
//! The engine calls [`SystemHooks::setup`] once at the start of
//! `initialize` (before the first bus transfer) and
//! [`SystemHooks::teardown`] once at the end of `terminate` (after the last
//! one). Boards use these to gate the codec's supply, reference clock and
//! reset line.

/// Board-level setup/teardown around a codec session.
pub trait SystemHooks {
    /// Bring up whatever the codec needs before it can be addressed.
    fn setup(&mut self);

    /// Release what [`setup`](Self::setup) acquired.
    fn teardown(&mut self);
}

/// Hooks for boards where the codec is always powered and clocked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoHooks;

impl SystemHooks for NoHooks {
    fn setup(&mut self) {}

    fn teardown(&mut self) {}
}

impl<T: SystemHooks + ?Sized> SystemHooks for &mut T {
    fn setup(&mut self) {
        (**self).setup();
    }

    fn teardown(&mut self) {
        (**self).teardown();
    }
}

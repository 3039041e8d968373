//! Render-loop scheduling: a next-frame coalescer plus the clock and tween
//! helpers that animations hang off it.

mod clock;
mod tween;

pub use clock::Clock;
pub use tween::{Easing, Tween};

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

/// The platform's "run before next repaint" primitive.
pub trait RefreshHost {
    /// Asks for one [`FrameScheduler::tick`] on the next display refresh.
    fn request_callback(&mut self);
}

/// Host for tests and loops that drive ticks themselves. Clones share the
/// request counter.
#[derive(Debug, Clone, Default)]
pub struct ManualHost {
    requests: Rc<Cell<usize>>,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh callbacks requested so far.
    pub fn requests(&self) -> usize {
        self.requests.get()
    }
}

impl RefreshHost for ManualHost {
    fn request_callback(&mut self) {
        self.requests.set(self.requests.get() + 1);
    }
}

type CallbackFn = dyn Fn(&mut Frame<'_>);

/// A registered render callback. Identity is the allocation, so clones of one
/// callback collapse into a single registration.
#[derive(Clone)]
pub struct FrameCallback(Rc<CallbackFn>);

impl FrameCallback {
    pub fn new(callback: impl Fn(&mut Frame<'_>) + 'static) -> Self {
        Self(Rc::new(callback))
    }

    pub fn same_as(&self, other: &FrameCallback) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.0) as *const (),
            Rc::as_ptr(&other.0) as *const (),
        )
    }
}

impl fmt::Debug for FrameCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FrameCallback")
            .field(&(Rc::as_ptr(&self.0) as *const ()))
            .finish()
    }
}

/// What a callback sees while it runs.
pub struct Frame<'a> {
    scheduler: &'a mut FrameScheduler,
    current: &'a FrameCallback,
    now: Instant,
}

impl Frame<'_> {
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Re-registers the running callback for the next tick.
    pub fn request_again(&mut self) {
        self.scheduler.request_frame(self.current);
    }

    pub fn request_frame(&mut self, callback: &FrameCallback) {
        self.scheduler.request_frame(callback);
    }

    pub fn scheduler(&mut self) -> &mut FrameScheduler {
        self.scheduler
    }
}

/// Collects render requests and runs each distinct callback at most once per
/// display refresh.
pub struct FrameScheduler {
    host: Box<dyn RefreshHost>,
    pending: Vec<FrameCallback>,
    scheduled: bool,
}

impl fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("pending", &self.pending.len())
            .field("scheduled", &self.scheduled)
            .finish()
    }
}

impl FrameScheduler {
    pub fn new(host: impl RefreshHost + 'static) -> Self {
        Self {
            host: Box::new(host),
            pending: Vec::new(),
            scheduled: false,
        }
    }

    /// Queues `callback` unless it is already queued, and makes sure exactly
    /// one refresh request is outstanding.
    pub fn request_frame(&mut self, callback: &FrameCallback) {
        if !self.pending.iter().any(|queued| queued.same_as(callback)) {
            self.pending.push(callback.clone());
        }
        if !self.scheduled {
            self.scheduled = true;
            self.host.request_callback();
        }
    }

    /// Runs one display refresh. The queue is snapshotted and cleared before
    /// any callback runs, so requests made from inside a callback land on the
    /// next tick. Returns the number of callbacks invoked.
    pub fn tick(&mut self, now: Instant) -> usize {
        if !self.scheduled {
            return 0;
        }
        let calls = std::mem::take(&mut self.pending);
        self.scheduled = false;
        for callback in &calls {
            let mut frame = Frame {
                scheduler: self,
                current: callback,
                now,
            };
            (callback.0)(&mut frame);
        }
        tracing::trace!(callbacks = calls.len(), "frame tick");
        calls.len()
    }

    /// Drops every pending registration without running it.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.scheduled = false;
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn counter() -> (Rc<Cell<usize>>, FrameCallback) {
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        let callback = FrameCallback::new(move |_| seen.set(seen.get() + 1));
        (count, callback)
    }

    #[test]
    fn duplicate_registrations_run_once() {
        let host = ManualHost::new();
        let mut scheduler = FrameScheduler::new(host.clone());
        let (count, callback) = counter();
        scheduler.request_frame(&callback);
        scheduler.request_frame(&callback.clone());
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(host.requests(), 1);

        assert_eq!(scheduler.tick(Instant::now()), 1);
        assert_eq!(count.get(), 1);
        assert!(!scheduler.is_scheduled());
    }

    #[test]
    fn idle_scheduler_requests_nothing() {
        let host = ManualHost::new();
        let mut scheduler = FrameScheduler::new(host.clone());
        assert_eq!(scheduler.tick(Instant::now()), 0);
        assert_eq!(host.requests(), 0);
    }

    #[test]
    fn self_registration_lands_on_the_next_tick() {
        let host = ManualHost::new();
        let mut scheduler = FrameScheduler::new(host.clone());
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        let callback = FrameCallback::new(move |frame| {
            seen.set(seen.get() + 1);
            frame.request_again();
            frame.request_again();
        });
        scheduler.request_frame(&callback);

        let now = Instant::now();
        assert_eq!(scheduler.tick(now), 1);
        assert_eq!(count.get(), 1);
        assert!(scheduler.is_scheduled());
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(host.requests(), 2);
        assert_eq!(scheduler.tick(now), 1);
        assert_eq!(count.get(), 2);
        // One host request per tick that ends with work pending.
        assert_eq!(host.requests(), 3);
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let mut scheduler = FrameScheduler::new(ManualHost::new());
        let order = Rc::new(RefCell::new(Vec::new()));
        let callbacks: Vec<FrameCallback> = (0..3)
            .map(|index| {
                let order = Rc::clone(&order);
                FrameCallback::new(move |_| order.borrow_mut().push(index))
            })
            .collect();
        scheduler.request_frame(&callbacks[2]);
        scheduler.request_frame(&callbacks[0]);
        scheduler.request_frame(&callbacks[1]);
        scheduler.request_frame(&callbacks[2]);
        scheduler.tick(Instant::now());
        assert_eq!(*order.borrow(), vec![2, 0, 1]);
    }

    #[test]
    fn reset_drops_pending_work() {
        let host = ManualHost::new();
        let mut scheduler = FrameScheduler::new(host.clone());
        let (count, callback) = counter();
        scheduler.request_frame(&callback);
        scheduler.reset();
        assert_eq!(scheduler.tick(Instant::now()), 0);
        assert_eq!(count.get(), 0);

        scheduler.request_frame(&callback);
        assert_eq!(host.requests(), 2);
        assert_eq!(scheduler.tick(Instant::now()), 1);
    }

    #[test]
    fn callback_can_schedule_another() {
        let mut scheduler = FrameScheduler::new(ManualHost::new());
        let (count, follow_up) = counter();
        let first = FrameCallback::new(move |frame| frame.request_frame(&follow_up));
        scheduler.request_frame(&first);
        assert_eq!(scheduler.tick(Instant::now()), 1);
        assert_eq!(count.get(), 0);
        assert_eq!(scheduler.tick(Instant::now()), 1);
        assert_eq!(count.get(), 1);
    }
}

//! Small synchronisation helpers: copy-cells behind a critical section and
//! cancelable delayed work items.

use core::cell::Cell;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};

/// `Copy` state that is read and written without awaiting.
pub struct Shared<T: Copy>(BlockingMutex<CriticalSectionRawMutex, Cell<T>>);

impl<T: Copy> Shared<T> {
    pub const fn new(v: T) -> Self {
        Self(BlockingMutex::new(Cell::new(v)))
    }

    pub fn get(&self) -> T {
        self.0.lock(|c| c.get())
    }

    pub fn set(&self, v: T) {
        self.0.lock(|c| c.set(v))
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.0.lock(|c| {
            let mut v = c.get();
            let r = f(&mut v);
            c.set(v);
            r
        })
    }
}

/// Proof that a tick was released by the schedule identified by `generation`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ticket {
    generation: u32,
}

#[derive(Copy, Clone)]
struct Slot {
    generation: u32,
    deadline: Option<Instant>,
    running: bool,
}

/// A cancelable, restartable deferred work item.
///
/// Every `schedule`/`cancel` bumps the generation; a tick started under an
/// older generation is stale and must not reschedule or commit.
pub struct DelayedWork {
    slot: Shared<Slot>,
    wake: Signal<CriticalSectionRawMutex, ()>,
}

impl DelayedWork {
    pub const fn new() -> Self {
        Self {
            slot: Shared::new(Slot { generation: 0, deadline: None, running: false }),
            wake: Signal::new(),
        }
    }

    /// Cancel whatever is pending and run after `delay`.
    pub fn schedule(&self, delay: Duration) {
        self.slot.update(|s| {
            s.generation = s.generation.wrapping_add(1);
            s.deadline = Some(Instant::now() + delay);
        });
        self.wake.signal(());
    }

    /// Schedule only if nothing is pending; an armed deadline is kept.
    pub fn queue(&self, delay: Duration) {
        let armed = self.slot.update(|s| {
            if s.deadline.is_some() {
                return false;
            }
            s.generation = s.generation.wrapping_add(1);
            s.deadline = Some(Instant::now() + delay);
            true
        });
        if armed {
            self.wake.signal(());
        }
    }

    /// Drop any pending tick and invalidate a running one.
    pub fn cancel(&self) {
        self.slot.update(|s| {
            s.generation = s.generation.wrapping_add(1);
            s.deadline = None;
        });
        self.wake.signal(());
    }

    /// Re-arm from inside a tick. Returns false if the ticket went stale.
    pub fn reschedule(&self, ticket: Ticket, delay: Duration) -> bool {
        let ok = self.slot.update(|s| {
            if s.generation != ticket.generation {
                return false;
            }
            s.generation = s.generation.wrapping_add(1);
            s.deadline = Some(Instant::now() + delay);
            true
        });
        if ok {
            self.wake.signal(());
        }
        ok
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.slot.get().generation == ticket.generation
    }

    pub fn is_pending(&self) -> bool {
        self.slot.get().deadline.is_some()
    }

    /// Pending or currently executing.
    pub fn is_busy(&self) -> bool {
        let s = self.slot.get();
        s.deadline.is_some() || s.running
    }

    /// Mark the tick released with `_ticket` finished. Only one runner
    /// drives an item, so the running flag is cleared unconditionally.
    pub fn done(&self, _ticket: Ticket) {
        self.slot.update(|s| s.running = false);
    }

    /// Wait until the armed deadline passes, then hand out a ticket.
    pub async fn next(&self) -> Ticket {
        loop {
            let slot = self.slot.get();
            match slot.deadline {
                None => self.wake.wait().await,
                Some(deadline) => match select(Timer::at(deadline), self.wake.wait()).await {
                    Either::First(()) => {
                        let fired = self.slot.update(|s| {
                            if s.generation == slot.generation && s.deadline.is_some() {
                                s.deadline = None;
                                s.running = true;
                                true
                            } else {
                                false
                            }
                        });
                        if fired {
                            return Ticket { generation: slot.generation };
                        }
                    }
                    Either::Second(()) => {}
                },
            }
        }
    }
}

impl Default for DelayedWork {
    fn default() -> Self {
        Self::new()
    }
}

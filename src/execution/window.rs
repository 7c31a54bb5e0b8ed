use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Bounds the number of submitted-but-unsettled publishes.
///
/// Driven from the blocking streaming thread: a full window parks that thread on the runtime until
/// a completion task drops its permit.
pub(crate) struct InFlightWindow {
    permits: Arc<Semaphore>,
    size: u32,
    runtime: Handle,
}

impl InFlightWindow {
    pub(crate) fn new(size: usize, runtime: Handle) -> Self {
        let size = u32::try_from(size.max(1)).unwrap_or(u32::MAX);
        Self {
            permits: Arc::new(Semaphore::new(size as usize)),
            size,
            runtime,
        }
    }

    /// Take one slot, blocking while the window is full.
    ///
    /// Returns the slot and the time spent waiting for it (zero if one was free). Must not be
    /// called from an async context.
    pub(crate) fn acquire(&self) -> Result<(OwnedSemaphorePermit, Duration), AcquireError> {
        if let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() {
            return Ok((permit, Duration::ZERO));
        }
        let start = Instant::now();
        let permit = self
            .runtime
            .block_on(Arc::clone(&self.permits).acquire_owned())?;
        Ok((permit, start.elapsed()))
    }

    /// Block until every slot has been returned.
    pub(crate) fn wait_idle(&self) -> Result<(), AcquireError> {
        let all = self.runtime.block_on(self.permits.acquire_many(self.size))?;
        drop(all);
        Ok(())
    }

    #[cfg(test)]
    fn in_use(&self) -> usize {
        self.size as usize - self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::InFlightWindow;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn acquire_blocks_until_a_slot_is_returned() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let window = InFlightWindow::new(1, rt.handle().clone());
        let (first, waited) = window.acquire().unwrap();
        assert_eq!(waited, Duration::ZERO);
        assert_eq!(window.in_use(), 1);

        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            drop(first);
        });

        let (_second, waited) = window.acquire().unwrap();
        assert!(waited > Duration::ZERO);
        releaser.join().unwrap();
    }

    #[test]
    fn wait_idle_returns_after_all_slots_come_back() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let window = InFlightWindow::new(3, rt.handle().clone());
        let held: Vec<_> = (0..3).map(|_| window.acquire().unwrap().0).collect();
        assert_eq!(window.in_use(), 3);

        let releaser = thread::spawn(move || {
            for permit in held {
                thread::sleep(Duration::from_millis(5));
                drop(permit);
            }
        });

        window.wait_idle().unwrap();
        assert_eq!(window.in_use(), 0);
        releaser.join().unwrap();
    }

    #[test]
    fn zero_size_is_raised_to_one() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let window = InFlightWindow::new(0, rt.handle().clone());
        let (_only, _) = window.acquire().unwrap();
        assert_eq!(window.in_use(), 1);
    }
}

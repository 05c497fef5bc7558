use std::sync::atomic::{AtomicBool, Ordering};

/// Run-in-progress flag for a periodic task
#[derive(Debug, Default)]
pub struct SingleFlight {
    running: AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag, or `None` when a run is already in progress.
    /// The flag is released when the guard drops.
    pub fn try_enter(&self) -> Option<FlightGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { flag: &self.running })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

pub struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_entry_refused_until_guard_drops() {
        let flight = SingleFlight::new();

        let guard = flight.try_enter();
        assert!(guard.is_some());
        assert!(flight.try_enter().is_none());
        assert!(flight.is_running());

        drop(guard);
        assert!(!flight.is_running());
        assert!(flight.try_enter().is_some());
    }
}

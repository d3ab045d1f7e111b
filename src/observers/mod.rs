//! Observer pattern for optimization monitoring.
//!
//! Observers registered on a [`LeastSquaresSolver`](crate::optimizer::LeastSquaresSolver)
//! are notified with an [`IterationStats`] record after every accepted step,
//! independently of the `verbose` flag. They only observe: nothing an
//! observer does can change the course of the optimization.
//!
//! ```text
//! ┌──────────────────────┐
//! │  LeastSquaresSolver  │
//! │       (GN / LM)      │
//! └──────────┬───────────┘
//!            │ observers.notify(&stats)
//!            ├──────────────┐
//!            ▼              ▼
//!      ┌──────────┐  ┌──────────┐
//!      │ History  │  │  Custom  │
//!      │ Observer │  │ Observer │
//!      └──────────┘  └──────────┘
//! ```
//!
//! # Custom Observer
//!
//! ```
//! use apex_lsq::observers::OptObserver;
//! use apex_lsq::optimizer::IterationStats;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! #[derive(Default)]
//! struct StepCounter {
//!     steps: AtomicUsize,
//! }
//!
//! impl OptObserver for StepCounter {
//!     fn on_step(&self, _stats: &IterationStats) {
//!         self.steps.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//! ```

use crate::optimizer::IterationStats;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::error;

/// Observer-specific error types for apex-lsq
#[derive(Debug, Clone, Error)]
pub enum ObserverError {
    /// Mutex was poisoned (a thread panicked while holding the lock)
    #[error("Mutex poisoned in {context}: {reason}")]
    MutexPoisoned { context: String, reason: String },
}

impl ObserverError {
    /// Log the error with tracing::error and return self for chaining
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

/// Result type for observer operations
pub type ObserverResult<T> = Result<T, ObserverError>;

/// Observer trait for monitoring optimization progress.
///
/// Called after every accepted step. Implementations that need mutable state
/// use interior mutability (`Mutex`, atomics) since notification takes `&self`.
pub trait OptObserver: Send {
    /// Called once per accepted step.
    fn on_step(&self, stats: &IterationStats);
}

/// Collection of observers notified together.
#[derive(Default)]
pub struct OptObserverVec {
    observers: Vec<Box<dyn OptObserver>>,
}

impl OptObserverVec {
    /// Create a new empty observer collection.
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Add an observer to the collection.
    pub fn add(&mut self, observer: impl OptObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Notify all observers of an accepted step.
    #[inline]
    pub fn notify(&self, stats: &IterationStats) {
        for observer in &self.observers {
            observer.on_step(stats);
        }
    }

    /// Check if any observers are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Get the number of registered observers.
    #[inline]
    pub fn len(&self) -> usize {
        self.observers.len()
    }
}

/// Records every reported [`IterationStats`].
///
/// Clones share the same history, so one clone can be handed to the solver
/// while the caller keeps the other to read the history afterwards.
#[derive(Debug, Clone, Default)]
pub struct HistoryObserver {
    history: Arc<Mutex<Vec<IterationStats>>>,
}

impl HistoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded statistics.
    pub fn history(&self) -> ObserverResult<Vec<IterationStats>> {
        self.history.lock().map(|guard| guard.clone()).map_err(|e| {
            ObserverError::MutexPoisoned {
                context: "HistoryObserver::history".to_string(),
                reason: e.to_string(),
            }
            .log()
        })
    }
}

impl OptObserver for HistoryObserver {
    fn on_step(&self, stats: &IterationStats) {
        match self.history.lock() {
            Ok(mut guard) => guard.push(stats.clone()),
            Err(e) => {
                let _ = ObserverError::MutexPoisoned {
                    context: "HistoryObserver::on_step".to_string(),
                    reason: e.to_string(),
                }
                .log();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(iteration: usize, cost: f64) -> IterationStats {
        IterationStats {
            iteration,
            cost,
            cost_change: 0.0,
            gradient_norm: 0.0,
            step_norm: 0.0,
            damping: None,
            trials: 0,
            evaluation_time_ms: 0.0,
            total_time_ms: 0.0,
        }
    }

    #[test]
    fn test_empty_collection() {
        let observers = OptObserverVec::new();
        assert!(observers.is_empty());
        assert_eq!(observers.len(), 0);
        // no-op
        observers.notify(&stats(0, 1.0));
    }

    #[test]
    fn test_all_observers_notified() -> ObserverResult<()> {
        let first = HistoryObserver::new();
        let second = HistoryObserver::new();

        let mut observers = OptObserverVec::new();
        observers.add(first.clone());
        observers.add(second.clone());
        assert_eq!(observers.len(), 2);

        observers.notify(&stats(0, 4.0));
        observers.notify(&stats(1, 2.0));

        for observer in [&first, &second] {
            let history = observer.history()?;
            assert_eq!(history.len(), 2);
            assert_eq!(history[1].iteration, 1);
            assert_eq!(history[1].cost, 2.0);
        }
        Ok(())
    }
}

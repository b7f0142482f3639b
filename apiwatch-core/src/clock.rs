//! Calendar date sources.
//!
//! Quota windows and the proxy circuit both roll over when the local date
//! changes. Components take a [`DateSource`] so tests can move the date.

use chrono::{Local, NaiveDate};
use std::sync::{Arc, Mutex};

/// Returns "today" when called.
pub type DateSource = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// The local calendar date.
pub fn local_date_source() -> DateSource {
    Arc::new(|| Local::now().date_naive())
}

/// A date source that can be moved by hand.
#[derive(Debug, Clone)]
pub struct ManualDate {
    current: Arc<Mutex<NaiveDate>>,
}

impl ManualDate {
    /// Starts at `date`.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            current: Arc::new(Mutex::new(date)),
        }
    }

    /// Sets the current date.
    pub fn set(&self, date: NaiveDate) {
        let mut guard = self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = date;
    }

    /// Returns the current date.
    pub fn get(&self) -> NaiveDate {
        *self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Returns a [`DateSource`] reading this value.
    pub fn source(&self) -> DateSource {
        let this = self.clone();
        Arc::new(move || this.get())
    }
}

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use chrono::{Local, NaiveDate};

/// Per-day count of accepted focus requests.
pub trait DailyCounter: Send + Sync {
    fn increment(&self);
    fn today(&self) -> u32;
}

/// Counts keyed by local calendar date, so the count for "today" resets on its
/// own at midnight. Seeded once at startup from the record store.
#[derive(Debug, Default)]
pub struct InMemoryDailyCounter {
    by_day: Mutex<HashMap<NaiveDate, u32>>,
}

impl InMemoryDailyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(today_count: u32) -> Self {
        let counter = Self::new();
        counter.days().insert(today(), today_count);
        counter
    }

    pub fn increment_on(&self, day: NaiveDate) {
        *self.days().entry(day).or_insert(0) += 1;
    }

    pub fn count_on(&self, day: NaiveDate) -> u32 {
        self.days().get(&day).copied().unwrap_or(0)
    }

    fn days(&self) -> MutexGuard<'_, HashMap<NaiveDate, u32>> {
        self.by_day.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DailyCounter for InMemoryDailyCounter {
    fn increment(&self) {
        self.increment_on(today());
    }

    fn today(&self) -> u32 {
        self.count_on(today())
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_kept_per_day() {
        let counter = InMemoryDailyCounter::new();
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).expect("date");
        let tuesday = NaiveDate::from_ymd_opt(2026, 3, 3).expect("date");

        counter.increment_on(monday);
        counter.increment_on(monday);
        counter.increment_on(tuesday);

        assert_eq!(counter.count_on(monday), 2);
        assert_eq!(counter.count_on(tuesday), 1);
        assert_eq!(counter.count_on(NaiveDate::from_ymd_opt(2026, 3, 4).expect("date")), 0);
    }

    #[test]
    fn seed_applies_to_today() {
        let counter = InMemoryDailyCounter::seeded(5);
        assert_eq!(counter.today(), 5);
        counter.increment();
        assert_eq!(counter.today(), 6);
    }
}

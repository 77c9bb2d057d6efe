//! Rolling window of recent readings, the data behind the client's chart

use std::collections::VecDeque;

use chrono::{DateTime, Local};

use crate::websocket::SensorReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    One,
    Two,
    Three,
}

impl Sensor {
    pub const ALL: [Sensor; 3] = [Sensor::One, Sensor::Two, Sensor::Three];

    pub fn value(self, reading: &SensorReading) -> f64 {
        match self {
            Sensor::One => reading.sensor1,
            Sensor::Two => reading.sensor2,
            Sensor::Three => reading.sensor3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub received_at: DateTime<Local>,
    pub reading: SensorReading,
}

impl HistoryEntry {
    /// Local wall-clock label, e.g. "14:03:27"
    pub fn label(&self) -> String {
        self.received_at.format("%H:%M:%S").to_string()
    }
}

#[derive(Debug, Clone)]
pub struct ReadingHistory {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl ReadingHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a reading, dropping the oldest once the window is full
    pub fn push(&mut self, reading: SensorReading) {
        self.push_at(reading, Local::now());
    }

    pub fn push_at(&mut self, reading: SensorReading, received_at: DateTime<Local>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            received_at,
            reading,
        });
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(HistoryEntry::label).collect()
    }

    /// Values of one sensor, oldest first
    pub fn series(&self, sensor: Sensor) -> Vec<f64> {
        self.entries
            .iter()
            .map(|entry| sensor.value(&entry.reading))
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading(n: f64) -> SensorReading {
        SensorReading {
            message: None,
            sensor1: n,
            sensor2: n * 2.0,
            sensor3: n * 3.0,
        }
    }

    #[test]
    fn test_window_keeps_most_recent() {
        let mut history = ReadingHistory::new(20);
        for i in 0..25 {
            history.push(reading(i as f64));
        }

        assert_eq!(history.len(), 20);
        let series = history.series(Sensor::One);
        assert_eq!(series.first(), Some(&5.0));
        assert_eq!(series.last(), Some(&24.0));
        assert_eq!(history.series(Sensor::Three).last(), Some(&72.0));
    }

    #[test]
    fn test_zero_capacity_still_holds_latest() {
        let mut history = ReadingHistory::new(0);
        history.push(reading(1.0));
        history.push(reading(2.0));
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().map(|e| e.reading.sensor1), Some(2.0));
    }

    #[test]
    fn test_labels_are_local_time() {
        let mut history = ReadingHistory::new(3);
        let at = Local.with_ymd_and_hms(2024, 5, 1, 14, 3, 27).unwrap();
        history.push_at(reading(1.0), at);
        assert_eq!(history.labels(), vec!["14:03:27".to_string()]);
    }
}

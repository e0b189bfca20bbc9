use super::{Id, LogError, LogValue, StatsLogger};

/// Logger that records every logged value in memory.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemoryLogger {
    entries: Vec<(Id, LogValue)>,
}

impl MemoryLogger {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// All logged values in order.
    pub fn entries(&self) -> &[(Id, LogValue)] {
        &self.entries
    }

    /// Values logged under the identifier `id`.
    pub fn values<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a LogValue> + 'a {
        self.entries
            .iter()
            .filter(move |(entry_id, _)| entry_id.as_str() == id)
            .map(|(_, value)| value)
    }

    /// The most recent scalar logged under `id`.
    pub fn last_scalar(&self, id: &str) -> Option<f64> {
        self.values(id)
            .filter_map(|value| match value {
                LogValue::Scalar(x) => Some(*x),
                _ => None,
            })
            .last()
    }

    /// Sum of all counter increments logged under `id`.
    pub fn counter(&self, id: &str) -> u64 {
        self.values(id)
            .map(|value| match value {
                LogValue::CounterIncrement(i) => *i,
                _ => 0,
            })
            .sum()
    }
}

impl StatsLogger for MemoryLogger {
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.entries.push((id, value));
        Ok(())
    }
}

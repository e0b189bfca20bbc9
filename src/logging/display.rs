//! Command-line logger
use super::summary::{ScalarStats, Summary};
use super::{Id, LogError, LogValue, StatsLogger};
use coarsetime::{Duration as CDuration, Instant as CInstant};
use std::collections::{btree_map::Entry, BTreeMap};
use std::fmt;
use std::ops::Drop;
use std::time::Duration;
use yansi::Paint;

/// Logger that displays summaries of grouped values to standard output.
///
/// Summaries are displayed at the start of the first group after `display_period` has elapsed,
/// on [`flush`][StatsLogger::flush], and when the logger is dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayLogger {
    // A binary tree is used so that identifiers are displayed in sorted order
    summaries: BTreeMap<Id, Summary>,
    // Coarse time since the period is checked once per group
    display_period: CDuration,
    last_display_time: CInstant,
    groups: u64,
}

impl Default for DisplayLogger {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl DisplayLogger {
    pub fn new(display_period: Duration) -> Self {
        Self {
            summaries: BTreeMap::new(),
            display_period: CDuration::new(
                display_period.as_secs(),
                display_period.subsec_nanos(),
            ),
            last_display_time: CInstant::now(),
            groups: 0,
        }
    }

    /// Current summaries by identifier.
    pub const fn summaries(&self) -> &BTreeMap<Id, Summary> {
        &self.summaries
    }
}

impl StatsLogger for DisplayLogger {
    fn group_start(&mut self) {
        // Checked before logging so that a burst of values is not split across two displays
        if self.last_display_time.elapsed() >= self.display_period {
            self.flush();
        }
    }

    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        match self.summaries.entry(id) {
            Entry::Vacant(e) => {
                e.insert(value.into());
            }
            Entry::Occupied(e) => e.into_mut().push(value)?,
        }
        Ok(())
    }

    fn group_end(&mut self) {
        self.groups += 1;
    }

    fn flush(&mut self) {
        if self.groups == 0 {
            return;
        }
        println!();
        println!(
            "==== {} groups in {:.2}s ====",
            self.groups,
            self.last_display_time.elapsed().as_f64()
        );
        for (id, summary) in &self.summaries {
            println!("{:<32} {}", Paint::fixed(35, id), DisplaySummary(summary));
        }

        for summary in self.summaries.values_mut() {
            summary.reset();
        }
        self.groups = 0;
        self.last_display_time = CInstant::now();
    }
}

/// Flush when dropped
impl Drop for DisplayLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

struct DisplaySummary<'a>(&'a Summary);

impl<'a> fmt::Display for DisplaySummary<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Summary::Counter {
                increment,
                initial_value,
            } => write!(
                f,
                "{}  (+{})",
                initial_value + increment,
                Paint::fixed(253, increment)
            ),
            Summary::Duration { .. } => match self.0.mean_duration() {
                Some(mean) => write!(f, "{:.3?}", mean),
                None => Ok(()),
            },
            Summary::Scalar { stats } => fmt_scalar_stats(f, stats),
            Summary::Message { counts } => {
                for (message, count) in counts {
                    write!(f, "[{}x] {}  ", Paint::fixed(221, count), message)?;
                }
                Ok(())
            }
        }
    }
}

fn fmt_scalar_stats(f: &mut fmt::Formatter, stats: &ScalarStats) -> fmt::Result {
    if let Some(mean) = stats.mean() {
        write!(f, "{:.4}", mean)?;
        if stats.count() > 1 {
            if let Some(stddev) = stats.stddev() {
                write!(f, " {}", Paint::fixed(8, format!("(σ {:.4})", stddev)))?;
            }
        }
    }
    Ok(())
}

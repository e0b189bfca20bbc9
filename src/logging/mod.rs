//! Logging statistics from loss evaluations
mod display;
mod memory;
mod summary;

pub use display::DisplayLogger;
pub use memory::MemoryLogger;
pub use summary::{ScalarStats, Summary};

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Hierarchical name identifying a logged value. Scopes are joined with `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(Cow<'static, str>);

impl Id {
    /// Prefix this identifier with a scope.
    #[must_use]
    pub fn with_prefix(self, scope: &str) -> Self {
        Self(format!("{}/{}", scope, self.0).into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Id {
    #[inline]
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for Id {
    #[inline]
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// A value that can be logged.
#[derive(Debug, Clone, PartialEq)]
pub enum LogValue {
    /// A scalar value. Aggregate by taking means.
    Scalar(f64),
    /// Increment a counter by the given amount.
    CounterIncrement(u64),
    /// A time duration. Aggregate by taking means.
    Duration(Duration),
    /// A message string. Aggregate by counting occurrences of each message.
    Message(Cow<'static, str>),
}

impl LogValue {
    pub const fn variant_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "Scalar",
            Self::CounterIncrement(_) => "CounterIncrement",
            Self::Duration(_) => "Duration",
            Self::Message(_) => "Message",
        }
    }
}

impl From<f64> for LogValue {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Duration> for LogValue {
    #[inline]
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("value of type {now} is incompatible with previous values of type {prev}")]
    IncompatibleValue {
        prev: &'static str,
        now: &'static str,
    },
}

/// Log statistics.
///
/// Values are logged in groups: a group holds values that were measured together,
/// such as the statistics of a single loss evaluation.
pub trait StatsLogger: Send {
    /// Start a new group of values.
    #[inline]
    fn group_start(&mut self) {}

    /// Log a value within the current group.
    ///
    /// # Returns
    /// May return an error if the logged value is structurally incompatible
    /// with previous values logged under the same identifier.
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError>;

    /// End the current group of values.
    #[inline]
    fn group_end(&mut self) {}

    /// Write out any buffered summaries.
    #[inline]
    fn flush(&mut self) {}

    /// Log a single value as its own group.
    fn log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.group_start();
        let result = self.group_log(id, value);
        self.group_end();
        result
    }

    /// Log a scalar value. Incompatible values are dropped.
    #[inline]
    fn log_scalar(&mut self, name: &'static str, value: f64) {
        let _ = self.group_log(name.into(), value.into());
    }

    /// Increment a counter. Incompatible values are dropped.
    #[inline]
    fn log_counter_increment(&mut self, name: &'static str, increment: u64) {
        let _ = self.group_log(name.into(), LogValue::CounterIncrement(increment));
    }

    /// Log a time duration. Incompatible values are dropped.
    #[inline]
    fn log_duration(&mut self, name: &'static str, duration: Duration) {
        let _ = self.group_log(name.into(), duration.into());
    }

    /// Log a message. Incompatible values are dropped.
    #[inline]
    fn log_message(&mut self, name: &'static str, message: Cow<'static, str>) {
        let _ = self.group_log(name.into(), LogValue::Message(message));
    }
}

/// Logger that does nothing
impl StatsLogger for () {
    #[inline]
    fn group_log(&mut self, _: Id, _: LogValue) -> Result<(), LogError> {
        Ok(())
    }
}

impl<T: StatsLogger + ?Sized> StatsLogger for Box<T> {
    #[inline]
    fn group_start(&mut self) {
        T::group_start(self)
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        T::group_log(self, id, value)
    }
    #[inline]
    fn group_end(&mut self) {
        T::group_end(self)
    }
    #[inline]
    fn flush(&mut self) {
        T::flush(self)
    }
}

/// Wraps a logger, prefixing all logged identifiers with a scope.
pub struct ScopedLogger<'a> {
    scope: &'static str,
    logger: &'a mut dyn StatsLogger,
}

impl<'a> ScopedLogger<'a> {
    #[inline]
    pub fn new(logger: &'a mut dyn StatsLogger, scope: &'static str) -> Self {
        Self { scope, logger }
    }
}

impl<'a> fmt::Debug for ScopedLogger<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ScopedLogger")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl<'a> StatsLogger for ScopedLogger<'a> {
    #[inline]
    fn group_start(&mut self) {
        self.logger.group_start()
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.logger.group_log(id.with_prefix(self.scope), value)
    }
    #[inline]
    fn group_end(&mut self) {
        self.logger.group_end()
    }
    #[inline]
    fn flush(&mut self) {
        self.logger.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_prefix() {
        let id = Id::from("loss").with_prefix("retrace");
        assert_eq!(id.as_str(), "retrace/loss");
        assert_eq!(id.to_string(), "retrace/loss");
    }

    #[test]
    fn scoped_logger_prefixes_ids() {
        let mut logger = MemoryLogger::new();
        {
            let mut scoped = ScopedLogger::new(&mut logger, "critic");
            scoped.log_scalar("loss", 1.5);
            scoped.log_counter_increment("count", 2);
        }
        assert_eq!(
            logger.entries(),
            &[
                (Id::from("critic/loss"), LogValue::Scalar(1.5)),
                (Id::from("critic/count"), LogValue::CounterIncrement(2)),
            ]
        );
    }

    #[test]
    fn unit_logger_accepts_anything() {
        let mut logger = ();
        assert_eq!(logger.log("x".into(), LogValue::Scalar(1.0)), Ok(()));
        assert_eq!(logger.log("x".into(), LogValue::CounterIncrement(1)), Ok(()));
    }
}

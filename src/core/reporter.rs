//! User-facing error reporting with duplicate suppression.
//!
//! Background refresh cycles can hit the same failure over and over (a network
//! outage, a misconfigured CLI path). [`ErrorReporter`] surfaces a message only
//! when it differs from the one reported immediately before it, and stays quiet
//! while a [`CounterGuard`] from [`ErrorReporter::silence`] is held.

use crate::core::cancel::{CounterGuard, ScopedCounter};
use crate::core::error::SvnCacheError;
use std::sync::{Mutex, PoisonError};

/// Receives messages that passed deduplication
pub type ReportSink = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
pub struct ErrorReporter {
    last: Mutex<Option<String>>,
    silence: ScopedCounter,
    sink: Option<ReportSink>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            sink: Some(Box::new(sink)),
            ..Self::default()
        }
    }

    /// Suppress user-facing reports until the guard is dropped
    pub fn silence(&self) -> CounterGuard {
        self.silence.acquire()
    }

    pub fn is_silenced(&self) -> bool {
        self.silence.is_held()
    }

    /// Report `message` unless it repeats the previous report.
    /// Returns whether it reached the user.
    pub fn report(&self, message: &str) -> bool {
        if self.is_silenced() {
            log::debug!("Silenced error: {message}");
            return false;
        }

        {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            if last.as_deref() == Some(message) {
                log::debug!("Suppressed repeated error: {message}");
                return false;
            }
            *last = Some(message.to_string());
        }

        log::error!("{message}");
        if let Some(sink) = &self.sink {
            sink(message);
        }
        true
    }

    pub fn report_error(&self, error: &SvnCacheError) -> bool {
        self.report(&error.to_string())
    }

    /// Forget the previous message so the next one is always reported
    pub fn reset(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn counting_reporter() -> (ErrorReporter, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let reporter = ErrorReporter::with_sink(move |message| {
            sink_seen.lock().unwrap().push(message.to_string())
        });
        (reporter, seen)
    }

    #[test]
    fn test_repeated_message_is_suppressed() {
        let (reporter, seen) = counting_reporter();
        assert!(reporter.report("E170013: Unable to connect"));
        assert!(!reporter.report("E170013: Unable to connect"));
        assert!(reporter.report("E215004: No more credentials"));
        assert!(reporter.report("E170013: Unable to connect"));
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_silenced_reports_are_dropped() {
        let (reporter, seen) = counting_reporter();
        {
            let _quiet = reporter.silence();
            assert!(!reporter.report("hidden"));
        }
        assert!(reporter.report("hidden"));
        assert_eq!(*seen.lock().unwrap(), vec!["hidden".to_string()]);
    }

    #[test]
    fn test_reset_allows_repeat() {
        let (reporter, seen) = counting_reporter();
        reporter.report("same");
        reporter.reset();
        reporter.report("same");
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}

use log::{log_enabled, Level};
use std::time::{Duration, Instant};

/// Scoped timer that traces the duration of a section and optionally adds it to a sink.
pub struct ScopedTimer<'a> {
    label: &'a str,
    start: Instant,
    sink: Option<&'a mut Duration>,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(label: &'a str) -> Self {
        if log_enabled!(Level::Trace) {
            log::trace!("start {label}");
        }
        Self {
            label,
            start: Instant::now(),
            sink: None,
        }
    }

    /// Like [`ScopedTimer::new`] but also accumulates the elapsed time into `sink`.
    pub fn accumulate(label: &'a str, sink: &'a mut Duration) -> Self {
        let mut timer = Self::new(label);
        timer.sink = Some(sink);
        timer
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        if let Some(sink) = self.sink.as_mut() {
            **sink += elapsed;
        }
        if log_enabled!(Level::Trace) {
            log::trace!("end {} ({} µs)", self.label, elapsed.as_micros());
        }
    }
}

/// Wall-clock time spent in each resolution phase since the last reset.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhaseTimings {
    pub detection: Duration,
    pub partition: Duration,
    pub solve: Duration,
    pub apply: Duration,
    pub stabilization: Duration,
}

impl PhaseTimings {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn total(&self) -> Duration {
        self.detection + self.partition + self.solve + self.apply + self.stabilization
    }

    /// Emits a one-line summary at debug level.
    pub fn report(&self) {
        let total_us = self.total().as_micros() as f64;
        if total_us < 1.0 {
            return;
        }
        let pct = |d: Duration| d.as_micros() as f64 / total_us * 100.0;
        log::debug!(
            "resolution {:.3} ms: detect {:.1}%, partition {:.1}%, solve {:.1}%, apply {:.1}%, stabilize {:.1}%",
            self.total().as_secs_f64() * 1000.0,
            pct(self.detection),
            pct(self.partition),
            pct(self.solve),
            pct(self.apply),
            pct(self.stabilization),
        );
    }
}

//! Named-phase elapsed-time recorder (L0), grounded in `steptimer.py`.
//!
//! Marks are timestamps keyed by a step name; `report()` walks consecutive
//! marks and formats the gap between them, skipping gaps of a second or
//! less, and ceiling-rounds durations the same way the original does
//! (`round(e + 0.5)`).

use std::time::{Duration, Instant};

pub struct StepTimer {
    marks: Vec<(String, Instant)>,
}

impl Default for StepTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl StepTimer {
    pub fn new() -> Self {
        let mut t = StepTimer { marks: Vec::new() };
        t.mark("start");
        t
    }

    pub fn mark(&mut self, name: &str) {
        self.marks.push((name.to_string(), Instant::now()));
    }

    /// Finalize with an "end" mark and produce the report line.
    pub fn report(&mut self) -> String {
        self.mark("end");

        let mut parts = Vec::new();
        let start_time = self.marks[0].1;
        let mut prev_time = start_time;
        let mut end_time = start_time;

        for (name, t) in &self.marks {
            if name == "start" {
                prev_time = *t;
                continue;
            }
            if name == "end" {
                end_time = *t;
            }

            let elapsed = t.duration_since(prev_time);
            if elapsed > Duration::from_secs(1) {
                parts.push(format!("{} {}", name, format_delta(elapsed)));
            }
            prev_time = *t;
        }

        let total = end_time.duration_since(start_time);
        format!("total time {} ({})", format_delta(total), parts.join(", "))
    }
}

/// Ceiling-round a duration to whole seconds and render as `HH:MM:SS`,
/// matching `datetime.timedelta(seconds=round(e+0.5))`'s str() output.
fn format_delta(d: Duration) -> String {
    let secs = (d.as_secs_f64() + 0.5).floor() as u64;
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

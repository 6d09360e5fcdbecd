//! Progress reporting for long-running loops.
//!
//! Loading a model and dividing two models both walk every n-gram entry. Callers
//! pass a `Progress` implementation into those loops instead of the library
//! configuring any process-wide reporter. The library itself only emits `tracing`
//! events; front ends decide how (and whether) to draw progress.

/// Sink for stage-based progress updates.
///
/// A stage is opened with `start`, advanced any number of times and closed with
/// `finish`. Stages never nest.
pub trait Progress {
    /// Open a stage expecting `total` units of work.
    fn start(&mut self, stage: &str, total: u64);

    /// Record `delta` completed units in the current stage.
    fn advance(&mut self, delta: u64);

    /// Close the current stage.
    fn finish(&mut self);
}

/// Progress sink that drops every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Progress for Silent {
    fn start(&mut self, _stage: &str, _total: u64) {}

    fn advance(&mut self, _delta: u64) {}

    fn finish(&mut self) {}
}

/// Progress sink that records stages and totals.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    /// `(stage, total, advanced)` for every finished or open stage.
    pub stages: Vec<(String, u64, u64)>,
}

#[cfg(test)]
impl Progress for Recorder {
    fn start(&mut self, stage: &str, total: u64) {
        self.stages.push((stage.to_string(), total, 0));
    }

    fn advance(&mut self, delta: u64) {
        if let Some(last) = self.stages.last_mut() {
            last.2 += delta;
        }
    }

    fn finish(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_tracks_current_stage() {
        let mut r = Recorder::default();
        r.start("one", 3);
        r.advance(1);
        r.advance(2);
        r.finish();
        r.start("two", 5);
        r.advance(4);
        assert_eq!(
            r.stages,
            vec![("one".to_string(), 3, 3), ("two".to_string(), 5, 4)]
        );
    }

    #[test]
    fn advance_without_stage_is_ignored() {
        let mut r = Recorder::default();
        r.advance(10);
        assert!(r.stages.is_empty());
    }
}

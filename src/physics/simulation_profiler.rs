#[cfg(feature = "profile")]
use crate::utilities::locks;
#[cfg(feature = "profile")]
use std::collections::HashMap;
#[cfg(feature = "profile")]
use std::sync::Mutex;
#[cfg(feature = "profile")]
use std::time::Instant;
use tracing::span::EnteredSpan;

/// Stores profiling information for the previous step.
///
/// Profiling is only active when the `profile` feature is enabled.
/// When inactive, all timing methods are no-ops. Stages can be timed from any thread, so the free-motion stage
/// running on a worker is recorded next to the collision stages of the stepping thread.
#[derive(Debug, Default)]
pub struct SimulationProfiler {
    #[cfg(feature = "profile")]
    stages: Mutex<HashMap<&'static str, f64>>,
    #[cfg(feature = "profile")]
    start_timestamps: Mutex<HashMap<&'static str, Instant>>,
}

impl SimulationProfiler {
    /// Creates a new simulation profiler.
    pub fn new(_initial_stage_count: usize) -> Self {
        Self {
            #[cfg(feature = "profile")]
            stages: Mutex::new(HashMap::with_capacity(_initial_stage_count)),
            #[cfg(feature = "profile")]
            start_timestamps: Mutex::new(HashMap::with_capacity(_initial_stage_count)),
        }
    }

    /// Gets the time in seconds it took to complete the last execution of the given stage.
    /// If no stage matching the given key ran, returns -1.
    pub fn get(&self, _stage: &str) -> f64 {
        #[cfg(feature = "profile")]
        {
            if let Some(&time) = locks::lock(&self.stages).get(_stage) {
                return time;
            }
        }
        -1.0
    }

    /// Starts timing a stage.
    pub fn start(&self, _stage: &'static str) {
        #[cfg(feature = "profile")]
        {
            let previous = locks::lock(&self.start_timestamps).insert(_stage, Instant::now());
            debug_assert!(previous.is_none(), "Cannot start a stage that has already been started.");
        }
    }

    /// Ends timing a stage and accumulates the elapsed time.
    pub fn end(&self, _stage: &'static str) {
        #[cfg(feature = "profile")]
        {
            let end_time = Instant::now();
            let start_time = locks::lock(&self.start_timestamps).remove(_stage);
            debug_assert!(
                start_time.is_some(),
                "To end a stage, it must currently be active (started and not already stopped)."
            );
            if let Some(start_time) = start_time {
                let elapsed = end_time.duration_since(start_time).as_secs_f64();
                *locks::lock(&self.stages).entry(_stage).or_insert(0.0) += elapsed;
            }
        }
    }

    /// Clears all accumulated stage times.
    pub fn clear(&self) {
        #[cfg(feature = "profile")]
        {
            debug_assert!(
                locks::lock(&self.start_timestamps).is_empty(),
                "It's likely that some stage was left unended from the previous step."
            );
            locks::lock(&self.stages).clear();
        }
    }

    /// Times `stage` until the returned guard is dropped, inside a `debug` tracing span named after the stage.
    pub fn scope(&self, stage: &'static str) -> ScopedStageTimer<'_> {
        self.start(stage);
        ScopedStageTimer {
            profiler: self,
            stage,
            _span: tracing::debug_span!("stage", stage).entered(),
        }
    }
}

/// Guard returned by [`SimulationProfiler::scope`].
pub struct ScopedStageTimer<'a> {
    profiler: &'a SimulationProfiler,
    stage: &'static str,
    _span: EnteredSpan,
}

impl Drop for ScopedStageTimer<'_> {
    fn drop(&mut self) {
        self.profiler.end(self.stage);
    }
}

use std::time::Duration;

/// Per-frame time budget for a fixed target rate.
///
/// Pacing is best effort: a frame that overruns its budget is counted as
/// missed and the next one starts immediately. Lost time is never made up by
/// shortening later frames.
#[derive(Clone, Debug)]
pub(crate) struct FramePacer {
    budget: Duration,
    missed: u64,
}

impl FramePacer {
    pub fn new(target_fps: u32) -> Self {
        Self {
            budget: Duration::from_secs(1) / target_fps.max(1),
            missed: 0,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// How long to sleep after a tick that took `elapsed`.
    pub fn remaining(&mut self, elapsed: Duration) -> Duration {
        match self.budget.checked_sub(elapsed) {
            Some(rest) if !rest.is_zero() => rest,
            _ => {
                self.missed += 1;
                if self.missed == 1 {
                    log::warn!(
                        "Frame took {:?}, over its {:?} budget; running late frames back to back",
                        elapsed,
                        self.budget
                    );
                } else {
                    log::debug!("Missed frame deadline ({} so far)", self.missed);
                }
                Duration::ZERO
            }
        }
    }
}

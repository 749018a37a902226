use super::ExitReason;
use crate::effects::{EffectFrame, EffectSequence};
use crate::hotkey::KillSignal;
use std::time::{Duration, Instant};

/// Position of the renderer within its sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayState {
    pub index: usize,
    pub elapsed: Duration,
    pub running: bool,
    /// Completed passes over the sequence.
    pub iteration: u64,
}

impl OverlayState {
    fn new() -> Self {
        Self {
            index: 0,
            elapsed: Duration::ZERO,
            running: true,
            iteration: 0,
        }
    }
}

/// What the renderer should do on this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Render { index: usize, elapsed: Duration },
    Exit(ExitReason),
}

/// Tick state machine for one overlay session. Holds no window state.
pub struct Session {
    sequence: EffectSequence,
    signal: KillSignal,
    looping: bool,
    state: OverlayState,
    exit: Option<ExitReason>,
    renders: u64,
}

impl Session {
    pub fn new(sequence: EffectSequence, signal: KillSignal, looping: bool) -> Self {
        Self {
            sequence,
            signal,
            looping,
            state: OverlayState::new(),
            exit: None,
            renders: 0,
        }
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn frame(&self, index: usize) -> Option<&EffectFrame> {
        self.sequence.get(index)
    }

    /// Number of `Render` ticks handed out so far.
    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.exit
    }

    /// End the session early, e.g. when the window was closed underneath us.
    /// Has no effect once the session already ended.
    pub fn abort(&mut self, reason: ExitReason) -> ExitReason {
        self.finish(reason)
    }

    fn finish(&mut self, reason: ExitReason) -> ExitReason {
        match self.exit {
            Some(r) => r,
            None => {
                tracing::debug!(?reason, renders = self.renders, "session finished");
                self.state.running = false;
                self.exit = Some(reason);
                reason
            }
        }
    }

    /// Advance one tick that took `dt`.
    ///
    /// The kill signal is checked before anything else, so once it is seen no
    /// further frame is rendered. At most one frame boundary is crossed per
    /// tick; leftover time is dropped rather than skipping frames.
    pub fn tick(&mut self, dt: Duration) -> Tick {
        if let Some(reason) = self.exit {
            return Tick::Exit(reason);
        }
        if self.signal.is_set() {
            return Tick::Exit(self.finish(ExitReason::Killed));
        }
        let Some(duration) = self.sequence.get(self.state.index).map(EffectFrame::duration) else {
            return Tick::Exit(self.finish(ExitReason::Completed));
        };

        let current = Tick::Render {
            index: self.state.index,
            elapsed: self.state.elapsed,
        };
        self.renders += 1;

        self.state.elapsed += dt;
        if self.state.elapsed >= duration {
            self.state.elapsed = Duration::ZERO;
            self.state.index += 1;
            if self.state.index >= self.sequence.len() && self.looping {
                self.state.index = 0;
                self.state.iteration += 1;
            }
        }
        current
    }
}

/// Fixed-interval tick clock for loops that get woken at arbitrary times.
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns the time since the previous tick when a tick is due. The first
    /// call is always due and reports one interval. Long stalls are capped at
    /// four intervals.
    pub fn due(&mut self, now: Instant) -> Option<Duration> {
        match self.last {
            None => {
                self.last = Some(now);
                Some(self.interval)
            }
            Some(last) => {
                let dt = now.saturating_duration_since(last);
                if dt < self.interval {
                    return None;
                }
                self.last = Some(now);
                Some(dt.min(self.interval * 4))
            }
        }
    }

    /// Time left until the next tick is due.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last {
            None => Duration::ZERO,
            Some(last) => self
                .interval
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacer_waits_for_interval() {
        let start = Instant::now();
        let mut p = Pacer::new(Duration::from_millis(50));
        assert_eq!(p.due(start), Some(Duration::from_millis(50)));
        assert_eq!(p.due(start + Duration::from_millis(20)), None);
        assert_eq!(p.remaining(start + Duration::from_millis(20)), Duration::from_millis(30));
        assert_eq!(
            p.due(start + Duration::from_millis(55)),
            Some(Duration::from_millis(55))
        );
        assert_eq!(
            p.due(start + Duration::from_secs(10)),
            Some(Duration::from_millis(200))
        );
    }
}

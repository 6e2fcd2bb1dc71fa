//! # Decode State Record
//!
//! The lifecycle state, the running flag and the pending control requests of a
//! pipeline live in one mutex-guarded record paired with a single condition
//! variable. The worker parks on that pair; control calls from any thread
//! mutate the record and wake the worker.
//!
//! ## State Graph
//!
//! ```text
//!  Stop ──begin──▶ Start ──first frame──▶ Pause ◀──pause── Decoding
//!                    │                      │                 ▲  │
//!                    │                      └──────resume─────┘  │
//!                    └──seek──▶ Seeking ◀──────────seek──────────┘
//!                                 │
//!                                 └──target reached──▶ Decoding | Pause
//!
//!  Start | Decoding | Seeking ──end of stream──▶ Finish ──seek──▶ Seeking
//!  any ──stop──▶ Stop
//! ```
//!
//! Every mutator returns the [`Transition`]s it performed so the caller can
//! notify listeners after the lock is released.

use crate::error::{DecodeError, Result};
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Lifecycle state of a decode pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeState {
    /// Initial and terminal state.
    #[default]
    Stop,
    /// Worker running, waiting for the first frame.
    Start,
    Decoding,
    Pause,
    Seeking,
    /// End of stream rendered; the worker stays parked until seek or stop.
    Finish,
}

impl DecodeState {
    /// Whether frames flow in this state.
    pub fn is_runnable(&self) -> bool {
        matches!(
            self,
            DecodeState::Start | DecodeState::Decoding | DecodeState::Seeking
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecodeState::Stop => "stop",
            DecodeState::Start => "start",
            DecodeState::Decoding => "decoding",
            DecodeState::Pause => "pause",
            DecodeState::Seeking => "seeking",
            DecodeState::Finish => "finish",
        }
    }
}

impl fmt::Display for DecodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change performed by one of the [`StateCell`] mutators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: DecodeState,
    pub to: DecodeState,
}

impl Transition {
    fn new(from: DecodeState, to: DecodeState) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Why the worker returned from [`StateCell::park`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The state is runnable; run one pump iteration.
    Run(DecodeState),
    /// A deferred engine configuration should be retried.
    RetryConfiguration,
    /// The pipeline was stopped.
    Exit,
}

/// Outcome of [`StateCell::resume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// `Pause -> Decoding` happened now.
    Resumed(Transition),
    /// Decoding will start once the first frame or the pending seek lands.
    Deferred,
    /// Already decoding.
    NoOp,
}

/// Completion of a seek, returned by [`StateCell::finish_seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekCompletion {
    pub transition: Transition,
    /// Decoding restarted from a non-running state; announce it.
    pub announce_running: bool,
}

#[derive(Debug, Default)]
struct Control {
    state: DecodeState,
    running: bool,
    pending_seek: Option<i64>,
    resume_after_seek: bool,
    announce_running: bool,
    play_requested: bool,
    retry_configuration: bool,
}

/// Guarded lifecycle record shared by the worker and the control handle.
#[derive(Debug, Default)]
pub struct StateCell {
    control: Mutex<Control>,
    wake: Condvar,
}

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DecodeState {
        self.control.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.control.lock().running
    }

    fn set(control: &mut Control, to: DecodeState) -> Option<Transition> {
        let from = control.state;
        if from == to {
            return None;
        }
        control.state = to;
        Some(Transition::new(from, to))
    }

    fn ensure_running(control: &Control) -> Result<()> {
        if !control.running || control.state == DecodeState::Stop {
            return Err(DecodeError::NotRunning);
        }
        Ok(())
    }

    // ========================================================================
    // Worker Side
    // ========================================================================

    /// Enter the worker loop: `Stop -> Start`, running.
    pub fn begin(&self) -> Option<Transition> {
        let mut control = self.control.lock();
        control.running = true;
        let transition = Self::set(&mut control, DecodeState::Start);
        self.wake.notify_all();
        transition
    }

    /// Block until there is work for the worker.
    ///
    /// While awaiting configuration only a retry request (or stop) wakes the
    /// worker. Otherwise it returns as soon as the state is runnable. When the
    /// park starts in `Pause`, `on_pause` runs once with the lock released
    /// before the worker waits.
    pub fn park<F>(&self, awaiting_configuration: bool, mut on_pause: F) -> Wake
    where
        F: FnMut(),
    {
        let mut control = self.control.lock();
        let mut announced = false;
        loop {
            if !control.running || control.state == DecodeState::Stop {
                return Wake::Exit;
            }

            if awaiting_configuration {
                if control.retry_configuration {
                    control.retry_configuration = false;
                    return Wake::RetryConfiguration;
                }
            } else if control.state.is_runnable() {
                return Wake::Run(control.state);
            } else if control.state == DecodeState::Pause && !announced {
                announced = true;
                MutexGuard::unlocked(&mut control, &mut on_pause);
                // Recheck: a control call may have landed while unlocked.
                continue;
            }

            self.wake.wait(&mut control);
        }
    }

    /// Take the seek target requested since the last call.
    pub fn take_pending_seek(&self) -> Option<i64> {
        self.control.lock().pending_seek.take()
    }

    pub fn has_pending_seek(&self) -> bool {
        self.control.lock().pending_seek.is_some()
    }

    /// First frame rendered: `Start -> Pause`, then `Pause -> Decoding` when
    /// playback was requested before the frame arrived.
    ///
    /// The flag is `true` when `on_running` should be announced.
    pub fn complete_first_frame(&self) -> (Vec<Transition>, bool) {
        let mut control = self.control.lock();
        let mut transitions = Vec::new();
        if control.state != DecodeState::Start {
            return (transitions, false);
        }

        transitions.extend(Self::set(&mut control, DecodeState::Pause));
        let announce = std::mem::take(&mut control.play_requested);
        if announce {
            transitions.extend(Self::set(&mut control, DecodeState::Decoding));
        }
        self.wake.notify_all();
        (transitions, announce)
    }

    /// The seek target was reached. Returns `None` if the state moved on or a
    /// newer seek is pending.
    pub fn finish_seek(&self) -> Option<SeekCompletion> {
        let mut control = self.control.lock();
        if control.state != DecodeState::Seeking || control.pending_seek.is_some() {
            return None;
        }

        let to = if control.resume_after_seek {
            DecodeState::Decoding
        } else {
            DecodeState::Pause
        };
        let announce_running = to == DecodeState::Decoding && control.announce_running;
        control.resume_after_seek = false;
        control.announce_running = false;

        let transition = Self::set(&mut control, to)?;
        self.wake.notify_all();
        Some(SeekCompletion {
            transition,
            announce_running,
        })
    }

    /// End of stream reached in a runnable state: move to `Finish`.
    ///
    /// Skipped when a seek is pending; the seek replaces the stream position.
    pub fn finish_stream(&self) -> Option<Transition> {
        let mut control = self.control.lock();
        if !control.running || !control.state.is_runnable() || control.pending_seek.is_some() {
            return None;
        }
        control.resume_after_seek = false;
        control.announce_running = false;
        control.play_requested = false;
        let transition = Self::set(&mut control, DecodeState::Finish);
        self.wake.notify_all();
        transition
    }

    /// Sleep for `duration` unless decoding is interrupted first.
    ///
    /// Pause, seek and stop wake the sleeper immediately.
    pub fn sleep_interruptibly(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let mut control = self.control.lock();
        while control.running
            && control.state == DecodeState::Decoding
            && control.pending_seek.is_none()
        {
            if self.wake.wait_until(&mut control, deadline).timed_out() {
                break;
            }
        }
    }

    // ========================================================================
    // Control Side
    // ========================================================================

    /// `Decoding -> Pause`.
    ///
    /// In `Start` and `Seeking` this cancels a requested resume instead; in
    /// `Pause` it does nothing.
    pub fn pause(&self) -> Result<Option<Transition>> {
        let mut control = self.control.lock();
        Self::ensure_running(&control)?;

        let transition = match control.state {
            DecodeState::Decoding => Self::set(&mut control, DecodeState::Pause),
            DecodeState::Seeking => {
                control.resume_after_seek = false;
                control.announce_running = false;
                None
            }
            DecodeState::Start => {
                control.play_requested = false;
                None
            }
            DecodeState::Pause => None,
            from @ (DecodeState::Finish | DecodeState::Stop) => {
                return Err(DecodeError::InvalidTransition {
                    from,
                    action: "pause",
                })
            }
        };
        self.wake.notify_all();
        Ok(transition)
    }

    /// `Pause -> Decoding`.
    ///
    /// Before the first frame or during a seek the request is remembered and
    /// applied when the worker gets there. A finished stream must be seeked to
    /// play again.
    pub fn resume(&self) -> Result<ResumeOutcome> {
        let mut control = self.control.lock();
        Self::ensure_running(&control)?;

        let outcome = match control.state {
            DecodeState::Pause => match Self::set(&mut control, DecodeState::Decoding) {
                Some(transition) => ResumeOutcome::Resumed(transition),
                None => ResumeOutcome::NoOp,
            },
            DecodeState::Seeking => {
                if !control.resume_after_seek {
                    control.resume_after_seek = true;
                    control.announce_running = true;
                }
                ResumeOutcome::Deferred
            }
            DecodeState::Start => {
                control.play_requested = true;
                ResumeOutcome::Deferred
            }
            DecodeState::Decoding => ResumeOutcome::NoOp,
            from @ (DecodeState::Finish | DecodeState::Stop) => {
                return Err(DecodeError::InvalidTransition {
                    from,
                    action: "resume",
                })
            }
        };
        self.wake.notify_all();
        Ok(outcome)
    }

    /// Record a seek to `target_us` and enter `Seeking`.
    ///
    /// Once the target is reached the pipeline decodes if `play` is set or it
    /// was decoding (or finished) before, and pauses otherwise.
    pub fn request_seek(&self, target_us: i64, play: bool) -> Result<Option<Transition>> {
        let mut control = self.control.lock();
        Self::ensure_running(&control)?;

        match control.state {
            DecodeState::Decoding => {
                control.resume_after_seek = true;
                control.announce_running = false;
            }
            DecodeState::Pause => {
                control.resume_after_seek = play;
                control.announce_running = play;
            }
            DecodeState::Finish => {
                control.resume_after_seek = true;
                control.announce_running = true;
            }
            DecodeState::Start => {
                let resume = play || std::mem::take(&mut control.play_requested);
                control.resume_after_seek = resume;
                control.announce_running = resume;
            }
            DecodeState::Seeking => {
                if play && !control.resume_after_seek {
                    control.resume_after_seek = true;
                    control.announce_running = true;
                }
            }
            DecodeState::Stop => return Err(DecodeError::NotRunning),
        }

        control.pending_seek = Some(target_us.max(0));
        let transition = Self::set(&mut control, DecodeState::Seeking);
        self.wake.notify_all();
        Ok(transition)
    }

    /// Ask a worker parked on deferred configuration to try again.
    pub fn request_configuration_retry(&self) -> Result<()> {
        let mut control = self.control.lock();
        Self::ensure_running(&control)?;
        control.retry_configuration = true;
        self.wake.notify_all();
        Ok(())
    }

    /// Clear the running flag and enter `Stop`. Idempotent.
    pub fn stop(&self) -> Option<Transition> {
        let mut control = self.control.lock();
        control.running = false;
        control.pending_seek = None;
        control.retry_configuration = false;
        let transition = Self::set(&mut control, DecodeState::Stop);
        self.wake.notify_all();
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn started() -> StateCell {
        let cell = StateCell::new();
        cell.begin();
        cell
    }

    fn paused() -> StateCell {
        let cell = started();
        cell.complete_first_frame();
        cell
    }

    #[test]
    fn test_begin_enters_start() {
        let cell = StateCell::new();
        assert_eq!(cell.state(), DecodeState::Stop);
        assert!(!cell.is_running());

        let transition = cell.begin().unwrap();
        assert_eq!(transition, Transition::new(DecodeState::Stop, DecodeState::Start));
        assert!(cell.is_running());
    }

    #[test]
    fn test_first_frame_pauses() {
        let cell = started();
        let (transitions, announce) = cell.complete_first_frame();

        assert_eq!(
            transitions,
            vec![Transition::new(DecodeState::Start, DecodeState::Pause)]
        );
        assert!(!announce);

        // Only the first frame counts.
        assert!(cell.complete_first_frame().0.is_empty());
    }

    #[test]
    fn test_resume_before_first_frame_plays_through() {
        let cell = started();
        assert_eq!(cell.resume().unwrap(), ResumeOutcome::Deferred);

        let (transitions, announce) = cell.complete_first_frame();
        assert_eq!(transitions.len(), 2);
        assert_eq!(cell.state(), DecodeState::Decoding);
        assert!(announce);
    }

    #[test]
    fn test_pause_resume_cycle() {
        let cell = paused();

        let outcome = cell.resume().unwrap();
        assert_eq!(
            outcome,
            ResumeOutcome::Resumed(Transition::new(DecodeState::Pause, DecodeState::Decoding))
        );
        assert_eq!(cell.resume().unwrap(), ResumeOutcome::NoOp);

        let transition = cell.pause().unwrap().unwrap();
        assert_eq!(transition.to, DecodeState::Pause);
        assert!(cell.pause().unwrap().is_none());
    }

    #[test]
    fn test_control_after_stop_fails() {
        let cell = paused();
        assert!(cell.stop().is_some());
        assert!(cell.stop().is_none());

        assert!(matches!(cell.pause(), Err(DecodeError::NotRunning)));
        assert!(matches!(cell.resume(), Err(DecodeError::NotRunning)));
        assert!(matches!(
            cell.request_seek(0, false),
            Err(DecodeError::NotRunning)
        ));
        assert!(matches!(
            cell.request_configuration_retry(),
            Err(DecodeError::NotRunning)
        ));
    }

    #[test]
    fn test_resume_from_finish_rejected() {
        let cell = paused();
        cell.resume().unwrap();
        assert_eq!(cell.finish_stream().unwrap().to, DecodeState::Finish);

        let err = cell.resume().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidTransition {
                from: DecodeState::Finish,
                action: "resume"
            }
        ));
    }

    #[test]
    fn test_seek_while_decoding_resumes_silently() {
        let cell = paused();
        cell.resume().unwrap();

        let transition = cell.request_seek(1_000, false).unwrap().unwrap();
        assert_eq!(transition.to, DecodeState::Seeking);
        assert_eq!(cell.take_pending_seek(), Some(1_000));
        assert_eq!(cell.take_pending_seek(), None);

        let completion = cell.finish_seek().unwrap();
        assert_eq!(completion.transition.to, DecodeState::Decoding);
        assert!(!completion.announce_running);
    }

    #[test]
    fn test_seek_while_paused_stays_paused() {
        let cell = paused();
        cell.request_seek(2_000, false).unwrap();
        cell.take_pending_seek();

        let completion = cell.finish_seek().unwrap();
        assert_eq!(completion.transition.to, DecodeState::Pause);
    }

    #[test]
    fn test_seek_and_play_from_pause_announces() {
        let cell = paused();
        cell.request_seek(2_000, true).unwrap();
        cell.take_pending_seek();

        let completion = cell.finish_seek().unwrap();
        assert_eq!(completion.transition.to, DecodeState::Decoding);
        assert!(completion.announce_running);
    }

    #[test]
    fn test_seek_from_finish_restarts() {
        let cell = paused();
        cell.resume().unwrap();
        cell.finish_stream();

        cell.request_seek(0, false).unwrap();
        cell.take_pending_seek();
        let completion = cell.finish_seek().unwrap();
        assert_eq!(
            completion.transition,
            Transition::new(DecodeState::Seeking, DecodeState::Decoding)
        );
        assert!(completion.announce_running);
    }

    #[test]
    fn test_newer_seek_defers_completion() {
        let cell = paused();
        cell.request_seek(1_000, false).unwrap();
        cell.take_pending_seek();
        cell.request_seek(3_000, false).unwrap();

        assert!(cell.finish_seek().is_none());
        assert!(cell.finish_stream().is_none());
        assert_eq!(cell.take_pending_seek(), Some(3_000));
        assert!(cell.finish_seek().is_some());
    }

    #[test]
    fn test_pause_during_seek_cancels_resume() {
        let cell = paused();
        cell.resume().unwrap();
        cell.request_seek(1_000, false).unwrap();
        cell.take_pending_seek();

        assert!(cell.pause().unwrap().is_none());
        assert_eq!(cell.finish_seek().unwrap().transition.to, DecodeState::Pause);
    }

    #[test]
    fn test_park_returns_when_runnable() {
        let cell = started();
        assert_eq!(cell.park(false, || {}), Wake::Run(DecodeState::Start));
    }

    #[test]
    fn test_park_announces_pause_once_and_wakes_on_resume() {
        let cell = Arc::new(paused());
        let announcements = Arc::new(AtomicUsize::new(0));

        let worker = {
            let cell = Arc::clone(&cell);
            let announcements = Arc::clone(&announcements);
            thread::spawn(move || {
                cell.park(false, || {
                    announcements.fetch_add(1, Ordering::SeqCst);
                })
            })
        };

        while announcements.load(Ordering::SeqCst) == 0 {
            thread::yield_now();
        }
        // A retry request wakes the condvar without changing the state.
        cell.request_configuration_retry().unwrap();
        cell.resume().unwrap();

        assert_eq!(worker.join().unwrap(), Wake::Run(DecodeState::Decoding));
        assert_eq!(announcements.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_park_exits_on_stop() {
        let cell = Arc::new(paused());
        let worker = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || cell.park(false, || {}))
        };

        cell.stop();
        assert_eq!(worker.join().unwrap(), Wake::Exit);
    }

    #[test]
    fn test_park_awaiting_configuration() {
        let cell = Arc::new(started());
        let worker = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || cell.park(true, || {}))
        };

        cell.request_configuration_retry().unwrap();
        assert_eq!(worker.join().unwrap(), Wake::RetryConfiguration);
    }

    #[test]
    fn test_sleep_interrupted_by_pause() {
        let cell = Arc::new(paused());
        cell.resume().unwrap();

        let sleeper = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                let started = Instant::now();
                cell.sleep_interruptibly(Duration::from_secs(30));
                started.elapsed()
            })
        };

        thread::sleep(Duration::from_millis(20));
        cell.pause().unwrap();
        assert!(sleeper.join().unwrap() < Duration::from_secs(30));
    }

    #[test]
    fn test_sleep_outside_decoding_returns_immediately() {
        let cell = paused();
        let started = Instant::now();
        cell.sleep_interruptibly(Duration::from_secs(30));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}

//! Audio unlock state.
//!
//! Mobile browsers suppress audio that is not attached to a user gesture
//! until something has played once. The unlock is process-wide and happens
//! at most once per page session; callers that arrive while an unlock is
//! already in flight wait for it instead of priming the subsystem again.

use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use super::interface::{AudioSink, SpeechError};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Locked,
    InFlight,
    Unlocked,
}

pub struct UnlockState {
    phase: Mutex<Phase>,
    notify: Notify,
}

impl UnlockState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            phase: Mutex::new(Phase::Locked),
            notify: Notify::new(),
        })
    }

    /// Whether the audio subsystem has been activated this session.
    pub async fn is_unlocked(&self) -> bool {
        *self.phase.lock().await == Phase::Unlocked
    }

    /// Make sure the audio subsystem is unlocked, playing a silent sample
    /// through `sink` if nobody has yet. Re-entrant callers queue behind
    /// the in-flight unlock rather than racing it.
    pub async fn ensure_unlocked(&self, sink: &dyn AudioSink) -> Result<(), SpeechError> {
        loop {
            // Register for wakeups before inspecting the phase so a
            // notify between unlock and await cannot be missed.
            let notified = self.notify.notified();
            {
                let mut phase = self.phase.lock().await;
                match *phase {
                    Phase::Unlocked => return Ok(()),
                    Phase::Locked => {
                        *phase = Phase::InFlight;
                        break;
                    }
                    Phase::InFlight => {}
                }
            }
            // Someone else is unlocking; wait for them and re-check.
            notified.await;
        }

        let result = sink.unlock().await;

        let mut phase = self.phase.lock().await;
        *phase = if result.is_ok() {
            Phase::Unlocked
        } else {
            Phase::Locked
        };
        drop(phase);
        self.notify.notify_waiters();

        result
    }

    /// Forget the unlock (new page session).
    pub async fn reset(&self) {
        let mut phase = self.phase.lock().await;
        *phase = Phase::Locked;
    }
}

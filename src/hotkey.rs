use crate::error::OverlayError;
use rdev::{listen, EventType, Key};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long [`watch`] waits for the input hook to report a startup failure.
pub const HOOK_PROBE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyCombo {
    pub key: Key,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyCombo {
    /// The fixed escape hatch: Ctrl+Shift+K.
    pub const fn kill_switch() -> Self {
        Self {
            key: Key::KeyK,
            ctrl: true,
            shift: true,
            alt: false,
        }
    }
}

impl Default for KeyCombo {
    fn default() -> Self {
        Self::kill_switch()
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            write!(f, "Ctrl+")?;
        }
        if self.shift {
            write!(f, "Shift+")?;
        }
        if self.alt {
            write!(f, "Alt+")?;
        }
        let name = format!("{:?}", self.key);
        write!(f, "{}", name.strip_prefix("Key").unwrap_or(&name))
    }
}

/// Shared flag raised by the listener and polled by the renderer every tick.
#[derive(Debug, Clone, Default)]
pub struct KillSignal(Arc<AtomicBool>);

impl KillSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Returns `true` only for the call that raised it.
    pub fn trigger(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tracks modifier and key state from raw key events and reports the first
/// moment the whole combination is held down. Once fired it ignores input.
#[derive(Debug, Clone)]
pub struct ComboTracker {
    combo: KeyCombo,
    ctrl: bool,
    shift: bool,
    alt: bool,
    key: bool,
    fired: bool,
}

impl ComboTracker {
    pub fn new(combo: KeyCombo) -> Self {
        Self {
            combo,
            ctrl: false,
            shift: false,
            alt: false,
            key: false,
            fired: false,
        }
    }

    pub fn fired(&self) -> bool {
        self.fired
    }

    /// Feed one event. Returns `true` exactly once, on the event that
    /// completes the combination.
    pub fn observe(&mut self, event: &EventType) -> bool {
        if self.fired {
            return false;
        }
        match *event {
            EventType::KeyPress(k) => self.set(k, true),
            EventType::KeyRelease(k) => self.set(k, false),
            _ => return false,
        }
        if self.held() {
            tracing::debug!(combo = %self.combo, "combination held");
            self.fired = true;
        }
        self.fired
    }

    fn set(&mut self, k: Key, down: bool) {
        match k {
            Key::ControlLeft | Key::ControlRight => self.ctrl = down,
            Key::ShiftLeft | Key::ShiftRight => self.shift = down,
            Key::Alt | Key::AltGr => self.alt = down,
            _ => {}
        }
        if k == self.combo.key {
            self.key = down;
        }
    }

    fn held(&self) -> bool {
        self.key
            && (!self.combo.ctrl || self.ctrl)
            && (!self.combo.shift || self.shift)
            && (!self.combo.alt || self.alt)
    }
}

/// A blocking producer of global key events. `run` only returns when the
/// source can no longer deliver input.
pub trait InputSource: Send + 'static {
    fn run(self, on_event: Box<dyn FnMut(EventType)>) -> Result<(), OverlayError>;
}

/// System-wide keyboard hook backed by `rdev::listen`.
pub struct GlobalInput;

impl InputSource for GlobalInput {
    fn run(self, mut on_event: Box<dyn FnMut(EventType)>) -> Result<(), OverlayError> {
        listen(move |event| on_event(event.event_type))
            .map_err(|e| OverlayError::InputHook(format!("{e:?}")))?;
        Err(OverlayError::InputHook(
            "global listener exited unexpectedly".into(),
        ))
    }
}

/// Handle to a running kill-switch listener.
pub struct KillSwitch {
    combo: KeyCombo,
    signal: KillSignal,
    failures: Receiver<OverlayError>,
}

impl KillSwitch {
    pub fn combo(&self) -> KeyCombo {
        self.combo
    }

    pub fn signal(&self) -> &KillSignal {
        &self.signal
    }

    /// The error that stopped the listener, if it has stopped.
    pub fn failure(&self) -> Option<OverlayError> {
        match self.failures.try_recv() {
            Ok(err) => Some(err),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(OverlayError::InputHook(
                "kill-switch listener exited".into(),
            )),
        }
    }
}

// Raises the signal when the listener thread ends for any reason, panics
// included, so the overlay never outlives its escape hatch.
struct TriggerOnExit(KillSignal);

impl Drop for TriggerOnExit {
    fn drop(&mut self) {
        if self.0.trigger() {
            tracing::warn!("kill-switch listener stopped; tearing down overlay");
        }
    }
}

/// Start listening for `combo` on the global keyboard hook.
pub fn watch(combo: KeyCombo, signal: KillSignal) -> Result<KillSwitch, OverlayError> {
    watch_with(GlobalInput, combo, signal, HOOK_PROBE)
}

/// Start a listener on `source`. Fails if the source reports an error within
/// `probe`, so callers never run the overlay without a working kill switch.
pub fn watch_with<S: InputSource>(
    source: S,
    combo: KeyCombo,
    signal: KillSignal,
    probe: Duration,
) -> Result<KillSwitch, OverlayError> {
    let (fail_tx, fail_rx) = channel::<OverlayError>();
    let thread_signal = signal.clone();
    tracing::debug!(%combo, "starting kill-switch listener");

    thread::Builder::new()
        .name("kill-switch".to_string())
        .spawn(move || {
            let _guard = TriggerOnExit(thread_signal.clone());
            let mut tracker = ComboTracker::new(combo);
            let callback = Box::new(move |event: EventType| {
                if tracker.observe(&event) && thread_signal.trigger() {
                    tracing::info!(%combo, "kill combination detected");
                }
            });
            let err = match source.run(callback) {
                Ok(()) => OverlayError::InputHook("input source stopped".into()),
                Err(e) => e,
            };
            tracing::error!(error = %err, "kill-switch listener failed");
            let _ = fail_tx.send(err);
        })
        .map_err(|e| OverlayError::InputHook(format!("failed to spawn listener thread: {e}")))?;

    match fail_rx.recv_timeout(probe) {
        Ok(err) => Err(err),
        Err(RecvTimeoutError::Timeout) => Ok(KillSwitch {
            combo,
            signal,
            failures: fail_rx,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(OverlayError::InputHook(
            "kill-switch listener exited during startup".into(),
        )),
    }
}

//! Coroutine identity and lifecycle state.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Opaque coroutine identity.
///
/// Identifiers are handed out once per process and never reused, so they are
/// safe to use as logging keys. Two handles are the same coroutine iff their
/// ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoroutineId(pub u64);

impl CoroutineId {
    /// Allocate the next identifier.
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CoroutineId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "#<Coroutine:0x{:016x}>", self.0)
    }
}

/// Coroutine lifecycle.
///
/// ```text
/// Created -> Running -> Suspended -> Running -> ... -> Dead
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineState {
    /// Worker spawned, body not started yet.
    Created,
    /// Body is executing; the resumer is blocked.
    Running,
    /// Body is parked in `suspend`, waiting for the next resume.
    Suspended,
    /// Body returned, panicked, or was abandoned.
    Dead,
}

impl CoroutineState {
    /// Convert from u8 (for atomic storage).
    #[inline]
    pub fn from_u8(val: u8) -> Self {
        match val {
            0 => CoroutineState::Created,
            1 => CoroutineState::Running,
            2 => CoroutineState::Suspended,
            _ => CoroutineState::Dead,
        }
    }

    /// Convert to u8 (for atomic storage).
    #[inline]
    pub fn as_u8(&self) -> u8 {
        match self {
            CoroutineState::Created => 0,
            CoroutineState::Running => 1,
            CoroutineState::Suspended => 2,
            CoroutineState::Dead => 3,
        }
    }

    /// Whether the coroutine can still be resumed.
    #[inline]
    pub fn is_alive(&self) -> bool {
        !matches!(self, CoroutineState::Dead)
    }
}

impl std::fmt::Display for CoroutineState {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            CoroutineState::Created => write!(f, "created"),
            CoroutineState::Running => write!(f, "running"),
            CoroutineState::Suspended => write!(f, "suspended"),
            CoroutineState::Dead => write!(f, "dead"),
        }
    }
}

/// State cell shared between the handle and its worker.
#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn new(state: CoroutineState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    #[inline]
    pub(crate) fn load(&self) -> CoroutineState {
        CoroutineState::from_u8(self.0.load(Ordering::SeqCst))
    }

    #[inline]
    pub(crate) fn store(
        &self,
        state: CoroutineState,
    ) {
        self.0.store(state.as_u8(), Ordering::SeqCst);
    }
}

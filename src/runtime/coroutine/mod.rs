//! Thread-backed coroutines
//!
//! A [`Coroutine`] pairs one dedicated worker thread with two zero-capacity
//! rendezvous channels. The resumer blocks until the body suspends or
//! returns, and the body blocks in [`Yielder::suspend`] until the next
//! resume, so exactly one side is ever runnable past its handoff point.
//!
//! ```rust
//! use rgss_host::runtime::coroutine::{Coroutine, Handoff};
//!
//! let co = Coroutine::new(|y, _args| {
//!     y.suspend(vec![1]);
//!     vec![2]
//! })
//! .unwrap();
//!
//! assert_eq!(co.resume(vec![]).unwrap(), Handoff::Single(1));
//! assert_eq!(co.resume(vec![]).unwrap(), Handoff::Single(2));
//! assert!(co.resume(vec![]).is_err());
//! ```

pub mod error;
pub mod handoff;
pub mod state;

pub use error::{CoroutineError, CoroutineResult};
pub use handoff::Handoff;
pub use state::{CoroutineId, CoroutineState};

use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use state::AtomicState;

/// What to do when a coroutine body panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanicPolicy {
    /// Log and abort the whole process.
    #[default]
    Abort,
    /// Re-raise the panic on the thread that called `resume`.
    Propagate,
}

/// Coroutine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoroutineConfig {
    /// Worker stack size; the platform default when unset.
    #[serde(default)]
    pub stack_size: Option<usize>,
    /// Body panic handling.
    #[serde(default)]
    pub panic_policy: PanicPolicy,
}

/// Boxed coroutine body.
pub type Body<T> = Box<dyn FnOnce(&Yielder<T>, Handoff<T>) -> Vec<T> + Send + 'static>;

/// Message sent from the worker to the resumer.
enum Outbound<T> {
    Values(Vec<T>),
    Panicked(Box<dyn Any + Send>),
}

/// Unwind payload that tears down a worker whose handle is gone.
struct Abandoned;

/// Identity shared by a handle and its worker.
#[derive(Debug)]
struct Shared {
    id: CoroutineId,
    name: Option<String>,
    state: AtomicState,
}

/// Caller-side ends of the two rendezvous slots.
struct Slots<T> {
    inbound: Sender<Vec<T>>,
    outbound: Receiver<Outbound<T>>,
}

/// Worker-to-coroutine binding for [`Yielder::current`].
struct Binding {
    id: CoroutineId,
    yielder: Box<dyn Any>,
}

thread_local! {
    static CURRENT: RefCell<Option<Binding>> = const { RefCell::new(None) };
}

/// A suspendable task running on its own worker thread.
pub struct Coroutine<T: Send + 'static> {
    shared: Arc<Shared>,
    slots: Mutex<Slots<T>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Coroutine<T> {
    /// Create a coroutine with default settings.
    ///
    /// The body receives the values of the first `resume`; whatever it
    /// returns is handed to the resume that observes its completion.
    pub fn new<F>(body: F) -> CoroutineResult<Self>
    where
        F: FnOnce(&Yielder<T>, Handoff<T>) -> Vec<T> + Send + 'static,
    {
        CoroutineBuilder::new().body(body).spawn()
    }

    /// Get the coroutine id.
    #[inline]
    pub fn id(&self) -> CoroutineId {
        self.shared.id
    }

    /// Get the name given at construction, if any.
    pub fn name(&self) -> Option<&str> {
        self.shared.name.as_deref()
    }

    /// Get the current lifecycle state.
    #[inline]
    pub fn state(&self) -> CoroutineState {
        self.shared.state.load()
    }

    /// Whether `resume` can still succeed.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.state().is_alive()
    }

    /// Transfer `args` into the coroutine and block until it suspends or
    /// finishes.
    ///
    /// Fails with [`CoroutineError::Dead`] once the body has terminated, and
    /// with [`CoroutineError::DoubleResume`] if another resume of the same
    /// coroutine is in flight.
    ///
    /// # Panics
    ///
    /// Under [`PanicPolicy::Propagate`], a panic raised by the body is
    /// re-raised here.
    pub fn resume(
        &self,
        args: Vec<T>,
    ) -> CoroutineResult<Handoff<T>> {
        let slots = self
            .slots
            .try_lock()
            .ok_or(CoroutineError::DoubleResume(self.id()))?;

        if !self.is_alive() {
            return Err(CoroutineError::Dead(self.id()));
        }

        trace!(coroutine = %self.id(), "resume");
        self.shared.state.store(CoroutineState::Running);
        if slots.inbound.send(args).is_err() {
            self.shared.state.store(CoroutineState::Dead);
            return Err(CoroutineError::Dead(self.id()));
        }

        match slots.outbound.recv() {
            Ok(Outbound::Values(values)) => Ok(Handoff::from(values)),
            Ok(Outbound::Panicked(payload)) => {
                drop(slots);
                self.join_worker();
                panic::resume_unwind(payload)
            }
            Err(_) => {
                self.shared.state.store(CoroutineState::Dead);
                Err(CoroutineError::Dead(self.id()))
            }
        }
    }

    /// Reap the worker thread once it has finished.
    fn join_worker(&self) {
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

impl<T: Send + 'static> Drop for Coroutine<T> {
    fn drop(&mut self) {
        // A live worker is released when the slots disconnect; never block on it.
        if !self.is_alive() {
            self.join_worker();
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for Coroutine<T> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Coroutine")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish()
    }
}

impl<T: Send + 'static> std::fmt::Display for Coroutine<T> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.shared.id)
    }
}

/// Body-side context of a running coroutine.
///
/// Handed to the body by reference and also retrievable through
/// [`Yielder::current`]. It is neither `Send` nor `Sync`: suspending is only
/// meaningful on the worker thread that owns it.
pub struct Yielder<T: Send + 'static> {
    shared: Arc<Shared>,
    inbound: Receiver<Vec<T>>,
    outbound: Sender<Outbound<T>>,
    _not_send: PhantomData<*const ()>,
}

impl<T: Send + 'static> Clone for Yielder<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            inbound: self.inbound.clone(),
            outbound: self.outbound.clone(),
            _not_send: PhantomData,
        }
    }
}

impl<T: Send + 'static> Yielder<T> {
    /// The coroutine bound to the calling thread.
    ///
    /// Fails with [`CoroutineError::NoCurrent`] on the root context, and on
    /// a worker whose coroutine carries a value type other than `T`.
    pub fn current() -> CoroutineResult<Self> {
        CURRENT.with(|current| {
            current
                .borrow()
                .as_ref()
                .and_then(|binding| binding.yielder.downcast_ref::<Yielder<T>>())
                .cloned()
                .ok_or(CoroutineError::NoCurrent)
        })
    }

    /// Get the coroutine id.
    #[inline]
    pub fn id(&self) -> CoroutineId {
        self.shared.id
    }

    /// Hand `values` to the resumer and park until the next resume.
    ///
    /// Returns the values passed to that resume. If the owning
    /// [`Coroutine`] is dropped meanwhile, the body is unwound and never
    /// returns from this call.
    pub fn suspend(
        &self,
        values: Vec<T>,
    ) -> Handoff<T> {
        trace!(coroutine = %self.id(), "suspend");
        self.shared.state.store(CoroutineState::Suspended);
        if self.outbound.send(Outbound::Values(values)).is_err() {
            panic::resume_unwind(Box::new(Abandoned));
        }
        match self.inbound.recv() {
            Ok(args) => Handoff::from(args),
            Err(_) => panic::resume_unwind(Box::new(Abandoned)),
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for Yielder<T> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Yielder").field("id", &self.shared.id).finish()
    }
}

/// Suspend the coroutine running on this thread.
///
/// Fails with [`CoroutineError::NoCurrent`] when called from the root
/// context.
pub fn suspend<T: Send + 'static>(values: Vec<T>) -> CoroutineResult<Handoff<T>> {
    Yielder::<T>::current().map(|yielder| yielder.suspend(values))
}

/// Id of the coroutine running on this thread, whatever its value type.
pub fn current_id() -> CoroutineResult<CoroutineId> {
    CURRENT.with(|current| {
        current
            .borrow()
            .as_ref()
            .map(|binding| binding.id)
            .ok_or(CoroutineError::NoCurrent)
    })
}

/// Builder for [`Coroutine`].
pub struct CoroutineBuilder<T: Send + 'static> {
    name: Option<String>,
    stack_size: Option<usize>,
    panic_policy: PanicPolicy,
    body: Option<Body<T>>,
}

impl<T: Send + 'static> Default for CoroutineBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> CoroutineBuilder<T> {
    /// Create a builder with default settings and no body.
    pub fn new() -> Self {
        Self {
            name: None,
            stack_size: None,
            panic_policy: PanicPolicy::default(),
            body: None,
        }
    }

    /// Create a builder from configuration.
    pub fn from_config(config: &CoroutineConfig) -> Self {
        Self {
            stack_size: config.stack_size,
            panic_policy: config.panic_policy,
            ..Self::new()
        }
    }

    /// Name the coroutine (also used for the worker thread name).
    pub fn name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the worker stack size.
    pub fn stack_size(
        mut self,
        size: usize,
    ) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Set the panic policy.
    pub fn panic_policy(
        mut self,
        policy: PanicPolicy,
    ) -> Self {
        self.panic_policy = policy;
        self
    }

    /// Set the body.
    pub fn body<F>(
        mut self,
        body: F,
    ) -> Self
    where
        F: FnOnce(&Yielder<T>, Handoff<T>) -> Vec<T> + Send + 'static,
    {
        self.body = Some(Box::new(body));
        self
    }

    /// Set an already boxed body, if any.
    pub fn boxed_body(
        mut self,
        body: Option<Body<T>>,
    ) -> Self {
        self.body = body;
        self
    }

    /// Spawn the worker thread.
    ///
    /// The worker blocks on the inbound slot until the first resume.
    pub fn spawn(self) -> CoroutineResult<Coroutine<T>> {
        let body = self.body.ok_or(CoroutineError::Construction)?;
        let id = CoroutineId::next();
        let shared = Arc::new(Shared {
            id,
            name: self.name,
            state: AtomicState::new(CoroutineState::Created),
        });

        let (inbound_tx, inbound_rx) = channel::bounded(0);
        let (outbound_tx, outbound_rx) = channel::bounded(0);

        let thread_name = match &shared.name {
            Some(name) => format!("coroutine-{}", name),
            None => format!("coroutine-{}", id.inner()),
        };
        let mut builder = thread::Builder::new().name(thread_name);
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }

        let worker_shared = shared.clone();
        let policy = self.panic_policy;
        let handle = builder.spawn(move || {
            run_worker(worker_shared, inbound_rx, outbound_tx, policy, body);
        })?;
        debug!(coroutine = %id, "coroutine created");

        Ok(Coroutine {
            shared,
            slots: Mutex::new(Slots {
                inbound: inbound_tx,
                outbound: outbound_rx,
            }),
            worker: Mutex::new(Some(handle)),
        })
    }
}

/// Worker thread main loop.
fn run_worker<T: Send + 'static>(
    shared: Arc<Shared>,
    inbound: Receiver<Vec<T>>,
    outbound: Sender<Outbound<T>>,
    policy: PanicPolicy,
    body: Body<T>,
) {
    let args = match inbound.recv() {
        Ok(args) => args,
        Err(_) => {
            shared.state.store(CoroutineState::Dead);
            debug!(coroutine = %shared.id, "coroutine dropped before first resume");
            return;
        }
    };

    let yielder = Yielder {
        shared: shared.clone(),
        inbound,
        outbound: outbound.clone(),
        _not_send: PhantomData,
    };
    CURRENT.with(|current| {
        *current.borrow_mut() = Some(Binding {
            id: shared.id,
            yielder: Box::new(yielder.clone()),
        });
    });

    let result = panic::catch_unwind(AssertUnwindSafe(|| body(&yielder, Handoff::from(args))));

    CURRENT.with(|current| current.borrow_mut().take());
    drop(yielder);
    shared.state.store(CoroutineState::Dead);

    match result {
        Ok(values) => {
            // The resumer may already be gone; nothing left to deliver then.
            let _ = outbound.send(Outbound::Values(values));
        }
        Err(payload) if payload.is::<Abandoned>() => {
            debug!(coroutine = %shared.id, "coroutine abandoned while suspended");
        }
        Err(payload) => match policy {
            PanicPolicy::Abort => {
                error!(
                    coroutine = %shared.id,
                    "coroutine body panicked: {}",
                    crate::util::panic_message(payload.as_ref())
                );
                std::process::abort();
            }
            PanicPolicy::Propagate => {
                debug!(coroutine = %shared.id, "coroutine body panicked, propagating");
                let _ = outbound.send(Outbound::Panicked(payload));
            }
        },
    }
}

#[cfg(test)]
mod tests;

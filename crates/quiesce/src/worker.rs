/*!
Serialization context for one attach.

A single dedicated thread owns every mutation of the session state. Callers
and notification sources hand it boxed jobs; each job runs under the state
lock and, once it returns, everyone blocked on [`Shared::wait_until`] is woken
to re-check their condition. Readers take the lock briefly and never see a
half-applied job.

The thread stops and is joined when the [`Worker`] is dropped.
*/

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::types::{AutomationError, AutomationResult};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
  Job(Job<S>),
  Stop,
}

/// State plus the condition variable that announces every applied job.
pub(crate) struct Shared<S> {
  state: Mutex<S>,
  changed: Condvar,
}

impl<S> Shared<S> {
  pub(crate) fn new(state: S) -> Self {
    Self {
      state: Mutex::new(state),
      changed: Condvar::new(),
    }
  }

  /// Read state. Never call platform functions inside the closure.
  #[inline]
  pub(crate) fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
    f(&self.state.lock())
  }

  pub(crate) fn lock(&self) -> MutexGuard<'_, S> {
    self.state.lock()
  }

  /// Block until the next job is applied or `deadline` passes.
  /// Returns `true` on timeout. `None` waits without a deadline.
  pub(crate) fn wait_until(&self, guard: &mut MutexGuard<'_, S>, deadline: Option<Instant>) -> bool {
    match deadline {
      Some(deadline) => self.changed.wait_until(guard, deadline).timed_out(),
      None => {
        self.changed.wait(guard);
        false
      }
    }
  }

  fn apply(&self, job: Job<S>) {
    job(&mut self.state.lock());
    self.changed.notify_all();
  }
}

/// Cloneable handle for queueing jobs onto a worker.
pub(crate) struct WorkerHandle<S> {
  tx: mpsc::Sender<Message<S>>,
}

impl<S> Clone for WorkerHandle<S> {
  fn clone(&self) -> Self {
    Self {
      tx: self.tx.clone(),
    }
  }
}

impl<S> std::fmt::Debug for WorkerHandle<S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WorkerHandle").finish_non_exhaustive()
  }
}

impl<S: Send + 'static> WorkerHandle<S> {
  /// Queue a job without waiting for it. Returns `false` if the worker has stopped.
  pub(crate) fn post(&self, job: impl FnOnce(&mut S) + Send + 'static) -> bool {
    self.tx.send(Message::Job(Box::new(job))).is_ok()
  }

  /// Queue a job and block until it has been applied.
  ///
  /// Must not be called from inside a job or while holding the state lock.
  pub(crate) fn run<R: Send + 'static>(
    &self,
    job: impl FnOnce(&mut S) -> R + Send + 'static,
  ) -> AutomationResult<R> {
    let (reply_tx, reply_rx) = mpsc::sync_channel(1);
    let queued = self.post(move |state| {
      drop(reply_tx.send(job(state)));
    });
    if !queued {
      return Err(AutomationError::InvalidSession);
    }
    reply_rx.recv().map_err(|_| AutomationError::InvalidSession)
  }
}

/// Owns the worker thread. Stops and joins on drop.
pub(crate) struct Worker<S> {
  handle: WorkerHandle<S>,
  thread: Option<JoinHandle<()>>,
}

impl<S> std::fmt::Debug for Worker<S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Worker").finish_non_exhaustive()
  }
}

impl<S: Send + 'static> Worker<S> {
  pub(crate) fn spawn(name: String, shared: Arc<Shared<S>>) -> AutomationResult<Self> {
    let (tx, rx) = mpsc::channel::<Message<S>>();

    let thread = thread::Builder::new()
      .name(name)
      .spawn(move || {
        while let Ok(Message::Job(job)) = rx.recv() {
          shared.apply(job);
        }
      })
      .map_err(|e| AutomationError::Internal(format!("failed to spawn session worker: {e}")))?;

    Ok(Self {
      handle: WorkerHandle { tx },
      thread: Some(thread),
    })
  }

  pub(crate) fn handle(&self) -> WorkerHandle<S> {
    self.handle.clone()
  }
}

impl<S> Drop for Worker<S> {
  fn drop(&mut self) {
    // Handles held elsewhere keep the channel open, so stop explicitly.
    drop(self.handle.tx.send(Message::Stop));
    if let Some(t) = self.thread.take() {
      if t.thread().id() == thread::current().id() {
        return;
      }
      drop(t.join());
    }
  }
}

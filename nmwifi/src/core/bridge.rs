//! The network thread.
//!
//! Every interaction with the network stack happens on one dedicated thread
//! running a single-threaded tokio runtime. Other threads reach it through
//! [`NetworkThread::call`] (blocking, returns a value) and
//! [`NetworkThread::call_async`] (fire and forget).
//!
//! The thread serves two sources, in priority order:
//!
//! 1. jobs derived from backend signals
//! 2. jobs queued by `call` / `call_async` and by timers
//!
//! Jobs run to completion one at a time, so module state is only ever
//! mutated by one job at a time. A job that is already queued when a signal
//! arrives still runs after it.

use futures::future::LocalBoxFuture;
use futures::stream::BoxStream;
use futures::{Future, FutureExt, StreamExt};
use log::{debug, error, warn};
use std::sync::mpsc::sync_channel;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::{mpsc, watch};

use crate::Result;
use crate::api::models::ConnectionError;
use crate::util::utils::mutex_lock;

/// A unit of work for the network thread.
pub(crate) type Job<C> = Box<dyn FnOnce(Arc<C>) -> LocalBoxFuture<'static, ()> + Send>;

/// Wraps a closure producing a future into a [`Job`].
pub(crate) fn job<C, F, Fut>(f: F) -> Job<C>
where
    F: FnOnce(Arc<C>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + 'static,
{
    Box::new(move |ctx| f(ctx).boxed_local())
}

/// Queues jobs for the network thread. Cheap to clone.
pub(crate) struct JobSender<C> {
    tx: mpsc::UnboundedSender<Job<C>>,
}

impl<C> Clone for JobSender<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<C> JobSender<C> {
    /// Queues a job. Returns `false` if the network thread is gone.
    pub(crate) fn enqueue(&self, job: Job<C>) -> bool {
        self.tx.send(job).is_ok()
    }
}

/// Receiving end of the job queue, consumed by [`NetworkThread::spawn`].
pub(crate) struct JobReceiver<C> {
    rx: mpsc::UnboundedReceiver<Job<C>>,
}

/// Creates the job queue. The sender can be handed to the context before
/// the thread exists.
pub(crate) fn job_queue<C>() -> (JobSender<C>, JobReceiver<C>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (JobSender { tx }, JobReceiver { rx })
}

/// Handle to the running network thread.
pub(crate) struct NetworkThread<C> {
    jobs: JobSender<C>,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl<C: Send + Sync + 'static> NetworkThread<C> {
    /// Starts the thread and runs `setup` on it before anything else.
    ///
    /// `setup` returns the stream of signal-derived jobs. This call blocks
    /// until `setup` has finished and returns its error, if any.
    pub(crate) fn spawn<S>(
        name: &str,
        ctx: Arc<C>,
        jobs: JobSender<C>,
        queue: JobReceiver<C>,
        setup: S,
    ) -> Result<Self>
    where
        S: FnOnce(Arc<C>) -> LocalBoxFuture<'static, Result<BoxStream<'static, Job<C>>>>
            + Send
            + 'static,
    {
        let (ready_tx, ready_rx) = sync_channel::<Result<()>>(1);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                };
                runtime.block_on(run(ctx, queue, shutdown_rx, setup, ready_tx));
                debug!("Network thread exiting");
            })?;

        let thread_id = handle.thread().id();
        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                error!("Network thread died during setup");
                let _ = handle.join();
                return Err(ConnectionError::BridgeUnavailable);
            }
        }

        Ok(Self {
            jobs,
            shutdown,
            handle: Mutex::new(Some(handle)),
            thread_id,
        })
    }

    /// Runs `f` on the network thread and waits for its result.
    ///
    /// Returns `None` if the thread is not running, if the job was dropped
    /// before completing, or if called from the network thread itself
    /// (which would otherwise deadlock).
    pub(crate) fn call<T, F, Fut>(&self, f: F) -> Option<T>
    where
        F: FnOnce(Arc<C>) -> Fut + Send + 'static,
        Fut: Future<Output = T> + 'static,
        T: Send + 'static,
    {
        if self.on_network_thread() {
            warn!("Blocking call issued from the network thread, ignoring");
            return None;
        }
        let (reply_tx, reply_rx) = sync_channel(1);
        let queued = self.jobs.enqueue(job(move |ctx| async move {
            let value = f(ctx).await;
            let _ = reply_tx.send(value);
        }));
        if !queued {
            debug!("Network thread not running, call() returns nothing");
            return None;
        }
        reply_rx.recv().ok()
    }

    /// Queues `f` on the network thread without waiting.
    ///
    /// Returns `false`, and logs, if the thread is not running.
    pub(crate) fn call_async<F, Fut>(&self, f: F) -> bool
    where
        F: FnOnce(Arc<C>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let queued = self.jobs.enqueue(job(f));
        if !queued {
            warn!("Network thread not running, dropping queued action");
        }
        queued
    }

    /// Waits until every job queued before this call has run.
    pub(crate) fn flush(&self) -> bool {
        self.call(|_| async {}).is_some()
    }

    /// Returns `true` when called from the network thread.
    pub(crate) fn on_network_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Stops the thread and waits for it to exit. Idempotent.
    pub(crate) fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let handle = mutex_lock(&self.handle).take();
        if let Some(handle) = handle {
            if self.on_network_thread() {
                // Dropping the last handle from inside a job; the loop exits
                // on its own once the job returns.
                return;
            }
            if handle.join().is_err() {
                error!("Network thread panicked");
            }
        }
    }
}

impl<C> Drop for NetworkThread<C> {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        let handle = mutex_lock(&self.handle).take();
        if let Some(handle) = handle
            && thread::current().id() != self.thread_id
            && handle.join().is_err()
        {
            error!("Network thread panicked");
        }
    }
}

async fn run<C, S>(
    ctx: Arc<C>,
    mut queue: JobReceiver<C>,
    mut shutdown: watch::Receiver<bool>,
    setup: S,
    ready: std::sync::mpsc::SyncSender<Result<()>>,
) where
    S: FnOnce(Arc<C>) -> LocalBoxFuture<'static, Result<BoxStream<'static, Job<C>>>>,
{
    let mut signals = match setup(ctx.clone()).await {
        Ok(signals) => {
            let _ = ready.send(Ok(()));
            signals
        }
        Err(e) => {
            error!("Network thread setup failed: {e}");
            let _ = ready.send(Err(e));
            return;
        }
    };
    drop(ready);
    debug!("Network thread ready");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            Some(job) = signals.next() => job(ctx.clone()).await,
            Some(job) = queue.rx.recv() => job(ctx.clone()).await,
            else => break,
        }
    }
}

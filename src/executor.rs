//! The main thread executor: a single-threaded task queue.
//!
//! The maze engine is not reentrant and not thread safe, so it is owned by the executor and
//! only ever touched by tasks the executor runs on the thread that created it. Producer
//! threads hold an `ExecutorHandle` and can do nothing but enqueue work.

use std::any::Any;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

use crossbeam::channel::{self, Receiver, Sender};

use crate::errors::*;

/// A unit of work run on the owning thread with exclusive access to the executor's target.
pub type Task<E> = Box<dyn FnOnce(&mut E) -> Result<()> + Send + 'static>;

pub struct MainThreadExecutor<E: 'static> {
    target: E,
    tasks: Receiver<Task<E>>,
    sender: Sender<Task<E>>,
    // Raw pointer marker: the executor, and the target it owns, stay on the creating thread.
    _owning_thread: PhantomData<*const ()>,
}

impl<E: 'static> MainThreadExecutor<E> {
    /// Must be called on the thread that will drain the queue.
    pub fn new(target: E) -> MainThreadExecutor<E> {
        let (sender, tasks) = channel::unbounded();
        MainThreadExecutor {
            target,
            tasks,
            sender,
            _owning_thread: PhantomData,
        }
    }

    pub fn handle(&self) -> ExecutorHandle<E> {
        ExecutorHandle { sender: self.sender.clone() }
    }

    /// Tasks waiting for the next `run_pending`.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Run every task queued at the moment of the call, in submission order.
    ///
    /// A task that fails or panics is logged and the drain carries on with the rest. Tasks
    /// enqueued while draining wait for the next call, so one tick is always bounded.
    pub fn run_pending(&mut self) -> usize {
        let queued = self.tasks.len();
        let mut ran = 0;

        for _ in 0..queued {
            let task = match self.tasks.try_recv() {
                Ok(task) => task,
                Err(_) => break,
            };
            ran += 1;

            let target = &mut self.target;
            match panic::catch_unwind(AssertUnwindSafe(move || task(target))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("main thread task failed: {}", e),
                Err(payload) => error!("main thread task panicked: {}", panic_message(&*payload)),
            }
        }

        ran
    }

    #[inline]
    pub fn target(&self) -> &E {
        &self.target
    }

    #[inline]
    pub fn target_mut(&mut self) -> &mut E {
        &mut self.target
    }

    /// Close the queue and hand back the target. Queued tasks are dropped without running and
    /// every outstanding handle starts failing with `ExecutorClosed`.
    pub fn shutdown(self) -> E {
        let dropped = self.tasks.len();
        if dropped > 0 {
            warn!("main thread executor shut down with {} tasks still queued", dropped);
        }
        self.target
    }
}

/// Cloneable, thread-safe way to enqueue work for a `MainThreadExecutor`.
pub struct ExecutorHandle<E: 'static> {
    sender: Sender<Task<E>>,
}

impl<E: 'static> Clone for ExecutorHandle<E> {
    fn clone(&self) -> ExecutorHandle<E> {
        ExecutorHandle { sender: self.sender.clone() }
    }
}

impl<E: 'static> ExecutorHandle<E> {
    pub fn schedule<F>(&self, task: F) -> Result<()>
        where F: FnOnce(&mut E) -> Result<()> + Send + 'static
    {
        self.sender
            .send(Box::new(task))
            .map_err(|_| ErrorKind::ExecutorClosed.into())
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}

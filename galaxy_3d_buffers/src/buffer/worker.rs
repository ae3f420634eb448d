/// Request worker - processes requests off the calling thread.
///
/// `RequestWorker` is a small pool of named threads fed through a crossbeam
/// channel. `process_async` is the one-shot form: one thread, one request.
/// Both hand back a `RequestTicket` whose `wait` yields the processed request.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use crossbeam_channel::{Receiver, Sender};
use crate::error::{Error, Result};
use crate::{engine_debug, engine_err, engine_trace};
use super::descriptor::BufferDescriptor;
use super::manager::BufferManager;
use super::request::{Request, StoreLocator};

const SOURCE: &str = "galaxy3d::RequestWorker";

type Completion = (Box<dyn Request>, Result<()>);

struct Job {
    request: Box<dyn Request>,
    reply: Sender<Completion>,
}

// ===== REQUEST TICKET =====

/// Handle on a request being processed elsewhere
pub struct RequestTicket {
    descriptor: Arc<BufferDescriptor>,
    receiver: Receiver<Completion>,
}

impl RequestTicket {
    fn new(descriptor: Arc<BufferDescriptor>) -> (Self, Sender<Completion>) {
        let (reply, receiver) = crossbeam_channel::bounded(1);
        (Self { descriptor, receiver }, reply)
    }

    /// Descriptor of the request, usable before completion
    pub fn descriptor(&self) -> Arc<BufferDescriptor> {
        self.descriptor.clone()
    }

    /// Whether the request has finished (successfully or not)
    pub fn is_done(&self) -> bool {
        !self.receiver.is_empty()
    }

    /// Block until the request is processed and return it
    pub fn wait(self) -> Result<Box<dyn Request>> {
        let (request, result) = self.receiver.recv().map_err(|_| {
            Error::WorkerUnavailable(format!("request '{}' was dropped before completion", self.descriptor.id()))
        })?;
        result.map(|()| request)
    }
}

// ===== REQUEST WORKER =====

/// Fixed pool of threads processing requests against one locator
pub struct RequestWorker {
    sender: Option<Sender<Job>>,
    threads: Vec<JoinHandle<()>>,
    locator: Arc<dyn StoreLocator>,
}

impl RequestWorker {
    /// Start `thread_count` worker threads (at least one)
    pub fn new(locator: Arc<dyn StoreLocator>, thread_count: usize) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let logger = locator.logger();
        let mut threads = Vec::with_capacity(thread_count.max(1));

        for index in 0..thread_count.max(1) {
            let receiver = receiver.clone();
            let locator = locator.clone();
            let handle = thread::Builder::new()
                .name(format!("galaxy3d-buffers-{}", index))
                .spawn(move || {
                    for job in receiver.iter() {
                        run(job.request, &*locator, &job.reply);
                    }
                })
                .map_err(|error| engine_err!(logger, SOURCE,
                    Error::WorkerUnavailable(format!("cannot start worker thread {}: {}", index, error))))?;
            threads.push(handle);
        }

        engine_debug!(logger, SOURCE, "Started {} request worker threads", threads.len());
        Ok(Self {
            sender: Some(sender),
            threads,
            locator,
        })
    }

    /// Pool sized by the manager's `worker_threads` setting
    pub fn for_manager(manager: &Arc<BufferManager>) -> Result<Self> {
        let threads = manager.config().worker_threads;
        Self::new(manager.clone(), threads)
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Queue a request for processing
    pub fn submit(&self, request: Box<dyn Request>) -> Result<RequestTicket> {
        let (ticket, reply) = RequestTicket::new(request.descriptor());
        let sender = self.sender.as_ref().ok_or_else(|| {
            Error::WorkerUnavailable("worker is shut down".to_string())
        })?;
        sender.send(Job { request, reply }).map_err(|_| {
            let logger = self.locator.logger();
            engine_err!(logger, SOURCE,
                Error::WorkerUnavailable("all worker threads have exited".to_string()))
        })?;
        Ok(ticket)
    }

    /// Finish queued requests and join the threads
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Closing the channel ends each thread's loop once the queue drains
        if self.sender.take().is_none() {
            return;
        }
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
        let logger = self.locator.logger();
        engine_trace!(logger, SOURCE, "Request worker stopped");
    }
}

impl Drop for RequestWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Process a single request on a dedicated thread
pub fn process_async(request: Box<dyn Request>, locator: Arc<dyn StoreLocator>) -> Result<RequestTicket> {
    let (ticket, reply) = RequestTicket::new(request.descriptor());
    let logger = locator.logger();

    thread::Builder::new()
        .name("galaxy3d-request".to_string())
        .spawn(move || run(request, &*locator, &reply))
        .map_err(|error| engine_err!(logger, SOURCE,
            Error::WorkerUnavailable(format!("cannot start request thread: {}", error))))?;
    Ok(ticket)
}

fn run(mut request: Box<dyn Request>, locator: &dyn StoreLocator, reply: &Sender<Completion>) {
    let result = request.process(locator);
    // The ticket may have been dropped; nobody is waiting then
    let _ = reply.send((request, result));
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;

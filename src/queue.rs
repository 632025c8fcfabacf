//! Bounded IQ work queue: LIFO processing, FIFO eviction.
//!
//! The receive callback must return promptly, while the pipeline costs
//! real CPU time per frame. The queue decouples the two with a fixed ring
//! of inline frames that (a) always processes the newest report first,
//! (b) silently drops the oldest report under overload, and (c) never
//! allocates on the submit path.
//!
//! [`IqRing`] is the bare data structure; [`IqWorkQueue`] adds the single
//! consumer: a background worker thread that drains the ring through a
//! statically parameterized [`IqProcessor`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::error::AodError;
use crate::iq::RawIqFrame;
use crate::Result;

/// Capacity of the IQ work queue.
pub const WORK_QUEUE_CAPACITY: usize = 8;

/// Outcome of a ring push, for the submitter to act on.
#[derive(Debug, Clone, Copy)]
pub struct PushOutcome {
    /// The oldest frame was overwritten to make room.
    pub evicted: bool,
    /// The ring was empty before this push; the consumer needs a wake-up.
    pub was_empty: bool,
}

/// Bounded ring buffer of raw IQ frames.
///
/// `head` indexes the newest frame and `tail` the oldest. A push advances
/// `head` modulo the capacity; when the ring is full, `tail` advances too
/// and the oldest frame is overwritten. Removal takes the newest frame
/// (LIFO), so under overload the freshest reports win and stale ones age
/// out at the tail.
#[derive(Debug)]
pub struct IqRing {
    buffer: [RawIqFrame; WORK_QUEUE_CAPACITY],
    head: usize,
    tail: usize,
    count: usize,
}

impl IqRing {
    pub fn new() -> IqRing {
        IqRing {
            buffer: [RawIqFrame::default(); WORK_QUEUE_CAPACITY],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Number of buffered frames.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == WORK_QUEUE_CAPACITY
    }

    /// Append a frame as the newest element, evicting the oldest when
    /// full.
    pub fn push(&mut self, frame: &RawIqFrame) -> PushOutcome {
        let outcome = PushOutcome {
            evicted: self.count == WORK_QUEUE_CAPACITY,
            was_empty: self.count == 0,
        };

        if outcome.evicted {
            self.tail = (self.tail + 1) % WORK_QUEUE_CAPACITY;
            self.head = (self.head + 1) % WORK_QUEUE_CAPACITY;
        } else {
            self.head = (self.head + 1) % WORK_QUEUE_CAPACITY;
            self.count += 1;
        }

        self.buffer[self.head] = *frame;
        outcome
    }

    /// Remove and return the newest frame.
    pub fn pop_newest(&mut self) -> Option<RawIqFrame> {
        if self.count == 0 {
            return None;
        }

        let frame = self.buffer[self.head];
        self.head = if self.head == 0 {
            WORK_QUEUE_CAPACITY - 1
        } else {
            self.head - 1
        };
        self.count -= 1;
        Some(frame)
    }
}

impl Default for IqRing {
    fn default() -> IqRing {
        IqRing::new()
    }
}

/// Consumer of dequeued raw IQ frames.
///
/// The work queue is specialized to one processor type at construction, so
/// the drain loop is monomorphic and allocation-free.
pub trait IqProcessor: Send {
    fn process(&mut self, frame: &RawIqFrame);
}

/// Adapter that lets a closure act as an [`IqProcessor`].
pub struct FnProcessor<F>(pub F);

impl<F> IqProcessor for FnProcessor<F>
where
    F: FnMut(&RawIqFrame) + Send,
{
    fn process(&mut self, frame: &RawIqFrame) {
        (self.0)(frame)
    }
}

struct Shared {
    ring: Mutex<IqRing>,
}

impl Shared {
    // The ring holds plain sample data; a panic mid-update cannot leave it
    // in a state worth poisoning over.
    fn lock(&self) -> MutexGuard<'_, IqRing> {
        match self.ring.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Single-consumer dispatch over an [`IqRing`].
///
/// `submit` is cheap enough for a receive callback: one short critical
/// section plus, when the ring transitions empty to non-empty, one
/// non-blocking wake-up token for the worker thread. The worker drains the
/// ring newest-first, processing each frame outside the lock, and re-arms
/// itself if frames arrived while it was busy.
pub struct IqWorkQueue {
    shared: Arc<Shared>,
    wake: Sender<()>,
    stop_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl IqWorkQueue {
    /// Spawn the worker thread and return the submit handle.
    pub fn start<P>(processor: P) -> Result<IqWorkQueue>
    where
        P: IqProcessor + 'static,
    {
        let shared = Arc::new(Shared {
            ring: Mutex::new(IqRing::new()),
        });
        // One pending token is enough: the worker re-checks the ring after
        // every drain.
        let (wake_tx, wake_rx) = crossbeam_channel::bounded::<()>(1);
        let stop_flag = Arc::new(AtomicBool::new(false));

        let thread = std::thread::Builder::new().name("aod-iq-worker".into()).spawn({
            let shared = shared.clone();
            let stop_flag = stop_flag.clone();
            let rearm = wake_tx.clone();
            move || worker_loop(shared, wake_rx, rearm, stop_flag, processor)
        })?;

        Ok(IqWorkQueue {
            shared,
            wake: wake_tx,
            stop_flag,
            thread: Some(thread),
        })
    }

    /// Queue a frame for processing.
    ///
    /// Called from the receive path. When the queue is full the oldest
    /// frame is evicted without signaling; the drop is deliberate
    /// back-pressure and only leaves a trace in the log.
    pub fn submit(&self, frame: &RawIqFrame) -> Result<()> {
        if self.stop_flag.load(Ordering::Relaxed) {
            return Err(AodError::WorkerStopped);
        }

        let outcome = self.shared.lock().push(frame);

        if outcome.evicted {
            log::trace!("IQ queue full, evicted oldest frame");
        }
        if outcome.was_empty {
            let _ = self.wake.try_send(());
        }
        Ok(())
    }

    /// Number of frames currently buffered.
    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the worker thread is still running.
    pub fn is_running(&self) -> bool {
        !self.stop_flag.load(Ordering::Relaxed)
    }

    /// Stop the worker and wait for it to finish.
    ///
    /// Subsequent submits fail with [`AodError::WorkerStopped`].
    pub fn stop(&mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for IqWorkQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<P>(
    shared: Arc<Shared>,
    wake: Receiver<()>,
    rearm: Sender<()>,
    stop_flag: Arc<AtomicBool>,
    mut processor: P,
) where
    P: IqProcessor,
{
    log::info!("IQ worker started");

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            break;
        }

        // Short timeout so the stop flag is observed promptly.
        match wake.recv_timeout(Duration::from_millis(100)) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }

        drain(&shared, &rearm, &mut processor);
    }

    log::info!("IQ worker stopped");
}

/// Drain the ring newest-first.
///
/// Each iteration extracts the newest frame and snapshots the emptiness
/// under one lock acquisition, then processes the frame outside the lock.
/// The loop exits on an empty snapshot; frames submitted during the final
/// processing step trigger a fresh wake-up token.
fn drain<P>(shared: &Shared, rearm: &Sender<()>, processor: &mut P)
where
    P: IqProcessor,
{
    loop {
        let (frame, exhausted) = {
            let mut ring = shared.lock();
            let frame = ring.pop_newest();
            let exhausted = ring.is_empty();
            (frame, exhausted)
        };

        if let Some(frame) = &frame {
            processor.process(frame);
        }

        if exhausted {
            break;
        }
    }

    let pending = !shared.lock().is_empty();
    if pending {
        let _ = rearm.try_send(());
    }
}

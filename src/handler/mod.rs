//! Incremental merge of shard payloads into a table snapshot.
//!
//! Each search shard hands its partial rows to [`TablePayloadHandler::add_queue`]
//! from its own thread. Payloads are queued and folded one at a time by
//! whichever thread holds the merge gate:
//!
//! ```text
//!   shard threads          pending merges        gate holder
//!  ┌──────────────┐       ┌─────────────┐       ┌──────────────────────────┐
//!  │ add_queue(p) ├──────►│ p1 p2 p3 …  ├──────►│ partition + reduce       │
//!  └──────────────┘       └─────────────┘       │ sort + trim              │
//!                                               │ publish Data (ArcSwap)   │
//!                                               └──────────────────────────┘
//! ```
//!
//! A thread that loses the race for the gate returns at once; the holder
//! drains everything queued, including payloads added while it was merging,
//! and re-checks the queue after releasing the gate so that nothing queued in
//! that window is stranded.
//!
//! Readers call [`TablePayloadHandler::data`] at any time and always see the
//! last complete snapshot: a fold publishes by swapping a single pointer and
//! a failed fold publishes nothing.

mod gate;

pub use gate::{MergeGate, MergeGuard};

use crate::{
    config::{MaxResults, StoreSize},
    error::Result,
    field::FieldSpec,
    item::{Item, RowKey},
    partition::ItemPartitioner,
    plan::FieldPlan,
    queue::UnsafePairQueue,
    store::{Data, ResultStoreCreator},
    terminate::HasTerminate,
};
use arc_swap::ArcSwap;
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant},
};

/// A batch of rows produced by one shard.
pub type Payload = UnsafePairQueue<RowKey, Item>;

/// Builds a payload keyed by each item's own row key.
pub fn payload<I>(items: I) -> Payload
where
    I: IntoIterator<Item = Item>,
{
    items
        .into_iter()
        .map(|item| (item.key.clone(), item))
        .collect()
}

pub struct TablePayloadHandler {
    plan: FieldPlan,
    max_results: Option<MaxResults>,
    store_size: StoreSize,

    // Every row ever merged, trimmed or not
    total_results: AtomicU64,
    pending_merges: Mutex<VecDeque<Payload>>,
    gate: MergeGate,
    cleared: AtomicBool,

    // Only locked by the gate holder
    retained: Mutex<Payload>,
    data: ArcSwap<Data>,

    idle_lock: Mutex<()>,
    idle: Condvar,
}

impl TablePayloadHandler {
    pub fn new(
        fields: &[FieldSpec],
        show_detail: bool,
        max_results: Option<MaxResults>,
        store_size: StoreSize,
    ) -> Result<Self> {
        let plan = FieldPlan::compile(fields, show_detail)?;
        Ok(Self::with_plan(plan, max_results, store_size))
    }

    pub fn with_plan(plan: FieldPlan, max_results: Option<MaxResults>, store_size: StoreSize) -> Self {
        Self {
            plan,
            max_results,
            store_size,
            total_results: AtomicU64::new(0),
            pending_merges: Mutex::new(VecDeque::new()),
            gate: MergeGate::new(),
            cleared: AtomicBool::new(false),
            retained: Mutex::new(Payload::new()),
            data: ArcSwap::from_pointee(Data::empty()),
            idle_lock: Mutex::new(()),
            idle: Condvar::new(),
        }
    }

    pub fn plan(&self) -> &FieldPlan {
        &self.plan
    }

    pub fn max_results(&self) -> Option<&MaxResults> {
        self.max_results.as_ref()
    }

    /// Queues `payload` for merging and merges pending payloads if no other
    /// thread is already doing so.
    ///
    /// Once `terminate` is raised all pending work is discarded instead.
    /// Errors from merges run on this thread are returned after the gate has
    /// been released; the snapshot stays at the last successful merge.
    pub fn add_queue(&self, payload: Payload, terminate: &dyn HasTerminate) -> Result<()> {
        let result = if terminate.is_terminated() || self.cleared.load(Ordering::SeqCst) {
            self.discard_pending();
            Ok(())
        } else {
            self.lock_pending().push_back(payload);
            self.merge_pending(terminate)
        };

        self.signal_waiters();
        result
    }

    fn merge_pending(&self, terminate: &dyn HasTerminate) -> Result<()> {
        let mut first_error = None;
        loop {
            let Some(guard) = self.gate.try_acquire() else {
                // The holder will pick up our payload.
                break;
            };
            if let Err(e) = self.drain_pending(terminate) {
                first_error.get_or_insert(e);
            }
            drop(guard);

            if terminate.is_terminated() {
                self.discard_pending();
            }

            // Payloads queued by threads that lost the gate to us after our
            // last poll would otherwise wait for the next add_queue.
            if self.lock_pending().is_empty() {
                break;
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn drain_pending(&self, terminate: &dyn HasTerminate) -> Result<()> {
        let mut first_error = None;

        while let Some(payload) = self.pop_pending() {
            if self.cleared.load(Ordering::SeqCst) {
                break;
            }

            let rows = payload.len();
            if let Err(e) = self.merge_queue(payload) {
                tracing::error!(rows = rows, error = %e, "Failed to merge payload");
                first_error.get_or_insert(e);
            }

            if terminate.is_terminated() {
                self.discard_pending();
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn merge_queue(&self, payload: Payload) -> Result<()> {
        let mut retained = self.retained.lock()?;
        let current = std::mem::take(&mut *retained);

        let rows = payload.len() as u64;
        let total = self.total_results.load(Ordering::SeqCst) + rows;

        match self.fold(current, payload, total) {
            Ok((remaining, data)) => {
                tracing::trace!(
                    rows = rows,
                    size = data.size(),
                    total_size = data.total_size(),
                    "Merged payload"
                );
                *retained = remaining;
                self.data.store(Arc::new(data));
                self.total_results.fetch_add(rows, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                // Pick up again from the last good snapshot.
                *retained = snapshot_queue(&self.data.load());
                Err(e)
            }
        }
    }

    fn fold(&self, current: Payload, payload: Payload, total: u64) -> Result<(Payload, Data)> {
        let mut partitioner = ItemPartitioner::new(&self.plan, Payload::new());
        partitioner.read(current)?;
        partitioner.read(payload)?;
        let reduced = partitioner.partition();

        let mut creator = ResultStoreCreator::new(&self.plan);
        creator.read(reduced)?;
        creator.trim(&self.store_size);

        let remaining = creator.remaining();
        Ok((remaining, creator.create(total)))
    }

    /// The latest published snapshot.
    pub fn data(&self) -> Arc<Data> {
        self.data.load_full()
    }

    /// Whether the search feeding this table can stop early.
    ///
    /// Only holds for tables with neither sorting nor grouping, where any
    /// `max_results[0]` rows are as good as any others.
    pub fn should_terminate_search(&self) -> bool {
        if self.plan.has_sort() || self.plan.has_group_by() {
            return false;
        }
        match &self.max_results {
            Some(max_results) => self.data.load().total_size() >= max_results.size(0) as u64,
            None => false,
        }
    }

    pub fn busy(&self) -> bool {
        !self.lock_pending().is_empty() || self.gate.is_held()
    }

    /// Blocks until no payload is pending or being merged, or `timeout`
    /// elapses. Returns whether the handler drained in time.
    pub fn wait_for_pending_work(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.idle_lock.lock().unwrap_or_else(PoisonError::into_inner);

        while self.busy() {
            guard = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::debug!(?timeout, "Timed out waiting for pending merges");
                        return false;
                    }
                    self.idle
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self.idle.wait(guard).unwrap_or_else(PoisonError::into_inner),
            };
        }
        true
    }

    /// Drops all merged and pending rows. The handler accepts no further payloads.
    pub fn clear(&self) {
        self.cleared.store(true, Ordering::SeqCst);
        self.discard_pending();
        self.total_results.store(0, Ordering::SeqCst);
        *self.retained.lock().unwrap_or_else(PoisonError::into_inner) = Payload::new();
        self.data.store(Arc::new(Data::empty()));
        self.signal_waiters();
    }

    fn lock_pending(&self) -> MutexGuard<'_, VecDeque<Payload>> {
        self.pending_merges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn pop_pending(&self) -> Option<Payload> {
        self.lock_pending().pop_front()
    }

    fn discard_pending(&self) {
        let discarded = {
            let mut pending = self.lock_pending();
            let count = pending.len();
            pending.clear();
            count
        };
        if discarded > 0 {
            tracing::warn!(payloads = discarded, "Discarded pending payloads after termination");
        }
    }

    fn signal_waiters(&self) {
        let _lock = self.idle_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.idle.notify_all();
    }
}

fn snapshot_queue(data: &Data) -> Payload {
    payload(data.items().cloned())
}

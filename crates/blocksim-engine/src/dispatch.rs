//! Dispatch loop and submission API
//!
//! [`Dispatcher`] owns the queue, scheduler, block store, buffer cache and
//! namespace. Callers submit requests with [`Dispatcher::submit`] and drive
//! service with [`Dispatcher::run_one_cycle`], which serves at most one
//! request per call.
//!
//! A cycle runs select, simulated service latency, execute, and finish in
//! that order. The busy flag is held for the whole cycle, latency included,
//! so a concurrent call observes [`Cycle::Busy`] and returns immediately.
//! The state lock is never held across the latency await.

use crate::events::{Event, EventSink, FailureKind, TracingSink};
use crate::namespace::{DirHandle, MemoryNamespace, Namespace};
use crate::outcome::{CacheOutcome, ExecOutcome};
use blocksim_common::{
    BlockAddr, CachePolicy, Error, Operation, ProcessId, ProcessState, Result, SchedulingPolicy,
    SimConfig,
};
use blocksim_sched::{
    DiskScheduler, IoProcess, IoRequest, Payload, ProcessSummary, RequestQueue, Selection,
};
use blocksim_storage::{BlockStore, BufferCache, CacheStats, DiskSnapshot};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Result of one dispatch cycle
#[derive(Debug)]
pub enum Cycle {
    /// Nothing was pending
    Idle,
    /// Another cycle was in progress; nothing was done
    Busy,
    /// One request was served successfully
    Served(Served),
}

/// A successfully served request
#[derive(Debug)]
pub struct Served {
    /// The process, now TERMINATED
    pub process: IoProcess,
    pub outcome: ExecOutcome,
    /// Head position after serving
    pub head: BlockAddr,
    pub seek_distance: u64,
}

/// Clears the busy flag when the cycle ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State touched only by the dispatcher
struct Core<N> {
    queue: RequestQueue,
    scheduler: DiskScheduler,
    store: BlockStore,
    cache: BufferCache,
    namespace: N,
    /// Source of submission positions
    positions: StdRng,
    /// Finished processes, oldest first
    history: Vec<IoProcess>,
}

/// Single-request-at-a-time disk access simulator
pub struct Dispatcher<N: Namespace = MemoryNamespace> {
    core: Mutex<Core<N>>,
    busy: AtomicBool,
    next_pid: AtomicU64,
    config: SimConfig,
    sink: Arc<dyn EventSink>,
}

impl Dispatcher<MemoryNamespace> {
    /// Dispatcher over an empty in-memory namespace
    pub fn in_memory(config: SimConfig) -> Result<Self> {
        Self::new(config, MemoryNamespace::new())
    }
}

impl<N: Namespace> Dispatcher<N> {
    /// Create a dispatcher reporting to `tracing`
    pub fn new(config: SimConfig, namespace: N) -> Result<Self> {
        Self::with_sink(config, namespace, Arc::new(TracingSink))
    }

    /// Create a dispatcher reporting to `sink`
    ///
    /// With `config.seed` set, block allocation and submission positions are
    /// reproducible. They use separate generators so that one stream does not
    /// shift the other.
    pub fn with_sink(config: SimConfig, namespace: N, sink: Arc<dyn EventSink>) -> Result<Self> {
        config.validate()?;

        let (store, positions) = match config.seed {
            Some(seed) => (
                BlockStore::with_seed(config.total_blocks, seed),
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (
                BlockStore::new(config.total_blocks),
                StdRng::from_entropy(),
            ),
        };

        let core = Core {
            queue: RequestQueue::new(),
            scheduler: DiskScheduler::new(config.scheduling_policy),
            store,
            cache: BufferCache::new(config.cache_capacity, config.cache_policy),
            namespace,
            positions,
            history: Vec::new(),
        };

        info!(
            total_blocks = config.total_blocks,
            block_size = config.block_size,
            cache_capacity = config.cache_capacity,
            cache_policy = %config.cache_policy,
            scheduling_policy = %config.scheduling_policy,
            latency_ms = config.service_latency_ms,
            "dispatcher initialized"
        );

        Ok(Self {
            core: Mutex::new(core),
            busy: AtomicBool::new(false),
            next_pid: AtomicU64::new(1),
            config,
            sink,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Queue a request at a random block position
    ///
    /// Returns a copy of the READY process. Invalid payloads are rejected
    /// before a process id is issued.
    pub fn submit(
        &self,
        operation: Operation,
        path: &str,
        file_name: &str,
        payload: Payload,
        user: &str,
    ) -> Result<IoProcess> {
        let process = {
            let mut core = self.core.lock();
            let position = core.positions.gen_range(0..self.config.total_blocks);
            let request = IoRequest::new(operation, path, file_name, payload, position)?;

            let id = ProcessId::new(self.next_pid.fetch_add(1, Ordering::Relaxed));
            let mut process = IoProcess::new(id, request, user);
            process.transition(ProcessState::Ready)?;
            core.queue.enqueue(process.clone());
            process
        };

        self.sink.emit(&Event::ProcessSubmitted {
            pid: process.id(),
            operation,
            file: file_name.to_string(),
            user: user.to_string(),
            block_position: process.block_position(),
        });
        Ok(process)
    }

    pub fn create_file(&self, path: &str, name: &str, blocks: u64, user: &str) -> Result<IoProcess> {
        self.submit(Operation::Create, path, name, Payload::Size(blocks), user)
    }

    pub fn update_file(
        &self,
        path: &str,
        name: &str,
        content: impl Into<Bytes>,
        user: &str,
    ) -> Result<IoProcess> {
        self.submit(
            Operation::Update,
            path,
            name,
            Payload::Content(content.into()),
            user,
        )
    }

    pub fn read_file(&self, path: &str, name: &str, user: &str) -> Result<IoProcess> {
        self.submit(Operation::Read, path, name, Payload::None, user)
    }

    pub fn delete_file(&self, path: &str, name: &str, user: &str) -> Result<IoProcess> {
        self.submit(Operation::Delete, path, name, Payload::None, user)
    }

    /// Serve at most one pending request
    ///
    /// Returns `Err` when the selected request fails; the failed process is
    /// already recorded in [`Dispatcher::history`] as BLOCKED or TERMINATED
    /// by then.
    pub async fn run_one_cycle(&self) -> Result<Cycle> {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            debug!("dispatch cycle already in progress");
            return Ok(Cycle::Busy);
        };

        let selection = {
            let mut core = self.core.lock();
            let Core {
                queue, scheduler, ..
            } = &mut *core;
            scheduler.select_next(queue)
        };
        let Some(Selection {
            mut process,
            policy,
            previous_head,
            head,
            seek_distance,
            reversed,
            wrapped,
        }) = selection
        else {
            return Ok(Cycle::Idle);
        };

        self.sink.emit(&Event::RequestScheduled {
            pid: process.id(),
            policy,
            previous_head,
            head,
            seek_distance,
            reversed,
            wrapped,
        });
        process.transition(ProcessState::Running)?;

        let latency = self.config.service_latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let result = self.core.lock().execute(&process, self.config.block_size);

        let next = match &result {
            Err(err) if err.blocks_process() => ProcessState::Blocked,
            _ => ProcessState::Terminated,
        };
        process.transition(next)?;

        match &result {
            Ok(outcome) => self.sink.emit(&outcome_event(&process, outcome)),
            Err(err) => {
                self.sink.emit(&Event::RequestFailed {
                    pid: process.id(),
                    file: process.request().file_name().to_string(),
                    kind: FailureKind::from(err),
                });
            }
        }
        self.sink.emit(&Event::ProcessFinished {
            pid: process.id(),
            state: next,
        });
        self.core.lock().history.push(process.clone());

        let outcome = result?;
        if matches!(outcome, ExecOutcome::Created { .. } | ExecOutcome::Deleted { .. }) {
            self.autosave();
        }

        Ok(Cycle::Served(Served {
            process,
            outcome,
            head,
            seek_distance,
        }))
    }

    /// Run cycles until the queue is empty
    ///
    /// Stops early if another cycle is already running.
    pub async fn run_until_idle(&self) -> Vec<Result<Served>> {
        let mut results = Vec::new();
        loop {
            match self.run_one_cycle().await {
                Ok(Cycle::Served(served)) => results.push(Ok(served)),
                Ok(Cycle::Idle | Cycle::Busy) => break,
                Err(err) => results.push(Err(err)),
            }
        }
        results
    }

    /// Persist occupancy if a snapshot path is configured
    fn autosave(&self) {
        let Some(path) = &self.config.snapshot_path else {
            return;
        };
        if let Err(err) = self.save_snapshot(path) {
            warn!(path = %path.display(), error = %err, "failed to save snapshot");
        }
    }

    /// Claim the busy flag for an operation that must not overlap a cycle
    fn exclusive(&self) -> Result<BusyGuard<'_>> {
        BusyGuard::acquire(&self.busy).ok_or(Error::Busy)
    }

    /// Drop every pending request, cached block, allocation and file
    ///
    /// Returns the number of pending requests dropped, or [`Error::Busy`]
    /// while a cycle is in flight.
    pub fn wipe(&self) -> Result<usize> {
        let _guard = self.exclusive()?;
        let dropped = {
            let mut core = self.core.lock();
            core.cache.clear();
            core.store.reset();
            core.namespace.clear();
            core.queue.drain().len()
        };
        self.sink.emit(&Event::Wiped {
            dropped_requests: dropped,
        });
        Ok(dropped)
    }

    /// Takes effect on the next selection
    pub fn set_policy(&self, policy: SchedulingPolicy) {
        self.core.lock().scheduler.set_policy(policy);
        self.sink.emit(&Event::PolicyChanged { policy });
    }

    /// Resident entries stay; only future evictions follow the new policy
    pub fn set_cache_policy(&self, policy: CachePolicy) {
        self.core.lock().cache.set_policy(policy);
        self.sink.emit(&Event::CachePolicyChanged { policy });
    }

    #[must_use]
    pub fn policy(&self) -> SchedulingPolicy {
        self.core.lock().scheduler.policy()
    }

    #[must_use]
    pub fn cache_policy(&self) -> CachePolicy {
        self.core.lock().cache.policy()
    }

    /// Block address of the most recently served request
    #[must_use]
    pub fn current_head_position(&self) -> BlockAddr {
        self.core.lock().scheduler.head()
    }

    /// Sum of every seek distance so far
    #[must_use]
    pub fn total_seek(&self) -> u64 {
        self.core.lock().scheduler.total_seek()
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.core.lock().cache.stats()
    }

    #[must_use]
    pub fn free_blocks(&self) -> u64 {
        self.core.lock().store.free_count()
    }

    #[must_use]
    pub fn owner_of(&self, block: BlockAddr) -> Option<String> {
        self.core.lock().store.owner_of(block).map(str::to_string)
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Pending processes in submission order
    #[must_use]
    pub fn pending(&self) -> Vec<ProcessSummary> {
        self.core
            .lock()
            .queue
            .peek_all()
            .iter()
            .map(IoProcess::summary)
            .collect()
    }

    /// Finished processes, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<ProcessSummary> {
        self.core
            .lock()
            .history
            .iter()
            .map(IoProcess::summary)
            .collect()
    }

    /// Inspect the namespace
    pub fn with_namespace<R>(&self, f: impl FnOnce(&N) -> R) -> R {
        f(&self.core.lock().namespace)
    }

    /// Change the namespace, e.g. to create directories
    ///
    /// Fails with [`Error::Busy`] while a cycle is in flight.
    pub fn with_namespace_mut<R>(&self, f: impl FnOnce(&mut N) -> R) -> Result<R> {
        let _guard = self.exclusive()?;
        Ok(f(&mut self.core.lock().namespace))
    }

    /// Write the occupancy bitmap to `path`
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let snapshot = self.core.lock().store.snapshot();
        snapshot.save(path)?;
        self.sink.emit(&Event::SnapshotSaved {
            used_blocks: snapshot.used_count(),
        });
        Ok(())
    }

    /// Restore occupancy from `path` and rebuild block owners
    ///
    /// Owners are replayed from the namespace's file list. A snapshot for a
    /// device of a different size is rejected and nothing changes, as is any
    /// load attempted while a cycle is in flight.
    pub fn load_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let _guard = self.exclusive()?;
        let snapshot = DiskSnapshot::load(path)?;

        let registered = {
            let mut core = self.core.lock();
            let Core {
                store, namespace, ..
            } = &mut *core;
            store.restore(&snapshot)?;

            let mut registered = 0u64;
            for (file, blocks) in namespace.all_files() {
                for block in blocks {
                    if store.register_owner(block, &file) {
                        registered += 1;
                    }
                }
            }
            registered
        };

        self.sink.emit(&Event::SnapshotLoaded {
            used_blocks: snapshot.used_count(),
            owners_registered: registered,
        });
        Ok(())
    }
}

impl<N: Namespace> Core<N> {
    fn execute(&mut self, process: &IoProcess, block_size: usize) -> Result<ExecOutcome> {
        let request = process.request();
        let dir = self
            .namespace
            .resolve_directory(request.path())
            .ok_or_else(|| not_found(request))?;

        match request.operation() {
            Operation::Create => self.create(&dir, request, block_size),
            Operation::Update => self.update(&dir, request, block_size),
            Operation::Read => self.read(&dir, request, block_size),
            Operation::Delete => self.delete(&dir, request),
        }
    }

    fn create(
        &mut self,
        dir: &DirHandle,
        request: &IoRequest,
        block_size: usize,
    ) -> Result<ExecOutcome> {
        let file = request.file_name();
        if self.namespace.file_exists(dir, file) {
            return Err(Error::DuplicateTarget {
                path: request.path().to_string(),
                file: file.to_string(),
            });
        }
        let size = request
            .requested_size()
            .ok_or_else(|| Error::invalid_request("CREATE without a size"))?;

        let blocks = self.store.allocate(size, file)?;
        self.namespace.insert_file(dir, file, blocks.clone());

        let zeroed = Bytes::from(vec![0u8; block_size]);
        let mut misses = 0u64;
        for &block in &blocks {
            if self.cache.get(block).is_none() {
                misses += 1;
            }
            self.cache.put(block, file, zeroed.clone());
        }
        let resident = blocks
            .iter()
            .filter(|&&block| self.cache.contains(block))
            .count();

        Ok(ExecOutcome::Created {
            blocks,
            misses,
            resident,
        })
    }

    fn update(
        &mut self,
        dir: &DirHandle,
        request: &IoRequest,
        block_size: usize,
    ) -> Result<ExecOutcome> {
        let file = request.file_name();
        let blocks = self
            .namespace
            .file_blocks(dir, file)
            .ok_or_else(|| not_found(request))?;
        let content = request.payload().cloned().unwrap_or_default();

        let (mut hits, mut misses) = (0u64, 0u64);
        for (index, &block) in blocks.iter().enumerate() {
            let chunk = block_chunk(&content, index, block_size);
            if self.cache.get(block).is_some() {
                hits += 1;
                self.cache.overwrite(block, chunk);
            } else {
                misses += 1;
                self.cache.put(block, file, chunk);
            }
        }

        Ok(ExecOutcome::Updated {
            cache: CacheOutcome::classify(hits, misses),
        })
    }

    fn read(
        &mut self,
        dir: &DirHandle,
        request: &IoRequest,
        block_size: usize,
    ) -> Result<ExecOutcome> {
        let file = request.file_name();
        let blocks = self
            .namespace
            .file_blocks(dir, file)
            .ok_or_else(|| not_found(request))?;

        let (mut hits, mut misses) = (0u64, 0u64);
        for &block in &blocks {
            if self.cache.get(block).is_some() {
                hits += 1;
            } else {
                misses += 1;
                self.cache
                    .put(block, file, Bytes::from(vec![0u8; block_size]));
            }
        }

        Ok(ExecOutcome::Read {
            cache: CacheOutcome::classify(hits, misses),
        })
    }

    fn delete(&mut self, dir: &DirHandle, request: &IoRequest) -> Result<ExecOutcome> {
        let released = self
            .namespace
            .remove_file(dir, request.file_name())
            .ok_or_else(|| not_found(request))?;

        for &block in &released {
            self.cache.remove(block);
        }
        self.store.release(&released);

        Ok(ExecOutcome::Deleted { released })
    }
}

fn not_found(request: &IoRequest) -> Error {
    Error::TargetNotFound {
        path: request.path().to_string(),
        file: request.file_name().to_string(),
    }
}

/// The `index`-th block-sized slice of `content`, zero padded
fn block_chunk(content: &Bytes, index: usize, block_size: usize) -> Bytes {
    let start = index.saturating_mul(block_size).min(content.len());
    let end = start.saturating_add(block_size).min(content.len());

    let mut chunk = BytesMut::zeroed(block_size);
    chunk[..end - start].copy_from_slice(&content[start..end]);
    chunk.freeze()
}

fn outcome_event(process: &IoProcess, outcome: &ExecOutcome) -> Event {
    let pid = process.id();
    let user = process.user().to_string();
    let file = process.request().file_name().to_string();

    match outcome {
        ExecOutcome::Created {
            blocks,
            misses,
            resident,
        } => Event::FileCreated {
            pid,
            user,
            path: process.request().path().to_string(),
            file,
            blocks: blocks.clone(),
            misses: *misses,
            resident: *resident,
        },
        ExecOutcome::Updated { cache } => Event::FileUpdated {
            pid,
            user,
            file,
            cache: *cache,
        },
        ExecOutcome::Read { cache } => Event::FileRead {
            pid,
            user,
            file,
            cache: *cache,
        },
        ExecOutcome::Deleted { released } => Event::FileDeleted {
            pid,
            user,
            file,
            released: released.len() as u64,
        },
    }
}

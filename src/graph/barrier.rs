//! The per-node phase barrier (§5): a sense-reversing busy-wait barrier
//! over atomics, kept intentionally busy-wait per the spec's §1 framing
//! ("a fixed-size worker pool coordinated through atomic flags and
//! busy-wait barriers" is named as one of the three things this
//! specification exists to define — see Design Notes and `DESIGN.md`).
//!
//! One [`Barrier`] is shared by the main thread and `n_threads - 1`
//! persistent helper threads for the duration of one [`super::Graph::compute`]
//! call. Each node that needs more than one task runs three rounds through
//! [`Barrier::run_node`] (`INIT`, `COMPUTE`, `FINALIZE`); single-task nodes
//! skip the barrier entirely and run inline on the main thread.
//!
//! The sense is a `generation` counter the main thread bumps exactly once
//! per phase. Each worker remembers the last generation it acted on and
//! blocks until `generation` differs from that value, so a worker runs a
//! phase exactly once per bump regardless of how the threads interleave —
//! unlike a plain `has_work` flag, which a fast worker could see cleared
//! and set again (or never cleared at all) before a slower worker has had
//! a chance to run the phase once.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU8, AtomicUsize, Ordering};

use crate::kernel::{NodeJob, Phase, TaskParams, dispatch};

fn phase_to_u8(phase: Phase) -> u8 {
    match phase {
        Phase::Init => 0,
        Phase::Compute => 1,
        Phase::Finalize => 2,
    }
}

fn phase_from_u8(v: u8) -> Phase {
    match v {
        0 => Phase::Init,
        1 => Phase::Compute,
        _ => Phase::Finalize,
    }
}

/// Shared state for one `compute` call's worker pool.
///
/// # Safety
///
/// `job` and the `work_ptr`/`work_len` pair are published by the main
/// thread via [`Barrier::run_phase`] *before* `generation` is bumped, and
/// observed by helper threads only *after* they see `generation` differ
/// from the value they last acted on. `generation`'s store uses
/// [`Ordering::Release`] and every helper's load uses [`Ordering::Acquire`],
/// so the publish happens-before every helper's read of
/// `job`/`work_ptr`/`work_len` — the same pattern [`std::sync::Arc`]'s
/// refcount/drop synchronization relies on. Workers and the main thread
/// then write disjoint byte ranges of the buffer `work_ptr` points at (per
/// each op's row/column partitioning contract), so no two threads ever
/// observe or mutate the same byte concurrently even though they each
/// reconstruct an aliasing `&mut [u8]` over it.
pub(crate) struct Barrier {
    n_threads: usize,
    phase: AtomicU8,
    generation: AtomicUsize,
    n_ready: AtomicUsize,
    stop: AtomicBool,
    job: UnsafeCell<*const NodeJob>,
    work_ptr: AtomicPtr<u8>,
    work_len: AtomicUsize,
}

unsafe impl Sync for Barrier {}

impl Barrier {
    pub(crate) fn new(n_threads: usize) -> Self {
        Self {
            n_threads,
            phase: AtomicU8::new(0),
            generation: AtomicUsize::new(0),
            n_ready: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
            job: UnsafeCell::new(std::ptr::null()),
            work_ptr: AtomicPtr::new(std::ptr::null_mut()),
            work_len: AtomicUsize::new(0),
        }
    }

    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Helper-thread body: loops until [`Barrier::request_stop`], running
    /// whatever phase the main thread last published exactly once per
    /// `generation` bump — `local_gen` is this worker's sense, and it only
    /// proceeds once `generation` has moved past it.
    pub(crate) fn worker_loop(&self, ith: usize) {
        let mut local_gen = 0usize;
        loop {
            loop {
                if self.stop.load(Ordering::Acquire) {
                    return;
                }
                let g = self.generation.load(Ordering::Acquire);
                if g != local_gen {
                    local_gen = g;
                    break;
                }
                std::hint::spin_loop();
            }

            let phase = phase_from_u8(self.phase.load(Ordering::Acquire));
            // SAFETY: see the struct's safety comment — observing a new
            // `generation` happens-after the main thread's publish of `job`.
            let job = unsafe { &*(*self.job.get()) };
            let work = self.work_slice();
            let mut params = TaskParams { phase, ith, nth: self.n_threads, work };
            dispatch(job, &mut params);

            self.n_ready.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn work_slice<'a>(&self) -> &'a mut [u8] {
        let ptr = self.work_ptr.load(Ordering::Acquire);
        let len = self.work_len.load(Ordering::Acquire);
        if ptr.is_null() {
            return &mut [];
        }
        // SAFETY: disjoint-write contract documented on the struct.
        unsafe { std::slice::from_raw_parts_mut(ptr, len) }
    }

    /// Runs one phase across every worker plus the main thread (`ith ==
    /// 0`), per §5's five-step protocol.
    ///
    /// Entry implies every worker has already reported ready for the
    /// *previous* phase (checked at the end of the previous call, or never
    /// started for the first), so `job`/`work_ptr`/`work_len` can be
    /// overwritten here with no worker still reading them.
    fn run_phase(&self, phase: Phase, job: &NodeJob, work: &mut [u8]) {
        // SAFETY: no worker reads `job` until it observes the `generation`
        // bump below, and every worker from the prior phase already
        // finished (this function only returns after `n_ready` reaches
        // `n_threads - 1`).
        unsafe {
            *self.job.get() = job as *const NodeJob;
        }
        self.work_ptr.store(work.as_mut_ptr(), Ordering::Release);
        self.work_len.store(work.len(), Ordering::Release);
        self.phase.store(phase_to_u8(phase), Ordering::Release);
        self.n_ready.store(0, Ordering::Release);
        self.generation.fetch_add(1, Ordering::Release);

        let main_work = self.work_slice();
        let mut params = TaskParams { phase, ith: 0, nth: self.n_threads, work: main_work };
        dispatch(job, &mut params);

        while self.n_ready.load(Ordering::Acquire) < self.n_threads - 1 {
            std::hint::spin_loop();
        }
    }

    /// Runs `job` through `INIT -> COMPUTE -> FINALIZE`, each phase
    /// synchronized across every worker before the next begins.
    pub(crate) fn run_node(&self, job: &NodeJob, work: &mut [u8]) {
        self.run_phase(Phase::Init, job, work);
        self.run_phase(Phase::Compute, job, work);
        self.run_phase(Phase::Finalize, job, work);
    }
}

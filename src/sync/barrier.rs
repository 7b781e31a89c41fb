use super::condvar::Condvar;
use super::errors::PoisonError;
use super::mutex::{Mutex, MutexGuard};
use log::*;
use std::fmt;
use std::thread;

/// Returned by [Barrier::wait]; exactly one thread per generation is the
/// leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult(bool);

impl BarrierWaitResult {
    pub fn is_leader(&self) -> bool {
        self.0
    }
}

/// Proof of arrival at a given generation, redeemed with
/// [Barrier::wait_arrival].
#[derive(Debug)]
#[must_use = "an arrival token has to be waited on"]
pub struct ArrivalToken {
    generation: u64,
    leader: bool,
}

struct BarrierState {
    /// Threads that arrived in the current generation.
    arrived: usize,
    /// Threads expected per generation; shrinks with `arrive_and_drop`.
    cohort: usize,
    generation: u64,
}

///
/// Cyclic rendezvous point for a fixed cohort of threads.
///
/// Waiters block until the cohort completes the current generation. The
/// generation counter advances exactly once per completed cohort, so a wake
/// meant for an earlier round never releases a late arriver.
pub struct Barrier {
    state: Mutex<BarrierState>,
    cvar: Condvar,
    completion: Option<Box<dyn Fn() + Send + Sync>>,
}

impl Barrier {
    ///
    /// A cohort of `n` threads. `n == 0` behaves like `n == 1`.
    pub fn new(n: usize) -> Self {
        Self::build(n, None)
    }

    ///
    /// Like [Barrier::new], running `completion` once per generation on the
    /// completing thread, before anybody is released.
    ///
    /// `completion` runs with the barrier's internal lock held. Calling back
    /// into the same barrier from it (`wait`, `arrive`, `generation`,
    /// `cohort_size`, even `{:?}`) deadlocks. If it panics, the generation
    /// still completes and the cohort is released; the panic then resumes on
    /// the completing thread.
    pub fn with_completion<F>(n: usize, completion: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(n, Some(Box::new(completion)))
    }

    fn build(n: usize, completion: Option<Box<dyn Fn() + Send + Sync>>) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                arrived: 0,
                cohort: n.max(1),
                generation: 0,
            }),
            cvar: Condvar::new(),
            completion,
        }
    }

    #[inline]
    fn state(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete_generation(&self, state: &mut BarrierState) {
        let end = GenerationEnd {
            cvar: &self.cvar,
            state,
        };
        if let Some(completion) = &self.completion {
            completion();
        }
        drop(end);
    }

    ///
    /// Registers an arrival without waiting.
    pub fn arrive(&self) -> ArrivalToken {
        let mut state = self.state();
        let generation = state.generation;
        state.arrived += 1;
        let leader = state.arrived >= state.cohort;
        if leader {
            self.complete_generation(&mut state);
        }
        ArrivalToken { generation, leader }
    }

    ///
    /// Blocks until the generation the token arrived in has completed.
    pub fn wait_arrival(&self, token: ArrivalToken) -> BarrierWaitResult {
        let state = self.state();
        let _state = self
            .cvar
            .wait_while(state, |s| s.generation == token.generation)
            .unwrap_or_else(PoisonError::into_inner);
        BarrierWaitResult(token.leader)
    }

    ///
    /// Arrives and blocks until the whole cohort has arrived.
    pub fn wait(&self) -> BarrierWaitResult {
        let token = self.arrive();
        self.wait_arrival(token)
    }

    ///
    /// Arrives for the current generation and leaves the cohort for every
    /// later one.
    pub fn arrive_and_drop(&self) {
        let mut state = self.state();
        state.cohort = state.cohort.saturating_sub(1).max(1);
        if state.arrived >= state.cohort {
            self.complete_generation(&mut state);
        }
    }

    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    pub fn cohort_size(&self) -> usize {
        self.state().cohort
    }
}

/// Closes the current generation and wakes the cohort when dropped, also
/// while unwinding out of the completion closure.
struct GenerationEnd<'a> {
    cvar: &'a Condvar,
    state: &'a mut BarrierState,
}

impl Drop for GenerationEnd<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            warn!(
                "barrier::completion_panicked::{}",
                self.state.generation
            );
        }
        self.state.arrived = 0;
        self.state.generation = self.state.generation.wrapping_add(1);
        debug!("barrier::generation::{}", self.state.generation);
        self.cvar.notify_all();
    }
}

impl fmt::Debug for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Barrier")
            .field("arrived", &state.arrived)
            .field("cohort", &state.cohort)
            .field("generation", &state.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::atomics::{AtomicCell, Ordering};
    use std::sync::Arc;

    #[test]
    fn single_thread_cohort_never_blocks() {
        let barrier = Barrier::new(1);
        assert!(barrier.wait().is_leader());
        assert!(barrier.wait().is_leader());
        assert_eq!(barrier.generation(), 2);

        let zero = Barrier::new(0);
        assert!(zero.wait().is_leader());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn exactly_one_leader_per_generation() {
        let n = 6;
        let barrier = Arc::new(Barrier::new(n));
        let leaders = Arc::new(AtomicCell::new(0_usize));

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let barrier = barrier.clone();
                let leaders = leaders.clone();
                thread::spawn(move || {
                    for _ in 0..3 {
                        if barrier.wait().is_leader() {
                            leaders.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(leaders.load(Ordering::Relaxed), 3);
        assert_eq!(barrier.generation(), 3);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn completion_runs_once_per_generation() {
        let runs = Arc::new(AtomicCell::new(0_usize));
        let r = runs.clone();
        let barrier = Arc::new(Barrier::with_completion(3, move || {
            r.fetch_add(1, Ordering::Relaxed);
        }));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    barrier.wait();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(runs.load(Ordering::Relaxed), 2);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn panicking_completion_still_releases_cohort() {
        let fired = Arc::new(AtomicCell::new(false));
        let runs = Arc::new(AtomicCell::new(0_usize));
        let (f, r) = (fired.clone(), runs.clone());
        let barrier = Arc::new(Barrier::with_completion(2, move || {
            r.fetch_add(1, Ordering::Relaxed);
            if !f.swap(true, Ordering::SeqCst) {
                panic!("completion failed");
            }
        }));

        let round = |barrier: &Arc<Barrier>| -> Vec<thread::Result<BarrierWaitResult>> {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let barrier = barrier.clone();
                    thread::spawn(move || barrier.wait())
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        };

        // The completing thread carries the panic, its partner is released.
        let first = round(&barrier);
        assert_eq!(first.iter().filter(|r| r.is_err()).count(), 1);
        assert!(first.iter().any(|r| matches!(r, Ok(res) if !res.is_leader())));
        assert_eq!(barrier.generation(), 1);
        assert_eq!(barrier.cohort_size(), 2);

        // Next round needs the full cohort again and completes normally.
        let second = round(&barrier);
        assert!(second.iter().all(|r| r.is_ok()));
        assert_eq!(second.iter().filter(|r| matches!(r, Ok(res) if res.is_leader())).count(), 1);
        assert_eq!(barrier.generation(), 2);
        assert_eq!(runs.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn split_arrive_and_wait() {
        let barrier = Barrier::new(2);
        let first = barrier.arrive();
        assert!(!first.leader);
        let second = barrier.arrive();
        assert!(second.leader);
        assert!(!barrier.wait_arrival(first).is_leader());
        assert!(barrier.wait_arrival(second).is_leader());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn arrive_and_drop_shrinks_cohort() {
        let barrier = Arc::new(Barrier::new(3));
        let b = barrier.clone();
        let stayer = thread::spawn(move || {
            b.wait();
            b.wait();
        });

        let token = barrier.arrive();
        barrier.arrive_and_drop();
        assert_eq!(barrier.cohort_size(), 2);
        let _ = barrier.wait_arrival(token);

        // Second generation only needs the remaining participant plus us.
        barrier.wait();
        stayer.join().unwrap();
    }
}

//! Single-threaded memoization cell for deferred computations.
//!
//! A producer that must run an expensive, possibly-noisy pipeline exactly
//! once and hand the same result to every caller keeps its state in a
//! [`Memo`]. The first caller wins `try_begin` and runs the pipeline;
//! concurrent callers park on `wait` and are woken by `complete`. WASM is
//! single-threaded, so `Rc<RefCell<..>>` is the whole synchronization story.

use std::cell::RefCell;
use std::rc::Rc;
use std::task::{Poll, Waker};

use futures::future::poll_fn;

struct MemoState<T> {
    value: Option<T>,
    running: bool,
    wakers: Vec<Waker>,
}

/// Shared once-cell with async waiters. Clones share state.
pub struct Memo<T> {
    state: Rc<RefCell<MemoState<T>>>,
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: Clone> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Memo<T> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(MemoState {
                value: None,
                running: false,
                wakers: Vec::new(),
            })),
        }
    }

    /// The computed value, if `complete` has run.
    pub fn value(&self) -> Option<T> {
        self.state.borrow().value.clone()
    }

    /// Claim the right to run the computation. Returns `true` for exactly
    /// one caller per cell lifetime.
    pub fn try_begin(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.running || state.value.is_some() {
            return false;
        }
        state.running = true;
        true
    }

    /// Publish the computed value and wake every parked waiter. Later calls
    /// are ignored: the first published value is final.
    pub fn complete(&self, value: T) {
        let wakers = {
            let mut state = self.state.borrow_mut();
            if state.value.is_some() {
                return;
            }
            state.value = Some(value);
            state.running = false;
            std::mem::take(&mut state.wakers)
        };
        for waker in wakers {
            waker.wake();
        }
    }

    /// Park until the value is published.
    pub async fn wait(&self) -> T {
        poll_fn(|cx| {
            let mut state = self.state.borrow_mut();
            match &state.value {
                Some(value) => Poll::Ready(value.clone()),
                None => {
                    state.wakers.push(cx.waker().clone());
                    Poll::Pending
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::LocalPool;
    use futures::task::LocalSpawnExt;

    #[test]
    fn begin_claims_exactly_once() {
        let memo: Memo<u32> = Memo::new();
        assert!(memo.try_begin());
        assert!(!memo.try_begin());
        memo.complete(7);
        assert!(!memo.try_begin());
        assert_eq!(memo.value(), Some(7));
    }

    #[test]
    fn first_completion_is_final() {
        let memo: Memo<u32> = Memo::new();
        assert!(memo.try_begin());
        memo.complete(1);
        memo.complete(2);
        assert_eq!(memo.value(), Some(1));
    }

    #[test]
    fn waiters_are_woken_with_the_published_value() {
        let memo: Memo<u32> = Memo::new();
        let mut pool = LocalPool::new();
        let spawner = pool.spawner();

        let results = Rc::new(RefCell::new(Vec::new()));
        for _ in 0..3 {
            let memo = memo.clone();
            let results = Rc::clone(&results);
            spawner
                .spawn_local(async move {
                    let value = memo.wait().await;
                    results.borrow_mut().push(value);
                })
                .unwrap();
        }

        pool.run_until_stalled();
        assert!(results.borrow().is_empty());

        memo.complete(42);
        pool.run_until_stalled();
        assert_eq!(*results.borrow(), vec![42, 42, 42]);
    }

    #[test]
    fn wait_after_completion_resolves_immediately() {
        let memo: Memo<u32> = Memo::new();
        memo.complete(9);
        assert_eq!(futures::executor::block_on(memo.wait()), 9);
    }
}

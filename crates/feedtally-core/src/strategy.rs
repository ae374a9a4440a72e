//! Ordered strategy lists: "first strategy that succeeds wins, else fall
//! through to the next one".
//!
//! The same shape recurs at several layers: an extraction rule chain falls
//! through to alternate phrasings when the specific pattern matches nothing,
//! a fetch chunk falls back from one batch request to per-item requests when
//! the batch response is unreadable, and the fetcher hands whatever a pass
//! left missing to a slower retry pass. [`StrategyChain`] implements the
//! three traversals once:
//!
//! | Method | Stops when |
//! |--------|-----------|
//! | [`StrategyChain::first_match`] | a strategy returns `Some` |
//! | [`StrategyChain::first_match_async`] | an async strategy returns `Ok(Some)` (errors abort) |
//! | [`StrategyChain::drain_async`] | no pending work remains (errors abort) |

use std::future::Future;

/// An ordered list of strategies of one type.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyChain<S> {
    strategies: Vec<S>,
}

/// Result of one strategy in [`StrategyChain::drain_async`]: finished items
/// plus the work it could not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partial<O, T> {
    pub done: Vec<O>,
    pub pending: Vec<T>,
}

impl<O, T> Partial<O, T> {
    pub fn new() -> Self {
        Self {
            done: Vec::new(),
            pending: Vec::new(),
        }
    }
}

impl<O, T> Default for Partial<O, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> StrategyChain<S> {
    pub fn new(strategies: Vec<S>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &[S] {
        &self.strategies
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn push(&mut self, strategy: S) {
        self.strategies.push(strategy);
    }

    pub fn prepend(&mut self, strategy: S) {
        self.strategies.insert(0, strategy);
    }

    /// Try each strategy in order; return the index and output of the first
    /// one that yields `Some`.
    pub fn first_match<T>(&self, mut attempt: impl FnMut(&S) -> Option<T>) -> Option<(usize, T)> {
        self.strategies
            .iter()
            .enumerate()
            .find_map(|(i, s)| attempt(s).map(|out| (i, out)))
    }

    /// Async variant of [`first_match`](Self::first_match). An `Err` from any
    /// strategy aborts the chain.
    pub async fn first_match_async<T, E, F, Fut>(&self, mut attempt: F) -> Result<Option<(usize, T)>, E>
    where
        F: FnMut(usize, &S) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        for (i, s) in self.strategies.iter().enumerate() {
            if let Some(out) = attempt(i, s).await? {
                return Ok(Some((i, out)));
            }
        }
        Ok(None)
    }

    /// Feed `pending` work to each strategy in turn, passing only what the
    /// previous strategy left unfinished. Returns everything finished and
    /// whatever is still pending after the last strategy.
    pub async fn drain_async<T, O, E, F, Fut>(
        &self,
        pending: Vec<T>,
        mut attempt: F,
    ) -> Result<Partial<O, T>, E>
    where
        F: FnMut(usize, &S, Vec<T>) -> Fut,
        Fut: Future<Output = Result<Partial<O, T>, E>>,
    {
        let mut outcome = Partial {
            done: Vec::new(),
            pending,
        };
        for (i, s) in self.strategies.iter().enumerate() {
            if outcome.pending.is_empty() {
                break;
            }
            let work = std::mem::take(&mut outcome.pending);
            let step = attempt(i, s, work).await?;
            outcome.done.extend(step.done);
            outcome.pending = step.pending;
        }
        Ok(outcome)
    }
}

impl<S> FromIterator<S> for StrategyChain<S> {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

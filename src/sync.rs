//! Task-combinator helpers used for independent I/O fan-out: joining two
//! lookups, awaiting a whole collection, and bounding the concurrency of
//! large scans (index hashing, tree walks).
//!
//! Cancellation uses `tokio-util`'s [`CancellationToken`]: a token travels
//! with the repository handle and is observed at suspension points, turning
//! into [`GitError::Cancelled`]. Dropping a future remains the native
//! cancellation path.

use std::future::Future;

use futures::{StreamExt, TryStreamExt, stream};
pub use tokio_util::sync::CancellationToken;

use crate::errors::GitError;

/// Await two fallible tasks concurrently, propagating the first failure.
pub async fn join<A, B, RA, RB>(a: A, b: B) -> Result<(RA, RB), GitError>
where
    A: Future<Output = Result<RA, GitError>>,
    B: Future<Output = Result<RB, GitError>>,
{
    tokio::try_join!(a, b)
}

/// Await three fallible tasks concurrently, propagating the first failure.
pub async fn join3<A, B, C, RA, RB, RC>(a: A, b: B, c: C) -> Result<(RA, RB, RC), GitError>
where
    A: Future<Output = Result<RA, GitError>>,
    B: Future<Output = Result<RB, GitError>>,
    C: Future<Output = Result<RC, GitError>>,
{
    tokio::try_join!(a, b, c)
}

/// Concurrent fan-out over a collection, unbounded.
pub async fn when_all<I, F, T>(futures: I) -> Result<Vec<T>, GitError>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, GitError>>,
{
    futures::future::try_join_all(futures).await
}

/// Concurrent fan-out with at most `limit` tasks in flight.
///
/// Results are returned in input order regardless of completion order.
pub async fn when_all_bounded<I, F, T>(limit: usize, futures: I) -> Result<Vec<T>, GitError>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, GitError>>,
{
    stream::iter(futures)
        .map(Ok::<_, GitError>)
        .try_buffered(limit.max(1))
        .try_collect()
        .await
}

/// A concurrency scope binding a cancellation token to a fan-out bound.
///
/// Long scans (working-directory hashing, recursive tree walks) run their
/// per-item work through a scope so both the bound and the token apply
/// uniformly.
#[derive(Clone)]
pub struct ConcurrentScope {
    token: CancellationToken,
    limit: usize,
}

impl ConcurrentScope {
    pub fn new(token: CancellationToken, limit: usize) -> ConcurrentScope {
        ConcurrentScope {
            token,
            limit: limit.max(1),
        }
    }

    /// Fail fast if the scope's token has fired.
    pub fn ensure_alive(&self) -> Result<(), GitError> {
        if self.token.is_cancelled() {
            Err(GitError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Run the futures with the scope's bound, checking cancellation before
    /// dispatching each item.
    pub async fn run_all<I, F, T>(&self, futures: I) -> Result<Vec<T>, GitError>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<T, GitError>>,
    {
        let token = self.token.clone();
        stream::iter(futures.into_iter().map(move |fut| {
            let token = token.clone();
            async move {
                if token.is_cancelled() {
                    return Err(GitError::Cancelled);
                }
                fut.await
            }
        }))
        .map(Ok::<_, GitError>)
        .try_buffered(self.limit)
        .try_collect()
        .await
    }
}

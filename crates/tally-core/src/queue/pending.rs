//! Pending - キューに積んだミューテーションの結果ハンドル
//!
//! # 設計
//! - キュー上の位置は `Pending` が作られた時点で確定している
//! - drop してもミューテーションは取り消されない（結果を捨てるだけ）
//! - キューを通さない no-op 操作は `Pending::ready` で即時に解決する

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use tokio::sync::oneshot;

use crate::error::TrackerError;

/// Resolves once the queued mutation has been applied (or has failed).
#[must_use = "the mutation runs regardless; await the handle to observe its result"]
pub struct Pending<T> {
    inner: BoxFuture<'static, Result<T, TrackerError>>,
}

impl<T: Send + 'static> Pending<T> {
    /// An already-settled handle; nothing was enqueued.
    pub fn ready(result: Result<T, TrackerError>) -> Self {
        Self {
            inner: future::ready(result).boxed(),
        }
    }

    pub(crate) fn waiting(rx: oneshot::Receiver<Result<T, TrackerError>>, queue: String) -> Self {
        Self {
            inner: rx
                .map(move |reply| match reply {
                    Ok(result) => result,
                    // The consumer went away before answering.
                    Err(_) => Err(TrackerError::QueueClosed(queue)),
                })
                .boxed(),
        }
    }

    pub fn map<U, F>(self, f: F) -> Pending<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Pending {
            inner: self.inner.map(move |result| result.map(f)).boxed(),
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T, TrackerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

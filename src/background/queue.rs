use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver, Sender, error::SendTimeoutError, error::TrySendError};

use crate::background::types::ResizeRequest;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("dispatch queue is full")]
    Full(ResizeRequest),
    #[error("dispatch queue is closed")]
    Closed(ResizeRequest),
}

/// Producer half of the bounded FIFO between submitters and the worker.
#[derive(Clone)]
pub struct DispatchSender {
    inner: Sender<ResizeRequest>,
    submit_timeout: Duration,
}

pub struct DispatchReceiver {
    inner: Receiver<ResizeRequest>,
}

/// Build a queue holding at most `capacity` pending requests.
///
/// A zero `submit_timeout` rejects immediately when the queue is full.
pub fn dispatch_queue(capacity: usize, submit_timeout: Duration) -> (DispatchSender, DispatchReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        DispatchSender {
            inner: tx,
            submit_timeout,
        },
        DispatchReceiver { inner: rx },
    )
}

impl DispatchSender {
    pub async fn dispatch(&self, request: ResizeRequest) -> Result<(), DispatchError> {
        if self.submit_timeout.is_zero() {
            return self.inner.try_send(request).map_err(|err| match err {
                TrySendError::Full(request) => DispatchError::Full(request),
                TrySendError::Closed(request) => DispatchError::Closed(request),
            });
        }
        self.inner
            .send_timeout(request, self.submit_timeout)
            .await
            .map_err(|err| match err {
                SendTimeoutError::Timeout(request) => DispatchError::Full(request),
                SendTimeoutError::Closed(request) => DispatchError::Closed(request),
            })
    }

    /// Requests accepted but not yet taken by the worker.
    pub fn queued(&self) -> usize {
        self.inner.max_capacity() - self.inner.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.inner.max_capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl DispatchReceiver {
    pub async fn recv(&mut self) -> Option<ResizeRequest> {
        self.inner.recv().await
    }

    /// Stop accepting requests and hand back everything still queued, oldest first.
    pub fn close_and_drain(&mut self) -> Vec<ResizeRequest> {
        self.inner.close();
        let mut drained = Vec::new();
        while let Ok(request) = self.inner.try_recv() {
            drained.push(request);
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::types::new_task_id;

    fn request(width: u32) -> ResizeRequest {
        ResizeRequest {
            task_id: new_task_id(),
            image_reference: "cat.png".into(),
            width,
            submitted_at: 0,
        }
    }

    #[tokio::test]
    async fn delivers_in_submission_order() {
        let (tx, mut rx) = dispatch_queue(4, Duration::ZERO);
        for width in [10, 20, 30] {
            tx.dispatch(request(width)).await.unwrap();
        }
        assert_eq!(tx.queued(), 3);
        for width in [10, 20, 30] {
            assert_eq!(rx.recv().await.unwrap().width, width);
        }
        assert_eq!(tx.queued(), 0);
    }

    #[tokio::test]
    async fn zero_timeout_rejects_when_full() {
        let (tx, _rx) = dispatch_queue(1, Duration::ZERO);
        tx.dispatch(request(10)).await.unwrap();
        let err = tx.dispatch(request(20)).await.unwrap_err();
        assert!(matches!(err, DispatchError::Full(r) if r.width == 20));
    }

    #[tokio::test]
    async fn full_queue_times_out() {
        let (tx, _rx) = dispatch_queue(1, Duration::from_millis(20));
        tx.dispatch(request(10)).await.unwrap();
        assert!(matches!(
            tx.dispatch(request(20)).await,
            Err(DispatchError::Full(_))
        ));
    }

    #[tokio::test]
    async fn waiting_submitter_gets_freed_slot() {
        let (tx, mut rx) = dispatch_queue(1, Duration::from_secs(5));
        tx.dispatch(request(10)).await.unwrap();

        let waiter = tokio::spawn({
            let tx = tx.clone();
            async move { tx.dispatch(request(20)).await }
        });
        assert_eq!(rx.recv().await.unwrap().width, 10);
        waiter.await.unwrap().unwrap();
        assert_eq!(rx.recv().await.unwrap().width, 20);
    }

    #[tokio::test]
    async fn drain_returns_pending_and_closes() {
        let (tx, mut rx) = dispatch_queue(4, Duration::ZERO);
        tx.dispatch(request(10)).await.unwrap();
        tx.dispatch(request(20)).await.unwrap();

        let drained = rx.close_and_drain();
        assert_eq!(drained.iter().map(|r| r.width).collect::<Vec<_>>(), vec![10, 20]);
        assert!(tx.is_closed());
        assert!(matches!(
            tx.dispatch(request(30)).await,
            Err(DispatchError::Closed(_))
        ));
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let (tx, _rx) = dispatch_queue(0, Duration::ZERO);
        assert_eq!(tx.capacity(), 1);
    }
}

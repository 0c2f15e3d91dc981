// ── Reactive device view streams ──
//
// Subscription handles vended by the `DeviceStore`.

mod filter;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

pub use filter::DeviceFilter;

use crate::model::DeviceView;

/// Shared snapshot of device views.
pub type ViewSnapshot = Arc<Vec<Arc<DeviceView>>>;

/// A subscription to the store's device views.
///
/// Provides both point-in-time access and change notification via
/// `changed()` or by converting to a `Stream`. The filter is applied to
/// every snapshot handed out.
pub struct DeviceStream {
    current: ViewSnapshot,
    receiver: watch::Receiver<ViewSnapshot>,
    filter: Arc<DeviceFilter>,
}

impl DeviceStream {
    pub(crate) fn new(receiver: watch::Receiver<ViewSnapshot>, filter: DeviceFilter) -> Self {
        let filter = Arc::new(filter);
        let current = apply_filter(&filter, &receiver.borrow());
        Self {
            current,
            receiver,
            filter,
        }
    }

    /// The snapshot captured at creation or by the last `changed()`.
    pub fn current(&self) -> &ViewSnapshot {
        &self.current
    }

    /// The latest snapshot (may have changed since creation).
    pub fn latest(&self) -> ViewSnapshot {
        apply_filter(&self.filter, &self.receiver.borrow())
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<ViewSnapshot> {
        self.receiver.changed().await.ok()?;
        let snap = apply_filter(&self.filter, &self.receiver.borrow_and_update());
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> DeviceWatchStream {
        DeviceWatchStream {
            inner: WatchStream::new(self.receiver),
            filter: self.filter,
        }
    }
}

fn apply_filter(filter: &DeviceFilter, views: &ViewSnapshot) -> ViewSnapshot {
    if matches!(filter, DeviceFilter::All) {
        return Arc::clone(views);
    }
    Arc::new(views.iter().filter(|v| filter.matches(v)).cloned().collect())
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields the current snapshot first, then a new one after each change.
pub struct DeviceWatchStream {
    inner: WatchStream<ViewSnapshot>,
    filter: Arc<DeviceFilter>,
}

impl Stream for DeviceWatchStream {
    type Item = ViewSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // WatchStream is Unpin, so pinning through &mut is fine.
        let filter = Arc::clone(&self.filter);
        Pin::new(&mut self.inner)
            .poll_next(cx)
            .map(|item| item.map(|snap| apply_filter(&filter, &snap)))
    }
}

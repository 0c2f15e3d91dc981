// ── Reactive device state ──
//
// Concurrent per-device storage with push-based view notification.

mod collection;
mod device_store;
mod reconcile;
mod refresh;

pub use device_store::{DeviceStore, SnapshotMark, StreamHealth};

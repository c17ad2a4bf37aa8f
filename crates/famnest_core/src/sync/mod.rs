//! In-process realtime fan-out for membership changes.
//!
//! Storage publishes role changes after commit; permission watchers rebuild
//! their engines from what they receive. Delivery is at-least-once with no
//! ordering guarantee across subscribers.

pub mod role_feed;

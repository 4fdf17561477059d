//! An in-process FIFO action queue.
//!
//! The queue hands items from any number of producers to a single streaming
//! consumer, preserving admission order. The module uses `tokio`'s
//! synchronization primitives under the hood.
//!
//! Producers call [`ActionQueue::enqueue`], which never blocks. Consumption
//! happens either through a background loop started with
//! [`ActionQueue::consume`], which applies a callback to every item in FIFO
//! order until cancelled, or through manual [`ActionQueue::dequeue`] calls, which
//! compete with the streaming consumer for the same storage.
//!
//! Every item carries the instant it was admitted (see [`Timestamped`]), which
//! allows [`ActionQueue::backlog_latency`] to report the age of the oldest
//! pending item as a backlog staleness metric.

#![warn(missing_docs)]

mod cancellation;
mod queue;
mod timestamped;

pub use self::{queue::ActionQueue, timestamped::Timestamped};

//! Background module - runs resize tasks off the request path
//!
//! Structure:
//! - `types`: Core data structures (ResizeRequest, ScratchGuard)
//! - `queue`: Bounded FIFO hand-off between submitters and the worker
//! - `processors`: Domain-specific processing logic (image)
//! - `flows`: The per-task resize pipeline
//! - `worker`: The single worker thread and its lifecycle
//! - `processor`: Submission and query entry points

pub mod flows;
pub mod processor;
pub mod processors;
pub mod queue;
pub mod types;
pub mod worker;

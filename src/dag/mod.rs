// src/dag/mod.rs

//! Task graph model.
//!
//! - [`task`] holds the `Task` record (one DAG node and its edges).
//! - [`store`] defines the read-only `TaskStore` the scheduler queries, plus
//!   an in-memory implementation.
//! - [`graph`] validates whole task sets and answers diagnostic queries
//!   (roots, topological order, reachability).

pub mod graph;
pub mod store;
pub mod task;

pub use graph::{reachable_from, root_ids, topological_order, validate_tasks};
pub use store::{InMemoryTaskStore, TaskStore};
pub use task::Task;

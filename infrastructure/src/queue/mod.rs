//! Job queue adapters

mod memory;

pub use memory::InMemoryJobQueue;

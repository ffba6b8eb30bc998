//! Run repository adapters
//!
//! Both adapters share one table set, so uniqueness and foreign-key rules
//! behave the same whether runs live in memory or in a JSON file.

mod json_file;
mod memory;
mod tables;

pub use json_file::JsonFileRunRepository;
pub use memory::InMemoryRunRepository;

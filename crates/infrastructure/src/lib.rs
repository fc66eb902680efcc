pub mod database;
pub mod in_memory;

pub use database::*;
pub use in_memory::InMemoryExecutionRepository;

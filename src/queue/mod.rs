pub mod allocator;
pub mod dispatcher;
pub mod display;
pub mod pagination;
pub mod pg_store;
pub mod store;

#[cfg(test)]
pub mod memory_store;

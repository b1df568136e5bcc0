//! Provides the storage resources backing the bus models.

pub mod memory;

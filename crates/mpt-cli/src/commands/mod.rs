pub mod allocation;
pub mod statistics;

// vectorlink-common: shared types and utilities for the VectorLink workspace

pub mod path;
pub mod types;

//! Background Tasks Module
//!
//! Work that runs after a caller has already been answered.
//!
//! # Tasks
//! - Revalidation: refreshes a cached value without blocking the caller

mod revalidate;

pub use revalidate::RevalidationScheduler;

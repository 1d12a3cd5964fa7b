/*! Accessibility vocabulary shared by snapshots and their consumers. */

mod role;

pub use role::Role;

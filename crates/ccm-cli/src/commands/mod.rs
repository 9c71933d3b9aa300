//! Node command implementations, grouped by the collaborator they drive.

pub mod admin;
pub mod config;
pub mod files;
pub mod info;
pub mod lifecycle;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

//! Possum - policy loader for a role-based authorization graph
//!
//! Turns a declarative policy (roles, resources, ownership, grants and
//! permits) into rows of a transactional store. This is the write path only;
//! permission checks happen elsewhere.

pub mod entities;
pub mod errors;
pub mod loader;
pub mod policy;
pub mod settings;
pub mod storage;

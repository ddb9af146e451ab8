//! Route modules, one per domain.

pub mod documents;
pub mod grants;
pub mod officers;
pub mod requests;

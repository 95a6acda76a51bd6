//! Domains module containing business logic organized by bounded contexts.
//!
//! `tools` and `prompts` are the two registries a client can discover and use;
//! `schema` is the parameter model they share.

pub mod prompts;
pub mod schema;
pub mod tools;

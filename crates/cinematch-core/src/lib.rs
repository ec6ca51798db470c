//! cinematch-core
//!
//! Domain types, error taxonomy and the traits the retrieval, reranking and
//! generation crates plug into. Nothing in here touches a model or an index.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod corpus;
pub mod error;
pub mod settings;
pub mod traits;
pub mod types;

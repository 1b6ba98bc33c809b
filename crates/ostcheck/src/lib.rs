//! Verification harness for remote order-statistic trees.
//!
//! A run applies a script of operations to a structure behind a
//! [`StructureClient`](ostcheck_client::StructureClient). After every step the
//! whole tree is rebuilt from per-node queries ([`reconstruct`]) and its
//! counts, heights and AVL balance are verified ([`checker`]). Scripts are
//! either the built-in regression table ([`script`]) or randomly generated
//! ([`generator`]).

pub mod checker;
pub mod config;
pub mod driver;
pub mod generator;
pub mod output;
pub mod reconstruct;
pub mod report;
pub mod script;
pub mod snapshot;

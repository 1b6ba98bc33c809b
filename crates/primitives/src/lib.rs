pub mod case;
pub mod handle;
pub mod jsonrpc;

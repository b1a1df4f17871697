pub mod error;
pub mod limits;
pub mod provider;
pub mod rpc;

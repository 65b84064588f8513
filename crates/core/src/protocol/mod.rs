mod rpc;
mod types;

pub use rpc::*;
pub use types::*;

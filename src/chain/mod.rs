pub mod decode;
pub mod rpc;

pub use rpc::RpcClient;

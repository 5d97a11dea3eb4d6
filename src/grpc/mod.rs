// tonic transport for client streams

pub mod call;
pub mod codec;

pub use call::GrpcClientStreamingCall;
pub use codec::StreamCodec;

use prost::Message;
use prost::bytes::{Buf, Bytes};
use std::marker::PhantomData;
use tonic::Status;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};

/// Encodes protobuf requests and hands the response back as raw bytes
pub struct StreamCodec<Req> {
    _request: PhantomData<fn(Req)>,
}

impl<Req> Default for StreamCodec<Req> {
    fn default() -> Self {
        Self {
            _request: PhantomData,
        }
    }
}

impl<Req> Codec for StreamCodec<Req>
where
    Req: Message + 'static,
{
    type Encode = Req;
    type Decode = Bytes;
    type Encoder = RequestEncoder<Req>;
    type Decoder = RawDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        RequestEncoder {
            _request: PhantomData,
        }
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawDecoder
    }
}

pub struct RequestEncoder<Req> {
    _request: PhantomData<fn(Req)>,
}

impl<Req: Message> Encoder for RequestEncoder<Req> {
    type Item = Req;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode(dst)
            .map_err(|e| Status::internal(format!("Encoding error: {}", e)))
    }
}

pub struct RawDecoder;

impl Decoder for RawDecoder {
    type Item = Bytes;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        Ok(Some(src.copy_to_bytes(src.remaining())))
    }
}

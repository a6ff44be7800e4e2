//! Body accumulation for the encoder.
//!
//! A record has at most one encoded body, or any number of form and multipart
//! parts that share one multipart body. The two never mix.

use crate::codec::Codec;
use crate::codec::multipart::MultipartWriter;
use crate::error::EncodeError;
use bytes::buf::Writer;
use bytes::{Bytes, BytesMut};
use std::io;
use tracing::warn;

/// The outgoing body, upgraded to a multipart writer by the first form part.
#[derive(Debug, Default)]
pub(crate) enum BodyBuilder {
    #[default]
    Empty,
    Encoded { bytes: Vec<u8>, codec: Codec },
    Multipart(MultipartWriter<Writer<BytesMut>>),
}

/// A finished body and the content type it was written with.
#[derive(Debug)]
pub(crate) struct FinishedBody {
    pub(crate) bytes: Bytes,
    pub(crate) content_type: Option<String>,
}

impl BodyBuilder {
    pub(crate) fn set_encoded(&mut self, bytes: Vec<u8>, codec: Codec) -> Result<(), EncodeError> {
        match self {
            BodyBuilder::Multipart(_) => Err(EncodeError::ConflictingBody),
            BodyBuilder::Encoded { .. } => {
                warn!("record has more than one body field, the last one wins");
                *self = BodyBuilder::Encoded { bytes, codec };
                Ok(())
            }
            BodyBuilder::Empty => {
                *self = BodyBuilder::Encoded { bytes, codec };
                Ok(())
            }
        }
    }

    pub(crate) fn multipart(&mut self) -> Result<&mut MultipartWriter<Writer<BytesMut>>, EncodeError> {
        match self {
            BodyBuilder::Encoded { .. } => return Err(EncodeError::ConflictingBody),
            BodyBuilder::Empty => *self = BodyBuilder::Multipart(MultipartWriter::in_memory()),
            BodyBuilder::Multipart(_) => {}
        }
        match self {
            BodyBuilder::Multipart(writer) => Ok(writer),
            BodyBuilder::Empty | BodyBuilder::Encoded { .. } => unreachable!("body was upgraded to multipart above"),
        }
    }

    pub(crate) fn is_multipart(&self) -> bool {
        matches!(self, BodyBuilder::Multipart(_))
    }

    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, BodyBuilder::Empty)
    }

    /// Closes a multipart writer and hands out the final bytes.
    pub(crate) fn finish(self) -> io::Result<FinishedBody> {
        match self {
            BodyBuilder::Empty => Ok(FinishedBody { bytes: Bytes::new(), content_type: None }),
            BodyBuilder::Encoded { bytes, codec } => {
                Ok(FinishedBody { bytes: Bytes::from(bytes), content_type: Some(codec.content_type().to_owned()) })
            }
            BodyBuilder::Multipart(writer) => {
                let content_type = writer.content_type();
                let bytes = writer.close()?.into_inner().freeze();
                Ok(FinishedBody { bytes, content_type: Some(content_type) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::multipart::{DEFAULT_MAX_MEMORY, MultipartForm, parse_boundary};

    #[test]
    fn empty_body() {
        let finished = BodyBuilder::default().finish().unwrap();
        assert!(finished.bytes.is_empty());
        assert!(finished.content_type.is_none());
    }

    #[test]
    fn multipart_is_closed_on_finish() {
        let mut body = BodyBuilder::default();
        body.multipart().unwrap().write_field("a", "1").unwrap();
        body.multipart().unwrap().write_field("b", "2").unwrap();
        assert!(body.is_multipart());

        let finished = body.finish().unwrap();
        let content_type = finished.content_type.unwrap();
        let boundary = parse_boundary(&content_type).unwrap();
        assert!(finished.bytes.ends_with(format!("\r\n--{boundary}--\r\n").as_bytes()));

        let form = MultipartForm::parse(&finished.bytes, &boundary, DEFAULT_MAX_MEMORY).unwrap();
        assert_eq!(form.values("b"), vec!["2"]);
    }

    #[test]
    fn body_and_form_conflict() {
        let mut body = BodyBuilder::default();
        body.set_encoded(b"{}".to_vec(), Codec::Json).unwrap();
        assert!(matches!(body.multipart(), Err(EncodeError::ConflictingBody)));

        let mut body = BodyBuilder::default();
        body.multipart().unwrap();
        assert!(matches!(body.set_encoded(b"{}".to_vec(), Codec::Json), Err(EncodeError::ConflictingBody)));
    }
}

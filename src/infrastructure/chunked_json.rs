// Chunked JSON streaming of widget frames
use crate::application::widget_coordinator::{WidgetFrames, WidgetReadout};
use async_compression::tokio::bufread::BrotliEncoder;
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use serde::Serialize;
use tokio::io::AsyncReadExt;

/// Create a chunked streaming response, one length-prefixed JSON document per item
pub async fn chunked_json_stream<S, T>(stream: S, compress: bool) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + Sync + 'static,
{
    let byte_stream = stream.then(move |item| async move { serialize_chunk(&item, compress).await });

    let body = Body::from_stream(byte_stream);

    // Chunks are compressed individually, so no Content-Encoding header is set:
    // clients must not try to decompress the HTTP stream as a whole.
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson-framed")
        .header(header::TRANSFER_ENCODING, "chunked")
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Serialize a single item to a chunk: 4-byte big-endian length, then the payload
pub async fn serialize_chunk<T: Serialize>(item: &T, compress: bool) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_vec(item).map_err(std::io::Error::other)?;

    let payload = if compress {
        let mut encoder = BrotliEncoder::new(std::io::Cursor::new(json));
        let mut compressed = Vec::new();
        encoder.read_to_end(&mut compressed).await?;
        compressed
    } else {
        json
    };

    let mut chunk = BytesMut::with_capacity(4 + payload.len());
    chunk.put_u32(payload.len() as u32);
    chunk.put_slice(&payload);

    Ok(chunk.freeze())
}

/// Readout stream for one widget: the current readout, then one per change until unmount
pub fn readout_stream(mut frames: WidgetFrames) -> impl Stream<Item = WidgetReadout> + Send + 'static {
    async_stream::stream! {
        yield frames.readout();
        while frames.changed().await {
            yield frames.readout();
        }
    }
}

/// Helper to create a streaming response from a widget's frames
pub async fn stream_widget_frames(frames: WidgetFrames, compress: bool) -> impl IntoResponse {
    match chunked_json_stream(readout_stream(frames), compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

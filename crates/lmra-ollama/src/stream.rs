//! NDJSON decoding of a streaming chat body.
//!
//! Ollama writes one JSON object per line, but transport fragments do not
//! respect line boundaries.  Lines are reassembled with [`LinesCodec`];
//! a line that is not valid JSON is logged and skipped so one corrupt line
//! never aborts the session.  Transport errors end the stream with an `Err`.

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt, TryStreamExt};
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tracing::warn;

use crate::error::OllamaError;
use crate::types::ChatChunk;

/// Boxed stream of decoded chat lines.
pub type ChunkStream = BoxStream<'static, Result<ChatChunk, OllamaError>>;

/// Longest single NDJSON line accepted from the runner.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Turn a raw byte stream into decoded [`ChatChunk`]s.
pub fn decode_ndjson<S, E>(body: S) -> ChunkStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let reader = StreamReader::new(body.map_err(std::io::Error::other));
    FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_BYTES))
        .filter_map(|line| async move {
            match line {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        return None;
                    }
                    match serde_json::from_str::<ChatChunk>(line) {
                        Ok(chunk) => match chunk.error {
                            Some(message) => Some(Err(OllamaError::Stream(message))),
                            None => Some(Ok(chunk)),
                        },
                        Err(e) => {
                            warn!(error = %e, line_len = line.len(), "skipping malformed stream line");
                            None
                        }
                    }
                }
                Err(e) => Some(Err(OllamaError::Stream(e.to_string()))),
            }
        })
        .boxed()
}

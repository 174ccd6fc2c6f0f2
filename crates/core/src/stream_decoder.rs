//! Streamed Response Decoder
//!
//! Turns the chunked body of a `POST /chat` response into a lazy sequence of
//! [`StreamEvent`]s. Frames are separated by a blank line and carry a
//! `data: ` payload that is either the `[DONE]` sentinel or a JSON object with
//! an optional `token` and an optional `error` field:
//!
//! ```text
//! data: {"token": "Hel"}
//!
//! data: {"token": "lo"}
//!
//! data: [DONE]
//!
//! ```
//!
//! Chunks may split frames, lines and even UTF-8 code points at any byte; the
//! decoded event sequence only depends on the concatenated bytes.

use futures::{Stream, StreamExt, stream};
use serde::Deserialize;
use std::collections::VecDeque;
use tracing::warn;

const FRAME_DELIMITER: &str = "\n\n";
const PAYLOAD_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// A decoded protocol event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A piece of the assistant reply, in arrival order.
    Token(String),
    /// The backend reported a failure inside the stream.
    Error(String),
    /// The sentinel frame; nothing follows it.
    Done,
}

#[derive(Deserialize, Debug)]
struct FramePayload {
    token: Option<String>,
    error: Option<String>,
}

/// Incremental UTF-8 decoding that tolerates code points split across chunks.
#[derive(Debug, Default)]
struct Utf8Accumulator {
    pending: Vec<u8>,
}

impl Utf8Accumulator {
    /// Decodes `chunk` (prefixed by any bytes held back from the previous call)
    /// into `out`. An incomplete trailing sequence is kept for the next call,
    /// invalid sequences become U+FFFD.
    fn decode_into(&mut self, chunk: &[u8], out: &mut String) {
        self.pending.extend_from_slice(chunk);
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    rest = &[];
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            rest = tail;
                            break;
                        }
                    }
                }
            }
        }
        self.pending = rest.to_vec();
    }
}

/// Outcome of decoding one complete frame.
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Event(StreamEvent),
    Ignored,
}

/// The buffering half of the decoder, independent of any I/O.
///
/// Feed it chunks with [`FrameDecoder::push`]; it returns the events of every
/// frame completed by that chunk and keeps the unterminated remainder.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    utf8: Utf8Accumulator,
    buffer: String,
    finished: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the sentinel has been seen. Once true, further input is ignored.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Appends a chunk and returns the events of all frames it completes.
    ///
    /// Decoding stops at the sentinel: frames after `[DONE]` in the same chunk
    /// are dropped and the returned list ends with [`StreamEvent::Done`].
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.utf8.decode_into(chunk, &mut self.buffer);

        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].find(FRAME_DELIMITER) {
            let frame = &self.buffer[consumed..consumed + offset];
            consumed += offset + FRAME_DELIMITER.len();

            if let Frame::Event(event) = decode_frame(frame) {
                let done = event == StreamEvent::Done;
                events.push(event);
                if done {
                    self.finished = true;
                    self.buffer.clear();
                    return events;
                }
            }
        }
        self.buffer.drain(..consumed);
        events
    }

    /// Bytes of an unterminated frame still held in the buffer.
    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

fn decode_frame(raw: &str) -> Frame {
    let line = raw.trim();
    let Some(data) = line.strip_prefix(PAYLOAD_PREFIX) else {
        return Frame::Ignored;
    };
    let data = data.trim();
    if data.is_empty() {
        return Frame::Ignored;
    }
    if data == DONE_SENTINEL {
        return Frame::Event(StreamEvent::Done);
    }

    match serde_json::from_str::<FramePayload>(data) {
        Ok(FramePayload {
            error: Some(message),
            ..
        }) if !message.is_empty() => Frame::Event(StreamEvent::Error(message)),
        Ok(FramePayload {
            token: Some(token), ..
        }) if !token.is_empty() => Frame::Event(StreamEvent::Token(token)),
        Ok(_) => Frame::Ignored,
        Err(e) => {
            warn!(payload = %data, error = %e, "Dropping undecodable stream frame");
            Frame::Ignored
        }
    }
}

struct DecodeState<S> {
    source: S,
    decoder: FrameDecoder,
    ready: VecDeque<StreamEvent>,
    exhausted: bool,
}

/// Wraps a chunked byte source into a lazy, single-pass stream of events.
///
/// The source is only polled when no decoded event is waiting, so a consumer
/// that stops early never reads further chunks. The stream ends after
/// [`StreamEvent::Done`], after the source completes (an unterminated trailing
/// frame is discarded), or after yielding the first source error.
pub fn decode_events<S, B, E>(source: S) -> impl Stream<Item = Result<StreamEvent, E>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + Unpin,
    B: AsRef<[u8]> + Send,
    E: Send,
{
    let state = DecodeState {
        source,
        decoder: FrameDecoder::new(),
        ready: VecDeque::new(),
        exhausted: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.ready.pop_front() {
                return Some((Ok(event), state));
            }
            if state.exhausted || state.decoder.is_finished() {
                return None;
            }
            match state.source.next().await {
                Some(Ok(chunk)) => {
                    state.ready.extend(state.decoder.push(chunk.as_ref()));
                }
                Some(Err(e)) => {
                    state.exhausted = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.exhausted = true;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn decode_chunks<B: AsRef<[u8]> + Send>(chunks: Vec<B>) -> Vec<StreamEvent> {
        let source = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, std::io::Error>(c.as_ref().to_vec())),
        );
        block_on(
            decode_events(source)
                .map(|event| event.unwrap())
                .collect::<Vec<_>>(),
        )
    }

    fn token(s: &str) -> StreamEvent {
        StreamEvent::Token(s.to_string())
    }

    #[test]
    fn test_cross_chunk_frame_reassembly() {
        let events = decode_chunks(vec![
            "data: {\"token\":\"Hel",
            "lo\"}\n\ndata: [DONE]\n\n",
        ]);
        assert_eq!(events, vec![token("Hello"), StreamEvent::Done]);
    }

    #[test]
    fn test_chunk_boundary_independence() {
        let body = "data: {\"token\":\"caf\u{e9} \"}\n\n\
                    data: not json\n\n\
                    : comment\n\n\
                    data: {\"token\":\"\u{1f600}\"}\n\n\
                    data: {\"error\":\"OpenAI error: boom\"}\n\n\
                    data: {\"token\":\"!\"}\n\n\
                    data: [DONE]\n\n"
            .as_bytes();

        let whole = decode_chunks(vec![body]);
        assert_eq!(
            whole,
            vec![
                token("caf\u{e9} "),
                token("\u{1f600}"),
                StreamEvent::Error("OpenAI error: boom".to_string()),
                token("!"),
                StreamEvent::Done,
            ]
        );

        for size in 1..=body.len() {
            let chunks: Vec<&[u8]> = body.chunks(size).collect();
            assert_eq!(decode_chunks(chunks), whole, "chunk size {size}");
        }
        for split in 0..=body.len() {
            let (a, b) = body.split_at(split);
            assert_eq!(decode_chunks(vec![a, b]), whole, "split at {split}");
        }
    }

    #[test]
    fn test_malformed_frame_does_not_affect_later_frames() {
        let events = decode_chunks(vec![
            "data: {\"token\": broken\n\ndata: {\"token\":\"ok\"}\n\n",
        ]);
        assert_eq!(events, vec![token("ok")]);
    }

    #[test]
    fn test_done_stops_decoding_rest_of_chunk() {
        let events = decode_chunks(vec![
            "data: {\"token\":\"a\"}\n\ndata: [DONE]\n\ndata: {\"token\":\"b\"}\n\n",
            "data: {\"token\":\"c\"}\n\n",
        ]);
        assert_eq!(events, vec![token("a"), StreamEvent::Done]);
    }

    #[test]
    fn test_done_stops_reading_the_source() {
        let pulled = std::sync::atomic::AtomicUsize::new(0);
        let chunks = vec!["data: [DONE]\n\n", "data: {\"token\":\"late\"}\n\n"];
        let source = stream::iter(chunks).map(|c| {
            pulled.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok::<_, std::io::Error>(c.as_bytes())
        });

        let events: Vec<_> = block_on(decode_events(source).collect::<Vec<_>>());
        assert_eq!(events.len(), 1);
        assert_eq!(pulled.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_truncated_trailing_frame_is_discarded() {
        let events = decode_chunks(vec!["data: {\"token\":\"a\"}\n\ndata: {\"token\":\"b\"}"]);
        assert_eq!(events, vec![token("a")]);
    }

    #[test]
    fn test_error_event_does_not_end_sequence() {
        let events = decode_chunks(vec![
            "data: {\"error\":\"bad\"}\n\ndata: {\"token\":\"after\"}\n\n",
        ]);
        assert_eq!(
            events,
            vec![StreamEvent::Error("bad".to_string()), token("after")]
        );
    }

    #[test]
    fn test_ignored_payloads() {
        let events = decode_chunks(vec![
            "data:\n\nevent: ping\n\ndata: {}\n\ndata: {\"token\":\"\"}\n\ndata: 42\n\ndata: {\"token\":5}\n\n",
        ]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_error_takes_precedence_over_token() {
        let events = decode_chunks(vec!["data: {\"token\":\"x\",\"error\":\"y\"}\n\n"]);
        assert_eq!(events, vec![StreamEvent::Error("y".to_string())]);
    }

    #[test]
    fn test_invalid_utf8_becomes_replacement_character() {
        let events = decode_chunks(vec![&b"data: {\"token\":\"a\xffb\"}\n\n"[..]]);
        assert_eq!(events, vec![token("a\u{fffd}b")]);
    }

    #[test]
    fn test_source_error_is_yielded_and_ends_stream() {
        let source = stream::iter(vec![
            Ok(b"data: {\"token\":\"a\"}\n\n".to_vec()),
            Err("connection reset"),
            Ok(b"data: {\"token\":\"b\"}\n\n".to_vec()),
        ]);
        let items: Vec<_> = block_on(decode_events(source).collect::<Vec<_>>());
        assert_eq!(items, vec![Ok(token("a")), Err("connection reset")]);
    }

    #[test]
    fn test_frame_decoder_keeps_pending_fragment() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"tok").is_empty());
        assert_eq!(decoder.pending(), "data: {\"tok");
        assert_eq!(decoder.push(b"en\":\"x\"}\n\n"), vec![token("x")]);
        assert_eq!(decoder.pending(), "");
        assert!(!decoder.is_finished());
    }
}

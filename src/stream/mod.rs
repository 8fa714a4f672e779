//! Upstream event-stream parsing and response synthesis.
//!
//! The upstream is always fully buffered before we touch it (see
//! [`crate::config`]'s Non-goals around true token streaming); this module
//! turns that buffer into a [`MessagesResponse`][crate::models::response::MessagesResponse]
//! or a synthesized pseudo-stream of [`StreamEvent`][crate::models::stream::StreamEvent]s.

pub mod event_parser;
pub mod response;

pub use event_parser::{parse_buffer, ParsedResponse, ToolCall};
pub use response::{build_pseudo_stream, build_response};

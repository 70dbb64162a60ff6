//! # Types Module
//!
//! Protocol-independent request and result types.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat turn with role and content |
//! | [`ChatRequest`] | Messages, model, temperature and token budget |
//! | [`NormalizedResult`] | `Success` / `Error` outcome of a dispatch |
//! | [`ChatResponse`] | Native or OpenAI-compatible answer |
//!
//! ## Example
//!
//! ```rust
//! use resilient_llm_backend::types::{ChatRequest, Message, NormalizedResult};
//!
//! let request = ChatRequest::new(
//!     vec![Message::system("Answer tersely."), Message::user("Ping?")],
//!     "phi3:mini",
//! )
//! .with_temperature(0.2);
//! assert_eq!(request.native_payload()["stream"], false);
//!
//! let result = NormalizedResult::native("Pong.");
//! assert_eq!(result.to_envelope()["status"], "success");
//! ```

pub mod message;
pub mod request;
pub mod response;

pub use message::{Message, MessageRole};
pub use request::ChatRequest;
pub use response::{ChatResponse, NormalizedResult};

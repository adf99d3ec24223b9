//! # Portico Middleware
//!
//! The composable dispatch pipeline every inbound call flows through.
//!
//! A [`Chain`] is an ordered sequence of [`Middleware`] values composed over
//! a terminal [`Handler`](portico_core::Handler) by an explicit fold. The
//! nesting order is fixed and documented: **the earlier-declared middleware
//! is the outermost**. It observes the call first on the way in and the
//! result last on the way out.
//!
//! ```text
//! call ──▶ layer 1 ──▶ layer 2 ──▶ ... ──▶ layer N ──▶ terminal handler
//!             ▲                                             │
//! reply ◀─────┴──────────────◀──────────────◀───────────────┘
//! ```
//!
//! ## Built-in layers
//!
//! | Layer                 | Purpose                                        |
//! |-----------------------|------------------------------------------------|
//! | [`Recovery`]          | Contain panics; never let a call abort the server |
//! | [`StatusTranslation`] | Map raw application errors to native [`Status`](portico_core::Status) |
//! | [`Timeout`]           | Publish a per-call deadline (cooperative)      |
//!
//! The standard chain ([`Chain::standard`]) places recovery outermost so it
//! also contains faults raised inside status translation.

#![doc(html_root_url = "https://docs.rs/portico-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod chain;
mod middleware;
mod recovery;
mod status;
mod timeout;

pub use chain::Chain;
pub use middleware::{FnMiddleware, Middleware, Next};
pub use recovery::Recovery;
pub use status::StatusTranslation;
pub use timeout::Timeout;

//! HPACK (RFC 7541) header-block encoding for an HTTP/2 server's
//! response headers.
//!
//! This crate covers the sending half only: the stateful dynamic table
//! that both peers of an HTTP/2 connection keep in lockstep, and the
//! per-header decision between the six wire representations HPACK
//! allows. There is no decoder here, no wire-level encoding of the
//! "Dynamic Table Size Update" signal, and no support for sharing an
//! [`Encoder`] across more than one connection or thread — see
//! DESIGN.md for the full list of non-goals and how they were resolved.
//!
//! ```
//! use hpack_tx::{Encoder, VecHeaderProducer};
//! use http::StatusCode;
//!
//! let mut encoder = Encoder::new(4096);
//! let mut producer = VecHeaderProducer::new(vec![]);
//! let mut buf = [0u8; 32];
//!
//! let (n, complete) = encoder
//!     .begin_encode_headers(Some(StatusCode::OK), &mut producer, &mut buf, true)
//!     .unwrap();
//! assert!(complete);
//! assert_eq!(&buf[..n], &[0x88]);
//! ```

mod error;
mod hpack;

pub use error::EncoderError;
pub use hpack::{Encoder, HeaderProducer, VecHeaderProducer};

//! Trace a single HTTP(S) request and gather its timing breakdown.
//!
//! One trace performs one request and reports the phases of its lifecycle
//! as whole milliseconds: DNS resolution, TCP connect, handshake, time to
//! first byte, redirect time, and end-to-end total, together with the
//! status code, resolved peer IP, and header/body byte counts. Network
//! failures never raise; they degrade the result field by field, so the
//! caller inspects `status_code` and `ip` to see how far the attempt got.
//!
//! ```no_run
//! # async fn run() -> Result<(), anyhow::Error> {
//! use htracer::Tracer;
//!
//! let result = Tracer::new("https://example.com")?.trace().await;
//! if result.status_code() == 0 {
//!     println!("never reached the server");
//! }
//! println!("{result}");
//! # Ok(())
//! # }
//! ```

mod http;
mod metrics;
mod result;
mod timing;
mod tls;
mod tracer;

pub use crate::result::res::TraceResult;
pub use crate::tracer::Tracer;

pub use ::http::Method;

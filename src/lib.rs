//! Generic Stream Encapsulation (ETSI TS 102 606 / DVB A134): encapsulates
//! variable-length PDUs into fixed-size GSE packets, refragments an
//! already-emitted packet at an arbitrary boundary, and de-encapsulates a
//! received packet stream back into PDUs.
//!
//! This crate only speaks the GSE packet protocol itself — it does not
//! assemble BBFrames, perform IP-layer processing, retransmit, address by
//! MAC, or encrypt. Callers pack the packets produced by [`encap`] (optionally
//! passed through [`refrag`]) into whatever link-layer framing they use, and
//! feed received packets to [`deencap`].
//!
//! # Layout
//!
//! - [`vfrag`] — the zero-copy windowed buffer ([`vfrag::VirtualFragment`])
//!   every other module builds on.
//! - [`header`] — the GSE base header, its four payload-variant tails, and
//!   the header extension chain.
//! - [`crc`] — the streaming ETSI-GSE CRC32.
//! - [`fifo`] — the bounded per-QoS ring buffer backing the encapsulator.
//! - [`encap`] — accepts PDUs and emits GSE packets.
//! - [`refrag`] — splits an emitted GSE packet into two valid successors.
//! - [`deencap`] — reassembles PDUs from received GSE packets.
//! - [`error`] — the unified error taxonomy returned by every fallible
//!   operation in this crate.

pub mod crc;
pub mod deencap;
pub mod encap;
pub mod error;
pub mod fifo;
pub mod header;
pub mod refrag;
pub mod vfrag;

pub use error::Error;

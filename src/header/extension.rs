//! GSE header extension chain.
//!
//! `ProtocolType` plays a dual role: a value `>= 0x0600` is a real EtherType
//! terminating the chain, anything smaller is an extension header word
//! `H-LEN(3 bits) | H-TYPE(13 bits)`. The same interpretation applies
//! uniformly to every word in the chain, including the head word stored in
//! the packet's `ProtocolType` field — this crate does not special-case the
//! head word, unlike a hand-rolled parser that inlines the first step.
//!
//! `H-LEN` counts this extension's total length in 2-byte units, *including*
//! the word itself: `H-LEN == 1` carries no extra data, `H-LEN == 5` carries
//! 8 bytes of extension-specific data after the word. `H-LEN == 0` never
//! appears on its own — a zero top-3-bits pattern only arises as part of a
//! `>= 0x0600` EtherType, which is read as a terminator rather than a header.

use crate::error::Error;

/// Extension chains longer than this many links are rejected.
pub const MAX_EXTENSIONS: usize = 8;

/// Extension chains whose total wire length (head word included) exceeds
/// this many bytes are rejected.
pub const MAX_EXTENSION_BYTES: usize = 256;

const H_TYPE_MASK: u16 = 0x1FFF;

/// One link of a decoded header extension chain.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct ExtensionHeader {
    /// 13-bit extension type.
    pub h_type: u16,
    /// Extension-specific payload, always an even number of bytes.
    pub data: Vec<u8>,
}

impl ExtensionHeader {
    fn h_len(&self) -> Result<u16, Error> {
        if self.data.len() % 2 != 0 {
            return Err(Error::InvalidExtensions(
                "extension data must be an even number of bytes",
            ));
        }
        let h_len = 1 + self.data.len() / 2;
        if !(1..=5).contains(&h_len) {
            return Err(Error::InvalidExtensions(
                "extension data length out of range for H-LEN",
            ));
        }
        Ok(h_len as u16)
    }
}

/// Parses a header extension chain starting at the head word `head` (the
/// packet's `ProtocolType` field), continuing to read chained words from
/// `data`.
///
/// Returns the decoded chain, the terminal EtherType, and how many bytes of
/// `data` were consumed (the head word itself is not part of `data`).
///
/// # Errors
///
/// [`Error::InvalidExtensions`] on a malformed, truncated, or
/// over-long chain.
pub fn parse_chain(head: u16, data: &[u8]) -> Result<(Vec<ExtensionHeader>, u16, usize), Error> {
    if head >= 0x0600 {
        return Ok((Vec::new(), head, 0));
    }

    let mut chain = Vec::new();
    let mut word = head;
    let mut offset = 0usize;
    let mut total_len = 2usize;

    loop {
        if word >= 0x0600 {
            return Ok((chain, word, offset));
        }

        let h_len = usize::from(word >> 13);
        let h_type = word & H_TYPE_MASK;
        if !(1..=5).contains(&h_len) {
            return Err(Error::InvalidExtensions("invalid H-LEN in extension word"));
        }
        let extra = 2 * (h_len - 1);
        if offset + extra > data.len() {
            return Err(Error::InvalidExtensions("extension data truncated"));
        }
        chain.push(ExtensionHeader {
            h_type,
            data: data[offset..offset + extra].to_vec(),
        });
        offset += extra;
        total_len += extra;

        if chain.len() > MAX_EXTENSIONS || total_len > MAX_EXTENSION_BYTES {
            return Err(Error::InvalidExtensions(
                "extension chain exceeds maximum length",
            ));
        }

        if offset + 2 > data.len() {
            return Err(Error::InvalidExtensions(
                "extension chain never reached a terminating EtherType",
            ));
        }
        word = u16::from_be_bytes([data[offset], data[offset + 1]]);
        offset += 2;
        total_len += 2;
    }
}

/// Builds the wire form of a header extension chain.
///
/// Returns the head word (to be stored in the packet's `ProtocolType`
/// field) and the trailing bytes that follow it, which the caller must
/// prefix onto the payload immediately after the base header.
///
/// # Errors
///
/// [`Error::WrongProtocol`] if `ethertype < 0x0600`;
/// [`Error::InvalidExtensions`] if any link's data is malformed or the
/// assembled chain exceeds [`MAX_EXTENSIONS`] / [`MAX_EXTENSION_BYTES`].
pub fn build_chain(extensions: &[ExtensionHeader], ethertype: u16) -> Result<(u16, Vec<u8>), Error> {
    if ethertype < 0x0600 {
        return Err(Error::WrongProtocol(ethertype));
    }
    if extensions.is_empty() {
        return Ok((ethertype, Vec::new()));
    }
    if extensions.len() > MAX_EXTENSIONS {
        return Err(Error::InvalidExtensions("too many extension headers"));
    }

    let mut words = Vec::with_capacity(extensions.len());
    for ext in extensions {
        if ext.h_type > H_TYPE_MASK {
            return Err(Error::InvalidExtensions("H-TYPE does not fit in 13 bits"));
        }
        words.push(((ext.h_len()? << 13) | ext.h_type, &ext.data));
    }

    let (head_word, head_data) = words[0];
    let mut trailing = head_data.clone();
    for &(word, data) in &words[1..] {
        trailing.extend_from_slice(&word.to_be_bytes());
        trailing.extend_from_slice(data);
    }
    trailing.extend_from_slice(&ethertype.to_be_bytes());

    if 2 + trailing.len() > MAX_EXTENSION_BYTES {
        return Err(Error::InvalidExtensions(
            "extension chain exceeds maximum length",
        ));
    }

    Ok((head_word, trailing))
}

/// Builds the extension chain for a given `ProtocolType`, invoked by the
/// encapsulator before emitting a PDU's first or complete packet.
///
/// The builder returns the extension links and the real EtherType, and
/// [`build_chain`] assembles the wire bytes and chain-head word.
pub trait ExtensionBuilder {
    /// Produces the extension chain to prefix onto a PDU whose real
    /// protocol is `ethertype`.
    ///
    /// # Errors
    ///
    /// Any application-specific failure, reported as
    /// [`Error::ExtensionCallbackFailed`].
    fn build(&mut self, ethertype: u16) -> Result<Vec<ExtensionHeader>, Error>;
}

//! Unified error taxonomy for every fallible operation in this crate.
//!
//! The variants below are grouped into families via the doc comment headers
//! below — the grouping exists only to make the taxonomy easier to audit, it
//! has no wire representation.

/// Failure of any operation exposed by this crate.
///
/// Recoverable, informative outcomes (a received PDU, a padding marker, a
/// de-encapsulation context being overwritten, a partial streaming CRC) are
/// *not* represented here — see [`crate::deencap::DeencapEvent`] and
/// [`crate::crc::Crc32`] instead. Only genuine failures live in this enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    // ---- 0x02: virtual buffer --------------------------------------------
    /// [`crate::vfrag::VirtualBuffer::create`] was asked to allocate a
    /// zero-length buffer.
    #[error("virtual buffer length is zero")]
    BuffLengthNull,
    /// The requested allocation size overflowed `usize`.
    #[error("virtual buffer allocation size overflowed")]
    AllocFailed,
    /// `data_len` exceeds the fragment's current window length.
    #[error("data too long: {len} bytes does not fit in a window of {max} bytes")]
    DataTooLong {
        /// Length of the data that was rejected.
        len: usize,
        /// Maximum length that would have been accepted.
        max: usize,
    },
    /// A write was attempted while more than one window was open on the
    /// backing buffer, which would alias data visible to the other window.
    #[error("cannot write: buffer has more than one active window")]
    MultipleVbufAccess,
    /// A [`crate::vfrag::VirtualFragment::shift`] would move an endpoint
    /// outside the bounds of the backing buffer.
    #[error("shifted pointer would fall outside the backing buffer")]
    PtrOutsideBuff,
    /// A [`crate::vfrag::VirtualFragment::shift`] would make `start > end`.
    #[error("shifted start pointer would pass the end pointer")]
    FragPtrs,
    /// [`crate::vfrag::VirtualFragment::duplicate`] was called on an empty
    /// fragment.
    #[error("cannot duplicate an empty fragment")]
    EmptyFrag,
    /// [`crate::vfrag::VirtualFragment::duplicate`] was called on a buffer
    /// that already has two active windows.
    #[error("backing buffer already has two active windows")]
    FragNbr,
    /// [`crate::vfrag::VirtualFragment::reset`] offsets exceed the buffer.
    #[error("reset offsets ({head} + {trail}) exceed buffer length {len}")]
    OffsetTooHigh {
        /// Requested head offset.
        head: usize,
        /// Requested trail offset.
        trail: usize,
        /// Length of the backing buffer.
        len: usize,
    },

    // ---- 0x03: FIFO ---------------------------------------------------
    /// [`crate::fifo::Fifo::push`] on a full ring.
    #[error("FIFO is full")]
    FifoFull,
    /// [`crate::fifo::Fifo::pop`] / `peek_head` on an empty ring.
    #[error("FIFO is empty")]
    FifoEmpty,
    /// [`crate::fifo::Fifo::new`] was asked for zero capacity.
    #[error("FIFO capacity must be non-zero")]
    FifoZeroSize,
    /// [`crate::encap::Encapsulator::new`] was asked for zero QoS indices.
    #[error("QoS count must be non-zero")]
    FifoZeroQos,

    // ---- 0x04: length ---------------------------------------------------
    /// PDU is larger than 65535 minus its label/protocol overhead.
    #[error("PDU length {len} exceeds the maximum of {max}")]
    PduLength {
        /// Length of the rejected PDU.
        len: usize,
        /// Maximum length that would have been accepted.
        max: usize,
    },
    /// Requested packet length could not hold even one header.
    #[error("requested length {len} is smaller than the minimum of {min}")]
    LengthTooSmall {
        /// Length that was requested.
        len: usize,
        /// Minimum length that would have been accepted.
        min: usize,
    },
    /// Requested packet length exceeds the 12-bit `GSE_Length` field.
    #[error("requested length {len} exceeds the maximum of {max}")]
    LengthTooHigh {
        /// Length that was requested.
        len: usize,
        /// Maximum length that would have been accepted.
        max: usize,
    },
    /// [`crate::refrag::refrag`] was asked for a `max_len` that would not
    /// actually shrink the packet.
    #[error("refragmentation at {max_len} is unnecessary: packet is already {len} bytes")]
    RefragUnnecessary {
        /// Requested maximum length of the first successor packet.
        max_len: usize,
        /// Length of the packet being refragmented.
        len: usize,
    },

    // ---- 0x05: header -----------------------------------------------------
    /// Protocol type is below the EtherType threshold and not a recognized
    /// extension chain head.
    #[error("protocol type {0:#06x} is not a valid EtherType")]
    WrongProtocol(u16),
    /// Unsupported or malformed label type bits.
    #[error("invalid label type bits {0:#04b}")]
    InvalidLt(u8),
    /// `qos` is out of range for this encapsulator/de-encapsulator.
    #[error("QoS index {qos} is out of range for qos_count {qos_count}")]
    InvalidQos {
        /// QoS index that was rejected.
        qos: u8,
        /// Number of QoS indices configured.
        qos_count: usize,
    },
    /// `GSE_Length` field did not match the actual packet length.
    #[error("GSE_Length field implies length {implied}, but packet is {actual} bytes")]
    InvalidGseLength {
        /// Length implied by the `GSE_Length` field.
        implied: usize,
        /// Actual length of the packet buffer.
        actual: usize,
    },
    /// Header extension chain exceeded the configured maximum length, never
    /// terminated, or is otherwise malformed.
    #[error("invalid header extension chain: {0}")]
    InvalidExtensions(&'static str),
    /// Declared label bytes form a reserved/invalid pattern.
    #[error("invalid label")]
    InvalidLabel,
    /// Packet is shorter than the minimum GSE header (2 bytes) plus at
    /// least 1 payload byte.
    #[error("packet of {len} bytes is smaller than the minimum of {min}")]
    PacketTooSmall {
        /// Length of the rejected packet.
        len: usize,
        /// Minimum length that would have been accepted.
        min: usize,
    },
    /// [`crate::refrag::refrag`] was asked to refragment a packet that
    /// already carries a FragID, under a different `qos`.
    #[error("packet carries FragID {actual}, but refrag was called with qos {expected}")]
    FragIdMismatch {
        /// FragID the caller supplied.
        expected: u8,
        /// FragID already present on the packet.
        actual: u8,
    },

    // ---- 0x06: de-encapsulation context ------------------------------------
    /// A subsequent/last fragment arrived for a FragID with no active
    /// context (never started, or cleared by timeout/overwrite).
    #[error("no active de-encapsulation context for FragID {0}")]
    CtxNotInit(u8),
    /// Reassembly buffer would exceed the worst-case PDU size.
    #[error("fragment payload does not fit in the reassembly buffer for FragID {0}")]
    NoSpaceInBuff(u8),

    // ---- 0x07: received PDU -----------------------------------------------
    /// Reassembled length did not match `TotalLength` plus CRC trailer.
    #[error("reassembled length {actual} does not match expected {expected}")]
    InvalidDataLength {
        /// Length implied by the header fields.
        expected: usize,
        /// Actual reassembled length.
        actual: usize,
    },
    /// Computed CRC32 did not match the trailer.
    #[error("CRC32 mismatch: computed {computed:#010x}, expected {expected:#010x}")]
    InvalidCrc {
        /// CRC computed over the reassembled PDU.
        computed: u32,
        /// CRC read from the packet trailer.
        expected: u32,
    },
    /// Last fragment did not carry the full 4-byte CRC trailer.
    #[error("last fragment split the CRC trailer across a packet boundary")]
    CrcFragmented,

    // ---- 0x08: extension --------------------------------------------------
    /// Extension builder callback returned an error.
    #[error("extension builder failed: {0}")]
    ExtensionCallbackFailed(&'static str),
}

impl Error {
    /// Gets the top-level family byte this error belongs to. Exposed for
    /// callers that need to bucket failures by family rather than match on
    /// every variant.
    #[must_use]
    pub const fn family(&self) -> u8 {
        match self {
            Self::BuffLengthNull
            | Self::AllocFailed
            | Self::DataTooLong { .. }
            | Self::MultipleVbufAccess
            | Self::PtrOutsideBuff
            | Self::FragPtrs
            | Self::EmptyFrag
            | Self::FragNbr
            | Self::OffsetTooHigh { .. } => 0x02,
            Self::FifoFull | Self::FifoEmpty | Self::FifoZeroSize | Self::FifoZeroQos => 0x03,
            Self::PduLength { .. }
            | Self::LengthTooSmall { .. }
            | Self::LengthTooHigh { .. }
            | Self::RefragUnnecessary { .. } => 0x04,
            Self::WrongProtocol(_)
            | Self::InvalidLt(_)
            | Self::InvalidQos { .. }
            | Self::InvalidGseLength { .. }
            | Self::InvalidExtensions(_)
            | Self::InvalidLabel
            | Self::PacketTooSmall { .. }
            | Self::FragIdMismatch { .. } => 0x05,
            Self::CtxNotInit(_) | Self::NoSpaceInBuff(_) => 0x06,
            Self::InvalidDataLength { .. } | Self::InvalidCrc { .. } | Self::CrcFragmented => 0x07,
            Self::ExtensionCallbackFailed(_) => 0x08,
        }
    }
}

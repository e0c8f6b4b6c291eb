//! See [`VirtualFragment`].
//!
//! # Design
//!
//! A GSE packet buffer is shared by at most two live windows at once: one
//! "source" window holding unemitted bytes, one "emitted" window holding the
//! packet just produced from it. Modelling the backing buffer as a shared
//! heap allocation with a single-producer / single-observer window pair
//! keeps emission zero-copy while ruling out a third concurrent window.
//!
//! `Rc<RefCell<Vec<u8>>>` gives us this almost for free: `Rc::strong_count`
//! *is* the active-window count, with no separate field to keep in sync, and
//! the count is incremented/decremented automatically by `Clone`/`Drop`
//! rather than by hand. The only thing we still check at runtime is the
//! upper bound of two windows, since `Rc` has no compile-time way to cap its
//! clone count — the `FRAG_NBR` check below is exactly that runtime
//! backstop.

use std::{cell::RefCell, rc::Rc};

use crate::error::Error;

type Backing = Rc<RefCell<Vec<u8>>>;

/// A contiguous byte allocation, windowed onto by one or two
/// [`VirtualFragment`]s.
///
/// There is no public way to construct a bare [`VirtualBuffer`] — it only
/// ever exists as the backing store of a [`VirtualFragment`], created via
/// [`VirtualFragment::create`].
#[derive(Debug)]
pub(crate) struct VirtualBuffer(Backing);

impl VirtualBuffer {
    fn len(&self) -> usize {
        self.0.borrow().len()
    }
}

/// A half-open window `[start, end)` onto a shared [`VirtualBuffer`].
///
/// Invariant: `vbuf.start <= start <= end <= vbuf.end`, and a buffer
/// may be referenced by at most two live fragments at once (see the module
/// docs for how that's enforced). Every operation here either fully
/// succeeds and updates the window, or fails and leaves the fragment (and
/// the buffer's contents) untouched.
#[derive(Debug)]
pub struct VirtualFragment {
    vbuf: VirtualBuffer,
    start: usize,
    end: usize,
}

impl VirtualFragment {
    /// Allocates a new backing buffer of `head_off + max_len + trail_off`
    /// bytes and returns a window over the middle `max_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BuffLengthNull`] if the total size would be zero, or
    /// [`Error::AllocFailed`] if the total size overflows `usize`.
    pub fn create(max_len: usize, head_off: usize, trail_off: usize) -> Result<Self, Error> {
        let total = head_off
            .checked_add(max_len)
            .and_then(|n| n.checked_add(trail_off))
            .ok_or(Error::AllocFailed)?;
        if total == 0 {
            return Err(Error::BuffLengthNull);
        }
        Ok(Self {
            vbuf: VirtualBuffer(Rc::new(RefCell::new(vec![0u8; total]))),
            start: head_off,
            end: head_off + max_len,
        })
    }

    /// Equivalent to [`VirtualFragment::create`] followed by
    /// [`VirtualFragment::copy_in`].
    ///
    /// # Errors
    ///
    /// As [`VirtualFragment::create`], plus [`Error::DataTooLong`] if
    /// `data.len() > max_len`.
    pub fn create_with_data(
        max_len: usize,
        head_off: usize,
        trail_off: usize,
        data: &[u8],
    ) -> Result<Self, Error> {
        let mut frag = Self::create(max_len, head_off, trail_off)?;
        frag.copy_in(data)?;
        Ok(frag)
    }

    /// Length of the current window, in bytes.
    #[must_use]
    pub const fn length(&self) -> usize {
        self.end - self.start
    }

    /// Number of [`VirtualFragment`]s currently sharing this fragment's
    /// backing buffer (1 or 2 in any well-formed program).
    #[must_use]
    pub fn active_windows(&self) -> usize {
        Rc::strong_count(&self.vbuf.0)
    }

    /// Reads the window's bytes.
    #[must_use]
    pub fn as_vec(&self) -> Vec<u8> {
        self.vbuf.0.borrow()[self.start..self.end].to_vec()
    }

    /// Calls `f` with a read-only view of the window's bytes.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.vbuf.0.borrow()[self.start..self.end])
    }

    /// Overwrites the window starting at `start` with `data`, shrinking the
    /// window's `end` to `start + data.len()`.
    ///
    /// # Errors
    ///
    /// [`Error::MultipleVbufAccess`] if another window is open on the same
    /// buffer (writing would be visible through that window too), or
    /// [`Error::DataTooLong`] if `data.len()` exceeds the current window
    /// length.
    pub fn copy_in(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.active_windows() > 1 {
            return Err(Error::MultipleVbufAccess);
        }
        let max = self.length();
        if data.len() > max {
            return Err(Error::DataTooLong {
                len: data.len(),
                max,
            });
        }
        let end = self.start + data.len();
        self.vbuf.0.borrow_mut()[self.start..end].copy_from_slice(data);
        self.end = end;
        Ok(())
    }

    /// Writes `data` directly at an absolute buffer offset, without moving
    /// the window's `start`/`end`. Used by the header codec to prefix a
    /// header onto a window that was already shifted back by
    /// [`VirtualFragment::shift`] to make room for it.
    ///
    /// # Errors
    ///
    /// [`Error::MultipleVbufAccess`] if another window is open, or
    /// [`Error::PtrOutsideBuff`] if the write would run outside the buffer.
    pub(crate) fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<(), Error> {
        if self.active_windows() > 1 {
            return Err(Error::MultipleVbufAccess);
        }
        let end = offset.checked_add(data.len()).ok_or(Error::PtrOutsideBuff)?;
        if end > self.vbuf.len() {
            return Err(Error::PtrOutsideBuff);
        }
        self.vbuf.0.borrow_mut()[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Atomically moves both endpoints of the window by the given deltas.
    ///
    /// On any error the fragment is left completely unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::PtrOutsideBuff`] if either resulting endpoint would fall
    /// outside the backing buffer, [`Error::FragPtrs`] if the result would
    /// have `start > end`.
    pub fn shift(&mut self, start_delta: isize, end_delta: isize) -> Result<(), Error> {
        let new_start = checked_offset(self.start, start_delta)?;
        let new_end = checked_offset(self.end, end_delta)?;
        let buf_len = self.vbuf.len();
        if new_start > buf_len || new_end > buf_len {
            return Err(Error::PtrOutsideBuff);
        }
        if new_start > new_end {
            return Err(Error::FragPtrs);
        }
        self.start = new_start;
        self.end = new_end;
        Ok(())
    }

    /// Produces a new window of length `min(len, self.length())`, starting
    /// at `self.start` and sharing this fragment's backing buffer.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyFrag`] if `self` is empty, [`Error::FragNbr`] if the
    /// buffer already has two active windows.
    pub fn duplicate(&self, len: usize) -> Result<Self, Error> {
        if self.length() == 0 {
            return Err(Error::EmptyFrag);
        }
        if self.active_windows() >= 2 {
            return Err(Error::FragNbr);
        }
        let new_len = len.min(self.length());
        Ok(Self {
            vbuf: VirtualBuffer(Rc::clone(&self.vbuf.0)),
            start: self.start,
            end: self.start + new_len,
        })
    }

    /// Repositions the window to span the whole buffer minus the given
    /// offsets at each end.
    ///
    /// # Errors
    ///
    /// [`Error::OffsetTooHigh`] if `head_off + trail_off` exceeds the
    /// buffer's length.
    pub fn reset(&mut self, head_off: usize, trail_off: usize) -> Result<(), Error> {
        let len = self.vbuf.len();
        let sum = head_off.checked_add(trail_off).ok_or(Error::OffsetTooHigh {
            head: head_off,
            trail: trail_off,
            len,
        })?;
        if sum > len {
            return Err(Error::OffsetTooHigh {
                head: head_off,
                trail: trail_off,
                len,
            });
        }
        self.start = head_off;
        self.end = len - trail_off;
        Ok(())
    }

    /// Allocates a backing buffer sized for up to `capacity` bytes and
    /// returns an initially empty window positioned at `head_off`, ready to
    /// be grown with [`VirtualFragment::append`]. Used by the
    /// de-encapsulator to build a reassembly buffer sized from a first
    /// fragment's declared `TotalLength` before any payload has arrived.
    ///
    /// # Errors
    ///
    /// As [`VirtualFragment::create`].
    pub(crate) fn create_empty(capacity: usize, head_off: usize, trail_off: usize) -> Result<Self, Error> {
        let mut frag = Self::create(capacity.max(1), head_off, trail_off)?;
        frag.end = frag.start;
        Ok(frag)
    }

    /// Appends `data` immediately after the current window, growing `end`.
    /// Used to accumulate a PDU's fragments into one growing reassembly
    /// buffer.
    ///
    /// # Errors
    ///
    /// [`Error::MultipleVbufAccess`] if another window is open on this
    /// buffer; [`Error::PtrOutsideBuff`] if the appended region would run
    /// past the backing buffer's end.
    pub(crate) fn append(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.active_windows() > 1 {
            return Err(Error::MultipleVbufAccess);
        }
        let new_end = self.end.checked_add(data.len()).ok_or(Error::PtrOutsideBuff)?;
        if new_end > self.vbuf.len() {
            return Err(Error::PtrOutsideBuff);
        }
        self.vbuf.0.borrow_mut()[self.end..new_end].copy_from_slice(data);
        self.end = new_end;
        Ok(())
    }

    /// Captures `(start, end)` so a multi-step caller can restore them if a
    /// later step in the same operation fails, keeping the source window
    /// unchanged on any error.
    pub(crate) fn bounds(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    /// Restores a window previously captured with
    /// [`VirtualFragment::bounds`].
    pub(crate) fn restore(&mut self, bounds: (usize, usize)) {
        self.start = bounds.0;
        self.end = bounds.1;
    }

    /// Releases this window. Idempotent in effect with dropping the value
    /// directly — provided as an explicit, named release call for callers
    /// who want one.
    pub fn free(self) {
        drop(self);
    }
}

fn checked_offset(base: usize, delta: isize) -> Result<usize, Error> {
    if delta >= 0 {
        #[allow(clippy::cast_sign_loss)]
        base.checked_add(delta as usize).ok_or(Error::PtrOutsideBuff)
    } else {
        #[allow(clippy::cast_sign_loss)]
        base.checked_sub((-delta) as usize).ok_or(Error::PtrOutsideBuff)
    }
}

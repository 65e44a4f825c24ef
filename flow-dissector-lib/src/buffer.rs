//! Bounded access to packet bytes.
//!
//! A packet may live in one contiguous slice or be scattered over several
//! chunks (a head buffer plus fragments). [`PacketBuf::header_pointer`] hands
//! back a borrowed view when the requested range sits inside one chunk and
//! copies into the caller's scratch space when it straddles a boundary. Reads
//! past the end of the packet return `None`; nothing here ever panics on a
//! bad offset.
//!
//! ```
//! use flow_dissector::buffer::{PacketBuf, Segmented};
//!
//! let head = [0x45u8, 0x00, 0x00];
//! let frag = [0x54u8, 0x00, 0x01];
//! let pkt = Segmented::new(&[&head[..], &frag[..]]);
//!
//! let mut scratch = [0u8; 2];
//! assert_eq!(pkt.header_pointer(2, &mut scratch), Some(&[0x00, 0x54][..]));
//! assert_eq!(pkt.header_pointer(5, &mut scratch), None);
//! ```

use smallvec::SmallVec;
use zerocopy::{FromBytes, IntoBytes};

use crate::packet::{DissectError, PacketHeader};

pub trait PacketBuf {
    /// Total number of packet bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `scratch.len()` bytes starting at `offset`, either borrowed from the
    /// packet or copied into `scratch`.
    fn header_pointer<'a>(&'a self, offset: usize, scratch: &'a mut [u8]) -> Option<&'a [u8]>;
}

impl PacketBuf for [u8] {
    #[inline]
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    #[inline]
    fn header_pointer<'a>(&'a self, offset: usize, scratch: &'a mut [u8]) -> Option<&'a [u8]> {
        let end = offset.checked_add(scratch.len())?;
        self.get(offset..end)
    }
}

impl PacketBuf for Vec<u8> {
    #[inline]
    fn len(&self) -> usize {
        Vec::len(self)
    }

    #[inline]
    fn header_pointer<'a>(&'a self, offset: usize, scratch: &'a mut [u8]) -> Option<&'a [u8]> {
        self.as_slice().header_pointer(offset, scratch)
    }
}

impl<const N: usize> PacketBuf for [u8; N] {
    #[inline]
    fn len(&self) -> usize {
        N
    }

    #[inline]
    fn header_pointer<'a>(&'a self, offset: usize, scratch: &'a mut [u8]) -> Option<&'a [u8]> {
        self.as_slice().header_pointer(offset, scratch)
    }
}

/// A packet made of borrowed chunks, in wire order.
#[derive(Debug, Clone, Default)]
pub struct Segmented<'p> {
    chunks: SmallVec<[&'p [u8]; 4]>,
    len: usize,
}

impl<'p> Segmented<'p> {
    pub fn new(chunks: &[&'p [u8]]) -> Self {
        let mut pkt = Self::default();
        for chunk in chunks {
            pkt.push(chunk);
        }
        pkt
    }

    /// Appends a chunk at the tail. Empty chunks are skipped.
    pub fn push(&mut self, chunk: &'p [u8]) {
        if !chunk.is_empty() {
            self.len += chunk.len();
            self.chunks.push(chunk);
        }
    }

    pub fn chunks(&self) -> &[&'p [u8]] {
        &self.chunks
    }
}

impl PacketBuf for Segmented<'_> {
    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    fn header_pointer<'a>(&'a self, offset: usize, scratch: &'a mut [u8]) -> Option<&'a [u8]> {
        let want = scratch.len();
        let end = offset.checked_add(want)?;
        if end > self.len {
            return None;
        }
        if want == 0 {
            return Some(scratch);
        }

        let mut base = 0;
        let mut copied = 0;
        for chunk in &self.chunks {
            let chunk_end = base + chunk.len();
            if chunk_end <= offset {
                base = chunk_end;
                continue;
            }

            let start = offset + copied - base;
            if copied == 0 && end <= chunk_end {
                return chunk.get(start..start + want);
            }

            let take = (want - copied).min(chunk.len() - start);
            scratch[copied..copied + take].copy_from_slice(&chunk[start..start + take]);
            copied += take;
            if copied == want {
                return Some(scratch);
            }
            base = chunk_end;
        }

        None
    }
}

/// Typed read of a fixed-size header at `offset`.
///
/// `scratch` only backs the result when the header straddles chunks; its
/// previous contents are irrelevant.
pub fn read_header<'a, H, B>(
    buf: &'a B,
    offset: usize,
    scratch: &'a mut H,
) -> Result<&'a H, DissectError>
where
    H: PacketHeader + IntoBytes,
    B: PacketBuf + ?Sized,
{
    let bytes = buf
        .header_pointer(offset, scratch.as_mut_bytes())
        .ok_or(DissectError::TruncatedPacket(H::NAME))?;
    let header = H::ref_from_bytes(bytes).map_err(|_| DissectError::TruncatedPacket(H::NAME))?;

    if !header.is_valid() {
        return Err(DissectError::InvalidHeader(H::NAME));
    }
    Ok(header)
}

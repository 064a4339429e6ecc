//! FIFF tag I/O.
//!
//! On-disk layout, always big-endian:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  kind : i32  │  type : u32  │  size : i32  │  next : i32  │  16 bytes
//! ├──────────────────────────────────────────────────────────┤
//! │  <size bytes of payload>                                 │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! `next == 0` means the next tag follows immediately, `next > 0` is an
//! absolute offset, and `next == -1` ends the chain.
use std::io::{Read, Seek, SeekFrom, Write};
use anyhow::{bail, Context, Result};

use super::constants::*;

/// Tag header; the payload is read on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHeader {
    pub kind:  i32,
    pub ftype: u32,
    pub size:  i32,
    pub next:  i32,
    /// Byte offset of the header in the file.
    pub pos:   u64,
}

impl TagHeader {
    #[inline]
    pub fn data_pos(&self) -> u64 {
        self.pos + 16
    }

    /// Payload length in bytes; negative sizes read as empty.
    #[inline]
    pub fn len(&self) -> usize {
        self.size.max(0) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offset of the following tag header, if any.
    pub fn next_pos(&self) -> Option<u64> {
        match self.next {
            FIFFV_NEXT_SEQ => Some(self.data_pos() + self.len() as u64),
            n if n > 0 => Some(n as u64),
            _ => None,
        }
    }
}

#[inline]
fn be_i32(b: &[u8]) -> i32 {
    i32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn parse_header(buf: &[u8; 16], pos: u64) -> TagHeader {
    TagHeader {
        kind:  be_i32(&buf[0..4]),
        ftype: be_i32(&buf[4..8]) as u32,
        size:  be_i32(&buf[8..12]),
        next:  be_i32(&buf[12..16]),
        pos,
    }
}

/// Read the 16-byte tag header at `pos`.
pub fn read_tag_header<R: Read + Seek>(reader: &mut R, pos: u64) -> Result<TagHeader> {
    reader.seek(SeekFrom::Start(pos))
        .with_context(|| format!("seek to tag header @ {pos:#x}"))?;
    let mut buf = [0u8; 16];
    reader.read_exact(&mut buf)
        .with_context(|| format!("read tag header @ {pos:#x}"))?;
    Ok(parse_header(&buf, pos))
}

/// Read the whole payload of `tag`.
pub fn read_payload<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<Vec<u8>> {
    reader
        .seek(SeekFrom::Start(tag.data_pos()))
        .with_context(|| format!("seek to tag data @ {:#x}", tag.data_pos()))?;
    let mut buf = vec![0u8; tag.len()];
    reader.read_exact(&mut buf)
        .with_context(|| format!("read {} payload bytes of tag {}", tag.len(), tag.kind))?;
    Ok(buf)
}

/// Read a single big-endian i32 payload.
pub fn read_i32<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<i32> {
    read_i32_array(reader, tag)?
        .first()
        .copied()
        .with_context(|| format!("tag {} has an empty int payload", tag.kind))
}

/// Read a big-endian i32 array. Matrix-coded payloads are read as their
/// flat element data; trailing dimension words are the caller's concern.
pub fn read_i32_array<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<Vec<i32>> {
    if tag.ftype != FIFFT_INT {
        bail!("tag {} has type {}, expected FIFFT_INT", tag.kind, tag.ftype);
    }
    let bytes = read_payload(reader, tag)?;
    Ok(bytes.chunks_exact(4).map(be_i32).collect())
}

/// Read a Latin-1 string payload.
pub fn read_string<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<String> {
    let bytes = read_payload(reader, tag)?;
    Ok(bytes.iter().map(|&b| b as char).collect())
}

/// Read the embedded tag directory (`FIFFT_DIR_ENTRY_STRUCT`). Each 16-byte
/// entry stores the tag's real file position in place of `next`.
pub fn read_directory<R: Read + Seek>(reader: &mut R, tag: &TagHeader) -> Result<Vec<TagHeader>> {
    if tag.ftype != FIFFT_DIR_ENTRY_STRUCT {
        bail!("expected FIFFT_DIR_ENTRY_STRUCT, got {}", tag.ftype);
    }
    let bytes = read_payload(reader, tag)?;
    Ok(bytes
        .chunks_exact(16)
        .map(|e| TagHeader {
            kind:  be_i32(&e[0..4]),
            ftype: be_i32(&e[4..8]) as u32,
            size:  be_i32(&e[8..12]),
            next:  FIFFV_NEXT_NONE,
            pos:   be_i32(&e[12..16]) as u32 as u64,
        })
        .collect())
}

/// Write one tag (header + payload). Returns the number of bytes written.
pub fn write_tag<W: Write>(writer: &mut W, kind: i32, ftype: u32, payload: &[u8], next: i32) -> Result<usize> {
    let size = i32::try_from(payload.len()).context("tag payload exceeds 2 GiB")?;
    writer.write_all(&kind.to_be_bytes())?;
    writer.write_all(&ftype.to_be_bytes())?;
    writer.write_all(&size.to_be_bytes())?;
    writer.write_all(&next.to_be_bytes())?;
    writer.write_all(payload)?;
    Ok(16 + payload.len())
}

/// Big-endian encoding of an i32 slice.
pub fn i32_payload(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

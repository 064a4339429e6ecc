//! FIF block tree.
//!
//! Tags are grouped into blocks delimited by `FIFF_BLOCK_START` /
//! `FIFF_BLOCK_END`. The tree is built from the flat tag directory, either
//! the one embedded in the file or one obtained by walking the `next` chain.
use std::collections::HashSet;
use std::io::{Read, Seek};
use anyhow::{bail, Result};
use tracing::debug;

use super::constants::*;
use super::tag::{read_directory, read_i32, read_tag_header, TagHeader};

/// One block of the FIF tree.
#[derive(Debug, Default, Clone)]
pub struct Node {
    /// Block kind (`FIFFB_*`); 0 for the root.
    pub block:    i32,
    /// Non-structural tags directly inside this block.
    pub entries:  Vec<TagHeader>,
    pub children: Vec<Node>,
}

impl Node {
    /// Depth-first search for the first block of `kind`.
    pub fn find_block(&self, kind: i32) -> Option<&Node> {
        if self.block == kind {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_block(kind))
    }

    /// First tag of `kind` in this block (not recursive).
    pub fn find_tag(&self, kind: i32) -> Option<&TagHeader> {
        self.entries.iter().find(|e| e.kind == kind)
    }
}

/// Build the tree, reading each `FIFF_BLOCK_START` payload for the block kind.
pub fn read_tree<R: Read + Seek>(reader: &mut R, directory: &[TagHeader]) -> Result<Node> {
    let mut stack = vec![Node::default()];
    for tag in directory {
        match tag.kind {
            FIFF_BLOCK_START => {
                let block = read_i32(reader, tag)?;
                stack.push(Node { block, ..Node::default() });
            }
            FIFF_BLOCK_END => {
                // An unmatched end tag at root level is ignored.
                if stack.len() > 1 {
                    if let Some(done) = stack.pop() {
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(done);
                        }
                    }
                }
            }
            _ => {
                if let Some(node) = stack.last_mut() {
                    node.entries.push(*tag);
                }
            }
        }
    }
    // Unterminated blocks are attached to their parents.
    while stack.len() > 1 {
        if let Some(orphan) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(orphan);
            }
        }
    }
    Ok(stack.pop().unwrap_or_default())
}

/// Follow the `next` chain from offset 0, collecting every tag header.
///
/// A chain that revisits a position is malformed and is an error.
pub fn scan_directory<R: Read + Seek>(reader: &mut R) -> Result<Vec<TagHeader>> {
    let mut directory = Vec::new();
    let mut visited = HashSet::new();
    let mut pos = Some(0u64);
    while let Some(p) = pos {
        if !visited.insert(p) {
            bail!("FIFF tag chain loops back to offset {p:#x}");
        }
        let tag = read_tag_header(reader, p)?;
        pos = tag.next_pos();
        directory.push(tag);
    }
    Ok(directory)
}

/// Load the directory embedded at the end of the file, if the second tag is
/// a valid `FIFF_DIR_POINTER`.
pub fn try_load_directory<R: Read + Seek>(reader: &mut R) -> Result<Option<Vec<TagHeader>>> {
    let id = read_tag_header(reader, 0)?;
    if id.kind != FIFF_FILE_ID {
        return Ok(None);
    }
    let Some(next) = id.next_pos() else { return Ok(None) };
    let ptr = read_tag_header(reader, next)?;
    if ptr.kind != FIFF_DIR_POINTER {
        return Ok(None);
    }
    let dirpos = read_i32(reader, &ptr)?;
    if dirpos <= 0 {
        return Ok(None);
    }
    let dir = read_tag_header(reader, dirpos as u64)?;
    if dir.ftype != FIFFT_DIR_ENTRY_STRUCT {
        return Ok(None);
    }
    Ok(Some(read_directory(reader, &dir)?))
}

/// Directory (embedded when present, scanned otherwise) and block tree.
pub fn load_tree<R: Read + Seek>(reader: &mut R) -> Result<Node> {
    let directory = match try_load_directory(reader)? {
        Some(d) => d,
        None => {
            debug!("no embedded FIFF directory, scanning tag chain");
            scan_directory(reader)?
        }
    };
    read_tree(reader, &directory)
}

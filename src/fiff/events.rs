//! Event lists stored in FIF files (`*-eve.fif`).
//!
//! Layout written by `mne.write_events`:
//!
//! ```text
//! FIFF_FILE_ID
//! FIFF_DIR_POINTER (-1)
//! FIFFB_MNE_EVENTS
//! ├── FIFF_MNE_EVENT_LIST   i32 [n × 3]
//! └── FIFF_DESCRIPTION      "name:id;name:id"   (optional)
//! ```
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use tracing::debug;

use super::constants::*;
use super::tag::{i32_payload, read_i32_array, read_string, write_tag};
use super::tree::load_tree;
use crate::events::{Event, EventId};

/// Read events and, when present, the stored name → id mapping.
///
/// Files ending in `.gz` are decompressed into memory first, since tag
/// access needs seeking.
pub fn read_events_fif<P: AsRef<Path>>(path: P) -> Result<(Vec<Event>, Option<EventId>)> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let gzipped = path.extension().is_some_and(|e| e == "gz");
    let result = if gzipped {
        let mut bytes = Vec::new();
        GzDecoder::new(BufReader::new(file))
            .read_to_end(&mut bytes)
            .with_context(|| format!("decompressing {}", path.display()))?;
        read_events_from(&mut Cursor::new(bytes))
    } else {
        read_events_from(&mut BufReader::new(file))
    };
    result.with_context(|| format!("reading events from {}", path.display()))
}

/// Reader-level variant of [`read_events_fif`].
pub fn read_events_from<R: Read + Seek>(reader: &mut R) -> Result<(Vec<Event>, Option<EventId>)> {
    let tree = load_tree(reader)?;
    let Some(block) = tree.find_block(FIFFB_MNE_EVENTS) else {
        bail!("could not find event data (no FIFFB_MNE_EVENTS block)");
    };
    let Some(list) = block.find_tag(FIFF_MNE_EVENT_LIST) else {
        bail!("FIFFB_MNE_EVENTS block has no FIFF_MNE_EVENT_LIST");
    };

    let flat = read_i32_array(reader, list)?;
    if flat.len() % 3 != 0 {
        bail!("event list has {} values, not a multiple of 3", flat.len());
    }
    let events: Vec<Event> = flat
        .chunks_exact(3)
        .map(|c| Event { sample: c[0] as i64, prev: c[1], id: c[2] })
        .collect();

    let mapping = match block.find_tag(FIFF_DESCRIPTION) {
        Some(tag) => Some(EventId::parse_mapping(&read_string(reader, tag)?)?),
        None => None,
    };
    debug!(n_events = events.len(), has_mapping = mapping.is_some(), "read FIFF events");
    Ok((events, mapping))
}

/// Write `events` (and optionally their id mapping) as a FIF event file.
pub fn write_events_fif<P: AsRef<Path>>(path: P, events: &[Event], mapping: Option<&EventId>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    write_events_to(&mut w, events, mapping)?;
    w.flush()?;
    Ok(())
}

/// Writer-level variant of [`write_events_fif`].
pub fn write_events_to<W: Write>(w: &mut W, events: &[Event], mapping: Option<&EventId>) -> Result<()> {
    let mut flat = Vec::with_capacity(events.len() * 3);
    for e in events {
        let sample = i32::try_from(e.sample)
            .with_context(|| format!("event sample {} does not fit in i32", e.sample))?;
        flat.extend_from_slice(&[sample, e.prev, e.id]);
    }

    // File id: version + zeroed machine id / timestamp.
    let mut file_id = i32_payload(&[0x0001_0003]);
    file_id.extend_from_slice(&[0u8; 16]);
    write_tag(w, FIFF_FILE_ID, FIFFT_ID_STRUCT, &file_id, FIFFV_NEXT_SEQ)?;
    write_tag(w, FIFF_DIR_POINTER, FIFFT_INT, &i32_payload(&[-1]), FIFFV_NEXT_SEQ)?;
    write_tag(w, FIFF_BLOCK_START, FIFFT_INT, &i32_payload(&[FIFFB_MNE_EVENTS]), FIFFV_NEXT_SEQ)?;
    write_tag(w, FIFF_MNE_EVENT_LIST, FIFFT_INT, &i32_payload(&flat), FIFFV_NEXT_SEQ)?;
    if let Some(m) = mapping {
        write_tag(w, FIFF_DESCRIPTION, FIFFT_STRING, m.to_mapping().as_bytes(), FIFFV_NEXT_SEQ)?;
    }
    write_tag(w, FIFF_BLOCK_END, FIFFT_INT, &i32_payload(&[FIFFB_MNE_EVENTS]), FIFFV_NEXT_NONE)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiff::tree::{scan_directory, try_load_directory};

    fn sample_events() -> Vec<Event> {
        vec![
            Event { sample: 27977, prev: 0, id: 2 },
            Event { sample: 28345, prev: 0, id: 3 },
            Event { sample: 28771, prev: 0, id: 1 },
        ]
    }

    #[test]
    fn round_trip_with_mapping() {
        let mapping = EventId::new(vec![("aud_l".into(), 1), ("aud_r".into(), 2), ("vis_l".into(), 3)]);
        let mut buf = Vec::new();
        write_events_to(&mut buf, &sample_events(), Some(&mapping)).unwrap();

        let (events, m) = read_events_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(events, sample_events());
        assert_eq!(m, Some(mapping));
    }

    #[test]
    fn round_trip_without_mapping() {
        let mut buf = Vec::new();
        write_events_to(&mut buf, &sample_events(), None).unwrap();
        let (events, m) = read_events_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(events.len(), 3);
        assert!(m.is_none());
    }

    /// Append a `FIFF_DIR` tag listing every scanned tag and point the
    /// `FIFF_DIR_POINTER` at it, the layout MNE writes.
    fn with_embedded_directory(mut buf: Vec<u8>) -> Vec<u8> {
        let scanned = scan_directory(&mut Cursor::new(&buf)).unwrap();
        let mut entries = Vec::new();
        for t in &scanned {
            entries.extend_from_slice(&i32_payload(&[t.kind, t.ftype as i32, t.size, t.pos as i32]));
        }
        let dirpos = buf.len() as i32;
        let ptr = scanned.iter().find(|t| t.kind == FIFF_DIR_POINTER).unwrap();
        let at = ptr.data_pos() as usize;
        buf[at..at + 4].copy_from_slice(&dirpos.to_be_bytes());
        write_tag(&mut buf, FIFF_DIR, FIFFT_DIR_ENTRY_STRUCT, &entries, FIFFV_NEXT_NONE).unwrap();
        buf
    }

    #[test]
    fn embedded_directory_matches_scan() {
        let mapping = EventId::new(vec![("aud_l".into(), 1), ("aud_r".into(), 2), ("vis_l".into(), 3)]);
        let mut plain = Vec::new();
        write_events_to(&mut plain, &sample_events(), Some(&mapping)).unwrap();
        let indexed = with_embedded_directory(plain.clone());

        let dir = try_load_directory(&mut Cursor::new(&indexed)).unwrap().unwrap();
        let scanned = scan_directory(&mut Cursor::new(&plain)).unwrap();
        assert_eq!(dir.len(), scanned.len());
        for (d, s) in dir.iter().zip(&scanned) {
            assert_eq!((d.kind, d.ftype, d.size, d.pos), (s.kind, s.ftype, s.size, s.pos));
        }

        let tree = load_tree(&mut Cursor::new(&indexed)).unwrap();
        assert!(tree.find_block(FIFFB_MNE_EVENTS).is_some());
        assert_eq!(
            read_events_from(&mut Cursor::new(indexed)).unwrap(),
            read_events_from(&mut Cursor::new(plain)).unwrap()
        );
    }

    #[test]
    fn missing_block_is_an_error() {
        let mut buf = Vec::new();
        write_tag(&mut buf, FIFF_FILE_ID, FIFFT_ID_STRUCT, &[0u8; 20], FIFFV_NEXT_SEQ).unwrap();
        write_tag(&mut buf, FIFF_DIR_POINTER, FIFFT_INT, &i32_payload(&[-1]), FIFFV_NEXT_NONE).unwrap();
        let err = read_events_from(&mut Cursor::new(buf)).unwrap_err();
        assert!(err.to_string().contains("FIFFB_MNE_EVENTS"));
    }
}

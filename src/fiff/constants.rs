//! FIFF constants used by the event reader and writer.
//!
//! Names mirror [`mne/_fiff/constants.py`][mne-src] so the code can be
//! cross-referenced with MNE. Only the subset touched by this crate is
//! listed.
//!
//! [mne-src]: https://github.com/mne-tools/mne-python/blob/main/mne/_fiff/constants.py

// ── Block kinds ───────────────────────────────────────────────────────────

/// Measurement block.
pub const FIFFB_MEAS:           i32 = 100;
/// Event list block written by `mne.write_events`.
pub const FIFFB_MNE_EVENTS:     i32 = 115;

// ── Tag kinds ─────────────────────────────────────────────────────────────

/// Unique file identifier (first tag in every FIF file).
pub const FIFF_FILE_ID:         i32 = 100;
/// Pointer to the embedded tag directory; `-1` when there is none.
pub const FIFF_DIR_POINTER:     i32 = 101;
/// Embedded tag directory (`FIFFT_DIR_ENTRY_STRUCT` entries).
pub const FIFF_DIR:             i32 = 102;
/// Opens a block; payload = block kind (i32).
pub const FIFF_BLOCK_START:     i32 = 104;
/// Closes the innermost open block; payload = block kind (i32).
pub const FIFF_BLOCK_END:       i32 = 105;
/// Free text. Inside `FIFFB_MNE_EVENTS` it holds the event-id mapping
/// `"name:id;name:id"`.
pub const FIFF_DESCRIPTION:     i32 = 206;
/// `[n_events × 3]` i32 matrix: sample, previous value, event id.
pub const FIFF_MNE_EVENT_LIST:  i32 = 3507;

// ── Tag payload types ─────────────────────────────────────────────────────

/// Big-endian signed 32-bit integer.
pub const FIFFT_INT:              u32 = 3;
/// Latin-1 string, not NUL-terminated.
pub const FIFFT_STRING:           u32 = 10;
/// File-ID struct (20 bytes).
pub const FIFFT_ID_STRUCT:        u32 = 31;
/// Tag-directory entry struct (16 bytes per entry).
pub const FIFFT_DIR_ENTRY_STRUCT: u32 = 32;

// ── `next` field sentinels ────────────────────────────────────────────────

/// The next tag follows immediately: `next_pos = pos + 16 + size`.
pub const FIFFV_NEXT_SEQ:  i32 = 0;
/// There is no next tag.
pub const FIFFV_NEXT_NONE: i32 = -1;

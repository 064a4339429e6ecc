//! Minimal FIFF support: enough of the tag/tree layer to read and write
//! MNE event files.
//!
//! # Quick start
//! ```no_run
//! use tfanova::fiff::read_events_fif;
//!
//! let (events, mapping) = read_events_fif("sample_audvis_raw-eve.fif").unwrap();
//! println!("{} events, mapping: {:?}", events.len(), mapping);
//! ```
pub mod constants;
pub mod events;
pub mod tag;
pub mod tree;

pub use events::{read_events_fif, read_events_from, write_events_fif, write_events_to};
pub use tag::{read_tag_header, TagHeader};
pub use tree::{load_tree, read_tree, scan_directory, try_load_directory, Node};

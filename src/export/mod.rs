//! Spectrum export formats.

pub mod spe;

pub use spe::{export, export_at, write_spe, write_spe_file, SpeMetadata};

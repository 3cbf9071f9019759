//! Geostage — four-stage geocoding pipeline for titled place records.
//!
//! Takes records of `{title, content, labels}` (typically extracted
//! from a scraped page), resolves each title to coordinates by falling
//! through Nominatim, Nominatim query variants, Photon, and OpenCage,
//! and accumulates results in JSON snapshots keyed by title.

pub mod geocode;

//! Pipeline stages for Markdown corpus cleaning.
//!
//! Each submodule implements exactly one transformation step as a pure
//! function from text to a new text value plus counters. Stages never touch
//! the filesystem; only [`input`] does I/O.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ basic ──▶ math? ──▶ captions? ──▶ tables? ──▶ references? ──▶ plaintext
//! (load)   (images,   ($…$)    (Figure N.)   (manifest)   (bibliography)  (.txt)
//!           spacing)
//! ```
//!
//! 1. [`input`]      — read `full.md` and the optional content manifest
//! 2. [`basic`]      — drop figure images, strip invisible characters,
//!    normalise whitespace
//! 3. [`math`]       — tighten LaTeX spacing inside math delimiters only
//! 4. [`captions`]   — delete captions orphaned by the image removal
//! 5. [`tables`]     — swap table-image placeholders for HTML tables
//! 6. [`references`] — title-based or heuristic bibliography removal
//! 7. [`plaintext`]  — markup-free rendering of the final Markdown
//!
//! Stages marked `?` are switched by [`crate::config::CleaningConfig`].

pub mod basic;
pub mod captions;
pub mod input;
pub mod math;
pub mod plaintext;
pub mod references;
pub mod tables;

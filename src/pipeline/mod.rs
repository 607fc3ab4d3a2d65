//! Pipeline stages for PDF flattening.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested alone and the decode/render engine can be swapped without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ source/pdfium ──▶ render ──▶ encode ──▶ assemble ──▶ archive
//! (paths)   (decode)          (raster)   (JPEG)     (lopdf)      (zip)
//! ```
//!
//! 1. [`input`]    — read `(name, bytes)` pairs from files and directories
//! 2. [`source`]   — the engine seam; [`pdfium`] is the production engine
//! 3. [`render`]   — per-page pixel target and rasterisation; runs inside
//!    `spawn_blocking` because pdfium is not async-safe
//! 4. [`encode`]   — raster to JPEG at the planned quality
//! 5. [`assemble`] — one full-bleed image per page into a fresh PDF
//! 6. [`archive`]  — every successful output into one zip

pub mod archive;
pub mod assemble;
pub mod encode;
pub mod input;
pub mod pdfium;
pub mod render;
pub mod source;

//! Shared data models for the vidpipe video pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Object-finalize trigger events and the source objects derived from them
//! - Output visibility
//! - Frame geometry (aspect ratios)
//! - Encoding defaults shared by the media and worker crates

pub mod encoding;
pub mod geometry;
pub mod source;
pub mod visibility;

pub use geometry::{AspectRatio, AspectRatioParseError};
pub use source::{split_extension, split_object_path, ObjectFinalizedEvent, SourceObject};
pub use visibility::{Visibility, VisibilityParseError};

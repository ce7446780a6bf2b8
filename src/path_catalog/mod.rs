//! PathCatalog - RTSP path knowledge
//!
//! ## Responsibilities
//!
//! - Vendor path lists keyed by normalized manufacturer
//! - NVR/DVR channel templates with aliases (exact, substring, fallback)
//! - Generic fallback paths
//! - Loading from an optional JSON resource with built-in defaults

mod catalog;
mod defaults;
mod template;

pub use catalog::{normalize_path, normalize_vendor, CustomPathPair, PathCatalog};
pub use template::{PathPattern, PathTemplate, Placeholder};

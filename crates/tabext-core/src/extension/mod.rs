//! Installed extensions and their manifests.

mod manifest;
mod unit;

pub use manifest::{MANIFEST_FILE, Manifest, format_time, now, parse_time};
pub use unit::{ExtensionFunction, ExtensionUnit};

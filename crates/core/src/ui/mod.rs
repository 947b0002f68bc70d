//! Interactive region selection.
//!
//! - [`region_selector`]: fullscreen eframe window over a frozen screenshot
//! - [`selection`]: drag tracking
//! - [`rendering`]: overlay painting

mod region_selector;
mod rendering;
mod selection;

pub use region_selector::RegionSelector;

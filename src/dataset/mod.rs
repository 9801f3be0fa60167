//! Patch datasets over slides.
//!
//! Indexed collections that feed a feature extractor:
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────────────────┐
//! │  SlideList   │────▶│  one patch file per slide     │
//! │  (CSV rows)  │     └───────────────┬───────────────┘
//! └──────────────┘                     │ ArrayStore
//!                      ┌───────────────┴───────────────┐
//!                      ▼                               ▼
//!              ┌──────────────┐              ┌──────────────────┐
//!              │  PatchBag    │              │  CoordinateBag   │
//!              │ (imgs array) │              │ (coords + slide) │
//!              └──────────────┘              └──────────────────┘
//! ```

mod bag;
mod slide_list;
mod store;

pub use bag::{BagOptions, CoordinateBag, Patch, PatchBag, PatchTransform};
pub use slide_list::{SlideEntry, SlideList};
pub use store::{
    int_attribute, ArrayStore, AttrValue, Attributes, MemoryStore, COORDS, IMGS, PATCH_LEVEL,
    PATCH_SIZE,
};

/// Data layer: core types, vendor detection, and parsing.
///
/// Architecture:
/// ```text
///  Shimadzu / Thermo / Waters text export
///        │
///        ▼
///   ┌──────────┐
///   │  sniff    │  first lines → Format
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  vendor parser + channel assignment → File
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ File / Trace  │  ordered traces, attribute lookup by name
///   └──────────────┘
/// ```

pub mod ids;
pub mod loader;
pub mod model;
pub mod sniff;

mod shimadzu;
mod thermo;
mod waters;

//! Multi-vendor chromatography export parsing.
//!
//! Text exports from Shimadzu LabSolutions, Thermo Chromeleon and Waters
//! MassLynx are detected, parsed into [`File`]s of ordered [`Trace`]s, and
//! selected with `key=value` filter strings:
//!
//! ```no_run
//! use chromtrace::{File, Filter};
//!
//! let file = File::parse("run01.txt")?;
//! let filter: Filter = "mode=mrm,event=[1,2]".parse()?;
//! for trace in filter.filter(&file) {
//!     println!("{} -> {}: {:?}", trace.precursor, trace.product, trace.detect_peak());
//! }
//! # Ok::<(), chromtrace::ChromError>(())
//! ```

pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod plot;
pub mod query;

pub use data::ids::IdAllocator;
pub use data::loader::{load_files, parse_many, BatchPolicy, ChannelRule};
pub use data::model::{Attributes, File, Format, IonMode, Scalar, Trace, TraceMode, Value};
pub use data::sniff::{sniff_path, sniff_reader};
pub use error::{ChromError, Result, Role};
pub use plot::{required_axes, PlotEntry};
pub use query::{AttributeMap, Defaults, Filter, KeyValueParser, Keywords, Options};

//! Export/reload round trip: trace a function into a program, persist it, reload it, and
//! call it again.

mod exportable;
mod exported;

pub use exportable::{ExportOptions, Exportable, NodeBuilder, TraceContext, Traced};
pub use exported::Exported;

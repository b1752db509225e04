//! Reports domain module: authored documents scoped to their author.

pub mod report;

pub use report::{MAX_TITLE_LEN, NewReport, Report, ReportPatch};

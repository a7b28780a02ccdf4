//! Output generation: planning, merging and writing generated files

mod artifact;
mod compat;
mod dialect;
mod driver;
mod fs;
mod merge;
mod naming;
mod planner;
mod type_resolver;
mod workspace;

pub use artifact::*;
pub use compat::*;
pub use dialect::{apply as apply_dialect, Dialect};
pub use driver::*;
pub use fs::atomic_write;
pub use merge::*;
pub use naming::*;
pub use planner::*;
pub use type_resolver::*;
pub use workspace::{append_fragment, register_member};

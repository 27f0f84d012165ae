pub mod reader;
pub mod run;
pub mod split;

pub use crate::reader::{load_dataset, read_group, GroupFrame};
pub use crate::run::{run, RunSummary};
pub use crate::split::stratified_split;

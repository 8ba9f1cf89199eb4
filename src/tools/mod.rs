mod registry;

pub use registry::{ToolHandler, ToolRegistry};

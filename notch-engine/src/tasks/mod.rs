//! Task Registry & Completion Engine.

pub mod completion;
pub mod registry;

pub use completion::CompletionEngine;
pub use registry::TaskRegistry;

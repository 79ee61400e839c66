//! Session Buffer (C2), Session Registry (C6), and Session Runtime (C5).

pub mod buffer;
pub mod registry;
pub mod runtime;

pub use buffer::{BufferId, SessionBuffer};
pub use registry::{SessionHandle, SessionRegistry};
pub use runtime::SessionTask;

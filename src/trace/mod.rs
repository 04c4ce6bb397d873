//! Run tracing: from the workflow-run event stream to a nested, display-ready trace.

pub mod event;
pub mod formatter;
pub mod reducer;
pub mod session;
pub mod sse;
pub mod stream;

pub use event::{NodeStatus, RunEvent, RunStatus};
pub use formatter::TraceFormatter;
pub use reducer::{NodeTrace, RunTrace};
pub use session::{ChatItem, ChatSession, Role, RunRequest, SessionEntry, SubContent};
pub use sse::{SseDecoder, SseFrame};
pub use stream::{RunGuard, RunHandle, consume, replay};

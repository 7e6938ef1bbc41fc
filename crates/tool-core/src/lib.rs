//! # tool-core
//!
//! Named call contracts with JSON arguments and structured results.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ToolCall    ┌──────────────┐   execute   ┌──────────────┐
//! │  Any router  │──────────────▶│ ToolRegistry │────────────▶│  dyn Tool    │
//! │ (HTTP, chat) │◀──────────────│  (validate)  │◀────────────│ (typed core) │
//! └──────────────┘  ToolResult   └──────────────┘             └──────────────┘
//! ```
//!
//! The transport that produces a `ToolCall` is not this crate's concern:
//! anything that can name a tool and hand over a JSON object can drive it.

pub mod tool;
pub mod error;

pub use error::{ToolError, Result};
pub use tool::{Tool, ToolCall, ToolResult, ToolRegistry, ToolSchema, ParameterSchema};

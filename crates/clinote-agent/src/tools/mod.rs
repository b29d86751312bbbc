//! Built-in tools for extraction agents.
//!
//! - Keyword scanning over the note (the same safety net the merger uses)
//! - Passage lookup with line numbers, for quoting provenance
//! - A scratchpad for recording reasoning

mod keyword_scan;
mod passages;
mod think;

pub use keyword_scan::KeywordScanTool;
pub use passages::FindPassagesTool;
pub use think::{Scratchpad, ThinkTool, new_scratchpad};

use std::sync::Arc;

use crate::tool::ToolRegistry;

/// Registry with every built-in tool bound to one note.
pub fn note_tools(note: Arc<str>, scratchpad: Scratchpad) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(KeywordScanTool::new(note.clone()));
    registry.register(FindPassagesTool::new(note));
    registry.register(ThinkTool::new(scratchpad));
    registry
}

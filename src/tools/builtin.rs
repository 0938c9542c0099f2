//! Demo tools shipped with the `roci-chat` binary.

use std::sync::Arc;

use chrono::{FixedOffset, Utc};
use serde_json::json;

use crate::error::ChatError;
use crate::tools::tool::{FnTool, Tool};
use crate::tools::types::ToolParameters;

/// `current_time`: the current time, optionally shifted by a UTC offset in hours.
pub fn current_time_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "current_time",
        "Get the current date and time, optionally at a UTC offset in hours",
        ToolParameters::object()
            .integer("utc_offset_hours", "Offset from UTC, -12 to 14", false)
            .build(),
        |args| {
            let hours = args.raw().get("utc_offset_hours").and_then(|v| v.as_i64()).unwrap_or(0);
            let offset = i32::try_from(hours)
                .ok()
                .filter(|h| (-12..=14).contains(h))
                .and_then(|h| FixedOffset::east_opt(h * 3600))
                .ok_or_else(|| {
                    ChatError::tool("current_time", format!("offset {hours} is out of range"))
                })?;
            let now = Utc::now().with_timezone(&offset);
            Ok(json!({ "iso8601": now.to_rfc3339(), "utc_offset_hours": hours }))
        },
    ))
}

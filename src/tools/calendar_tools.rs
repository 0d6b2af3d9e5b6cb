//! Catalogue entries for the `calendar_*` tools.

use serde_json::json;

use super::ToolMeta;
use crate::calendar::{DEFAULT_STEP_MINUTES, MIN_SLOT_MINUTES};

pub(super) fn register(tools: &mut Vec<ToolMeta>) {
    tools.push(ToolMeta::new(
        "calendar_list_events",
        "List calendar events with optional filters. Default returns next 10 upcoming events.",
        json!({
            "type": "object",
            "properties": {
                "maxResults": {
                    "type": "number",
                    "description": "Maximum number of events to return (default: 10)",
                    "minimum": 1,
                    "maximum": 100
                },
                "timeMin": { "type": "string", "description": "Start time (ISO 8601 format, default: now)" },
                "timeMax": { "type": "string", "description": "End time (ISO 8601 format)" },
                "q": { "type": "string", "description": "Search query to filter events" }
            }
        }),
    ));

    tools.push(ToolMeta::new(
        "calendar_get_event",
        "Get details of a specific calendar event by ID.",
        json!({
            "type": "object",
            "properties": {
                "eventId": { "type": "string", "description": "Calendar event ID" }
            },
            "required": ["eventId"]
        }),
    ));

    tools.push(ToolMeta::new(
        "calendar_create_event",
        "Create a new calendar event with optional attendees and location.",
        json!({
            "type": "object",
            "properties": {
                "summary": { "type": "string", "description": "Event title/summary" },
                "description": { "type": "string", "description": "Event description" },
                "start": { "type": "string", "description": "Start time (ISO 8601 format)" },
                "end": { "type": "string", "description": "End time (ISO 8601 format)" },
                "attendees": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "List of attendee email addresses"
                },
                "location": { "type": "string", "description": "Event location" },
                "timeZone": {
                    "type": "string",
                    "description": "Time zone (default: the server's configured zone)"
                }
            },
            "required": ["summary", "start", "end"]
        }),
    ));

    tools.push(ToolMeta::new(
        "calendar_update_event",
        "Update an existing calendar event.",
        json!({
            "type": "object",
            "properties": {
                "eventId": { "type": "string", "description": "Event ID to update" },
                "summary": { "type": "string", "description": "New event title" },
                "description": { "type": "string", "description": "New event description" },
                "location": { "type": "string", "description": "New event location" },
                "start": { "type": "string", "description": "New start time (ISO 8601)" },
                "end": { "type": "string", "description": "New end time (ISO 8601)" },
                "attendees": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "New attendee list"
                },
                "timeZone": { "type": "string", "description": "Time zone" }
            },
            "required": ["eventId"]
        }),
    ));

    tools.push(ToolMeta::new(
        "calendar_delete_event",
        "Delete a calendar event.",
        json!({
            "type": "object",
            "properties": {
                "eventId": { "type": "string", "description": "Event ID to delete" }
            },
            "required": ["eventId"]
        }),
    ));

    tools.push(ToolMeta::new(
        "calendar_find_free_slots",
        "Find available time slots within a date range.",
        json!({
            "type": "object",
            "properties": {
                "timeMin": { "type": "string", "description": "Start time (ISO 8601 format)" },
                "timeMax": { "type": "string", "description": "End time (ISO 8601 format)" },
                "duration": {
                    "type": "number",
                    "description": "Duration of each slot in minutes (default: 60)",
                    "minimum": MIN_SLOT_MINUTES
                },
                "step": {
                    "type": "number",
                    "description": format!(
                        "Minutes between candidate start times (default: {DEFAULT_STEP_MINUTES})"
                    ),
                    "minimum": 1
                }
            },
            "required": ["timeMin", "timeMax"]
        }),
    ));

    tools.push(ToolMeta::new(
        "calendar_get_today_events",
        "Get all events scheduled for today.",
        json!({ "type": "object", "properties": {} }),
    ));

    tools.push(ToolMeta::new(
        "calendar_get_week_events",
        "Get all events scheduled for the next 7 days.",
        json!({ "type": "object", "properties": {} }),
    ));
}

//! Catalogue entries for the `gmail_*` tools.

use serde_json::json;

use super::ToolMeta;

pub(super) fn register(tools: &mut Vec<ToolMeta>) {
    tools.push(ToolMeta::new(
        "gmail_search_messages",
        "Search for Gmail messages using Gmail query syntax. Supports filters like \"from:\", \"to:\", \"subject:\", \"is:unread\", etc.",
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Gmail search query (e.g., \"from:example@gmail.com is:unread\")"
                },
                "maxResults": {
                    "type": "number",
                    "description": "Maximum number of results to return (1-500, default: 50)",
                    "minimum": 1,
                    "maximum": 500
                },
                "labelIds": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Filter by label IDs"
                },
                "includeSpamTrash": {
                    "type": "boolean",
                    "description": "Include spam and trash (default: false)"
                },
                "pageToken": {
                    "type": "string",
                    "description": "Page token for pagination"
                }
            }
        }),
    ));

    tools.push(ToolMeta::new(
        "gmail_get_message",
        "Retrieve a specific Gmail message by ID with full details including body and attachments.",
        json!({
            "type": "object",
            "properties": {
                "messageId": { "type": "string", "description": "Gmail message ID" },
                "format": {
                    "type": "string",
                    "enum": ["full", "metadata", "minimal", "raw"],
                    "description": "Message format (default: full)"
                }
            },
            "required": ["messageId"]
        }),
    ));

    tools.push(ToolMeta::new(
        "gmail_send_message",
        "Compose and send a new email message. Supports attachments and threading.",
        json!({
            "type": "object",
            "properties": {
                "to": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Recipient email addresses"
                },
                "cc": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "CC recipients"
                },
                "bcc": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "BCC recipients"
                },
                "subject": { "type": "string", "description": "Email subject" },
                "body": { "type": "string", "description": "Email body content" },
                "contentType": {
                    "type": "string",
                    "enum": ["text/plain", "text/html"],
                    "description": "Content type (default: text/plain)"
                },
                "attachments": attachments_schema(true),
                "threadId": { "type": "string", "description": "Thread ID to reply to" },
                "inReplyTo": { "type": "string", "description": "Message ID this is in reply to" },
                "references": { "type": "string", "description": "References header for threading" }
            },
            "required": ["to", "subject", "body"]
        }),
    ));

    tools.push(ToolMeta::new(
        "gmail_modify_message",
        "Modify message labels to archive, mark as read/unread, star, etc.",
        json!({
            "type": "object",
            "properties": {
                "messageId": { "type": "string", "description": "Message ID" },
                "addLabelIds": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Label IDs to add (e.g., [\"STARRED\"], [\"UNREAD\"])"
                },
                "removeLabelIds": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Label IDs to remove (e.g., [\"UNREAD\"], [\"INBOX\"])"
                }
            },
            "required": ["messageId"]
        }),
    ));

    tools.push(ToolMeta::new(
        "gmail_delete_message",
        "Move message to trash or permanently delete it.",
        json!({
            "type": "object",
            "properties": {
                "messageId": { "type": "string", "description": "Message ID" },
                "permanent": {
                    "type": "boolean",
                    "description": "Permanently delete (default: false, moves to trash)"
                }
            },
            "required": ["messageId"]
        }),
    ));

    tools.push(ToolMeta::new(
        "gmail_create_draft",
        "Create a draft email message that can be sent later.",
        json!({
            "type": "object",
            "properties": {
                "to": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Recipient email addresses"
                },
                "cc": { "type": "array", "items": { "type": "string" } },
                "bcc": { "type": "array", "items": { "type": "string" } },
                "subject": { "type": "string", "description": "Email subject" },
                "body": { "type": "string", "description": "Email body" },
                "contentType": { "type": "string", "enum": ["text/plain", "text/html"] },
                "attachments": attachments_schema(false)
            },
            "required": ["to", "subject", "body"]
        }),
    ));

    tools.push(ToolMeta::new(
        "gmail_list_labels",
        "List all available Gmail labels (folders).",
        json!({ "type": "object", "properties": {} }),
    ));

    tools.push(ToolMeta::new(
        "gmail_create_label",
        "Create a new Gmail label (folder).",
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Label name" },
                "labelListVisibility": {
                    "type": "string",
                    "enum": ["labelShow", "labelHide", "labelShowIfUnread"],
                    "description": "Label visibility in label list"
                },
                "messageListVisibility": {
                    "type": "string",
                    "enum": ["show", "hide"],
                    "description": "Message visibility in message list"
                }
            },
            "required": ["name"]
        }),
    ));

    tools.push(ToolMeta::new(
        "gmail_get_attachment",
        "Download an email attachment by ID.",
        json!({
            "type": "object",
            "properties": {
                "messageId": { "type": "string", "description": "Message ID" },
                "attachmentId": {
                    "type": "string",
                    "description": "Attachment ID (from message object)"
                }
            },
            "required": ["messageId", "attachmentId"]
        }),
    ));
}

fn attachments_schema(described: bool) -> serde_json::Value {
    let mut schema = json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "filename": { "type": "string" },
                "mimeType": { "type": "string" },
                "content": { "type": "string" }
            },
            "required": ["filename", "mimeType", "content"]
        }
    });
    if described {
        schema["items"]["properties"]["content"]["description"] = json!("Base64 encoded content");
        schema["description"] = json!("File attachments");
    }
    schema
}

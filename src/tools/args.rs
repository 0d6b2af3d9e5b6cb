//! Typed tool arguments.
//!
//! A tool name is `<prefix>_<operation>`; the prefix picks the capability
//! and the operation picks the variant.  Arguments are decoded and their
//! bounds checked here, before any capability handle is touched.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::calendar::{
    CreateEventInput, EventIdInput, FindFreeSlotsInput, FreeSlotQuery, ListEventsInput,
    UpdateEventInput,
};
use crate::mail::{
    CreateDraftInput, CreateLabelInput, DeleteMessageInput, GetAttachmentInput, GetMessageInput,
    ModifyMessageInput, SearchMessagesInput, SendMessageInput,
};

/// Separator between capability prefix and operation.
pub const PREFIX_SEPARATOR: char = '_';

#[derive(Debug, Error)]
pub enum ArgsError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    Invalid { tool: String, reason: String },
}

/// The capability that owns a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Mail,
    Scheduling,
}

impl Capability {
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "gmail" => Some(Capability::Mail),
            "calendar" => Some(Capability::Scheduling),
            _ => None,
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            Capability::Mail => "gmail",
            Capability::Scheduling => "calendar",
        }
    }
}

#[derive(Debug, Clone)]
pub enum MailCall {
    Search(SearchMessagesInput),
    Get(GetMessageInput),
    Send(SendMessageInput),
    Modify(ModifyMessageInput),
    Delete(DeleteMessageInput),
    CreateDraft(CreateDraftInput),
    ListLabels,
    CreateLabel(CreateLabelInput),
    GetAttachment(GetAttachmentInput),
}

#[derive(Debug, Clone)]
pub enum CalendarCall {
    List(ListEventsInput),
    Get(EventIdInput),
    Create(CreateEventInput),
    Update(UpdateEventInput),
    Delete(EventIdInput),
    FindFreeSlots(FreeSlotQuery),
    Today,
    Week,
}

/// A validated tool invocation.
#[derive(Debug, Clone)]
pub enum ToolCall {
    Mail(MailCall),
    Calendar(CalendarCall),
}

struct Decoder<'a> {
    tool: &'a str,
    args: Value,
}

impl Decoder<'_> {
    fn invalid(&self, reason: impl std::fmt::Display) -> ArgsError {
        ArgsError::Invalid {
            tool: self.tool.to_string(),
            reason: reason.to_string(),
        }
    }

    fn decode<T: DeserializeOwned>(&self) -> Result<T, ArgsError> {
        serde_json::from_value(self.args.clone()).map_err(|e| self.invalid(e))
    }

    /// Decode, then run `check` against the decoded value.
    fn decode_checked<T, F>(&self, check: F) -> Result<T, ArgsError>
    where
        T: DeserializeOwned,
        F: FnOnce(&Self, &T) -> Result<(), ArgsError>,
    {
        let value: T = self.decode()?;
        check(self, &value)?;
        Ok(value)
    }

    fn check_range(&self, field: &str, value: Option<u32>, min: u32, max: u32) -> Result<(), ArgsError> {
        match value {
            Some(v) if !(min..=max).contains(&v) => {
                Err(self.invalid(format!("{field} must be between {min} and {max}, got {v}")))
            }
            _ => Ok(()),
        }
    }
}

impl ToolCall {
    /// Decode `arguments` for the tool called `name`.  `null` arguments are
    /// treated as an empty object.
    pub fn parse(name: &str, arguments: Value) -> Result<Self, ArgsError> {
        let unknown = || ArgsError::UnknownTool(name.to_string());
        let (prefix, op) = name.split_once(PREFIX_SEPARATOR).ok_or_else(unknown)?;
        let capability = Capability::from_prefix(prefix).ok_or_else(unknown)?;

        let args = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let d = Decoder { tool: name, args };

        match capability {
            Capability::Mail => Ok(ToolCall::Mail(match op {
                "search_messages" => {
                    let input: SearchMessagesInput = d.decode_checked(|d, i: &SearchMessagesInput| {
                        d.check_range("maxResults", i.max_results, 1, 500)
                    })?;
                    MailCall::Search(input)
                }
                "get_message" => MailCall::Get(d.decode()?),
                "send_message" => MailCall::Send(d.decode()?),
                "modify_message" => MailCall::Modify(d.decode()?),
                "delete_message" => MailCall::Delete(d.decode()?),
                "create_draft" => MailCall::CreateDraft(d.decode()?),
                "list_labels" => MailCall::ListLabels,
                "create_label" => MailCall::CreateLabel(d.decode()?),
                "get_attachment" => MailCall::GetAttachment(d.decode()?),
                _ => return Err(unknown()),
            })),
            Capability::Scheduling => Ok(ToolCall::Calendar(match op {
                "list_events" => {
                    let input: ListEventsInput = d.decode_checked(|d, i: &ListEventsInput| {
                        d.check_range("maxResults", i.max_results, 1, 100)
                    })?;
                    CalendarCall::List(input)
                }
                "get_event" => CalendarCall::Get(d.decode()?),
                "create_event" => CalendarCall::Create(d.decode()?),
                "update_event" => CalendarCall::Update(d.decode()?),
                "delete_event" => CalendarCall::Delete(d.decode()?),
                "find_free_slots" => {
                    let input: FindFreeSlotsInput = d.decode()?;
                    let query = input.into_query().map_err(|e| d.invalid(e))?;
                    CalendarCall::FindFreeSlots(query)
                }
                "get_today_events" => CalendarCall::Today,
                "get_week_events" => CalendarCall::Week,
                _ => return Err(unknown()),
            })),
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            ToolCall::Mail(_) => Capability::Mail,
            ToolCall::Calendar(_) => Capability::Scheduling,
        }
    }
}

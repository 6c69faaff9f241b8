//! Append-only conversation transcript.
//!
//! A [`Transcript`] owns the ordered message history for one run. It only
//! grows: messages are appended, never edited or removed. Tool rounds are
//! committed atomically with [`Transcript::commit_round`], which checks that
//! the result messages answer exactly the tool calls of the assistant
//! message before anything is appended. A committed transcript therefore
//! never holds an unanswered tool call.

use crate::{Message, MessageRole, ToolCall};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

/// Rejections from [`Transcript`] appends and [`Transcript::verify`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("expected an assistant message, got role '{0}'")]
    NotAssistant(MessageRole),

    #[error("assistant message in a tool round has no tool calls")]
    EmptyRound,

    #[error("final assistant message still requests {0} tool call(s)")]
    PendingCalls(usize),

    #[error("expected a tool result message, got role '{0}'")]
    NotToolResult(MessageRole),

    #[error("duplicate tool call id '{0}'")]
    DuplicateCallId(String),

    #[error("tool result answers no pending call (id '{0}')")]
    UnexpectedResult(String),

    #[error("tool call '{0}' has no result")]
    Unanswered(String),
}

/// A seeded history that [`Transcript::from_messages`] refused, returned
/// whole so the caller can still inspect it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("rejected history of {} message(s): {error}", messages.len())]
pub struct RejectedHistory {
    #[source]
    pub error: TranscriptError,
    pub messages: Vec<Message>,
}

impl RejectedHistory {
    /// The rejection cause and the history as given, unverified.
    pub fn into_parts(self) -> (TranscriptError, Transcript) {
        (
            self.error,
            Transcript {
                messages: self.messages,
            },
        )
    }
}

/// Ordered, append-only message history for a single agent run.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Seed a transcript with an optional system instruction and the user's task.
    pub fn new(system: Option<&str>, task: impl Into<String>) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system.filter(|s| !s.is_empty()) {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(task));
        Self { messages }
    }

    /// Adopt an existing history, rejecting one that breaks the call-id invariant.
    pub fn from_messages(messages: Vec<Message>) -> Result<Self, RejectedHistory> {
        let transcript = Self { messages };
        match transcript.verify() {
            Ok(()) => Ok(transcript),
            Err(error) => Err(RejectedHistory {
                error,
                messages: transcript.messages,
            }),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Append the model's final answer (an assistant message without tool calls).
    pub fn push_final(&mut self, message: Message) -> Result<(), TranscriptError> {
        if message.role != MessageRole::Assistant {
            return Err(TranscriptError::NotAssistant(message.role));
        }
        if message.has_tool_calls() {
            return Err(TranscriptError::PendingCalls(message.tool_calls().len()));
        }
        self.messages.push(message);
        Ok(())
    }

    /// Append an assistant message and its tool results as one unit.
    ///
    /// `results` must answer every call of `assistant` exactly once (any
    /// order); they are appended in the order given. On error nothing is
    /// appended.
    pub fn commit_round(
        &mut self,
        assistant: Message,
        results: Vec<Message>,
    ) -> Result<(), TranscriptError> {
        if assistant.role != MessageRole::Assistant {
            return Err(TranscriptError::NotAssistant(assistant.role));
        }
        if !assistant.has_tool_calls() {
            return Err(TranscriptError::EmptyRound);
        }

        let mut pending = call_ids(assistant.tool_calls())?;
        for result in &results {
            answer(&mut pending, result)?;
        }
        if let Some(call) = assistant
            .tool_calls()
            .iter()
            .find(|c| pending.contains(c.id.as_str()))
        {
            return Err(TranscriptError::Unanswered(call.id.clone()));
        }

        self.messages.reserve(results.len() + 1);
        self.messages.push(assistant);
        self.messages.extend(results);
        Ok(())
    }

    /// Tool calls that have no result yet, in request order.
    pub fn unanswered_calls(&self) -> Vec<&ToolCall> {
        let answered: HashSet<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        self.messages
            .iter()
            .flat_map(|m| m.tool_calls())
            .filter(|c| !answered.contains(c.id.as_str()))
            .collect()
    }

    /// Check the whole history: every tool result answers exactly one
    /// earlier, still-pending call, and no call is left without a result.
    pub fn verify(&self) -> Result<(), TranscriptError> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut pending: HashSet<&str> = HashSet::new();
        for message in &self.messages {
            match message.role {
                MessageRole::Assistant => {
                    for call in message.tool_calls() {
                        if !seen.insert(call.id.as_str()) {
                            return Err(TranscriptError::DuplicateCallId(call.id.clone()));
                        }
                        pending.insert(call.id.as_str());
                    }
                }
                MessageRole::Tool => {
                    let id = message.tool_call_id.as_deref().unwrap_or_default();
                    if !pending.remove(id) {
                        return Err(TranscriptError::UnexpectedResult(id.to_string()));
                    }
                }
                MessageRole::System | MessageRole::User => {}
            }
        }
        match self.unanswered_calls().first() {
            Some(call) => Err(TranscriptError::Unanswered(call.id.clone())),
            None => Ok(()),
        }
    }
}

fn call_ids(calls: &[ToolCall]) -> Result<HashSet<&str>, TranscriptError> {
    let mut ids = HashSet::with_capacity(calls.len());
    for call in calls {
        if !ids.insert(call.id.as_str()) {
            return Err(TranscriptError::DuplicateCallId(call.id.clone()));
        }
    }
    Ok(ids)
}

fn answer(pending: &mut HashSet<&str>, result: &Message) -> Result<(), TranscriptError> {
    if result.role != MessageRole::Tool {
        return Err(TranscriptError::NotToolResult(result.role.clone()));
    }
    let id = result.tool_call_id.as_deref().unwrap_or_default();
    if pending.remove(id) {
        Ok(())
    } else {
        Err(TranscriptError::UnexpectedResult(id.to_string()))
    }
}

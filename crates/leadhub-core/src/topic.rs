// SPDX-FileCopyrightText: 2026 Leadhub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime topic names.

use std::fmt;
use std::str::FromStr;

use crate::error::LeadhubError;

/// A realtime fanout topic.
///
/// Wire form is the string clients subscribe with, e.g. `conversation:abc:message`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// New or updated message in one conversation.
    ConversationMessage(String),
    LeadNew,
    LeadUpdated,
    ConversationNew,
    ConversationUpdated,
    ConversationAssigned,
    QueueUpdate,
    /// Events addressed to one agent.
    Agent(String),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::ConversationMessage(id) => write!(f, "conversation:{id}:message"),
            Topic::LeadNew => f.write_str("lead:new"),
            Topic::LeadUpdated => f.write_str("lead:updated"),
            Topic::ConversationNew => f.write_str("conversation:new"),
            Topic::ConversationUpdated => f.write_str("conversation:updated"),
            Topic::ConversationAssigned => f.write_str("conversation:assigned"),
            Topic::QueueUpdate => f.write_str("queue:update"),
            Topic::Agent(id) => write!(f, "agent:{id}"),
        }
    }
}

impl FromStr for Topic {
    type Err = LeadhubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let topic = match s {
            "lead:new" => Topic::LeadNew,
            "lead:updated" => Topic::LeadUpdated,
            "conversation:new" => Topic::ConversationNew,
            "conversation:updated" => Topic::ConversationUpdated,
            "conversation:assigned" => Topic::ConversationAssigned,
            "queue:update" => Topic::QueueUpdate,
            other => {
                if let Some(id) = other
                    .strip_prefix("conversation:")
                    .and_then(|rest| rest.strip_suffix(":message"))
                    .filter(|id| !id.is_empty())
                {
                    Topic::ConversationMessage(id.to_string())
                } else if let Some(id) = other.strip_prefix("agent:").filter(|id| !id.is_empty()) {
                    Topic::Agent(id.to_string())
                } else {
                    return Err(LeadhubError::Parse {
                        message: format!("unknown topic: {other}"),
                    });
                }
            }
        };
        Ok(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names() {
        assert_eq!(
            Topic::ConversationMessage("c1".into()).to_string(),
            "conversation:c1:message"
        );
        assert_eq!(Topic::QueueUpdate.to_string(), "queue:update");
        assert_eq!(Topic::Agent("u7".into()).to_string(), "agent:u7");
    }

    #[test]
    fn parses_every_wire_name() {
        for topic in [
            Topic::ConversationMessage("c1".into()),
            Topic::LeadNew,
            Topic::LeadUpdated,
            Topic::ConversationNew,
            Topic::ConversationUpdated,
            Topic::ConversationAssigned,
            Topic::QueueUpdate,
            Topic::Agent("u7".into()),
        ] {
            assert_eq!(topic.to_string().parse::<Topic>().unwrap(), topic);
        }
    }

    #[test]
    fn rejects_unknown_and_empty_ids() {
        assert!("conversation::message".parse::<Topic>().is_err());
        assert!("agent:".parse::<Topic>().is_err());
        assert!("billing:paid".parse::<Topic>().is_err());
    }
}

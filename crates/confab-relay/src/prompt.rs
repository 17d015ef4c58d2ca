//! Thread transcript → completion prompt mapping.

use serde::{Deserialize, Serialize};

/// One message of a conversation thread, as fetched from the chat platform.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub author_id: String,
    pub text: String,
    pub ts: String,
}

/// A single prompt message for the completion API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Mention token for a member id, e.g. `<@U0123ABC>`.
pub fn mention_token(member_id: &str) -> String {
    format!("<@{member_id}>")
}

/// Map a thread transcript onto the alternating prompt, preserving order:
///
/// - entries authored by the bot become `assistant` messages, kept verbatim
///   (the author check runs first, so a bot reply that happens to quote the
///   mention token still counts as the bot's own output);
/// - entries addressed to the bot (text starts with its mention token)
///   become `user` messages with every occurrence of the token removed and
///   the remainder trimmed;
/// - anything else is side chatter and is dropped.
///
/// An entry that is nothing but the mention token yields a user message
/// with empty content; the model is left to deal with it.
pub fn build_thread_prompt(entries: &[TranscriptEntry], bot_member_id: &str) -> Vec<Message> {
    let token = mention_token(bot_member_id);
    let mut messages = Vec::new();

    for entry in entries {
        if entry.author_id == bot_member_id {
            messages.push(Message {
                role: Role::Assistant,
                content: entry.text.clone(),
            });
        } else if entry.text.starts_with(&token) {
            messages.push(Message {
                role: Role::User,
                content: entry.text.replace(&token, "").trim().to_string(),
            });
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: &str = "U0BOT";

    fn entry(author: &str, text: &str) -> TranscriptEntry {
        TranscriptEntry {
            author_id: author.to_string(),
            text: text.to_string(),
            ts: "1700000000.000100".to_string(),
        }
    }

    #[test]
    fn roles_follow_authorship_and_addressing() {
        let transcript = vec![
            entry("U1", "<@U0BOT> what's the weather?"),
            entry(BOT, "Sunny, 22 degrees."),
            entry("U2", "nice, thanks everyone"),
            entry("U1", "<@U0BOT> and tomorrow?"),
        ];

        let prompt = build_thread_prompt(&transcript, BOT);

        assert_eq!(
            prompt,
            vec![
                Message {
                    role: Role::User,
                    content: "what's the weather?".to_string()
                },
                Message {
                    role: Role::Assistant,
                    content: "Sunny, 22 degrees.".to_string()
                },
                Message {
                    role: Role::User,
                    content: "and tomorrow?".to_string()
                },
            ]
        );
    }

    #[test]
    fn side_chatter_is_dropped() {
        let transcript = vec![
            entry("U1", "just talking amongst ourselves"),
            entry("U2", "yeah <@U0BOT> is not addressed here"),
        ];
        assert!(build_thread_prompt(&transcript, BOT).is_empty());
    }

    #[test]
    fn bot_author_wins_over_mention_prefix() {
        // The bot quoting its own mention token is still assistant output,
        // verbatim.
        let transcript = vec![entry(BOT, "<@U0BOT> is how you summon me")];
        let prompt = build_thread_prompt(&transcript, BOT);
        assert_eq!(prompt.len(), 1);
        assert_eq!(prompt[0].role, Role::Assistant);
        assert_eq!(prompt[0].content, "<@U0BOT> is how you summon me");
    }

    #[test]
    fn every_token_occurrence_is_stripped() {
        let transcript = vec![entry("U1", "<@U0BOT> ping <@U0BOT> again")];
        let prompt = build_thread_prompt(&transcript, BOT);
        assert_eq!(prompt[0].content, "ping  again");
    }

    #[test]
    fn bare_mention_yields_empty_user_message() {
        let transcript = vec![entry("U1", "<@U0BOT>")];
        let prompt = build_thread_prompt(&transcript, BOT);
        assert_eq!(prompt.len(), 1);
        assert_eq!(prompt[0].role, Role::User);
        assert_eq!(prompt[0].content, "");
    }

    #[test]
    fn other_member_mentions_survive() {
        let transcript = vec![entry("U1", "<@U0BOT> ask <@U2OTHER> about it")];
        let prompt = build_thread_prompt(&transcript, BOT);
        assert_eq!(prompt[0].content, "ask <@U2OTHER> about it");
    }

    #[test]
    fn roles_serialize_lowercase() {
        let msg = Message {
            role: Role::Assistant,
            content: "hi".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}

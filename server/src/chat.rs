//! Chat relay and rate limiting (§4.7 worker↔hub `chatMessage`, §6 chat
//! config keys).
//!
//! The banned-word matching algorithm is a spec §9 Open Question ("the
//! chat profanity/spam policy is referenced by configuration fields but
//! its matching behaviour... is not specified") — `ChatFilter` is the
//! pluggable boundary for it, with a permissive default. Rate limiting is
//! fully specified and fully implemented.

use std::collections::HashMap;
use std::time::Instant;

use crate::config::RoomConfig;

pub trait ChatFilter: Send + Sync {
    fn is_blocked(&self, message: &str) -> bool;
}

/// Default filter: blocks nothing. See the module doc comment.
pub struct PermissiveFilter;

impl ChatFilter for PermissiveFilter {
    fn is_blocked(&self, _message: &str) -> bool {
        false
    }
}

struct SenderRate {
    last_message_at: Instant,
    messages_this_minute: u32,
    minute_started_at: Instant,
    grace_used: u32,
}

/// Per-room rate limiter keyed by username.
pub struct ChatLimiter {
    min_millis_per_message: u64,
    spam_grace_count: u32,
    max_spam_per_minute: u32,
    senders: HashMap<String, SenderRate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatDecision {
    Accept,
    RateLimited,
}

impl ChatLimiter {
    pub fn new(config: &RoomConfig) -> Self {
        ChatLimiter {
            min_millis_per_message: config.chat_min_millis_per_message,
            spam_grace_count: config.chat_spam_grace_count,
            max_spam_per_minute: config.chat_max_spam_per_minute,
            senders: HashMap::new(),
        }
    }

    pub fn check(&mut self, username: &str, now: Instant) -> ChatDecision {
        let entry = self.senders.entry(username.to_string()).or_insert_with(|| SenderRate {
            last_message_at: now - std::time::Duration::from_secs(3600),
            messages_this_minute: 0,
            minute_started_at: now,
            grace_used: 0,
        });

        if now.duration_since(entry.minute_started_at) >= std::time::Duration::from_secs(60) {
            entry.minute_started_at = now;
            entry.messages_this_minute = 0;
        }

        let too_soon = now.duration_since(entry.last_message_at).as_millis()
            < self.min_millis_per_message as u128;

        if too_soon {
            if entry.grace_used < self.spam_grace_count {
                entry.grace_used += 1;
            } else {
                return ChatDecision::RateLimited;
            }
        } else {
            entry.grace_used = 0;
        }

        if entry.messages_this_minute >= self.max_spam_per_minute {
            return ChatDecision::RateLimited;
        }

        entry.last_message_at = now;
        entry.messages_this_minute += 1;
        ChatDecision::Accept
    }
}

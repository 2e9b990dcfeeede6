//! Access control decisions for incoming events.
//!
//! A sender passes if they are statically allowed (user or chat list), are
//! the admin, or any of their identifiers appears in the dynamic whitelist.
//! Decisions are computed per event and never cached.

use crate::config::TelegramSettings;
use crate::whitelist::WhitelistStore;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

pub struct AccessPolicy {
    admin_id: i64,
    allowed_users: HashSet<i64>,
    allowed_chats: HashSet<i64>,
    whitelist: Arc<WhitelistStore>,
}

impl AccessPolicy {
    #[must_use]
    pub fn new(telegram: &TelegramSettings, whitelist: Arc<WhitelistStore>) -> Self {
        Self {
            admin_id: telegram.admin_id,
            allowed_users: telegram.allowed_users.iter().copied().collect(),
            allowed_chats: telegram.allowed_chats.iter().copied().collect(),
            whitelist,
        }
    }

    /// Whether this sender may invoke commands at all.
    ///
    /// Logs a warning on denial; has no other side effects.
    #[must_use]
    pub fn is_allowed(&self, user_id: i64, chat_id: i64, username: Option<&str>) -> bool {
        if user_id == self.admin_id
            || self.allowed_users.contains(&user_id)
            || self.allowed_chats.contains(&chat_id)
        {
            return true;
        }
        if self.whitelist.is_whitelisted_id(user_id) || self.whitelist.is_whitelisted_id(chat_id) {
            return true;
        }
        if let Some(name) = username {
            if self.whitelist.is_whitelisted(name) {
                return true;
            }
        }
        debug!("Message from user {user_id}, chat {chat_id} was blocked");
        false
    }

    /// Exact admin identity check, used by whitelist management commands.
    #[must_use]
    pub fn is_admin(&self, user_id: i64) -> bool {
        user_id == self.admin_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelegramSettings;
    use tempfile::TempDir;

    fn policy(admin: i64, users: Vec<i64>, chats: Vec<i64>) -> (TempDir, AccessPolicy) {
        let dir = TempDir::new().expect("tempdir");
        let whitelist =
            Arc::new(WhitelistStore::open(dir.path().join("wl.txt")).expect("open store"));
        let telegram = TelegramSettings {
            bot_token: "123:abc".to_string(),
            admin_id: admin,
            allowed_users: users,
            allowed_chats: chats,
        };
        (dir, AccessPolicy::new(&telegram, whitelist))
    }

    #[test]
    fn static_lists_and_admin_allow() {
        let (_dir, policy) = policy(42, vec![1], vec![-100]);
        assert!(policy.is_allowed(1, 555, None));
        assert!(policy.is_allowed(999, -100, None));
        assert!(policy.is_allowed(42, 555, None));
        assert!(!policy.is_allowed(7, 555, None));
    }

    #[test]
    fn whitelisted_identifiers_allow() {
        let dir = TempDir::new().expect("tempdir");
        let whitelist =
            Arc::new(WhitelistStore::open(dir.path().join("wl.txt")).expect("open store"));
        whitelist.whitelist("bob").expect("whitelist bob");
        whitelist.whitelist("777").expect("whitelist 777");
        let telegram = TelegramSettings {
            bot_token: "123:abc".to_string(),
            admin_id: 42,
            allowed_users: Vec::new(),
            allowed_chats: Vec::new(),
        };
        let policy = AccessPolicy::new(&telegram, whitelist);

        assert!(policy.is_allowed(777, 1, None));
        assert!(policy.is_allowed(1, 777, None));
        assert!(policy.is_allowed(1, 2, Some("Bob")));
        assert!(!policy.is_allowed(1, 2, Some("carol")));
        assert!(!policy.is_allowed(1, 2, None));
    }

    #[test]
    fn is_admin_is_exact() {
        let (_dir, policy) = policy(42, vec![7], Vec::new());
        assert!(policy.is_admin(42));
        assert!(!policy.is_admin(7));
        assert!(!policy.is_admin(-42));
    }
}

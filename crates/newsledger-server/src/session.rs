//! Per-connection session state.

use newsledger_nntp::GroupName;

use crate::auth::{UserInfo, UserPriv};
use crate::config::RunConfig;

/// The selected group and article pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCursor {
    /// Selected group.
    pub group: GroupName,
    /// Current article number; `None` when the group was empty.
    pub article: Option<u64>,
}

/// State owned by one connection.
///
/// Created at accept time from the run configuration, changed only by
/// commands on that connection and dropped on disconnect.
#[derive(Debug, Clone)]
pub struct Session {
    authenticated: bool,
    privileges: UserPriv,
    tls_active: bool,
    pending_login: Option<UserInfo>,
    current: Option<GroupCursor>,
}

impl Session {
    /// Creates a session with the configured default privileges.
    #[must_use]
    pub const fn new(config: &RunConfig) -> Self {
        Self {
            authenticated: false,
            privileges: config.default_priv,
            tls_active: false,
            pending_login: None,
            current: None,
        }
    }

    /// Returns true after a successful AUTHINFO or certificate login.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Returns the current privileges.
    #[must_use]
    pub const fn privileges(&self) -> UserPriv {
        self.privileges
    }

    /// Reading is allowed.
    #[must_use]
    pub const fn can_read(&self) -> bool {
        self.privileges.read
    }

    /// Posting is allowed.
    #[must_use]
    pub const fn can_post(&self) -> bool {
        self.privileges.post
    }

    /// Returns true once TLS is active.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.tls_active
    }

    /// Returns the selected group, if any.
    #[must_use]
    pub const fn current(&self) -> Option<&GroupCursor> {
        self.current.as_ref()
    }

    /// Selects a group and article.
    pub fn select(&mut self, group: GroupName, article: Option<u64>) {
        self.current = Some(GroupCursor { group, article });
    }

    /// Moves the article pointer within the selected group.
    pub fn set_article(&mut self, number: u64) {
        if let Some(cursor) = self.current.as_mut() {
            cursor.article = Some(number);
        }
    }

    /// Marks the session authenticated as `user`.
    pub fn login(&mut self, user: &UserInfo) {
        self.authenticated = true;
        self.pending_login = None;
        self.privileges = self.privileges.merge(user.privileges);
    }

    /// Remembers the user named by AUTHINFO USER.
    pub fn set_pending_login(&mut self, user: UserInfo) {
        self.pending_login = Some(user);
    }

    /// Takes the pending AUTHINFO USER, clearing it.
    pub fn take_pending_login(&mut self) -> Option<UserInfo> {
        self.pending_login.take()
    }

    /// Returns true while an AUTHINFO USER awaits its PASS.
    #[must_use]
    pub const fn has_pending_login(&self) -> bool {
        self.pending_login.is_some()
    }

    /// Records TLS activation: the group selection is dropped and
    /// `tls_priv` is granted.
    pub fn activate_tls(&mut self, tls_priv: UserPriv) {
        self.tls_active = true;
        self.current = None;
        self.privileges = self.privileges.merge(tls_priv);
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn restricted() -> RunConfig {
        RunConfig::builder().default_priv(UserPriv::NONE).build()
    }

    #[test]
    fn test_new_session() {
        let session = Session::new(&restricted());
        assert!(!session.is_authenticated());
        assert!(!session.can_read());
        assert!(!session.is_tls());
        assert!(session.current().is_none());
    }

    #[test]
    fn test_login_merges_privileges() {
        let mut session = Session::new(&restricted());
        let user = UserInfo {
            name: "bob".into(),
            password: None,
            privileges: UserPriv {
                read: true,
                post: false,
            },
        };
        session.set_pending_login(user.clone());
        assert!(session.has_pending_login());
        session.login(&user);
        assert!(session.is_authenticated());
        assert!(!session.has_pending_login());
        assert!(session.can_read());
        assert!(!session.can_post());
    }

    #[test]
    fn test_tls_clears_selection() {
        let mut session = Session::new(&restricted());
        session.select(GroupName::parse(b"misc.test").unwrap(), Some(1));
        session.set_article(2);
        assert_eq!(session.current().unwrap().article, Some(2));
        session.activate_tls(UserPriv::ALL);
        assert!(session.current().is_none());
        assert!(session.is_tls());
        assert_eq!(session.privileges(), UserPriv::ALL);
    }
}

//! NNTP status codes.

/// Three-digit NNTP status code.
///
/// Values are always within 100..=599 when produced by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResponseCode(u16);

impl ResponseCode {
    /// Creates a response code without range checking.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true for informational codes (1xx).
    #[must_use]
    pub const fn is_informational(self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    /// Returns true for completion codes (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true for continuation codes (3xx).
    #[must_use]
    pub const fn is_continuation(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Returns true for temporary failures (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true for permanent failures (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl PartialEq<u16> for ResponseCode {
    fn eq(&self, other: &u16) -> bool {
        self.0 == *other
    }
}

// Codes used by the server and the puller
impl ResponseCode {
    /// 100 help text follows
    pub const HELP_FOLLOWS: Self = Self(100);
    /// 101 capability list follows
    pub const CAPABILITIES_FOLLOW: Self = Self(101);
    /// 111 server date and time
    pub const DATE: Self = Self(111);
    /// 200 service available, posting allowed
    pub const READY_POSTING_ALLOWED: Self = Self(200);
    /// 201 service available, posting prohibited
    pub const READY_NO_POSTING: Self = Self(201);
    /// 205 connection closing
    pub const CLOSING: Self = Self(205);
    /// 202 slave status noted
    pub const SLAVE_NOTED: Self = Self(202);
    /// 203 streaming permitted
    pub const STREAMING_OK: Self = Self(203);
    /// 211 group selected
    pub const GROUP_SELECTED: Self = Self(211);
    /// 215 information follows
    pub const LIST_FOLLOWS: Self = Self(215);
    /// 220 article follows
    pub const ARTICLE_FOLLOWS: Self = Self(220);
    /// 221 headers follow (also XHDR)
    pub const HEAD_FOLLOWS: Self = Self(221);
    /// 222 body follows
    pub const BODY_FOLLOWS: Self = Self(222);
    /// 223 article exists and selected
    pub const ARTICLE_EXISTS: Self = Self(223);
    /// 224 overview information follows
    pub const OVERVIEW_FOLLOWS: Self = Self(224);
    /// 225 headers follow (HDR)
    pub const HDR_FOLLOWS: Self = Self(225);
    /// 230 list of new articles follows
    pub const NEW_ARTICLES_FOLLOW: Self = Self(230);
    /// 231 list of new newsgroups follows
    pub const NEW_GROUPS_FOLLOW: Self = Self(231);
    /// 235 article transferred OK
    pub const TRANSFER_OK: Self = Self(235);
    /// 238 send article (CHECK)
    pub const CHECK_SEND: Self = Self(238);
    /// 239 article transferred OK (TAKETHIS)
    pub const TAKETHIS_OK: Self = Self(239);
    /// 240 article received OK
    pub const POST_OK: Self = Self(240);
    /// 281 authentication accepted
    pub const AUTH_ACCEPTED: Self = Self(281);
    /// 282 XGTITLE list follows
    pub const XGTITLE_FOLLOWS: Self = Self(282);
    /// 335 send article to be transferred
    pub const SEND_TRANSFER: Self = Self(335);
    /// 340 send article to be posted
    pub const SEND_POST: Self = Self(340);
    /// 381 password required
    pub const PASSWORD_REQUIRED: Self = Self(381);
    /// 382 continue with TLS negotiation
    pub const CONTINUE_TLS: Self = Self(382);
    /// 400 service discontinued
    pub const SERVICE_DISCONTINUED: Self = Self(400);
    /// 403 internal fault
    pub const INTERNAL_FAULT: Self = Self(403);
    /// 411 no such newsgroup
    pub const NO_SUCH_GROUP: Self = Self(411);
    /// 412 no newsgroup selected
    pub const NO_GROUP_SELECTED: Self = Self(412);
    /// 420 current article number is invalid
    pub const NO_CURRENT_ARTICLE: Self = Self(420);
    /// 421 no next article in this group
    pub const NO_NEXT_ARTICLE: Self = Self(421);
    /// 422 no previous article in this group
    pub const NO_PREVIOUS_ARTICLE: Self = Self(422);
    /// 423 no article with that number / in that range
    pub const NO_ARTICLE_WITH_NUMBER: Self = Self(423);
    /// 430 no article with that Message-ID
    pub const NO_ARTICLE_WITH_ID: Self = Self(430);
    /// 431 try sending the article later (CHECK)
    pub const CHECK_LATER: Self = Self(431);
    /// 435 article not wanted (IHAVE)
    pub const TRANSFER_NOT_WANTED: Self = Self(435);
    /// 436 transfer not possible, try again later
    pub const TRANSFER_LATER: Self = Self(436);
    /// 437 transfer rejected, do not retry
    pub const TRANSFER_REJECTED: Self = Self(437);
    /// 438 article not wanted (CHECK)
    pub const CHECK_NOT_WANTED: Self = Self(438);
    /// 439 transfer rejected (TAKETHIS)
    pub const TAKETHIS_REJECTED: Self = Self(439);
    /// 440 posting not permitted
    pub const POSTING_NOT_PERMITTED: Self = Self(440);
    /// 441 posting failed
    pub const POSTING_FAILED: Self = Self(441);
    /// 480 authentication required
    pub const AUTH_REQUIRED: Self = Self(480);
    /// 481 authentication failed
    pub const AUTH_REJECTED: Self = Self(481);
    /// 482 authentication commands issued out of sequence
    pub const AUTH_OUT_OF_SEQUENCE: Self = Self(482);
    /// 483 command unavailable until the connection is encrypted
    pub const ENCRYPTION_REQUIRED: Self = Self(483);
    /// 500 unknown command
    pub const UNKNOWN_COMMAND: Self = Self(500);
    /// 501 syntax error
    pub const SYNTAX_ERROR: Self = Self(501);
    /// 502 permission denied
    pub const ACCESS_DENIED: Self = Self(502);
    /// 503 feature not supported
    pub const NOT_SUPPORTED: Self = Self(503);
    /// 580 cannot initiate TLS negotiation
    pub const TLS_UNAVAILABLE: Self = Self(580);
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

    #[test]
    fn test_classes() {
        assert!(ResponseCode::CAPABILITIES_FOLLOW.is_informational());
        assert!(ResponseCode::GROUP_SELECTED.is_success());
        assert!(ResponseCode::new(340).is_continuation());
        assert!(ResponseCode::NO_SUCH_GROUP.is_transient());
        assert!(ResponseCode::SYNTAX_ERROR.is_permanent());
        assert!(!ResponseCode::SYNTAX_ERROR.is_transient());
    }

    #[test]
    fn test_display_and_compare() {
        assert_eq!(ResponseCode::ARTICLE_FOLLOWS.to_string(), "220");
        assert_eq!(ResponseCode::new(211), 211);
        assert!(ResponseCode::new(420) < ResponseCode::new(440));
    }
}

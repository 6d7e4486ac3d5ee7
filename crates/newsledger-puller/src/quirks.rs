//! Remote implementations and workarounds.
//!
//! Peers identify themselves through `IMPLEMENTATION` in CAPABILITIES.
//! A few known ones tolerate larger listing slices, and one of them
//! reports watermarks in LIST ACTIVE that cannot be trusted.

use newsledger_nntp::Capability;

/// Articles asked for per slice by default.
pub const SMALL_SLICE: u64 = 800;

/// Articles asked for per slice from cooperative remotes.
pub const LARGE_SLICE: u64 = 2048;

/// Most descriptors kept from one slice listing.
pub const MAX_LIST_SIZE: usize = 2048;

/// Known remote implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoteKind {
    /// Anything else.
    #[default]
    Unknown,
    /// `srndv2` (nntpchan).
    Srndv2,
    /// `CNTPD`.
    Cntpd,
}

impl RemoteKind {
    /// Detects the implementation from a CAPABILITIES listing.
    #[must_use]
    pub fn detect(capabilities: &[Capability]) -> Self {
        for cap in capabilities {
            if let Capability::Implementation(name) = cap {
                let name = name.split_ascii_whitespace().next().unwrap_or_default();
                if name.eq_ignore_ascii_case("srndv2") {
                    return Self::Srndv2;
                }
                if name.eq_ignore_ascii_case("CNTPD") {
                    return Self::Cntpd;
                }
            }
        }
        Self::Unknown
    }
}

/// Workarounds in effect for one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteQuirks {
    /// The detected implementation.
    pub kind: RemoteKind,
    /// Slices of [`LARGE_SLICE`] articles are fine.
    pub large_slices: bool,
    /// A LIST ACTIVE line with high < low means "ask GROUP", not "empty".
    pub broken_active_list: bool,
}

impl RemoteQuirks {
    /// Returns the workarounds for a remote kind.
    #[must_use]
    pub const fn for_remote(kind: RemoteKind) -> Self {
        match kind {
            RemoteKind::Unknown => Self {
                kind,
                large_slices: false,
                broken_active_list: false,
            },
            RemoteKind::Srndv2 => Self {
                kind,
                large_slices: true,
                broken_active_list: true,
            },
            RemoteKind::Cntpd => Self {
                kind,
                large_slices: true,
                broken_active_list: false,
            },
        }
    }

    /// Returns how many articles one listing slice asks for.
    #[must_use]
    pub const fn slice_size(&self) -> u64 {
        if self.large_slices {
            LARGE_SLICE
        } else {
            SMALL_SLICE
        }
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

    fn caps(lines: &[&str]) -> Vec<Capability> {
        lines.iter().map(|l| Capability::parse(l)).collect()
    }

    #[test]
    fn test_detect() {
        assert_eq!(
            RemoteKind::detect(&caps(&["VERSION 2", "IMPLEMENTATION srndv2 1.0"])),
            RemoteKind::Srndv2
        );
        assert_eq!(
            RemoteKind::detect(&caps(&["IMPLEMENTATION cntpd"])),
            RemoteKind::Cntpd
        );
        assert_eq!(
            RemoteKind::detect(&caps(&["READER", "IMPLEMENTATION INN 2.7"])),
            RemoteKind::Unknown
        );
        assert_eq!(RemoteKind::detect(&[]), RemoteKind::Unknown);
    }

    #[test]
    fn test_quirks() {
        let q = RemoteQuirks::for_remote(RemoteKind::Srndv2);
        assert!(q.broken_active_list);
        assert_eq!(q.slice_size(), LARGE_SLICE);

        let q = RemoteQuirks::for_remote(RemoteKind::Cntpd);
        assert!(!q.broken_active_list);
        assert_eq!(q.slice_size(), LARGE_SLICE);

        assert_eq!(RemoteQuirks::default().slice_size(), SMALL_SLICE);
    }
}

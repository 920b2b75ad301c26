//! Access-control translation
//!
//! Objects carry a list of grants (grantee + permission). The filesystem view
//! works with [`Rights`]: a bitset of four right levels for each of three
//! recognized grantee groups (the owner, every authenticated user of the store
//! and everyone). Grants that fit none of the groups are kept aside verbatim
//! and written back untouched.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Group URI for any authenticated user of the store
pub const AUTHENTICATED_USERS_URI: &str =
    "http://acs.amazonaws.com/groups/global/AuthenticatedUsers";

/// Group URI for anonymous access
pub const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

/// Identity owning a bucket or object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Who a grant applies to, as the store describes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Grantee {
    CanonicalUser {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
    },
    Group {
        uri: String,
    },
    Email {
        address: String,
    },
    /// Grantee the adapter cannot model, kept field for field
    Raw {
        kind: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        uri: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
    },
}

/// Store permission names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    Read,
    Write,
    ReadAcp,
    WriteAcp,
    FullControl,
    /// Permission name the adapter does not know
    Other(String),
}

impl Permission {
    pub fn as_str(&self) -> &str {
        match self {
            Permission::Read => "READ",
            Permission::Write => "WRITE",
            Permission::ReadAcp => "READ_ACP",
            Permission::WriteAcp => "WRITE_ACP",
            Permission::FullControl => "FULL_CONTROL",
            Permission::Other(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name {
            "READ" => Permission::Read,
            "WRITE" => Permission::Write,
            "READ_ACP" => Permission::ReadAcp,
            "WRITE_ACP" => Permission::WriteAcp,
            "FULL_CONTROL" => Permission::FullControl,
            other => Permission::Other(other.to_string()),
        }
    }
}

/// A single access grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub grantee: Grantee,
    pub permission: Permission,
}

/// Owner and grants of one bucket or object
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessControlList {
    pub owner: Option<Owner>,
    pub grants: Vec<Grant>,
}

/// Recognized grantee groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RightGroup {
    Owner,
    Authenticated,
    Everyone,
}

impl RightGroup {
    pub const ALL: [RightGroup; 3] = [
        RightGroup::Owner,
        RightGroup::Authenticated,
        RightGroup::Everyone,
    ];

    const fn shift(self) -> u16 {
        match self {
            RightGroup::Owner => 0,
            RightGroup::Authenticated => 4,
            RightGroup::Everyone => 8,
        }
    }

    /// Single-letter code used in summaries
    pub const fn code(self) -> char {
        match self {
            RightGroup::Owner => 'O',
            RightGroup::Authenticated => 'U',
            RightGroup::Everyone => 'E',
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "O" | "o" => Some(RightGroup::Owner),
            "U" | "u" => Some(RightGroup::Authenticated),
            "E" | "e" => Some(RightGroup::Everyone),
            _ => None,
        }
    }
}

/// Right levels within a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RightLevel {
    Read,
    Write,
    ReadAcp,
    WriteAcp,
}

impl RightLevel {
    pub const ALL: [RightLevel; 4] = [
        RightLevel::Read,
        RightLevel::Write,
        RightLevel::ReadAcp,
        RightLevel::WriteAcp,
    ];

    const fn bit(self) -> u16 {
        match self {
            RightLevel::Read => 1,
            RightLevel::Write => 2,
            RightLevel::ReadAcp => 4,
            RightLevel::WriteAcp => 8,
        }
    }

    fn permission(self) -> Permission {
        match self {
            RightLevel::Read => Permission::Read,
            RightLevel::Write => Permission::Write,
            RightLevel::ReadAcp => Permission::ReadAcp,
            RightLevel::WriteAcp => Permission::WriteAcp,
        }
    }
}

const GROUP_MASK: u16 = 0xF;

/// Levels that make up full control
const FULL_LEVELS: u16 = 1 | 4 | 8;

/// Rights bitset over all recognized groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rights(u16);

impl Rights {
    pub const NONE: Rights = Rights(0);

    pub const fn from_bits(bits: u16) -> Self {
        Rights(bits & 0xFFF)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn flag(group: RightGroup, level: RightLevel) -> Self {
        Rights(level.bit() << group.shift())
    }

    /// Read, read-acl and write-acl for one group
    pub const fn full(group: RightGroup) -> Self {
        Rights(FULL_LEVELS << group.shift())
    }

    pub const fn contains(self, other: Rights) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn has(self, group: RightGroup, level: RightLevel) -> bool {
        self.contains(Self::flag(group, level))
    }

    pub const fn union(self, other: Rights) -> Self {
        Rights(self.0 | other.0)
    }

    pub const fn difference(self, other: Rights) -> Self {
        Rights(self.0 & !other.0)
    }

    /// The rights of one group, all other groups cleared
    pub const fn only(self, group: RightGroup) -> Self {
        Rights(self.0 & (GROUP_MASK << group.shift()))
    }

    const fn group_bits(self, group: RightGroup) -> u16 {
        (self.0 >> group.shift()) & GROUP_MASK
    }

    /// Compact summary: `O:F,E:R`, with `+` when unrecognized grants exist
    pub fn summary(self, unrecognized: bool) -> String {
        let mut tokens = Vec::new();
        for group in RightGroup::ALL {
            let bits = self.group_bits(group);
            let code = if bits & FULL_LEVELS == FULL_LEVELS {
                "F"
            } else if bits & RightLevel::Read.bit() != 0 {
                if bits & !RightLevel::Read.bit() != 0 {
                    "R+"
                } else {
                    "R"
                }
            } else {
                continue;
            };
            tokens.push(format!("{}:{}", group.code(), code));
        }
        if unrecognized {
            tokens.push("+".to_string());
        }
        tokens.join(",")
    }
}

impl fmt::Display for Rights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary(false))
    }
}

/// Parses `G:L[,G:L...]` where `G` is `O`, `U` or `E` and `L` is `F` or any
/// combination of `R` (read), `W` (write), `A` (read acl) and `P` (write acl).
impl FromStr for Rights {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut rights = Rights::NONE;
        for token in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (group, levels) = token
                .split_once(':')
                .ok_or_else(|| Error::General(format!("Invalid rights token '{token}'")))?;
            let group = RightGroup::from_code(group.trim())
                .ok_or_else(|| Error::General(format!("Unknown group '{group}' in '{token}'")))?;
            for c in levels.trim().chars() {
                let add = match c.to_ascii_uppercase() {
                    'F' => Rights::full(group),
                    'R' => Rights::flag(group, RightLevel::Read),
                    'W' => Rights::flag(group, RightLevel::Write),
                    'A' => Rights::flag(group, RightLevel::ReadAcp),
                    'P' => Rights::flag(group, RightLevel::WriteAcp),
                    '+' => continue,
                    other => {
                        return Err(Error::General(format!(
                            "Unknown right '{other}' in '{token}'"
                        )));
                    }
                };
                rights = rights.union(add);
            }
        }
        Ok(rights)
    }
}

/// A requested permission change, applied on top of the current rights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RightsChange {
    pub grant: Rights,
    pub revoke: Rights,
}

impl RightsChange {
    /// Replace the current rights entirely
    pub fn exact(rights: Rights) -> Self {
        Self {
            grant: rights,
            revoke: Rights::from_bits(u16::MAX).difference(rights),
        }
    }

    pub fn apply(&self, current: Rights) -> Rights {
        current.union(self.grant).difference(self.revoke)
    }
}

/// Recognized classification of a grantee relative to an owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GranteeKind {
    Owner,
    AllAuthenticated,
    AllAnonymous,
    Unrecognized,
}

impl GranteeKind {
    fn group(self) -> Option<RightGroup> {
        match self {
            GranteeKind::Owner => Some(RightGroup::Owner),
            GranteeKind::AllAuthenticated => Some(RightGroup::Authenticated),
            GranteeKind::AllAnonymous => Some(RightGroup::Everyone),
            GranteeKind::Unrecognized => None,
        }
    }
}

/// Classify a grantee
///
/// A canonical user only counts as the owner group when its id is the owner's.
pub fn grantee_kind(grantee: &Grantee, owner: Option<&Owner>) -> GranteeKind {
    match grantee {
        Grantee::CanonicalUser { id, .. } if owner.is_some_and(|o| &o.id == id) => {
            GranteeKind::Owner
        }
        Grantee::CanonicalUser { id, .. } => {
            tracing::debug!(grantee = %id, "Unsupported permission for canonical user");
            GranteeKind::Unrecognized
        }
        Grantee::Group { uri } if uri == AUTHENTICATED_USERS_URI => GranteeKind::AllAuthenticated,
        Grantee::Group { uri } if uri == ALL_USERS_URI => GranteeKind::AllAnonymous,
        Grantee::Group { .. } | Grantee::Email { .. } | Grantee::Raw { .. } => {
            GranteeKind::Unrecognized
        }
    }
}

/// Rights contributed by one grant; empty when the grant is unrecognized
pub fn grant_rights(grant: &Grant, owner: Option<&Owner>) -> Rights {
    let Some(group) = grantee_kind(&grant.grantee, owner).group() else {
        return Rights::NONE;
    };
    match grant.permission {
        Permission::FullControl => Rights::full(group),
        Permission::Read => Rights::flag(group, RightLevel::Read),
        Permission::Write => Rights::flag(group, RightLevel::Write),
        Permission::ReadAcp => Rights::flag(group, RightLevel::ReadAcp),
        Permission::WriteAcp => Rights::flag(group, RightLevel::WriteAcp),
        Permission::Other(_) => Rights::NONE,
    }
}

/// Permission view of an ACL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionView {
    pub owner: Option<Owner>,
    pub rights: Rights,
    /// Grants outside the recognized groups, in their original order
    pub preserved: Vec<Grant>,
    pub summary: String,
}

impl PermissionView {
    /// Translate an ACL into rights plus preserved grants
    pub fn from_acl(acl: &AccessControlList) -> Self {
        let owner = acl.owner.as_ref();
        let mut rights = Rights::NONE;
        let mut preserved = Vec::new();
        for grant in &acl.grants {
            let granted = grant_rights(grant, owner);
            if granted.is_empty() {
                preserved.push(grant.clone());
            } else {
                rights = rights.union(granted);
            }
        }
        let summary = rights.summary(!preserved.is_empty());
        Self {
            owner: acl.owner.clone(),
            rights,
            preserved,
            summary,
        }
    }

    /// Build the ACL to write back for the given rights
    ///
    /// Groups holding read, read-acl and write-acl get one full-control
    /// grant. Preserved grants follow the computed ones unchanged.
    pub fn to_acl(&self, rights: Rights) -> Result<AccessControlList> {
        let mut grants = Vec::new();
        for group in RightGroup::ALL {
            let mut remaining = rights.only(group);
            if remaining.is_empty() {
                continue;
            }
            let grantee = match group {
                RightGroup::Owner => {
                    let owner = self.owner.as_ref().ok_or_else(|| {
                        Error::General("Cannot grant owner rights: owner is unknown".into())
                    })?;
                    Grantee::CanonicalUser {
                        id: owner.id.clone(),
                        display_name: owner.display_name.clone(),
                    }
                }
                RightGroup::Authenticated => Grantee::Group {
                    uri: AUTHENTICATED_USERS_URI.to_string(),
                },
                RightGroup::Everyone => Grantee::Group {
                    uri: ALL_USERS_URI.to_string(),
                },
            };
            let full = Rights::full(group);
            if remaining.contains(full) {
                grants.push(Grant {
                    grantee: grantee.clone(),
                    permission: Permission::FullControl,
                });
                remaining = remaining.difference(full);
            }
            for level in RightLevel::ALL {
                if remaining.has(group, level) {
                    grants.push(Grant {
                        grantee: grantee.clone(),
                        permission: level.permission(),
                    });
                }
            }
        }
        grants.extend(self.preserved.iter().cloned());
        Ok(AccessControlList {
            owner: self.owner.clone(),
            grants,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Owner {
        Owner {
            id: "owner-id".into(),
            display_name: Some("alice".into()),
        }
    }

    fn user(id: &str) -> Grantee {
        Grantee::CanonicalUser {
            id: id.into(),
            display_name: None,
        }
    }

    fn group(uri: &str) -> Grantee {
        Grantee::Group { uri: uri.into() }
    }

    fn grant(grantee: Grantee, permission: Permission) -> Grant {
        Grant {
            grantee,
            permission,
        }
    }

    #[test]
    fn test_full_control_expands() {
        let acl = AccessControlList {
            owner: Some(owner()),
            grants: vec![grant(user("owner-id"), Permission::FullControl)],
        };
        let view = PermissionView::from_acl(&acl);
        assert_eq!(view.rights, Rights::full(RightGroup::Owner));
        assert_eq!(view.summary, "O:F");
        assert!(view.preserved.is_empty());
    }

    #[test]
    fn test_summary_tokens() {
        let acl = AccessControlList {
            owner: Some(owner()),
            grants: vec![
                grant(user("owner-id"), Permission::FullControl),
                grant(group(AUTHENTICATED_USERS_URI), Permission::Read),
                grant(group(AUTHENTICATED_USERS_URI), Permission::ReadAcp),
                grant(group(ALL_USERS_URI), Permission::Read),
            ],
        };
        let view = PermissionView::from_acl(&acl);
        assert_eq!(view.summary, "O:F,U:R+,E:R");
    }

    #[test]
    fn test_acp_without_read_has_no_token() {
        let rights = Rights::flag(RightGroup::Everyone, RightLevel::WriteAcp);
        assert_eq!(rights.summary(false), "");
        assert_eq!(rights.summary(true), "+");
    }

    #[test]
    fn test_foreign_user_is_unrecognized() {
        let acl = AccessControlList {
            owner: Some(owner()),
            grants: vec![
                grant(user("owner-id"), Permission::FullControl),
                grant(user("someone-else"), Permission::Read),
                grant(
                    group("http://acs.amazonaws.com/groups/s3/LogDelivery"),
                    Permission::Write,
                ),
            ],
        };
        let view = PermissionView::from_acl(&acl);
        assert_eq!(view.preserved.len(), 2);
        assert_eq!(view.summary, "O:F,+");
    }

    #[test]
    fn test_write_back_collapses_full_control() {
        let view = PermissionView::from_acl(&AccessControlList {
            owner: Some(owner()),
            grants: vec![],
        });
        let rights: Rights = "O:RAP,E:R".parse().unwrap();
        let acl = view.to_acl(rights).unwrap();
        assert_eq!(
            acl.grants,
            vec![
                grant(
                    Grantee::CanonicalUser {
                        id: "owner-id".into(),
                        display_name: Some("alice".into())
                    },
                    Permission::FullControl
                ),
                grant(group(ALL_USERS_URI), Permission::Read),
            ]
        );
    }

    #[test]
    fn test_write_back_individual_grants() {
        let view = PermissionView::from_acl(&AccessControlList {
            owner: Some(owner()),
            grants: vec![],
        });
        let rights = Rights::flag(RightGroup::Authenticated, RightLevel::Read)
            .union(Rights::flag(RightGroup::Authenticated, RightLevel::WriteAcp));
        let acl = view.to_acl(rights).unwrap();
        let permissions: Vec<_> = acl.grants.iter().map(|g| g.permission.clone()).collect();
        assert_eq!(permissions, vec![Permission::Read, Permission::WriteAcp]);
    }

    #[test]
    fn test_round_trip_preserves_grants() {
        let foreign = grant(user("auditor"), Permission::Other("X_CUSTOM".into()));
        let log = grant(
            Grantee::Email {
                address: "ops@example.com".into(),
            },
            Permission::Read,
        );
        let raw = grant(
            Grantee::Raw {
                kind: "Federated".into(),
                id: None,
                display_name: None,
                uri: Some("urn:example:idp".into()),
                email: None,
            },
            Permission::Read,
        );
        let acl = AccessControlList {
            owner: Some(owner()),
            grants: vec![
                foreign.clone(),
                grant(user("owner-id"), Permission::FullControl),
                grant(group(ALL_USERS_URI), Permission::Read),
                log.clone(),
                raw.clone(),
            ],
        };
        let view = PermissionView::from_acl(&acl);
        let written = view.to_acl(view.rights).unwrap();
        let reread = PermissionView::from_acl(&written);

        assert_eq!(reread.rights, view.rights);
        assert_eq!(reread.preserved, vec![foreign, log, raw]);
    }

    #[test]
    fn test_owner_rights_need_owner() {
        let view = PermissionView::from_acl(&AccessControlList::default());
        assert!(view.to_acl(Rights::full(RightGroup::Owner)).is_err());
        assert!(view.to_acl(Rights::flag(RightGroup::Everyone, RightLevel::Read)).is_ok());
    }

    #[test]
    fn test_rights_change() {
        let current: Rights = "O:F".parse().unwrap();
        let add: Rights = "E:R".parse().unwrap();
        let change = RightsChange {
            grant: add,
            revoke: Rights::NONE,
        };
        assert_eq!(change.apply(current).summary(false), "O:F,E:R");

        let change = RightsChange::exact("U:R".parse().unwrap());
        assert_eq!(change.apply(current).summary(false), "U:R");
    }

    #[test]
    fn test_parse_rights_errors() {
        assert!("X:R".parse::<Rights>().is_err());
        assert!("O:Z".parse::<Rights>().is_err());
        assert!("OR".parse::<Rights>().is_err());
        assert_eq!("".parse::<Rights>().unwrap(), Rights::NONE);
    }

    #[test]
    fn test_permission_names() {
        assert_eq!(Permission::parse("READ_ACP"), Permission::ReadAcp);
        assert_eq!(Permission::parse("FULL_CONTROL").as_str(), "FULL_CONTROL");
        assert_eq!(Permission::parse("WEIRD"), Permission::Other("WEIRD".into()));
    }
}

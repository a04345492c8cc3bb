//! Cluster membership
//!
//! Member identities, their typed attributes and the local view of the
//! cluster built from replicated member records.

pub mod attributes;
pub mod member;
pub mod membership;

pub use attributes::{
    Attribute, AttributeChange, AttributeError, AttributeKind, AttributeResult, AttributeStore, AttributeType,
    AttributeValue,
};
pub use member::{AttributeEntry, Member};
pub use membership::{ClusterView, MembershipError, MembershipResult};

/// Factory id of the membership portables
pub const CLUSTER_FACTORY_ID: i32 = -2;

/// Class id of an encoded [`Member`]
pub const MEMBER_CLASS_ID: i32 = 1;

/// Class id of one encoded attribute
pub const ATTRIBUTE_ENTRY_CLASS_ID: i32 = 2;

//! Cluster view
//!
//! The local member plus every remote member this node has heard about.
//! Remote entries are created and refreshed from encoded member records;
//! how those records travel between nodes is up to the caller.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info};

use super::member::Member;
use crate::portable::{PortableCodec, PortableError};

/// Result type for membership operations
pub type MembershipResult<T> = Result<T, MembershipError>;

/// Membership errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MembershipError {
    /// The view must be anchored on the local member
    #[error("member {0} is not local")]
    NotLocal(String),

    /// A replicated record claimed the local member's id
    #[error("record for local member {0} rejected")]
    LocalRecord(String),

    /// Record could not be encoded or decoded
    #[error("member record: {0}")]
    Portable(#[from] PortableError),
}

/// Local member plus known remote members
#[derive(Debug)]
pub struct ClusterView {
    local: Member,
    remotes: DashMap<String, Member>,
    codec: PortableCodec,
}

impl ClusterView {
    pub fn new(local: Member, codec: PortableCodec) -> MembershipResult<Self> {
        if !local.is_local() {
            return Err(MembershipError::NotLocal(local.id().to_string()));
        }
        Ok(Self {
            local,
            remotes: DashMap::new(),
            codec,
        })
    }

    pub fn local_member(&self) -> &Member {
        &self.local
    }

    /// Look up any member by id
    pub fn member(&self, id: &str) -> Option<Member> {
        if self.local.id() == id {
            return Some(self.local.clone());
        }
        self.remotes.get(id).map(|entry| entry.value().clone())
    }

    /// All members, local first, remotes ordered by id
    pub fn members(&self) -> Vec<Member> {
        let mut remotes: Vec<Member> = self.remotes.iter().map(|entry| entry.value().clone()).collect();
        remotes.sort_by(|a, b| a.id().cmp(b.id()));

        let mut members = Vec::with_capacity(remotes.len() + 1);
        members.push(self.local.clone());
        members.extend(remotes);
        members
    }

    /// Number of members including the local one
    pub fn len(&self) -> usize {
        self.remotes.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Encode the local member for exchange
    pub fn member_record(&self) -> MembershipResult<Bytes> {
        Ok(self.codec.encode(&self.local)?)
    }

    /// Adopt a replicated member record
    ///
    /// A known member keeps its attribute store; its contents are replaced
    /// with the record's snapshot so existing holders see the update.
    pub fn apply_member_record(&self, record: &[u8]) -> MembershipResult<Member> {
        let incoming: Member = self.codec.decode_as(record)?;
        if incoming.id() == self.local.id() {
            return Err(MembershipError::LocalRecord(incoming.id().to_string()));
        }

        if let Some(existing) = self.remotes.get(incoming.id()) {
            if existing.socket_address() == incoming.socket_address() {
                existing
                    .attributes()
                    .replace_all(incoming.attributes().get_all().map(|a| (a.key, a.value)));
                debug!(member = %existing.id(), "refreshed member attributes");
                return Ok(existing.value().clone());
            }
        }

        info!(member = %incoming, "member added");
        self.remotes.insert(incoming.id().to_string(), incoming.clone());
        Ok(incoming)
    }

    /// Forget a remote member
    pub fn remove_member(&self, id: &str) -> Option<Member> {
        let removed = self.remotes.remove(id).map(|(_, member)| member);
        if let Some(member) = &removed {
            info!(member = %member, "member removed");
        }
        removed
    }

    /// Shared store of a member's attributes
    pub fn attributes_of(&self, id: &str) -> Option<Arc<super::AttributeStore>> {
        self.member(id).map(|member| Arc::clone(member.attributes()))
    }
}

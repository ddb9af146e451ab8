//! Tenant scoping.
//!
//! Two-level hierarchy: a district contains local congregations. The
//! district is the encryption key-derivation scope; the local congregation
//! is the access-scoping unit for reviewers and grants.

use serde::{Deserialize, Serialize};

/// A district — the key-derivation tenant scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistrictId(pub String);

impl DistrictId {
    /// Wrap a district code (e.g. `"D-NORTH"`).
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The district code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DistrictId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A local congregation — the access-scoping unit within a district.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub String);

impl LocalId {
    /// Wrap a local congregation code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The local code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LocalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully qualified tenant scope: district plus local congregation.
///
/// Every registry record, grant, and officer identity carries one of these.
/// Scoped reviewer roles may only act within a matching scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantScope {
    /// The owning district (encryption key-derivation scope).
    pub district: DistrictId,
    /// The local congregation (access-scoping unit).
    pub local: LocalId,
}

impl TenantScope {
    /// Build a scope from district and local codes.
    pub fn new(district: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            district: DistrictId::new(district),
            local: LocalId::new(local),
        }
    }
}

impl std::fmt::Display for TenantScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.district, self.local)
    }
}

//! Tenant identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Longest name that still leaves room for the `-tenant` namespace suffix
/// inside the 63-character DNS label limit.
const MAX_TENANT_NAME_LEN: usize = 56;

/// Kind of tenant. Exactly one `System` tenant carries the cluster-wide
/// monitoring stack; every other tenant is a `User` tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantType {
    System,
    User,
}

/// A logical workspace. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tenant {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TenantType,
}

impl Tenant {
    /// Build a tenant, rejecting names that are not DNS-1123 labels.
    pub fn new(name: impl Into<String>, kind: TenantType) -> CoreResult<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { name, kind })
    }

    pub fn system() -> Self {
        Self {
            name: "system".to_string(),
            kind: TenantType::System,
        }
    }

    pub fn user(name: &str) -> CoreResult<Self> {
        Self::new(name, TenantType::User)
    }

    pub fn is_system(&self) -> bool {
        self.kind == TenantType::System
    }

    /// Re-run name validation, e.g. after deserializing from a feed.
    pub fn validate(&self) -> CoreResult<()> {
        validate_name(&self.name)
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn validate_name(name: &str) -> CoreResult<()> {
    let invalid = |reason| CoreError::InvalidTenantName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.len() > MAX_TENANT_NAME_LEN {
        return Err(invalid("longer than 56 characters"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(invalid("only lowercase alphanumerics and '-' are allowed"));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid("must start and end with an alphanumeric"));
    }
    Ok(())
}

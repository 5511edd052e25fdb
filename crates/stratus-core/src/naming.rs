//! Naming rules shared by the composer and the ClickHouse reconciler.

use crate::tenant::Tenant;

/// Prefix carried by every tenant-owned ClickHouse database and user.
pub const CLICKHOUSE_TENANT_PREFIX: &str = "tenant_";

/// ClickHouse identity (database and user name) of a tenant.
///
/// ClickHouse rejects dashes in identifiers, so the name is prefixed and
/// its *first* dash becomes an underscore: `user-tenant` maps to
/// `tenant_user_tenant`, `a-b-c` maps to `tenant_a_b-c`. Existing
/// databases were created under this rule, so it must not change.
pub fn clickhouse_id(tenant: &Tenant) -> String {
    clickhouse_id_for_name(&tenant.name)
}

pub fn clickhouse_id_for_name(name: &str) -> String {
    format!("{CLICKHOUSE_TENANT_PREFIX}{}", name.replacen('-', "_", 1))
}

/// Namespace holding a tenant's stack.
pub fn tenant_namespace(tenant: &Tenant) -> String {
    format!("{}-tenant", tenant.name)
}

pub fn prometheus_name(tenant: &Tenant) -> String {
    format!("{}-prometheus", tenant.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clickhouse_id_replaces_first_dash_only() {
        assert_eq!(clickhouse_id_for_name("user-tenant"), "tenant_user_tenant");
        assert_eq!(clickhouse_id_for_name("a-b-c"), "tenant_a_b-c");
        assert_eq!(clickhouse_id_for_name("system"), "tenant_system");
    }

    #[test]
    fn clickhouse_id_from_tenant() {
        let t = Tenant::user("user-tenant").unwrap();
        assert_eq!(clickhouse_id(&t), "tenant_user_tenant");
    }

    #[test]
    fn tenant_namespace_and_prometheus_name() {
        let t = Tenant::user("dev").unwrap();
        assert_eq!(tenant_namespace(&t), "dev-tenant");
        assert_eq!(prometheus_name(&t), "dev-prometheus");
    }
}

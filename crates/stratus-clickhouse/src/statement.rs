//! DDL/DCL the reconciler issues. Every statement is idempotent.

use std::fmt;

/// One tenant-provisioning statement, carrying the ClickHouse id it
/// targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    CreateDatabase(String),
    CreateUser(String),
    Grant(String),
    DropUser(String),
    DropDatabase(String),
}

const TENANT_PRIVILEGES: &str = "SELECT, INSERT, ALTER, CREATE, DROP, TRUNCATE, OPTIMIZE, SHOW";

impl Statement {
    pub fn id(&self) -> &str {
        match self {
            Statement::CreateDatabase(id)
            | Statement::CreateUser(id)
            | Statement::Grant(id)
            | Statement::DropUser(id)
            | Statement::DropDatabase(id) => id,
        }
    }

    pub fn sql(&self) -> String {
        let ident = quote_ident(self.id());
        match self {
            Statement::CreateDatabase(_) => {
                format!("CREATE DATABASE IF NOT EXISTS {ident} ENGINE=Atomic")
            }
            Statement::CreateUser(id) => format!(
                "CREATE USER IF NOT EXISTS {ident} IDENTIFIED WITH plaintext_password BY '{}' \
                 HOST ANY DEFAULT DATABASE {ident}",
                escape_literal(&format!("{id}_password")),
            ),
            Statement::Grant(_) => format!("GRANT {TENANT_PRIVILEGES} ON {ident}.* TO {ident}"),
            Statement::DropUser(_) => format!("DROP USER IF EXISTS {ident}"),
            Statement::DropDatabase(_) => format!("DROP DATABASE IF EXISTS {ident}"),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql())
    }
}

/// Backtick-quote an identifier unless it is a plain `[A-Za-z0-9_]` word.
/// Ids such as `tenant_a_b-c` keep their later dashes and need quoting.
fn quote_ident(id: &str) -> String {
    let plain = !id.is_empty()
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !id.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        id.to_string()
    } else {
        format!("`{}`", id.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn escape_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_render_exact_sql() {
        let id = "tenant_dev".to_string();
        assert_eq!(
            Statement::CreateDatabase(id.clone()).sql(),
            "CREATE DATABASE IF NOT EXISTS tenant_dev ENGINE=Atomic"
        );
        assert_eq!(
            Statement::CreateUser(id.clone()).sql(),
            "CREATE USER IF NOT EXISTS tenant_dev IDENTIFIED WITH plaintext_password BY \
             'tenant_dev_password' HOST ANY DEFAULT DATABASE tenant_dev"
        );
        assert_eq!(
            Statement::Grant(id.clone()).sql(),
            "GRANT SELECT, INSERT, ALTER, CREATE, DROP, TRUNCATE, OPTIMIZE, SHOW ON tenant_dev.* TO tenant_dev"
        );
        assert_eq!(Statement::DropUser(id.clone()).sql(), "DROP USER IF EXISTS tenant_dev");
        assert_eq!(Statement::DropDatabase(id).sql(), "DROP DATABASE IF EXISTS tenant_dev");
    }

    #[test]
    fn dashed_ids_are_quoted() {
        let sql = Statement::DropDatabase("tenant_a_b-c".into()).sql();
        assert_eq!(sql, "DROP DATABASE IF EXISTS `tenant_a_b-c`");

        let sql = Statement::CreateUser("tenant_a_b-c".into()).sql();
        assert!(sql.contains("BY 'tenant_a_b-c_password'"));
        assert!(sql.ends_with("DEFAULT DATABASE `tenant_a_b-c`"));
    }
}

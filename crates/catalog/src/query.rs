// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Schema query builder
//!
//! Builds the fixed control commands used to discover the schema of a Kusto
//! cluster, and escapes identifiers before they are spliced into a command.

use crate::keywords::is_reserved_keyword;

/// Hosting environment whose proxy does not expose `PrettyName` for databases
const ARIA_PROXY_HOST: &str = "kusto.aria.microsoft.com";

/// Prefix the remote side puts in front of CLR type names
const SYSTEM_TYPE_PREFIX: &str = "System.";

/// Column names of the result sets produced by the queries below
pub mod columns {
    pub const DATABASE_NAME: &str = "DatabaseName";
    pub const PRETTY_NAME: &str = "PrettyName";
    pub const TABLE_NAME: &str = "TableName";
    pub const COLUMN_NAME: &str = "ColumnName";
    pub const COLUMN_TYPE: &str = "ColumnType";
    pub const FOLDER: &str = "Folder";
    pub const NAME: &str = "Name";
    pub const PARAMETERS: &str = "Parameters";
    pub const BODY: &str = "Body";
    pub const DOC_STRING: &str = "DocString";
    pub const COUNT: &str = "Count";
}

/// Builds the schema discovery commands
pub struct SchemaQueryBuilder;

impl SchemaQueryBuilder {
    /// List the databases of a cluster.
    ///
    /// The Aria proxy rejects the projection, so it is left out there.
    pub fn list_databases_query(cluster: &str) -> String {
        if cluster
            .to_ascii_lowercase()
            .contains(&ARIA_PROXY_HOST.to_ascii_lowercase())
        {
            ".show databases".to_string()
        } else {
            format!(
                ".show databases | project {}, {}",
                columns::DATABASE_NAME,
                columns::PRETTY_NAME
            )
        }
    }

    /// One row per column of every table in `database`
    pub fn database_schema_query(database: &str) -> String {
        format!(
            ".show database {} schema | where TableName != '' | project {}, {}, {}, {}",
            Self::escape_identifier(database, false),
            columns::TABLE_NAME,
            columns::COLUMN_NAME,
            columns::COLUMN_TYPE,
            columns::FOLDER
        )
    }

    /// Same shape as [`Self::database_schema_query`], restricted to one table
    pub fn table_schema_query(database: &str, table: &str) -> String {
        format!(
            ".show database {} schema | where TableName == {} | project {}, {}, {}, {}",
            Self::escape_identifier(database, false),
            Self::quote_literal(table),
            columns::TABLE_NAME,
            columns::COLUMN_NAME,
            columns::COLUMN_TYPE,
            columns::FOLDER
        )
    }

    /// Every function of the database the command runs against
    pub fn list_functions_query() -> String {
        format!(
            ".show functions | project {}, {}, {}, {}, {}",
            columns::NAME,
            columns::PARAMETERS,
            columns::BODY,
            columns::DOC_STRING,
            columns::FOLDER
        )
    }

    /// Lightweight query used to decide whether a database exists
    pub fn count_tables_query() -> String {
        ".show tables | count".to_string()
    }

    /// Strip the leading `System.` from a remote type name
    pub fn strip_system_prefix(column_type: &str) -> &str {
        column_type
            .strip_prefix(SYSTEM_TYPE_PREFIX)
            .unwrap_or(column_type)
    }

    /// Escape an identifier so it can be used verbatim in a query.
    ///
    /// Already escaped names and `*` are returned unchanged. Otherwise the
    /// name is wrapped when it contains a character outside `[A-Za-z0-9_]`,
    /// equals a reserved keyword, or `always_escape` is set.
    pub fn escape_identifier(name: &str, always_escape: bool) -> String {
        if Self::is_escaped(name) || name == "*" {
            return name.to_string();
        }

        let needs_escape = always_escape
            || name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            || is_reserved_keyword(name);

        if !needs_escape {
            return name.to_string();
        }

        match (name.contains('"'), name.contains('\'')) {
            (true, false) => format!("[@'{name}']"),
            // Verbatim literals escape a double quote by doubling it.
            (true, true) => format!("[@\"{}\"]", name.replace('"', "\"\"")),
            (false, _) => format!("[@\"{name}\"]"),
        }
    }

    fn is_escaped(name: &str) -> bool {
        name.starts_with("[@") && name.ends_with(']')
    }

    /// Single-quoted string literal
    fn quote_literal(value: &str) -> String {
        let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
        format!("'{escaped}'")
    }
}

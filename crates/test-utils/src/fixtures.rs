// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Test fixtures: result tables shaped like the schema discovery commands

use kusto_metadata_catalog::{ResultTable, SchemaQueryBuilder};
use serde_json::json;

use crate::mock_executor::MockQueryExecutorBuilder;

pub const CLUSTER: &str = "https://help.kusto.windows.net";
pub const SAMPLES: &str = "Samples";

/// Builders for result tables
pub struct SchemaFixtures;

impl SchemaFixtures {
    /// `.show databases` rows of `(DatabaseName, PrettyName)`
    pub fn databases(rows: &[(&str, &str)]) -> ResultTable {
        rows.iter().fold(
            ResultTable::new(["DatabaseName", "PrettyName"]),
            |table, (name, pretty)| table.with_row(vec![json!(name), json!(pretty)]),
        )
    }

    /// Schema rows of `(TableName, ColumnName, ColumnType, Folder)`
    pub fn schema(rows: &[(&str, &str, &str, &str)]) -> ResultTable {
        rows.iter().fold(
            ResultTable::new(["TableName", "ColumnName", "ColumnType", "Folder"]),
            |table, (name, column, column_type, folder)| {
                table.with_row(vec![
                    json!(name),
                    json!(column),
                    json!(column_type),
                    json!(folder),
                ])
            },
        )
    }

    /// Function rows of `(Name, Folder)` with a trivial body
    pub fn functions(rows: &[(&str, &str)]) -> ResultTable {
        rows.iter().fold(
            ResultTable::new(["Name", "Parameters", "Body", "DocString", "Folder"]),
            |table, (name, folder)| {
                table.with_row(vec![
                    json!(name),
                    json!("()"),
                    json!("{ print 1 }"),
                    json!(""),
                    json!(folder),
                ])
            },
        )
    }

    pub fn count(n: i64) -> ResultTable {
        ResultTable::new(["Count"]).with_row(vec![json!(n)])
    }

    /// Script a database: existence check, schema and functions
    pub fn script_database(
        builder: MockQueryExecutorBuilder,
        database: &str,
        schema: ResultTable,
        functions: ResultTable,
    ) -> MockQueryExecutorBuilder {
        builder
            .respond_on(
                database,
                SchemaQueryBuilder::count_tables_query(),
                Self::count(schema.len() as i64),
            )
            .respond_on(
                database,
                SchemaQueryBuilder::database_schema_query(database),
                schema,
            )
            .respond_on(database, SchemaQueryBuilder::list_functions_query(), functions)
    }

    /// `Samples` with a root table `Events(Id:int, Ts:datetime)` and a table
    /// `Logs(Msg:string)` in folder `Diagnostics`
    pub fn samples(builder: MockQueryExecutorBuilder) -> MockQueryExecutorBuilder {
        let builder = builder.respond(
            SchemaQueryBuilder::list_databases_query(CLUSTER),
            Self::databases(&[(SAMPLES, "")]),
        );
        Self::script_database(
            builder,
            SAMPLES,
            Self::schema(&[
                ("Events", "Id", "System.Int32", ""),
                ("Events", "Ts", "System.DateTime", ""),
                ("Logs", "Msg", "System.String", "Diagnostics"),
            ]),
            Self::functions(&[]),
        )
    }
}

// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Child resolution
//!
//! [`ChildResolver`] answers "what are the children of this object", reading
//! from the [`MetadataCache`] and populating it on a miss.
//!
//! The remote side has no notion of folders. A database is loaded with two
//! queries (its column schema and its functions) and the rows are partitioned
//! here by their `Folder` label:
//!
//! ```text
//! Database
//! ├── Folder "Diagnostics"        one per distinct label, tables and functions share it
//! │   ├── Table  "Logs"
//! │   └── Function "RecentLogs"
//! ├── Table "Events"              empty label: direct child
//! └── Function "Top10"
//! ```
//!
//! Population of a database runs under that database's lock, builds a scratch
//! [`DatabaseEntry`], and publishes it only after every query succeeded. A
//! failed or cancelled population leaves the cache as it was.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, DatabaseChildren, DatabaseEntry, MetadataCache};
use crate::error::{CatalogError, CatalogResult};
use crate::executor::ResultTable;
use crate::metadata::{FunctionDefinition, MetadataObject, ObjectDetails, ParentRef};
use crate::query::{SchemaQueryBuilder, columns};
use crate::runner::QueryRunner;

/// Rows of one table from the schema query
#[derive(Debug, Default)]
struct TableRows {
    folder: Option<String>,
    columns: Vec<(String, String)>,
}

pub struct ChildResolver {
    cluster: MetadataObject,
    cache: Arc<MetadataCache>,
    runner: Arc<QueryRunner>,
}

impl ChildResolver {
    pub fn new(
        cluster: MetadataObject,
        cache: Arc<MetadataCache>,
        runner: Arc<QueryRunner>,
    ) -> Self {
        Self {
            cluster,
            cache,
            runner,
        }
    }

    pub fn cluster(&self) -> &MetadataObject {
        &self.cluster
    }

    /// Ordered children of `parent`; leaves yield an empty list
    pub async fn children(
        &self,
        parent: &MetadataObject,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<MetadataObject>> {
        match parent.details() {
            ObjectDetails::Cluster => self.databases(cancel).await,
            ObjectDetails::Database { .. } => Ok(self
                .resolve_database_children(parent, cancel)
                .await?
                .merged()),
            ObjectDetails::Table { database_name, .. } => {
                self.table_columns(parent, database_name, cancel).await
            }
            ObjectDetails::Folder { parent: owner } => {
                self.folder_children(parent, owner, cancel).await
            }
            ObjectDetails::Column { .. } | ObjectDetails::Function { .. } => Ok(Vec::new()),
        }
    }

    /// Databases of the cluster, ordinal by name
    pub async fn databases(
        &self,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<MetadataObject>> {
        if let Some(databases) = self.cache.databases() {
            return Ok(databases.as_ref().clone());
        }

        let lock = self.cache.population_lock(&CacheKey::Cluster);
        let _guard = lock.lock().await;
        if let Some(databases) = self.cache.databases() {
            return Ok(databases.as_ref().clone());
        }
        let generation = self.cache.generation();

        let query = SchemaQueryBuilder::list_databases_query(self.cluster.name());
        let result = self.runner.run(&query, None, "list databases", cancel).await?;

        let mut databases: Vec<MetadataObject> = result
            .rows()
            .filter_map(|row| {
                let name = row.get_str(columns::DATABASE_NAME)?;
                if name.trim().is_empty() {
                    return None;
                }
                let pretty_name = row.get_str_or_empty(columns::PRETTY_NAME);
                Some(MetadataObject::database(&self.cluster, name, pretty_name))
            })
            .collect();
        databases.sort_by(|a, b| a.name().cmp(b.name()));

        self.cache.publish_databases(databases.clone(), generation);
        Ok(databases)
    }

    /// Children of a database kept apart by kind, populating on first use
    pub async fn resolve_database_children(
        &self,
        database: &MetadataObject,
        cancel: &CancellationToken,
    ) -> CatalogResult<DatabaseChildren> {
        let entry = self.populated_database(database, cancel).await?;
        Ok(entry.children().clone())
    }

    /// Whether `database` exists remotely.
    ///
    /// Any failure other than cancellation counts as "does not exist".
    pub async fn database_exists(
        &self,
        database: &str,
        cancel: &CancellationToken,
    ) -> CatalogResult<bool> {
        let query = SchemaQueryBuilder::count_tables_query();
        match self
            .runner
            .run(&query, Some(database), "count tables", cancel)
            .await
        {
            Ok(result) => {
                let count = result
                    .rows()
                    .next()
                    .and_then(|row| row.get_i64(columns::COUNT))
                    .or_else(|| result.scalar().and_then(serde_json::Value::as_i64));
                Ok(count.is_some_and(|count| count >= 0))
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!("Existence check for database {} failed: {}", database, e);
                Ok(false)
            }
        }
    }

    async fn populated_database(
        &self,
        database: &MetadataObject,
        cancel: &CancellationToken,
    ) -> CatalogResult<Arc<DatabaseEntry>> {
        let name = database.name();
        if let Some(entry) = self.cache.database_entry(name) {
            return Ok(entry);
        }

        let lock = self.cache.population_lock(&CacheKey::database(name));
        let _guard = lock.lock().await;
        if let Some(entry) = self.cache.database_entry(name) {
            return Ok(entry);
        }
        let generation = self.cache.generation();

        if !self.database_exists(name, cancel).await? {
            return Err(CatalogError::NotFound(name.to_string()));
        }

        let entry = self.load_database(database, cancel).await?;
        Ok(self.cache.publish_database(name, entry, generation))
    }

    async fn load_database(
        &self,
        database: &MetadataObject,
        cancel: &CancellationToken,
    ) -> CatalogResult<DatabaseEntry> {
        let name = database.name();
        info!("Loading schema of database {}", name);

        // Materialised up front: the rows are walked more than once below.
        let schema = self
            .runner
            .run(
                &SchemaQueryBuilder::database_schema_query(name),
                Some(name),
                "load database schema",
                cancel,
            )
            .await?;

        if schema.is_empty() {
            debug!("Database {} has no tables", name);
            return Ok(DatabaseEntry::default());
        }

        let tables = group_schema_rows(&schema);

        let functions = self
            .runner
            .run(
                &SchemaQueryBuilder::list_functions_query(),
                Some(name),
                "list functions",
                cancel,
            )
            .await?;
        let functions = group_function_rows(&functions);

        Ok(build_database_entry(database, tables, functions))
    }

    async fn table_columns(
        &self,
        table: &MetadataObject,
        database: &str,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<MetadataObject>> {
        let key = CacheKey::columns(database, table.name());
        if let Some(columns) = self.cache.get(&key) {
            return Ok(columns);
        }

        // Columns are loaded together with their database; a table the loaded
        // database does not know is a caller bug, not a cache miss.
        match self.cache.database_entry(database) {
            None => {
                return Err(CatalogError::InvariantViolation(format!(
                    "columns of {table} requested before database '{database}' was loaded"
                )));
            }
            Some(entry) if !entry.has_table(table.name()) => {
                return Err(CatalogError::InvariantViolation(format!(
                    "table {table} is not part of loaded database '{database}'"
                )));
            }
            Some(_) => {}
        }

        let lock = self.cache.population_lock(&key);
        let _guard = lock.lock().await;
        if let Some(columns) = self.cache.get(&key) {
            return Ok(columns);
        }
        let generation = self.cache.generation();

        info!("Reloading columns of {}.{}", database, table.name());
        let result = self
            .runner
            .run(
                &SchemaQueryBuilder::table_schema_query(database, table.name()),
                Some(database),
                "load table schema",
                cancel,
            )
            .await?;

        let rows = group_schema_rows(&result)
            .remove(table.name())
            .unwrap_or_default();
        let columns = column_objects(table, rows.columns);
        self.cache
            .set_columns(database, table.name(), columns.clone(), generation);
        Ok(columns)
    }

    async fn folder_children(
        &self,
        folder: &MetadataObject,
        owner: &ParentRef,
        cancel: &CancellationToken,
    ) -> CatalogResult<Vec<MetadataObject>> {
        if let Some(children) = self
            .cache
            .get(&CacheKey::folder(&owner.database_name, folder.name()))
        {
            return Ok(children);
        }

        let database = MetadataObject::database(&self.cluster, &owner.database_name, "");
        let entry = self.populated_database(&database, cancel).await?;
        Ok(entry
            .folder_children(folder.name())
            .map(|children| children.as_ref().clone())
            .unwrap_or_default())
    }
}

/// Blank labels mean "database root"
fn folder_label(raw: Option<&str>) -> Option<String> {
    raw.filter(|label| !label.trim().is_empty())
        .map(str::to_string)
}

/// Group schema rows by table name. A table keeps the folder label of its
/// first row.
fn group_schema_rows(schema: &ResultTable) -> BTreeMap<String, TableRows> {
    let mut tables: BTreeMap<String, TableRows> = BTreeMap::new();
    for row in schema.rows() {
        let table = row.get_str_or_empty(columns::TABLE_NAME);
        if table.trim().is_empty() {
            continue;
        }
        let entry = tables
            .entry(table.to_string())
            .or_insert_with(|| TableRows {
                folder: folder_label(row.get_str(columns::FOLDER)),
                columns: Vec::new(),
            });

        let column = row.get_str_or_empty(columns::COLUMN_NAME);
        if !column.is_empty() {
            let column_type =
                SchemaQueryBuilder::strip_system_prefix(row.get_str_or_empty(columns::COLUMN_TYPE));
            entry
                .columns
                .push((column.to_string(), column_type.to_string()));
        }
    }
    tables
}

fn group_function_rows(
    functions: &ResultTable,
) -> BTreeMap<String, (Option<String>, FunctionDefinition)> {
    let mut grouped = BTreeMap::new();
    for row in functions.rows() {
        let name = row.get_str_or_empty(columns::NAME);
        if name.trim().is_empty() {
            continue;
        }
        let definition = FunctionDefinition::new(name)
            .with_parameters(row.get_str_or_empty(columns::PARAMETERS))
            .with_body(row.get_str_or_empty(columns::BODY))
            .with_doc_string(row.get_str_or_empty(columns::DOC_STRING));
        grouped
            .entry(name.to_string())
            .or_insert((folder_label(row.get_str(columns::FOLDER)), definition));
    }
    grouped
}

/// Columns sorted case-insensitively.
///
/// Tables sort case-sensitively; the difference is intentional.
fn column_objects(table: &MetadataObject, columns: Vec<(String, String)>) -> Vec<MetadataObject> {
    let mut objects: Vec<MetadataObject> = columns
        .into_iter()
        .map(|(name, data_type)| MetadataObject::column(table, name, data_type))
        .collect();
    objects.sort_by_cached_key(|column| column.name().to_lowercase());
    objects
}

fn build_database_entry(
    database: &MetadataObject,
    tables: BTreeMap<String, TableRows>,
    functions: BTreeMap<String, (Option<String>, FunctionDefinition)>,
) -> DatabaseEntry {
    let labels: BTreeSet<&str> = tables
        .values()
        .filter_map(|t| t.folder.as_deref())
        .chain(functions.values().filter_map(|(label, _)| label.as_deref()))
        .collect();

    let folders: BTreeMap<String, MetadataObject> = labels
        .into_iter()
        .map(|label| (label.to_string(), MetadataObject::folder(database, label)))
        .collect();
    let mut buckets: BTreeMap<String, Vec<MetadataObject>> = BTreeMap::new();
    let mut root_tables = Vec::new();
    let mut root_functions = Vec::new();
    let mut column_lists = Vec::with_capacity(tables.len());

    // BTreeMap iteration keeps tables and functions in ordinal order.
    for (name, rows) in tables {
        let parent = rows
            .folder
            .as_ref()
            .and_then(|label| folders.get(label))
            .unwrap_or(database);
        let table = MetadataObject::table(parent, name);
        column_lists.push((table.name().to_string(), column_objects(&table, rows.columns)));

        match rows.folder {
            Some(label) => buckets.entry(label).or_default().push(table),
            None => root_tables.push(table),
        }
    }

    for (_, (label, definition)) in functions {
        let parent = label
            .as_ref()
            .and_then(|label| folders.get(label))
            .unwrap_or(database);
        let function = MetadataObject::function(parent, definition);

        match label {
            Some(label) => buckets.entry(label).or_default().push(function),
            None => root_functions.push(function),
        }
    }

    let mut entry = DatabaseEntry::new(DatabaseChildren {
        folders: folders.into_values().collect(),
        root_tables,
        root_functions,
    });
    for (label, children) in buckets {
        entry = entry.with_folder(label, children);
    }
    for (table, columns) in column_lists {
        entry = entry.with_columns(table, columns);
    }
    entry
}

// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Metadata cache
//!
//! In-memory cache of previously resolved children, keyed by [`CacheKey`].
//!
//! ## Layout
//!
//! - one slot for the cluster's database list
//! - one [`DatabaseEntry`] per populated database, holding the database's
//!   direct children, the contents of every synthetic folder and the column
//!   list of every table
//!
//! A database is populated into a scratch [`DatabaseEntry`] and published with
//! a single map insert, so readers either see the whole database or nothing.
//! Column lists stay individually removable so a single table can be refreshed
//! without touching its siblings.
//!
//! Nothing expires on its own; entries leave the cache only through
//! [`MetadataCache::invalidate`] or [`MetadataCache::clear`].
//!
//! ## Generations
//!
//! Every invalidation bumps a generation counter. Writers capture the
//! generation before they start querying and hand it back when publishing;
//! a publish from an older generation is dropped, so a population that was
//! in flight during a refresh cannot resurrect what the refresh removed.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::metadata::{MetadataObject, ObjectDetails};

/// Scope of a cached child list.
///
/// Tagged instead of `scope.name` strings so a folder and a table with the
/// same name in the same database cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Databases of the cluster
    Cluster,
    /// Direct children of a database
    Database(String),
    /// Tables and functions grouped under a folder label
    Folder { database: String, folder: String },
    /// Columns of a table
    Columns { database: String, table: String },
}

impl CacheKey {
    pub fn database(name: impl Into<String>) -> Self {
        Self::Database(name.into())
    }

    pub fn folder(database: impl Into<String>, folder: impl Into<String>) -> Self {
        Self::Folder {
            database: database.into(),
            folder: folder.into(),
        }
    }

    pub fn columns(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self::Columns {
            database: database.into(),
            table: table.into(),
        }
    }

    /// Database the key is scoped to
    pub fn database_name(&self) -> Option<&str> {
        match self {
            CacheKey::Cluster => None,
            CacheKey::Database(database)
            | CacheKey::Folder { database, .. }
            | CacheKey::Columns { database, .. } => Some(database),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Cluster => f.write_str("<cluster>"),
            CacheKey::Database(database) => f.write_str(database),
            CacheKey::Folder { database, folder } => write!(f, "{database}/{folder}"),
            CacheKey::Columns { database, table } => write!(f, "{database}.{table}"),
        }
    }
}

/// Direct children of a database, kept apart by kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseChildren {
    pub folders: Vec<MetadataObject>,
    pub root_tables: Vec<MetadataObject>,
    pub root_functions: Vec<MetadataObject>,
}

impl DatabaseChildren {
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.root_tables.is_empty() && self.root_functions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.folders.len() + self.root_tables.len() + self.root_functions.len()
    }

    /// Folders, then root tables, then root functions
    pub fn merged(&self) -> Vec<MetadataObject> {
        let mut all = Vec::with_capacity(self.len());
        all.extend(self.folders.iter().cloned());
        all.extend(self.root_tables.iter().cloned());
        all.extend(self.root_functions.iter().cloned());
        all
    }
}

/// Everything cached for one database
#[derive(Debug, Default)]
pub struct DatabaseEntry {
    children: DatabaseChildren,
    folder_children: HashMap<String, Arc<Vec<MetadataObject>>>,
    tables: BTreeSet<String>,
    columns: DashMap<String, Arc<Vec<MetadataObject>>>,
}

impl DatabaseEntry {
    pub fn new(children: DatabaseChildren) -> Self {
        Self {
            children,
            ..Default::default()
        }
    }

    /// Builder method: set the contents of a folder
    pub fn with_folder(mut self, label: impl Into<String>, children: Vec<MetadataObject>) -> Self {
        self.folder_children.insert(label.into(), Arc::new(children));
        self
    }

    /// Builder method: set the columns of a table
    pub fn with_columns(
        mut self,
        table: impl Into<String>,
        columns: Vec<MetadataObject>,
    ) -> Self {
        let table = table.into();
        self.tables.insert(table.clone());
        self.columns.insert(table, Arc::new(columns));
        self
    }

    pub fn children(&self) -> &DatabaseChildren {
        &self.children
    }

    pub fn folder_children(&self, label: &str) -> Option<Arc<Vec<MetadataObject>>> {
        self.folder_children.get(label).cloned()
    }

    pub fn columns(&self, table: &str) -> Option<Arc<Vec<MetadataObject>>> {
        self.columns.get(table).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `table` was part of the database when it was loaded
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    pub fn folder_count(&self) -> usize {
        self.folder_children.len()
    }

    pub fn column_list_count(&self) -> usize {
        self.columns.len()
    }
}

/// Concurrent cache of resolved children
#[derive(Debug, Default)]
pub struct MetadataCache {
    databases: RwLock<Option<Arc<Vec<MetadataObject>>>>,
    entries: DashMap<String, Arc<DatabaseEntry>>,
    locks: DashMap<CacheKey, Arc<Mutex<()>>>,
    generation: RwLock<u64>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached children for `key`, `None` when not populated.
    ///
    /// Database children come back merged; see [`Self::database_entry`] for
    /// the kind-separated form.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<MetadataObject>> {
        let hit = match key {
            CacheKey::Cluster => self.databases().map(|list| list.as_ref().clone()),
            CacheKey::Database(database) => self
                .database_entry(database)
                .map(|entry| entry.children().merged()),
            CacheKey::Folder { database, folder } => self
                .database_entry(database)
                .and_then(|entry| entry.folder_children(folder))
                .map(|list| list.as_ref().clone()),
            CacheKey::Columns { database, table } => self
                .database_entry(database)
                .and_then(|entry| entry.columns(table))
                .map(|list| list.as_ref().clone()),
        };
        debug!(
            "Metadata cache {} for {}",
            if hit.is_some() { "hit" } else { "miss" },
            key
        );
        hit
    }

    pub fn databases(&self) -> Option<Arc<Vec<MetadataObject>>> {
        self.databases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn database_entry(&self, database: &str) -> Option<Arc<DatabaseEntry>> {
        self.entries
            .get(database)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn is_populated(&self, key: &CacheKey) -> bool {
        match key {
            CacheKey::Cluster => self.databases().is_some(),
            CacheKey::Database(database) => self.entries.contains_key(database),
            _ => self.get(key).is_some(),
        }
    }

    /// Current invalidation generation
    pub fn generation(&self) -> u64 {
        *self
            .generation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish the database list loaded during `generation`.
    ///
    /// Returns `false` when an invalidation happened since.
    pub fn publish_databases(&self, databases: Vec<MetadataObject>, generation: u64) -> bool {
        let current = self
            .generation
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if *current != generation {
            debug!(
                "Dropping database list from generation {} (now {})",
                generation, *current
            );
            return false;
        }
        info!("Caching {} databases", databases.len());
        *self
            .databases
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(databases));
        true
    }

    /// Publish a fully built database in one step.
    ///
    /// The entry is handed back either way; it is only cached when no
    /// invalidation happened since `generation`.
    pub fn publish_database(
        &self,
        database: impl Into<String>,
        entry: DatabaseEntry,
        generation: u64,
    ) -> Arc<DatabaseEntry> {
        let database = database.into();
        let entry = Arc::new(entry);
        let current = self
            .generation
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if *current != generation {
            debug!(
                "Dropping database {} from generation {} (now {})",
                database, generation, *current
            );
            return entry;
        }
        info!(
            "Caching database {}: {} children, {} folders, {} column lists",
            database,
            entry.children().len(),
            entry.folder_count(),
            entry.column_list_count()
        );
        self.entries.insert(database, Arc::clone(&entry));
        entry
    }

    /// Store the columns of one table of an already populated database.
    ///
    /// Returns `false` when the database is not populated or an invalidation
    /// happened since `generation`.
    pub fn set_columns(
        &self,
        database: &str,
        table: &str,
        columns: Vec<MetadataObject>,
        generation: u64,
    ) -> bool {
        let current = self
            .generation
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if *current != generation {
            debug!(
                "Dropping columns of {}.{} from generation {} (now {})",
                database, table, generation, *current
            );
            return false;
        }
        match self.entries.get(database) {
            Some(entry) => {
                entry.columns.insert(table.to_string(), Arc::new(columns));
                true
            }
            None => false,
        }
    }

    /// Lock serialising population of `key`
    pub fn population_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(key.clone()).or_default().value())
    }

    /// Remove what is cached for `object`.
    ///
    /// - cluster: everything
    /// - database or folder: the whole database entry, including folders and
    ///   column lists
    /// - table or function: that object's column list only
    /// - column: the owning table's column list
    pub fn invalidate(&self, object: &MetadataObject) {
        let mut generation = self
            .generation
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        match object.details() {
            ObjectDetails::Cluster => self.remove_all(),
            ObjectDetails::Database { .. } => self.remove_database(object.name()),
            ObjectDetails::Folder { parent } => self.remove_database(&parent.database_name),
            ObjectDetails::Table { database_name, .. }
            | ObjectDetails::Function { database_name, .. } => {
                self.remove_columns(database_name, object.name())
            }
            ObjectDetails::Column {
                database_name,
                table_name,
                ..
            } => self.remove_columns(database_name, table_name),
        }
    }

    /// Reset every mapping to unpopulated
    pub fn clear(&self) {
        let mut generation = self
            .generation
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        self.remove_all();
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.len()
    }

    fn remove_all(&self) {
        info!("Clearing metadata cache");
        *self
            .databases
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.entries.clear();
        self.locks.clear();
    }

    fn remove_database(&self, database: &str) {
        debug!("Invalidating database {}", database);
        self.entries.remove(database);
        self.locks.retain(|key, _| key.database_name() != Some(database));
    }

    fn remove_columns(&self, database: &str, table: &str) {
        debug!("Invalidating columns of {}.{}", database, table);
        if let Some(entry) = self.entries.get(database) {
            entry.columns.remove(table);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLUSTER: &str = "https://help.kusto.windows.net";

    fn sample_entry(db: &MetadataObject) -> DatabaseEntry {
        let folder = MetadataObject::folder(db, "Diagnostics");
        let events = MetadataObject::table(db, "Events");
        let logs = MetadataObject::table(&folder, "Logs");
        let id = MetadataObject::column(&events, "Id", "int");
        let msg = MetadataObject::column(&logs, "Msg", "string");

        DatabaseEntry::new(DatabaseChildren {
            folders: vec![folder],
            root_tables: vec![events],
            root_functions: vec![],
        })
        .with_folder("Diagnostics", vec![logs])
        .with_columns("Events", vec![id])
        .with_columns("Logs", vec![msg])
    }

    fn fixture() -> (MetadataObject, MetadataObject, MetadataCache) {
        let cluster = MetadataObject::cluster(CLUSTER);
        let db = MetadataObject::database(&cluster, "Samples", "");
        let cache = MetadataCache::new();
        cache.publish_databases(vec![db.clone()], cache.generation());
        cache.publish_database("Samples", sample_entry(&db), cache.generation());
        (cluster, db, cache)
    }

    #[test]
    fn test_unpopulated_cache_misses() {
        let cache = MetadataCache::new();
        assert_eq!(cache.get(&CacheKey::Cluster), None);
        assert_eq!(cache.get(&CacheKey::database("Samples")), None);
        assert!(!cache.is_populated(&CacheKey::Cluster));
    }

    #[test]
    fn test_published_database_is_visible_at_every_key() {
        let (_, _, cache) = fixture();

        let children = cache.get(&CacheKey::database("Samples")).unwrap();
        let names: Vec<_> = children.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Diagnostics", "Events"]);

        let folder = cache.get(&CacheKey::folder("Samples", "Diagnostics")).unwrap();
        assert_eq!(folder[0].name(), "Logs");

        let columns = cache.get(&CacheKey::columns("Samples", "Logs")).unwrap();
        assert_eq!(columns[0].name(), "Msg");
    }

    #[test]
    fn test_folder_and_table_with_same_name_do_not_collide() {
        let cluster = MetadataObject::cluster(CLUSTER);
        let db = MetadataObject::database(&cluster, "Samples", "");
        let folder = MetadataObject::folder(&db, "Events");
        let nested = MetadataObject::table(&folder, "Nested");
        let events = MetadataObject::table(&db, "Events");
        let id = MetadataObject::column(&events, "Id", "int");

        let cache = MetadataCache::new();
        cache.publish_database(
            "Samples",
            DatabaseEntry::new(DatabaseChildren {
                folders: vec![folder],
                root_tables: vec![events],
                root_functions: vec![],
            })
            .with_folder("Events", vec![nested])
            .with_columns("Events", vec![id]),
            cache.generation(),
        );

        let folder = cache.get(&CacheKey::folder("Samples", "Events")).unwrap();
        let columns = cache.get(&CacheKey::columns("Samples", "Events")).unwrap();
        assert_eq!(folder[0].name(), "Nested");
        assert_eq!(columns[0].name(), "Id");
    }

    #[test]
    fn test_table_invalidation_removes_only_its_columns() {
        let (_, db, cache) = fixture();
        let events = MetadataObject::table(&db, "Events");

        cache.invalidate(&events);

        assert!(cache.get(&CacheKey::columns("Samples", "Events")).is_none());
        assert!(cache.get(&CacheKey::columns("Samples", "Logs")).is_some());
        assert!(cache.is_populated(&CacheKey::database("Samples")));
    }

    #[test]
    fn test_database_invalidation_cascades() {
        let (_, db, cache) = fixture();

        cache.invalidate(&db);

        assert!(!cache.is_populated(&CacheKey::database("Samples")));
        assert!(cache.get(&CacheKey::folder("Samples", "Diagnostics")).is_none());
        assert!(cache.get(&CacheKey::columns("Samples", "Events")).is_none());
        assert!(cache.is_populated(&CacheKey::Cluster));
    }

    #[test]
    fn test_folder_invalidation_drops_owning_database() {
        let (_, db, cache) = fixture();
        let folder = MetadataObject::folder(&db, "Diagnostics");

        cache.invalidate(&folder);

        assert!(!cache.is_populated(&CacheKey::database("Samples")));
    }

    #[test]
    fn test_cluster_invalidation_clears_everything() {
        let (cluster, _, cache) = fixture();

        cache.invalidate(&cluster);

        assert!(!cache.is_populated(&CacheKey::Cluster));
        assert!(!cache.is_populated(&CacheKey::database("Samples")));
    }

    #[test]
    fn test_set_columns_requires_populated_database() {
        let (_, db, cache) = fixture();
        let events = MetadataObject::table(&db, "Events");
        let ts = MetadataObject::column(&events, "Ts", "datetime");

        let generation = cache.generation();
        assert!(cache.set_columns("Samples", "Events", vec![ts], generation));
        assert!(!cache.set_columns("Other", "Events", vec![], generation));
    }

    #[test]
    fn test_empty_database_is_populated() {
        let cache = MetadataCache::new();
        cache.publish_database("Empty", DatabaseEntry::default(), cache.generation());

        assert!(cache.is_populated(&CacheKey::database("Empty")));
        assert_eq!(cache.get(&CacheKey::database("Empty")), Some(vec![]));
    }

    #[test]
    fn test_population_lock_is_shared_per_key() {
        let cache = MetadataCache::new();
        let a = cache.population_lock(&CacheKey::database("A"));
        let a2 = cache.population_lock(&CacheKey::database("A"));
        let b = cache.population_lock(&CacheKey::database("B"));

        assert!(Arc::ptr_eq(&a, &a2));
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_known_tables_follow_loaded_columns() {
        let cluster = MetadataObject::cluster(CLUSTER);
        let db = MetadataObject::database(&cluster, "Samples", "");
        let entry = sample_entry(&db);

        assert!(entry.has_table("Events"));
        assert!(entry.has_table("Logs"));
        assert!(!entry.has_table("Diagnostics"));
        assert!(!entry.has_table("NoSuchTable"));
    }

    #[test]
    fn test_known_table_survives_column_invalidation() {
        let (_, db, cache) = fixture();
        cache.invalidate(&MetadataObject::table(&db, "Events"));

        let entry = cache.database_entry("Samples").unwrap();
        assert!(entry.has_table("Events"));
        assert!(entry.columns("Events").is_none());
    }

    #[test]
    fn test_publish_from_before_invalidation_is_dropped() {
        let (cluster, db, cache) = fixture();
        let stale = cache.generation();

        cache.invalidate(&cluster);

        let entry = cache.publish_database("Samples", sample_entry(&db), stale);
        assert!(entry.has_table("Events"));
        assert!(!cache.is_populated(&CacheKey::database("Samples")));
        assert!(!cache.publish_databases(vec![db.clone()], stale));
        assert!(!cache.is_populated(&CacheKey::Cluster));

        cache.publish_database("Samples", sample_entry(&db), cache.generation());
        assert!(cache.is_populated(&CacheKey::database("Samples")));
    }

    #[test]
    fn test_columns_from_before_invalidation_are_dropped() {
        let (_, db, cache) = fixture();
        let events = MetadataObject::table(&db, "Events");
        let stale = cache.generation();

        cache.invalidate(&events);

        assert!(!cache.set_columns("Samples", "Events", vec![], stale));
        assert!(cache.get(&CacheKey::columns("Samples", "Events")).is_none());
    }

    #[test]
    fn test_invalidation_prunes_population_locks() {
        let (cluster, db, cache) = fixture();
        cache.population_lock(&CacheKey::Cluster);
        cache.population_lock(&CacheKey::database("Samples"));
        cache.population_lock(&CacheKey::columns("Samples", "Events"));
        cache.population_lock(&CacheKey::folder("Samples", "Diagnostics"));
        cache.population_lock(&CacheKey::database("Other"));
        assert_eq!(cache.lock_count(), 5);

        cache.invalidate(&db);
        assert_eq!(cache.lock_count(), 2);

        cache.invalidate(&cluster);
        assert_eq!(cache.lock_count(), 0);
    }
}

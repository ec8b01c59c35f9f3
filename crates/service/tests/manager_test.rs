// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! End-to-end: connection string to browsed hierarchy

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kusto_metadata_catalog::{
    CancellationToken, CatalogResult, DataSource, MetadataType, QueryExecutor,
};
use kusto_metadata_service::{DataSourceConfig, DataSourceManager, QueryExecutorFactory};
use kusto_metadata_test_utils::{MockQueryExecutor, SAMPLES, SchemaFixtures};

/// Hands out one shared scripted executor and remembers what it was asked for
#[derive(Default)]
struct SamplesFactory {
    executor: Mutex<Option<Arc<MockQueryExecutor>>>,
    configs: Mutex<Vec<DataSourceConfig>>,
}

#[async_trait]
impl QueryExecutorFactory for SamplesFactory {
    async fn create_executor(
        &self,
        config: &DataSourceConfig,
    ) -> CatalogResult<Arc<dyn QueryExecutor>> {
        self.configs.lock().unwrap().push(config.clone());
        let executor = self
            .executor
            .lock()
            .unwrap()
            .get_or_insert_with(|| {
                Arc::new(SchemaFixtures::samples(MockQueryExecutor::builder()).build())
            })
            .clone();
        Ok(executor)
    }
}

#[tokio::test]
async fn test_browse_from_connection_string() {
    let config = DataSourceConfig::from_connection_string(
        "Data Source=help.kusto.windows.net;Initial Catalog=Samples",
    )
    .unwrap()
    .with_query_timeout(15);
    let factory = Arc::new(SamplesFactory::default());
    let mut manager = DataSourceManager::new(factory.clone());

    let source = manager.get_data_source(&config).await.unwrap();
    let cancel = CancellationToken::new();

    let databases = source
        .get_child_objects(source.cluster(), &cancel)
        .await
        .unwrap();
    assert_eq!(databases.len(), 1);
    assert_eq!(databases[0].name(), SAMPLES);

    let children = source.get_child_objects(&databases[0], &cancel).await.unwrap();
    let kinds: Vec<_> = children.iter().map(|c| c.metadata_type()).collect();
    assert_eq!(kinds, vec![MetadataType::Folder, MetadataType::Table]);

    assert!(source.exists(&databases[0], &cancel).await.unwrap());

    let recorded = factory.configs.lock().unwrap().clone();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].query_timeout_secs, 15);
    assert_eq!(recorded[0].cluster, "https://help.kusto.windows.net");
}

#[tokio::test]
async fn test_reused_source_keeps_its_cache() {
    let config = DataSourceConfig::new("https://help.kusto.windows.net").with_database(SAMPLES);
    let factory = Arc::new(SamplesFactory::default());
    let mut manager = DataSourceManager::new(factory.clone());
    let cancel = CancellationToken::new();

    let first = manager.get_data_source(&config).await.unwrap();
    let db = first.database_object(SAMPLES);
    first.get_child_objects(&db, &cancel).await.unwrap();

    let second = manager.get_data_source(&config).await.unwrap();
    second.get_child_objects(&db, &cancel).await.unwrap();

    let executor = factory.executor.lock().unwrap().clone().unwrap();
    assert_eq!(
        executor.call_count(&kusto_metadata_catalog::SchemaQueryBuilder::database_schema_query(
            SAMPLES
        )),
        1
    );
}

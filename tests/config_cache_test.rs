// ==========================================
// 配置管理器 + 字段元数据缓存 集成测试
// ==========================================
// 测试目标: 文件库上的选项持久化 / 缓存命中后不再 describe
// ==========================================


use serde_json::json;
use sobject_loader::config::{config_keys, ConfigManager, LoadOptions, GLOBAL_SCOPE};
use sobject_loader::db::open_sqlite_connection;
use sobject_loader::domain::types::ApiMode;
use sobject_loader::importer::SchemaFieldResolver;
use sobject_loader::repository::FieldMetadataCache;
use std::sync::{Arc, Mutex};
use test_helpers::{create_test_db, MockQueryService, MockSchemaService};

#[test]
fn test_options_survive_reopen() {
    let (_temp_file, db_path) = create_test_db();

    {
        let manager = ConfigManager::new(&db_path).unwrap();
        let options = LoadOptions {
            api_mode: ApiMode::Streaming,
            insert_nulls: true,
            date_format: "DD/MM/YYYY".to_string(),
            binary_body_field: Some("VersionData".to_string()),
            api_version: "v58.0".to_string(),
        };
        manager.save_load_options("ContentVersion", &options).unwrap();
        manager.set_config_value(GLOBAL_SCOPE, config_keys::API_VERSION, "v61.0").unwrap();
    }

    let manager = ConfigManager::new(&db_path).unwrap();
    let stored = manager.load_options("ContentVersion").unwrap();
    assert_eq!(stored.api_mode, ApiMode::Streaming);
    assert_eq!(stored.date_format, "DD/MM/YYYY");
    assert_eq!(stored.binary_body_field.as_deref(), Some("VersionData"));
    assert_eq!(stored.api_version, "v58.0");

    // 其他对象只继承 global
    let other = manager.load_options("Account").unwrap();
    assert_eq!(other.api_mode, ApiMode::Batch);
    assert_eq!(other.api_version, "v61.0");
}

#[test]
fn test_shared_connection() {
    let (_temp_file, db_path) = create_test_db();
    let conn = Arc::new(Mutex::new(open_sqlite_connection(&db_path).unwrap()));

    let manager = ConfigManager::from_connection(conn.clone()).unwrap();
    let cache = FieldMetadataCache::from_connection(conn).unwrap();

    manager.set_config_value("Lead", config_keys::INSERT_NULLS, "true").unwrap();
    cache.put("00D000000000001", "Lead", &[]).unwrap();

    assert!(manager.load_options("Lead").unwrap().insert_nulls);
    assert_eq!(cache.get("00D000000000001", "Lead").unwrap(), Some(Vec::new()));
    assert!(manager.delete_config_value("Lead", config_keys::INSERT_NULLS).unwrap());
}

#[tokio::test]
async fn test_cached_field_metadata_skips_describe() {
    let (_temp_file, db_path) = create_test_db();
    let cache = FieldMetadataCache::new(&db_path).unwrap();
    let schema = MockSchemaService::new().with_object(
        "Case",
        json!([
            {"name": "Subject", "label": "Subject", "type": "string", "createable": true},
            {"name": "Origin", "label": "Case Origin", "type": "picklist", "createable": true}
        ]),
    );
    let query = MockQueryService::empty();
    let resolver = SchemaFieldResolver::new(&schema, &query);

    let first = resolver.get_field_metadata_cached(&cache, "00D1", "Case").await.unwrap();
    let second = resolver.get_field_metadata_cached(&cache, "00D1", "Case").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(schema.call_count(), 1);

    // 不同 org 不共享缓存
    resolver.get_field_metadata_cached(&cache, "00D2", "Case").await.unwrap();
    assert_eq!(schema.call_count(), 2);

    cache.invalidate("00D1", "Case").unwrap();
    resolver.get_field_metadata_cached(&cache, "00D1", "Case").await.unwrap();
    assert_eq!(schema.call_count(), 3);
}

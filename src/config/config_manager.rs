// ==========================================
// SObject 数据加载 - 配置管理器
// ==========================================
// 职责: 加载选项默认值的持久化与分级覆写
// 存储: config_kv 表 (scope_id + key → value)
// 覆写顺序: 内置默认值 → global → 对象级 scope
// ==========================================

use crate::config::load_options::LoadOptions;
use crate::db::{configure_sqlite_connection, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// 全局作用域
pub const GLOBAL_SCOPE: &str = "global";

const CREATE_CONFIG_KV_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
)
"#;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        conn.execute_batch(CREATE_CONFIG_KV_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager（会再次应用统一 PRAGMA，幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
            guard.execute_batch(CREATE_CONFIG_KV_SQL)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取单个配置值
    pub fn get_config_value(&self, scope_id: &str, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![scope_id, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入单个配置值（UPSERT）
    pub fn set_config_value(&self, scope_id: &str, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![scope_id, key, value],
        )?;
        Ok(())
    }

    /// 删除单个配置值
    pub fn delete_config_value(&self, scope_id: &str, key: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![scope_id, key],
        )?;
        Ok(affected > 0)
    }

    /// 读取某个作用域下的全部配置
    fn scope_values(&self, scope_id: &str) -> RepositoryResult<HashMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1")?;
        let rows = stmt.query_map(params![scope_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut values = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            values.insert(key, value);
        }
        Ok(values)
    }

    /// 读取加载选项（内置默认值 → global → scope 逐级覆写）
    ///
    /// # 参数
    /// - scope: 作用域（通常为对象 API 名；传 "global" 只读全局）
    pub fn load_options(&self, scope: &str) -> RepositoryResult<LoadOptions> {
        let mut options = LoadOptions::default();
        apply_values(&mut options, &self.scope_values(GLOBAL_SCOPE)?);
        if scope != GLOBAL_SCOPE {
            apply_values(&mut options, &self.scope_values(scope)?);
        }
        debug!(scope = %scope, api_mode = %options.api_mode, "加载选项已读取");
        Ok(options)
    }

    /// 保存加载选项到指定作用域
    pub fn save_load_options(&self, scope: &str, options: &LoadOptions) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let entries = [
            (config_keys::API_MODE, Some(options.api_mode.to_string())),
            (config_keys::INSERT_NULLS, Some(options.insert_nulls.to_string())),
            (config_keys::DATE_FORMAT, Some(options.date_format.clone())),
            (config_keys::BINARY_BODY_FIELD, options.binary_body_field.clone()),
            (config_keys::API_VERSION, Some(options.api_version.clone())),
        ];
        for (key, value) in entries {
            match value {
                Some(value) => {
                    tx.execute(
                        "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
                         ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
                        params![scope, key, value],
                    )?;
                }
                None => {
                    tx.execute(
                        "DELETE FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                        params![scope, key],
                    )?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// 将 config_kv 中的值覆写到选项上；格式错误的值保持原值
fn apply_values(options: &mut LoadOptions, values: &HashMap<String, String>) {
    if let Some(raw) = values.get(config_keys::API_MODE) {
        match raw.parse() {
            Ok(mode) => options.api_mode = mode,
            Err(e) => warn!(config_key = config_keys::API_MODE, raw_value = %raw, error = %e, "配置格式错误，忽略"),
        }
    }
    if let Some(raw) = values.get(config_keys::INSERT_NULLS) {
        match raw.trim().parse::<bool>() {
            Ok(flag) => options.insert_nulls = flag,
            Err(_) => warn!(config_key = config_keys::INSERT_NULLS, raw_value = %raw, "配置格式错误，忽略"),
        }
    }
    if let Some(raw) = values.get(config_keys::DATE_FORMAT) {
        options.date_format = raw.clone();
    }
    if let Some(raw) = values.get(config_keys::BINARY_BODY_FIELD) {
        options.binary_body_field = Some(raw.clone()).filter(|v| !v.is_empty());
    }
    if let Some(raw) = values.get(config_keys::API_VERSION) {
        options.api_version = raw.clone();
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const API_MODE: &str = "api_mode";
    pub const INSERT_NULLS: &str = "insert_nulls";
    pub const DATE_FORMAT: &str = "date_format";
    pub const BINARY_BODY_FIELD: &str = "binary_body_field";
    pub const API_VERSION: &str = "api_version";
}

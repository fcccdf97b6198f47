// ==========================================
// SObject 数据加载 - 字段元数据缓存
// ==========================================
// 职责: 按 (org_id, sobject) 缓存已解析的字段目录（JSON）
// 红线: 仓储不含解析逻辑，只负责存取
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::field::FieldDescriptor;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

const CREATE_FIELD_METADATA_CACHE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS field_metadata_cache (
    org_id TEXT NOT NULL,
    sobject TEXT NOT NULL,
    fields_json TEXT NOT NULL,
    cached_at TEXT NOT NULL,
    PRIMARY KEY (org_id, sobject)
)
"#;

// ==========================================
// FieldMetadataCache
// ==========================================
pub struct FieldMetadataCache {
    conn: Arc<Mutex<Connection>>,
}

impl FieldMetadataCache {
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        conn.execute_batch(CREATE_FIELD_METADATA_CACHE_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（与 ConfigManager 共用连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            guard.execute_batch(CREATE_FIELD_METADATA_CACHE_SQL)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取缓存
    ///
    /// # 返回
    /// - Ok(None): 未缓存
    /// - Err(CorruptEntry): 缓存内容无法反序列化
    pub fn get(&self, org_id: &str, sobject: &str) -> RepositoryResult<Option<Vec<FieldDescriptor>>> {
        let conn = self.get_conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT fields_json FROM field_metadata_cache WHERE org_id = ?1 AND sobject = ?2",
                params![org_id, sobject],
                |row| row.get(0),
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            warn!(org_id = %org_id, sobject = %sobject, error = %e, "字段元数据缓存损坏");
            RepositoryError::CorruptEntry {
                key: format!("{}/{}", org_id, sobject),
                message: e.to_string(),
            }
        })
    }

    /// 写入缓存（覆盖已有条目）
    pub fn put(&self, org_id: &str, sobject: &str, fields: &[FieldDescriptor]) -> RepositoryResult<()> {
        let fields_json = serde_json::to_string(fields)?;
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO field_metadata_cache (org_id, sobject, fields_json, cached_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![org_id, sobject, fields_json, Utc::now().to_rfc3339()],
        )?;
        debug!(org_id = %org_id, sobject = %sobject, fields = fields.len(), "字段元数据已缓存");
        Ok(())
    }

    /// 删除单个对象的缓存
    pub fn invalidate(&self, org_id: &str, sobject: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM field_metadata_cache WHERE org_id = ?1 AND sobject = ?2",
            params![org_id, sobject],
        )?;
        Ok(affected > 0)
    }

    /// 清空某个 org 的全部缓存
    pub fn clear_org(&self, org_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM field_metadata_cache WHERE org_id = ?1",
            params![org_id],
        )?;
        debug!(org_id = %org_id, removed = affected, "org 字段元数据缓存已清空");
        Ok(affected)
    }
}

// ==========================================
// SObject 数据加载 - 外部协作方接口
// ==========================================
// 职责: 定义核心逻辑依赖的远端服务与文件解析接口（不包含实现）
// ==========================================

use crate::domain::describe::{DescribeSObjectResult, QueryResult};
use crate::domain::record::InputRecord;
use crate::importer::error::LoadResult;
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// SchemaService Trait
// ==========================================
// 用途: 对象描述服务（返回字段列表、类型、关联关系）
#[async_trait]
pub trait SchemaService: Send + Sync {
    /// 描述单个对象
    ///
    /// # 参数
    /// - sobject: 对象 API 名
    ///
    /// # 返回
    /// - Ok(DescribeSObjectResult): 原始字段定义
    /// - Err: 远端调用失败（致命）
    async fn describe_sobject(&self, sobject: &str) -> LoadResult<DescribeSObjectResult>;
}

// ==========================================
// QueryService Trait
// ==========================================
// 用途: 查询服务（执行查询语句，返回记录）
#[async_trait]
pub trait QueryService: Send + Sync {
    /// 执行查询（返回全部结果）
    ///
    /// # 参数
    /// - soql: 查询语句
    ///
    /// # 返回
    /// - Ok(QueryResult): 记录列表
    /// - Err: 单次调用失败，由调用方决定是否致命
    async fn query(&self, soql: &str) -> LoadResult<QueryResult>;
}

/// 解析后的输入文件
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    /// 表头（按列顺序）
    pub headers: Vec<String>,
    pub rows: Vec<InputRecord>,
}

// ==========================================
// FileParser Trait
// ==========================================
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析文件为表头 + 行记录
    fn parse_file(&self, file_path: &Path) -> LoadResult<ParsedFile>;
}

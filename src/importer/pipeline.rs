// ==========================================
// SObject 数据加载 - 主流程编排
// ==========================================
// 流程: 前置校验 → 关联记录解析 → 载荷整形
// 错误: 前置条件失败立即返回；行错误与批次查询错误收集在结果中
// ==========================================

use crate::config::LoadOptions;
use crate::domain::mapping::FieldMapping;
use crate::domain::record::{InputRecord, PrepareDataResponse};
use crate::importer::error::{LoadError, LoadResult};
use crate::importer::progress::ProgressReporter;
use crate::importer::related_resolver::RelatedRecordResolver;
use crate::importer::traits::QueryService;
use crate::importer::transformer::{transform_data, TransformOptions};
use tracing::{info, instrument, warn};
use uuid::Uuid;

// ==========================================
// LoadPreparer
// ==========================================
pub struct LoadPreparer<'a, Q: QueryService> {
    query_service: &'a Q,
}

impl<'a, Q: QueryService> LoadPreparer<'a, Q> {
    pub fn new(query_service: &'a Q) -> Self {
        Self { query_service }
    }

    /// 准备写入数据
    ///
    /// # 参数
    /// - sobject: 目标对象
    /// - rows: 输入行
    /// - mapping: 字段映射
    /// - options: 写入 API 变体、空值策略、日期格式
    /// - progress: 进度上报（0..=100）
    ///
    /// # 返回
    /// - Ok(PrepareDataResponse): 载荷行 + 行错误 + 查询错误
    /// - Err(EmptyDataset / NoMappedFields): 前置条件失败
    #[instrument(skip_all, fields(run_id = %Uuid::new_v4(), sobject = %sobject, api_mode = %options.api_mode))]
    pub async fn prepare_data(
        &self,
        sobject: &str,
        rows: Vec<InputRecord>,
        mapping: &FieldMapping,
        options: &LoadOptions,
        progress: &mut ProgressReporter,
    ) -> LoadResult<PrepareDataResponse> {
        if rows.is_empty() {
            return Err(LoadError::EmptyDataset);
        }
        if mapping.mapped_items().next().is_none() {
            return Err(LoadError::NoMappedFields);
        }

        let input_rows = rows.len();
        let resolver = RelatedRecordResolver::new(self.query_service, sobject, options.api_mode);
        let outcome = resolver
            .fetch_mapped_related_records(rows, mapping, progress)
            .await;

        let transform_options = TransformOptions {
            sobject,
            api_mode: options.api_mode,
            insert_nulls: options.insert_nulls,
            date_format: &options.date_format,
        };
        let shaped = transform_data(&outcome.rows, mapping, &transform_options);

        if !outcome.errors.is_empty() {
            warn!(dropped = outcome.errors.len(), "部分行因关联记录解析失败被剔除");
        }
        info!(
            input_rows,
            output_rows = shaped.len(),
            row_errors = outcome.errors.len(),
            query_errors = outcome.query_errors.len(),
            "数据准备完成"
        );

        Ok(PrepareDataResponse {
            rows: shaped,
            errors: outcome.errors,
            query_errors: outcome.query_errors,
        })
    }
}

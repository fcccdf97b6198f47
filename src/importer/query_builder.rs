// ==========================================
// SObject 数据加载 - 查询语句构建
// ==========================================
// 职责: 关联字段元数据查询 / 关联记录分批查询
// 约束: 单条查询长度不超过 MAX_QUERY_LENGTH（略超 10K 时远端报错）
// ==========================================

/// 每个值的长度缓冲（覆盖引号、逗号与转义膨胀）
pub const QUERY_ITEM_BUFFER_LENGTH: usize = 250;

/// 单条查询的长度上限
pub const MAX_QUERY_LENGTH: usize = 9500;

/// 关联字段元数据查询只保留的数据类型
pub const LOOKUP_DATA_TYPES: [&str; 4] = ["string", "phone", "url", "email"];

/// 转义查询字符串字面量中的值
///
/// - `'` → `\'`
/// - 字面量 `\n` 序列 → `\\n`
/// - 换行符 → `\n`
pub fn escape_soql_value(value: &str) -> String {
    value
        .replace('\'', "\\'")
        .replace("\\n", "\\\\n")
        .replace('\n', "\\n")
}

fn quote_list<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| format!("'{}'", v.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 构建关联对象的可查找字段元数据查询
///
/// 按所属对象、标签排序；排除 Id 字段，仅保留字符串类字段
pub fn build_external_id_fields_query(sobjects: &[String]) -> String {
    let escaped: Vec<String> = sobjects.iter().map(|s| escape_soql_value(s)).collect();
    format!(
        "SELECT Id, Name, EntityDefinitionId, EntityDefinition.QualifiedApiName, IsIdLookup, \
         DataType, ValueTypeId, ReferenceTo, IsCreatable, IsUpdatable, Label, MasterLabel, \
         QualifiedApiName, RelationshipName FROM EntityParticle \
         WHERE EntityDefinition.QualifiedApiName IN ({}) AND QualifiedApiName != 'Id' \
         AND DataType IN ({}) ORDER BY EntityDefinitionId, Label",
        quote_list(&escaped),
        quote_list(&LOOKUP_DATA_TYPES),
    )
}

/// 特殊过滤条件（RecordType 需按所属对象过滤）
fn special_case_filter(base_object: &str, related_object: &str) -> Option<String> {
    if related_object.eq_ignore_ascii_case("recordtype") {
        Some(format!("SobjectType = '{}'", escape_soql_value(base_object)))
    } else {
        None
    }
}

/// 按查询长度预算切分关联值
///
/// # 规则
/// - 初始估算 = 查询前缀长度 + 缓冲
/// - 每个值累加 (值长度 + 缓冲)，先加入批次再判断
/// - 估算达到上限时关闭当前批次并重置
///
/// # 返回
/// - 已转义的值批次；每个输入值恰好出现在一个批次中
pub fn plan_related_value_batches(
    base_object: &str,
    related_object: &str,
    related_field: &str,
    related_values: &[String],
) -> Vec<Vec<String>> {
    let extra = special_case_filter(base_object, related_object)
        .map(|filter| format!("{} AND ", filter))
        .unwrap_or_default();
    let base_query_length = format!(
        "SELECT Id, {field} FROM {object} WHERE {extra}{field} IN ('",
        field = related_field,
        object = related_object,
        extra = extra,
    )
    .chars()
    .count()
        + QUERY_ITEM_BUFFER_LENGTH;

    let mut batches = Vec::new();
    let mut current = Vec::new();
    let mut current_length = base_query_length;

    for value in related_values {
        current.push(escape_soql_value(value));
        current_length += value.chars().count() + QUERY_ITEM_BUFFER_LENGTH;
        if current_length >= MAX_QUERY_LENGTH {
            batches.push(std::mem::take(&mut current));
            current_length = base_query_length;
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// 构建关联记录查询（按需拆分为多条）
///
/// # 参数
/// - base_object: 查找字段所属对象（用于 RecordType 特殊过滤）
/// - related_object: 被查询的关联对象
/// - related_field: 关联对象上的查找字段
/// - related_values: 去重后的原始值
pub fn get_related_fields_queries(
    base_object: &str,
    related_object: &str,
    related_field: &str,
    related_values: &[String],
) -> Vec<String> {
    let select = if related_field.eq_ignore_ascii_case("Id") {
        "Id".to_string()
    } else {
        format!("Id, {}", related_field)
    };
    let extra = special_case_filter(base_object, related_object)
        .map(|filter| format!("{} AND ", filter))
        .unwrap_or_default();

    plan_related_value_batches(base_object, related_object, related_field, related_values)
        .into_iter()
        .map(|batch| {
            format!(
                "SELECT {} FROM {} WHERE {}{} IN ({})",
                select,
                related_object,
                extra,
                related_field,
                quote_list(&batch)
            )
        })
        .collect()
}

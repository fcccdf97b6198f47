// ==========================================
// SObject 数据加载 - 字段元数据
// ==========================================
// 职责: 丰富后的字段目录（FieldDescriptor / RelatedFieldCatalog）
// 生命周期: 每个 (org, object) 构建一次，构建后只读
// ==========================================

use crate::domain::types::FieldType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 关联对象上可用作查找键的字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub is_external_id: bool,
}

/// 关联对象名 → 可查找字段列表（保持插入顺序）
pub type RelatedFieldCatalog = IndexMap<String, Vec<RelatedField>>;

/// 目标对象的字段描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub soap_type: String,
    #[serde(default)]
    pub external_id: bool,
    #[serde(default)]
    pub type_label: Option<String>,
    /// 候选关联对象（仅 reference 字段，最多 5 个）
    #[serde(default)]
    pub reference_to: Option<Vec<String>>,
    #[serde(default)]
    pub relationship_name: Option<String>,
    /// None = 未解析；Some = 已解析（仅包含查询到字段的对象）
    #[serde(default)]
    pub related_fields: Option<RelatedFieldCatalog>,
}

impl FieldDescriptor {
    /// 是否为多态引用（候选对象超过一个）
    pub fn is_polymorphic(&self) -> bool {
        self.reference_to.as_ref().map_or(false, |r| r.len() > 1)
    }

    /// 在关联目录中查找字段（先精确匹配，再忽略大小写）
    ///
    /// # 返回
    /// - Some((关联对象名, 字段)): 第一个包含该字段的关联对象
    /// - None: 无目录或无匹配
    pub fn find_related_field(&self, related: &str) -> Option<(&str, &RelatedField)> {
        let catalog = self.related_fields.as_ref()?;
        let related_lower = related.to_lowercase();
        catalog.iter().find_map(|(object, fields)| {
            fields
                .iter()
                .find(|f| f.name == related || f.name.to_lowercase() == related_lower)
                .map(|f| (object.as_str(), f))
        })
    }
}

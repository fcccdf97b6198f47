// ==========================================
// SObject 数据加载 - 值类型转换
// ==========================================
// 职责: 按目标字段类型整形非空值
// 规则:
// - boolean: 常见真/假写法 → JSON 布尔
// - date: 按日期格式提示解析 → YYYY-MM-DD
// - datetime: 按日期格式提示解析 → ISO 8601 (UTC)
// - 其他类型 / 无法解析: 原样透传（由远端校验）
// ==========================================

use crate::domain::types::FieldType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat};
use serde_json::Value;

/// 日期格式提示 → chrono 格式串（如 MM/DD/YYYY → %m/%d/%Y）
pub fn chrono_format(date_format: &str) -> String {
    date_format
        .replace("YYYY", "%Y")
        .replace("yyyy", "%Y")
        .replace("MM", "%m")
        .replace("DD", "%d")
        .replace("dd", "%d")
}

/// 解析日期（先 ISO，再按提示格式）
pub fn parse_date(value: &str, date_format: &str) -> Option<NaiveDate> {
    let hint = chrono_format(date_format);
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, &hint))
        .ok()
}

/// 解析日期时间（RFC 3339 / ISO / 提示格式 + 时间 / 仅日期）
pub fn parse_datetime(value: &str, date_format: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    let hint = chrono_format(date_format);
    let candidates = [
        "%Y-%m-%dT%H:%M:%S%.f".to_string(),
        "%Y-%m-%d %H:%M:%S".to_string(),
        "%Y-%m-%d %H:%M".to_string(),
        format!("{} %H:%M:%S", hint),
        format!("{} %H:%M", hint),
        format!("{} %I:%M %p", hint),
    ];
    candidates
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| parse_date(value, date_format).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// 解析布尔值
pub fn parse_boolean(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// 按字段类型转换非空值
///
/// # 参数
/// - value: 非空原始值
/// - field_type: 目标字段类型
/// - date_format: 日期格式提示（如 "MM/DD/YYYY"）
pub fn transform_value(value: &str, field_type: &FieldType, date_format: &str) -> Value {
    match field_type {
        FieldType::Boolean => parse_boolean(value)
            .map(Value::Bool)
            .unwrap_or_else(|| Value::String(value.to_string())),
        FieldType::Date => parse_date(value.trim(), date_format)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or_else(|| Value::String(value.to_string())),
        FieldType::Datetime => parse_datetime(value.trim(), date_format)
            .map(|dt| Value::String(dt.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true)))
            .unwrap_or_else(|| Value::String(value.to_string())),
        _ => Value::String(value.to_string()),
    }
}

/// 转换为文本形式（用于 XML 元数据值）
pub fn transform_value_to_string(value: &str, field_type: &FieldType, date_format: &str) -> String {
    match transform_value(value, field_type, date_format) {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_boolean_coercion() {
        assert_eq!(transform_value("Yes", &FieldType::Boolean, "MM/DD/YYYY"), json!(true));
        assert_eq!(transform_value("0", &FieldType::Boolean, "MM/DD/YYYY"), json!(false));
        assert_eq!(transform_value("maybe", &FieldType::Boolean, "MM/DD/YYYY"), json!("maybe"));
    }

    #[test]
    fn test_date_with_hint() {
        assert_eq!(transform_value("01/20/2025", &FieldType::Date, "MM/DD/YYYY"), json!("2025-01-20"));
        assert_eq!(transform_value("20/01/2025", &FieldType::Date, "DD/MM/YYYY"), json!("2025-01-20"));
        assert_eq!(transform_value("2025-01-20", &FieldType::Date, "DD/MM/YYYY"), json!("2025-01-20"));
    }

    #[test]
    fn test_unparseable_date_passthrough() {
        assert_eq!(transform_value("soon", &FieldType::Date, "MM/DD/YYYY"), json!("soon"));
    }

    #[test]
    fn test_datetime_normalized_to_utc() {
        assert_eq!(
            transform_value("2025-01-20T10:30:00+02:00", &FieldType::Datetime, "MM/DD/YYYY"),
            json!("2025-01-20T08:30:00.000Z")
        );
        assert_eq!(
            transform_value("01/20/2025 10:30", &FieldType::Datetime, "MM/DD/YYYY"),
            json!("2025-01-20T10:30:00.000Z")
        );
        assert_eq!(
            transform_value("01/20/2025", &FieldType::Datetime, "MM/DD/YYYY"),
            json!("2025-01-20T00:00:00.000Z")
        );
    }

    #[test]
    fn test_other_types_passthrough() {
        assert_eq!(transform_value("1,200.50", &FieldType::Currency, "MM/DD/YYYY"), json!("1,200.50"));
        assert_eq!(transform_value("001xx", &FieldType::Reference, "MM/DD/YYYY"), json!("001xx"));
    }
}

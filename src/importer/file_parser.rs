// ==========================================
// SObject 数据加载 - 文件解析器实现
// ==========================================
// 职责: 输入文件 → 表头 + 行记录
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// ==========================================

use crate::domain::record::{CellValue, InputRecord};
use crate::importer::error::{LoadError, LoadResult};
use crate::importer::traits::{FileParser, ParsedFile};
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;

/// 将一行单元格按表头组装为输入行；全空行返回 None
fn build_record<I>(headers: &[String], cells: I) -> Option<InputRecord>
where
    I: IntoIterator<Item = String>,
{
    let mut record = InputRecord::new();
    for (col_idx, value) in cells.into_iter().enumerate() {
        if let Some(header) = headers.get(col_idx) {
            record.insert(header.clone(), CellValue::text(value.trim()));
        }
    }

    // 缺失列补齐为空值，保证每行键集合一致
    for header in headers {
        record.entry(header.clone()).or_insert(CellValue::Empty);
    }

    if record.values().all(CellValue::is_empty) {
        None
    } else {
        Some(record)
    }
}

fn check_exists(path: &Path) -> LoadResult<()> {
    if !path.exists() {
        return Err(LoadError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 从任意 reader 解析（便于测试与内存数据）
    pub fn parse_reader<R: std::io::Read>(&self, reader: R) -> LoadResult<ParsedFile> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            if let Some(row) = build_record(&headers, record.iter().map(str::to_string)) {
                rows.push(row);
            }
        }

        Ok(ParsedFile { headers, rows })
    }
}

impl FileParser for CsvParser {
    fn parse_file(&self, file_path: &Path) -> LoadResult<ParsedFile> {
        check_exists(file_path)?;

        if let Some(ext) = file_path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(LoadError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }

        let file = File::open(file_path)?;
        self.parse_reader(file)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_file(&self, file_path: &Path) -> LoadResult<ParsedFile> {
        check_exists(file_path)?;

        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if ext != "xlsx" && ext != "xls" {
            return Err(LoadError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(file_path)?;

        // 只读取第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| LoadError::ExcelParseError("Excel 文件无工作表".to_string()))?;

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| LoadError::ExcelParseError(e.to_string()))?;

        let mut rows_iter = range.rows();
        let header_row = rows_iter
            .next()
            .ok_or_else(|| LoadError::ExcelParseError("Excel 文件无数据行".to_string()))?;

        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        let rows = rows_iter
            .filter_map(|data_row| build_record(&headers, data_row.iter().map(|c| c.to_string())))
            .collect();

        Ok(ParsedFile { headers, rows })
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> LoadResult<ParsedFile> {
        let path = file_path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => CsvParser.parse_file(path),
            "xlsx" | "xls" => ExcelParser.parse_file(path),
            _ => Err(LoadError::UnsupportedFormat(ext)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn temp_csv(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(temp_file, "{}", line).unwrap();
        }
        temp_file
    }

    #[test]
    fn test_csv_parser_valid_file() {
        let temp_file = temp_csv(&["Name, Account.Name ,Phone", "Acme,Parent Co,555-0100", "Globex,,"]);

        let parsed = CsvParser.parse_file(temp_file.path()).unwrap();

        assert_eq!(parsed.headers, vec!["Name", "Account.Name", "Phone"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0]["Account.Name"], CellValue::Text("Parent Co".to_string()));
        assert_eq!(parsed.rows[1]["Phone"], CellValue::Empty);
    }

    #[test]
    fn test_csv_parser_file_not_found() {
        let result = CsvParser.parse_file(Path::new("non_existent.csv"));
        assert!(matches!(result, Err(LoadError::FileNotFound(_))));
    }

    #[test]
    fn test_csv_parser_skip_empty_rows() {
        let temp_file = temp_csv(&["Name,Phone", "Acme,1", ",", "Globex,2"]);

        let parsed = CsvParser.parse_file(temp_file.path()).unwrap();

        assert_eq!(parsed.rows.len(), 2);
    }

    #[test]
    fn test_csv_parser_short_rows_filled() {
        let parsed = CsvParser
            .parse_reader("Name,Phone,Email\nAcme\n".as_bytes())
            .unwrap();

        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0]["Email"], CellValue::Empty);
    }

    #[test]
    fn test_universal_parser_rejects_unknown_extension() {
        let result = UniversalFileParser.parse("data.json");
        assert!(matches!(result, Err(LoadError::UnsupportedFormat(ext)) if ext == "json"));
    }
}

// ==========================================
// 禽类订单结算引擎 - 行映射工具
// ==========================================
// 职责: 日期/时间/枚举/JSON 列的读写转换
// 说明: 解析失败统一转换为 FromSqlConversionFailure, 由调用方 `?` 透传
// ==========================================

use crate::db::{DATETIME_FORMAT, DATE_FORMAT, TIME_FORMAT};
use crate::domain::types::Sex;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::Type;
use rusqlite::Error as SqlError;

fn conversion_error(col: usize, message: String) -> SqlError {
    SqlError::FromSqlConversionFailure(
        col,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

pub fn fmt_date(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

pub fn fmt_time(t: NaiveTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

pub fn fmt_datetime(ts: NaiveDateTime) -> String {
    ts.format(DATETIME_FORMAT).to_string()
}

pub fn parse_date(col: usize, raw: &str) -> Result<NaiveDate, SqlError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| conversion_error(col, format!("日期格式错误 '{}': {}", raw, e)))
}

pub fn parse_time(col: usize, raw: &str) -> Result<NaiveTime, SqlError> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .map_err(|e| conversion_error(col, format!("时间格式错误 '{}': {}", raw, e)))
}

pub fn parse_datetime(col: usize, raw: &str) -> Result<NaiveDateTime, SqlError> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .map_err(|e| conversion_error(col, format!("时间戳格式错误 '{}': {}", raw, e)))
}

pub fn parse_opt_date(col: usize, raw: Option<String>) -> Result<Option<NaiveDate>, SqlError> {
    raw.map(|s| parse_date(col, &s)).transpose()
}

pub fn parse_sex(col: usize, raw: Option<String>) -> Result<Option<Sex>, SqlError> {
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => Sex::parse(&s)
            .map(Some)
            .ok_or_else(|| conversion_error(col, format!("未知性别 '{}'", s))),
    }
}

pub fn parse_json<T: serde::de::DeserializeOwned>(col: usize, raw: &str) -> Result<T, SqlError> {
    serde_json::from_str(raw).map_err(|e| conversion_error(col, format!("JSON 解析失败: {}", e)))
}

pub fn parse_enum<T>(col: usize, raw: &str, parse: fn(&str) -> Option<T>) -> Result<T, SqlError> {
    parse(raw).ok_or_else(|| conversion_error(col, format!("未知枚举值 '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_roundtrip() {
        let d = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
        assert_eq!(fmt_date(d), "2026-01-09");
        assert_eq!(parse_date(0, "2026-01-09").unwrap(), d);
        assert!(parse_date(0, "09/01/2026").is_err());
    }

    #[test]
    fn test_parse_sex_blank_is_none() {
        assert_eq!(parse_sex(0, None).unwrap(), None);
        assert_eq!(parse_sex(0, Some(" ".to_string())).unwrap(), None);
        assert_eq!(parse_sex(0, Some("H".to_string())).unwrap(), Some(Sex::H));
        assert!(parse_sex(0, Some("Q".to_string())).is_err());
    }
}

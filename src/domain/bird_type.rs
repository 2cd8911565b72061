// ==========================================
// 禽类订单结算引擎 - 禽类标签值对象
// ==========================================
// 结构化的禽类标签: 基础类型 + 品种 + 公母数量
// 旧数据为显示字符串, 如 "Pollo (M:10, H:20)" / "Pollo - Roja"
// 入库前通过 parse_display 解析, 之后只做字段读取
// ==========================================

use crate::domain::types::Sex;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// SexCounts - 公母数量
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SexCounts {
    pub male: u32,   // 公 (M)
    pub female: u32, // 母 (H)
}

impl SexCounts {
    pub fn new(male: u32, female: u32) -> Self {
        Self { male, female }
    }

    pub fn total(&self) -> u32 {
        self.male + self.female
    }

    /// 唯一非零的性别; 混合或全零返回 None
    pub fn dominant_sex(&self) -> Option<Sex> {
        match (self.male > 0, self.female > 0) {
            (true, false) => Some(Sex::M),
            (false, true) => Some(Sex::H),
            _ => None,
        }
    }

    pub fn add(&self, other: &SexCounts) -> SexCounts {
        SexCounts {
            male: self.male + other.male,
            female: self.female + other.female,
        }
    }
}

// ==========================================
// BirdTypeLabel - 禽类标签
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirdTypeLabel {
    pub base: String,                  // 基础类型, 如 "Pollo"
    pub variety: Option<String>,       // 品种, 如 "Roja"
    pub sex_counts: Option<SexCounts>, // 公母数量
}

impl BirdTypeLabel {
    /// 仅基础类型的标签
    pub fn plain(base: &str) -> Self {
        Self {
            base: base.trim().to_string(),
            variety: None,
            sex_counts: None,
        }
    }

    pub fn with_variety(mut self, variety: &str) -> Self {
        let v = variety.trim();
        self.variety = if v.is_empty() { None } else { Some(v.to_string()) };
        self
    }

    pub fn with_sex_counts(mut self, male: u32, female: u32) -> Self {
        self.sex_counts = Some(SexCounts::new(male, female));
        self
    }

    /// 合并判定使用的归一化名称 (去掉品种和公母标注)
    pub fn normalized(&self) -> &str {
        &self.base
    }

    /// 价格/损耗查询使用的性别
    pub fn sex(&self) -> Option<Sex> {
        self.sex_counts.as_ref().and_then(|c| c.dominant_sex())
    }

    /// 从旧显示字符串解析
    ///
    /// 支持:
    /// - "Pollo"
    /// - "Pollo - Roja"
    /// - "Pollo (M:10, H:20)"
    /// - "Pollo - Roja (M:10, H:20)"
    ///
    /// 括号内无法识别时整体视为基础类型的一部分
    pub fn parse_display(label: &str) -> Self {
        let trimmed = label.trim();

        let (head, sex_counts) = match Self::split_sex_suffix(trimmed) {
            Some((head, counts)) => (head, Some(counts)),
            None => (trimmed, None),
        };

        let (base, variety) = match head.split_once(" - ") {
            Some((b, v)) if !v.trim().is_empty() => (b.trim(), Some(v.trim().to_string())),
            _ => (head.trim(), None),
        };

        Self {
            base: base.to_string(),
            variety,
            sex_counts,
        }
    }

    fn split_sex_suffix(label: &str) -> Option<(&str, SexCounts)> {
        if !label.ends_with(')') {
            return None;
        }
        let open = label.rfind('(')?;
        let inner = &label[open + 1..label.len() - 1];

        let mut counts = SexCounts::default();
        let mut seen = false;
        for part in inner.split(',') {
            let (key, value) = part.split_once(':')?;
            let value: u32 = value.trim().parse().ok()?;
            match Sex::parse(key)? {
                Sex::M => counts.male = value,
                Sex::H => counts.female = value,
            }
            seen = true;
        }

        if seen {
            Some((label[..open].trim_end(), counts))
        } else {
            None
        }
    }
}

impl fmt::Display for BirdTypeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        if let Some(variety) = &self.variety {
            write!(f, " - {}", variety)?;
        }
        if let Some(counts) = &self.sex_counts {
            write!(f, " (M:{}, H:{})", counts.male, counts.female)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let label = BirdTypeLabel::parse_display("  Pollo ");
        assert_eq!(label, BirdTypeLabel::plain("Pollo"));
    }

    #[test]
    fn test_parse_variety() {
        let label = BirdTypeLabel::parse_display("Pollo - Roja");
        assert_eq!(label.base, "Pollo");
        assert_eq!(label.variety.as_deref(), Some("Roja"));
        assert!(label.sex_counts.is_none());
    }

    #[test]
    fn test_parse_sex_counts() {
        let label = BirdTypeLabel::parse_display("Pollo (M:10, H:20)");
        assert_eq!(label.base, "Pollo");
        assert_eq!(label.sex_counts, Some(SexCounts::new(10, 20)));
        assert_eq!(label.sex(), None);
    }

    #[test]
    fn test_parse_variety_and_single_sex() {
        let label = BirdTypeLabel::parse_display("Gallina - Roja (H:15)");
        assert_eq!(label.base, "Gallina");
        assert_eq!(label.variety.as_deref(), Some("Roja"));
        assert_eq!(label.sex(), Some(Sex::H));
        assert_eq!(label.normalized(), "Gallina");
    }

    #[test]
    fn test_unrecognised_parentheses_stay_in_base() {
        let label = BirdTypeLabel::parse_display("Pato (criollo)");
        assert_eq!(label.base, "Pato (criollo)");
        assert!(label.sex_counts.is_none());
    }

    #[test]
    fn test_display_matches_legacy_format() {
        let label = BirdTypeLabel::plain("Pollo")
            .with_variety("Roja")
            .with_sex_counts(10, 20);
        assert_eq!(label.to_string(), "Pollo - Roja (M:10, H:20)");
        assert_eq!(BirdTypeLabel::parse_display(&label.to_string()), label);
    }
}

//! 表格行 → 记录
//!
//! 先用结构化选择器取字段；取不到案号时，对整行文本跑正则兜底

use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

use crate::models::{Provenance, Record, RecordKind, TreePagination};
use crate::taxonomy::{ClassifiedError, ErrorKind, StageResult};

/// 页面脚本读出的一行
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRow {
    /// 规则名 → 单元格内容（选择器未命中为 None）
    #[serde(default)]
    pub cells: BTreeMap<String, Option<String>>,
    /// 整行的纯文本
    #[serde(default)]
    pub text: String,
}

pub struct RowMapper {
    key_field: String,
    case_number: Regex,
    kind: RecordKind,
}

impl RowMapper {
    pub fn new(config: &TreePagination) -> StageResult<Self> {
        let case_number = Regex::new(&config.case_number_pattern).map_err(|e| {
            ClassifiedError::new(
                ErrorKind::ExtractionFailed,
                format!("案号正则无效 '{}': {}", config.case_number_pattern, e),
            )
        })?;
        Ok(Self {
            key_field: config.key_field.clone(),
            case_number,
            kind: config.record_kind,
        })
    }

    /// 取不到案号的行返回 None
    pub fn map(&self, row: RawRow, provenance: Provenance) -> Option<Record> {
        let mut fields: BTreeMap<String, String> = row
            .cells
            .iter()
            .filter_map(|(name, value)| {
                let value = normalize_whitespace(value.as_deref()?);
                (!value.is_empty()).then(|| (name.clone(), value))
            })
            .collect();

        let key = match fields.get(&self.key_field) {
            Some(primary) => self
                .find_case_number(primary)
                .unwrap_or_else(|| primary.clone()),
            None => {
                let fallback = self.find_case_number(&row.text)?;
                debug!("结构化选择器未取到案号，正则兜底: {}", fallback);
                fallback
            }
        };
        fields.insert(self.key_field.clone(), key.clone());

        let raw = json!({ "cells": row.cells, "text": row.text });
        Some(Record::new(key, self.kind, provenance, fields, raw))
    }

    fn find_case_number(&self, text: &str) -> Option<String> {
        self.case_number
            .find(text)
            .map(|m| m.as_str().to_string())
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::target;
    use crate::models::Navigation;

    fn mapper() -> RowMapper {
        match target("tjsp").navigation {
            Navigation::TreePaginated(tree) => RowMapper::new(&tree).unwrap(),
            other => panic!("modo inesperado: {:?}", other),
        }
    }

    fn provenance() -> Provenance {
        Provenance {
            target: "tjsp".to_string(),
            node: Some("Capital".to_string()),
            page: 2,
        }
    }

    fn row(cells: &[(&str, Option<&str>)], text: &str) -> RawRow {
        RawRow {
            cells: cells
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect(),
            text: text.to_string(),
        }
    }

    #[test]
    fn structural_selectors_come_first() {
        let record = mapper()
            .map(
                row(
                    &[
                        ("numeroProcesso", Some(" Processo 1000123-45.2023.8.26.0100 ")),
                        ("prazo", Some("10/11/2026")),
                    ],
                    "ignored 9999999-99.2099.8.26.0001",
                ),
                provenance(),
            )
            .unwrap();

        assert_eq!(record.numero_processo(), "1000123-45.2023.8.26.0100");
        assert_eq!(record.field("prazo"), Some("10/11/2026"));
        assert_eq!(record.kind(), RecordKind::Intimacao);
        assert_eq!(record.provenance().node.as_deref(), Some("Capital"));
    }

    #[test]
    fn drifting_markup_falls_back_to_the_row_text() {
        let record = mapper()
            .map(
                row(
                    &[("numeroProcesso", None), ("prazo", Some("  "))],
                    "Intimação\n 1000123-45.2023.8.26.0100  Vara Cível",
                ),
                provenance(),
            )
            .unwrap();

        assert_eq!(record.numero_processo(), "1000123-45.2023.8.26.0100");
        assert_eq!(record.field("numeroProcesso"), Some("1000123-45.2023.8.26.0100"));
        assert_eq!(record.field("prazo"), None);
    }

    #[test]
    fn rows_without_any_case_number_are_dropped() {
        assert!(mapper()
            .map(row(&[("prazo", Some("hoje"))], "Nenhum processo"), provenance())
            .is_none());
    }
}

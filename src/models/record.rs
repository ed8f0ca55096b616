use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// 记录种类
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    #[default]
    Processo,
    Audiencia,
    Intimacao,
}

/// 记录来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub target: String,
    /// 树形来源的节点（地区/收件箱）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    pub page: u32,
}

/// 一条标准化记录，产出后不可修改
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    numero_processo: String,
    kind: RecordKind,
    provenance: Provenance,
    fields: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<JsonValue>,
    raw: JsonValue,
}

impl Record {
    pub fn new(
        numero_processo: impl Into<String>,
        kind: RecordKind,
        provenance: Provenance,
        fields: BTreeMap<String, String>,
        raw: JsonValue,
    ) -> Self {
        Self {
            numero_processo: numero_processo.into(),
            kind,
            provenance,
            fields,
            detail: None,
            raw,
        }
    }

    /// 在产出前附加详情
    pub(crate) fn with_detail(mut self, detail: JsonValue) -> Self {
        self.detail = Some(detail);
        self
    }

    /// 自然键，下游用于去重
    pub fn numero_processo(&self) -> &str {
        &self.numero_processo
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn detail(&self) -> Option<&JsonValue> {
        self.detail.as_ref()
    }

    pub fn raw(&self) -> &JsonValue {
        &self.raw
    }
}

//! 树形分页策略（地区 → 收件箱 → 表格）
//!
//! - 计数为 0 的顶层节点直接跳过，不点击
//! - 一个节点翻到底再处理下一个，不交错
//! - 是否有下一页只看"下一页"控件是否存在，来源不提供总数；每个节点最多翻 `max_pages_per_node` 页
//! - 打开收件箱或翻页可能重绘整棵树，打开下一个节点前重新打标记

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use super::row_mapping::{RawRow, RowMapper};
use super::PageSource;
use crate::browser::{BrowserCapability, WaitCondition, WaitOptions};
use crate::infrastructure::JsExecutor;
use crate::models::{Provenance, Record, Session, TreePagination};
use crate::taxonomy::{ClassifiedError, ErrorKind, StageResult};

/// 节点编号写在这个属性上，之后用属性选择器定位
const NODE_ATTRIBUTE: &str = "data-tribunal-node";

pub(crate) const LIST_NODES_SCRIPT: &str = r#"(nodeSelector, labelSelector, countSelector, attribute) => {
    return Array.from(document.querySelectorAll(nodeSelector)).map((node, index) => {
        node.setAttribute(attribute, String(index));
        const labelEl = labelSelector ? node.querySelector(labelSelector) : null;
        const countEl = node.querySelector(countSelector);
        const digits = countEl ? (countEl.textContent || '').replace(/\D+/g, '') : '';
        return {
            index,
            label: ((labelEl || node).textContent || '').trim().split('\n')[0].trim(),
            count: digits ? parseInt(digits, 10) : 0,
        };
    });
}"#;

pub(crate) const READ_ROWS_SCRIPT: &str = r#"(tableSelector, rowSelector, rules) => {
    const table = document.querySelector(tableSelector);
    if (!table) return [];
    return Array.from(table.querySelectorAll(rowSelector)).map((row) => {
        const cells = {};
        for (const rule of rules) {
            const el = row.querySelector(rule.selector);
            if (!el) { cells[rule.name] = null; continue; }
            cells[rule.name] = rule.attribute ? el.getAttribute(rule.attribute) : (el.textContent || '');
        }
        return { cells, text: row.innerText || row.textContent || '' };
    });
}"#;

pub(crate) const HAS_NEXT_PAGE_SCRIPT: &str = r#"(selector) => {
    const el = document.querySelector(selector);
    if (!el) return false;
    const style = window.getComputedStyle(el);
    return style.display !== 'none' && style.visibility !== 'hidden' && !el.hasAttribute('disabled');
}"#;

/// 顶层节点
#[derive(Debug, Clone, Deserialize)]
pub struct TreeNode {
    pub index: usize,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub count: u32,
}

impl TreeNode {
    fn selector(&self) -> String {
        format!("[{}=\"{}\"]", NODE_ATTRIBUTE, self.index)
    }
}

/// 正在处理的节点和当前页码
struct OpenNode {
    node: TreeNode,
    page: u32,
}

pub struct TreeSource<'a> {
    session: &'a Session<'a>,
    browser: &'a dyn BrowserCapability,
    executor: JsExecutor<'a>,
    target_id: String,
    tree: &'a TreePagination,
    mapper: RowMapper,
    /// None 表示尚未枚举
    pending: Option<VecDeque<TreeNode>>,
    current: Option<OpenNode>,
    /// 页面上的节点标记是否仍是最近一次枚举打上的
    stamped: bool,
    done: bool,
}

impl<'a> TreeSource<'a> {
    pub fn new(
        session: &'a Session<'a>,
        target_id: &str,
        tree: &'a TreePagination,
    ) -> StageResult<Self> {
        Ok(Self {
            session,
            browser: session.browser(),
            executor: session.executor(),
            target_id: target_id.to_string(),
            tree,
            mapper: RowMapper::new(tree)?,
            pending: None,
            current: None,
            stamped: false,
            done: false,
        })
    }

    /// 回到树所在页面；被带离目标域名说明会话已失效
    async fn show_tree(&self) -> StageResult<()> {
        if let Some(url) = &self.tree.tree_url {
            self.browser
                .navigate(url, WaitCondition::Load, self.tree.table_timeout())
                .await
                .map_err(|e| e.classify_navigation())?;
            let landed = self
                .browser
                .current_url()
                .await
                .map_err(|e| e.classify_as(ErrorKind::ExtractionFailed))?;
            if !self.session.is_on_domain(&landed) {
                return Err(ClassifiedError::new(
                    ErrorKind::SessionExpired,
                    format!(
                        "打开 {} 后落在 {}，已离开 {}",
                        url,
                        landed,
                        self.session.domain()
                    ),
                ));
            }
        }
        self.browser
            .wait_for_element(&self.tree.node_selector, WaitOptions::attached(self.tree.table_timeout()))
            .await
            .map_err(|e| e.classify_wait(ErrorKind::ExtractionFailed))
    }

    /// 给所有顶层节点打上编号
    async fn stamp_nodes(&self) -> StageResult<Vec<TreeNode>> {
        self.executor
            .eval_as(
                LIST_NODES_SCRIPT,
                vec![
                    JsonValue::from(self.tree.node_selector.as_str()),
                    self.tree
                        .node_label_selector
                        .as_deref()
                        .map_or(JsonValue::Null, JsonValue::from),
                    JsonValue::from(self.tree.node_count_selector.as_str()),
                    JsonValue::from(NODE_ATTRIBUTE),
                ],
            )
            .await
            .map_err(|e| e.classify_as(ErrorKind::ExtractionFailed))
    }

    /// 枚举顶层节点，只保留计数非零的
    async fn enumerate(&self) -> StageResult<VecDeque<TreeNode>> {
        self.show_tree().await?;
        let nodes = self.stamp_nodes().await?;

        let total = nodes.len();
        let with_records: VecDeque<TreeNode> = nodes.into_iter().filter(|n| n.count > 0).collect();
        info!(
            "[{}] 🌳 {} 个节点，其中 {} 个有记录",
            self.target_id,
            total,
            with_records.len()
        );
        Ok(with_records)
    }

    /// 重新打标记，按标签找回节点的新编号
    async fn restamp(&self, node: TreeNode) -> StageResult<TreeNode> {
        self.show_tree().await?;
        let nodes = self.stamp_nodes().await?;
        let index = nodes
            .iter()
            .find(|n| !node.label.is_empty() && n.label == node.label)
            .map_or(node.index, |n| n.index);
        if index != node.index {
            debug!(
                "[{}] 节点 '{}' 编号 {} → {}",
                self.target_id, node.label, node.index, index
            );
        }
        Ok(TreeNode { index, ..node })
    }

    /// 展开节点并打开收件箱
    async fn open(&self, node: &TreeNode) -> StageResult<()> {
        let node_selector = node.selector();
        let inbox_selector = format!("{} {}", node_selector, self.tree.inbox_selector);
        let wait = WaitOptions::visible(self.tree.table_timeout());
        info!(
            "[{}] 📂 打开节点 '{}' ({} 条)",
            self.target_id, node.label, node.count
        );

        self.browser
            .wait_for_element(&node_selector, WaitOptions::attached(self.tree.table_timeout()))
            .await
            .map_err(|e| e.classify_wait(ErrorKind::ExtractionFailed))?;
        self.browser
            .click(&node_selector)
            .await
            .map_err(|e| e.classify_wait(ErrorKind::ExtractionFailed))?;
        self.browser
            .wait_for_element(&inbox_selector, wait)
            .await
            .map_err(|e| e.classify_wait(ErrorKind::ExtractionFailed))?;
        self.browser
            .click(&inbox_selector)
            .await
            .map_err(|e| e.classify_wait(ErrorKind::ExtractionFailed))
    }

    async fn read_rows(&self) -> StageResult<Vec<RawRow>> {
        self.browser
            .wait_for_element(
                &self.tree.table_selector,
                WaitOptions::visible(self.tree.table_timeout()),
            )
            .await
            .map_err(|e| e.classify_wait(ErrorKind::ExtractionFailed))?;

        let rules: Vec<JsonValue> = self
            .tree
            .fields
            .iter()
            .map(|rule| {
                json!({ "name": rule.name, "selector": rule.selector, "attribute": rule.attribute })
            })
            .collect();
        self.executor
            .eval_as(
                READ_ROWS_SCRIPT,
                vec![
                    JsonValue::from(self.tree.table_selector.as_str()),
                    JsonValue::from(self.tree.row_selector.as_str()),
                    JsonValue::Array(rules),
                ],
            )
            .await
            .map_err(|e| e.classify_as(ErrorKind::ExtractionFailed))
    }

    async fn has_next_page(&self) -> StageResult<bool> {
        self.executor
            .eval_as(
                HAS_NEXT_PAGE_SCRIPT,
                vec![JsonValue::from(self.tree.next_page_selector.as_str())],
            )
            .await
            .map_err(|e| e.classify_as(ErrorKind::ExtractionFailed))
    }

    async fn fetch(&mut self) -> StageResult<Vec<Record>> {
        let pending = match self.pending.take() {
            Some(pending) => pending,
            None => {
                let pending = self.enumerate().await?;
                self.stamped = true;
                pending
            }
        };
        self.pending = Some(pending);

        let open = match self.current.take() {
            Some(mut open) => {
                self.browser
                    .click(&self.tree.next_page_selector)
                    .await
                    .map_err(|e| e.classify_wait(ErrorKind::ExtractionFailed))?;
                open.page += 1;
                open
            }
            None => {
                let Some(node) = self.pending.as_mut().and_then(VecDeque::pop_front) else {
                    self.done = true;
                    return Ok(Vec::new());
                };
                let node = if self.stamped {
                    node
                } else {
                    self.restamp(node).await?
                };
                self.stamped = false;
                self.open(&node).await?;
                OpenNode { node, page: 1 }
            }
        };

        let rows = self.read_rows().await?;
        let row_count = rows.len();
        let records: Vec<Record> = rows
            .into_iter()
            .filter_map(|row| {
                self.mapper.map(
                    row,
                    Provenance {
                        target: self.target_id.clone(),
                        node: Some(open.node.label.clone()),
                        page: open.page,
                    },
                )
            })
            .collect();
        if records.len() < row_count {
            warn!(
                "[{}] 节点 '{}' 第 {} 页有 {} 行取不到案号",
                self.target_id,
                open.node.label,
                open.page,
                row_count - records.len()
            );
        }
        debug!(
            "[{}] 节点 '{}' 第 {} 页: {} 条",
            self.target_id,
            open.node.label,
            open.page,
            records.len()
        );

        let has_next = self.has_next_page().await?;
        if has_next && open.page < self.tree.max_pages_per_node {
            self.current = Some(open);
        } else {
            if has_next {
                warn!(
                    "[{}] 节点 '{}' 已达翻页上限 {}，转到下一个节点",
                    self.target_id, open.node.label, self.tree.max_pages_per_node
                );
            }
            info!(
                "[{}] ✓ 节点 '{}' 完成，共 {} 页",
                self.target_id, open.node.label, open.page
            );
            self.done = self.pending.as_ref().map_or(true, VecDeque::is_empty);
        }
        Ok(records)
    }
}

#[async_trait]
impl PageSource for TreeSource<'_> {
    async fn fetch_page(&mut self) -> StageResult<Vec<Record>> {
        let result = self.fetch().await;
        if result.is_err() {
            self.done = true;
        }
        result
    }

    fn has_more(&self) -> bool {
        !self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeBrowser;
    use crate::models::fixtures::target;
    use crate::models::Navigation;
    use crate::traversal::records;
    use futures::TryStreamExt;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn tree() -> TreePagination {
        match target("tjsp").navigation {
            Navigation::TreePaginated(tree) => tree,
            other => panic!("modo inesperado: {:?}", other),
        }
    }

    fn row(numero: &str) -> JsonValue {
        json!({
            "cells": { "numeroProcesso": numero, "prazo": "10 dias" },
            "text": format!("{} 10 dias", numero)
        })
    }

    fn node(index: usize) -> String {
        format!("[data-tribunal-node=\"{}\"]", index)
    }

    /// 节点计数由 `counts` 给出；每个节点的表格有 `pages` 页
    fn tree_site(counts: &'static [u32], pages: u32) -> FakeBrowser {
        tree_site_with(counts, pages, false)
    }

    /// `rerender` 为真时，打开收件箱会重绘树并抹掉节点标记
    fn tree_site_with(counts: &'static [u32], pages: u32, rerender: bool) -> FakeBrowser {
        let page = Arc::new(AtomicU32::new(1));
        let on_next = page.clone();
        FakeBrowser::builder()
            .present(&[".tree-region"])
            .on_script(move |f, _, state| {
                if f == LIST_NODES_SCRIPT {
                    let nodes: Vec<JsonValue> = counts
                        .iter()
                        .enumerate()
                        .map(|(i, count)| {
                            state.show(&node(i));
                            json!({ "index": i, "label": format!("Região {}", i), "count": count })
                        })
                        .collect();
                    return Ok(JsonValue::Array(nodes));
                }
                let current = page.load(Ordering::SeqCst);
                if f == READ_ROWS_SCRIPT {
                    return Ok(json!([
                        row(&format!("{:07}-11.2024.8.26.0100", current * 10 + 1)),
                        row(&format!("{:07}-11.2024.8.26.0100", current * 10 + 2)),
                    ]));
                }
                if f == HAS_NEXT_PAGE_SCRIPT {
                    return Ok(JsonValue::Bool(current < pages));
                }
                Ok(JsonValue::Null)
            })
            .on_click(move |selector, state| {
                if selector == "a.next:not(.disabled)" {
                    on_next.fetch_add(1, Ordering::SeqCst);
                } else if selector.ends_with(".inbox") {
                    on_next.store(1, Ordering::SeqCst);
                    state.show("table#intimacoes");
                    if rerender {
                        for i in 0..counts.len() {
                            state.hide(&node(i));
                        }
                    }
                } else if selector.starts_with("[data-tribunal-node=") {
                    state.show(&format!("{} .inbox", selector));
                }
            })
            .build()
    }

    async fn collect(browser: &FakeBrowser, tree: &TreePagination) -> StageResult<Vec<Record>> {
        let session = Session::new(browser, "tjsp", "https://esaj.tjsp.jus.br/esaj/portal.do");
        let source = TreeSource::new(&session, "tjsp", tree)?;
        records(Box::new(source), CancellationToken::new(), Duration::from_millis(1))
            .try_collect()
            .await
    }

    #[tokio::test]
    async fn zero_count_nodes_are_never_clicked() {
        let browser = tree_site(&[0, 4, 0], 1);
        let all = collect(&browser, &tree()).await.unwrap();

        assert_eq!(
            browser.clicks(),
            vec![
                "[data-tribunal-node=\"1\"]".to_string(),
                "[data-tribunal-node=\"1\"] .inbox".to_string(),
            ]
        );
        assert!(browser
            .clicks()
            .iter()
            .all(|c| !c.contains("\"0\"") && !c.contains("\"2\"")));
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].provenance().node.as_deref(), Some("Região 1"));
    }

    #[tokio::test]
    async fn follows_next_page_until_it_disappears() {
        let browser = tree_site(&[3], 3);
        let all = collect(&browser, &tree()).await.unwrap();

        assert_eq!(all.len(), 6);
        let next_clicks = browser
            .clicks()
            .iter()
            .filter(|c| c.as_str() == "a.next:not(.disabled)")
            .count();
        assert_eq!(next_clicks, 2);
        assert_eq!(all[5].provenance().page, 3);
        assert_eq!(all[5].numero_processo(), "0000032-11.2024.8.26.0100");
    }

    #[tokio::test]
    async fn stuck_next_control_stops_at_the_page_limit() {
        let browser = tree_site(&[5, 5], u32::MAX);
        let mut limited = tree();
        limited.max_pages_per_node = 3;

        let all = collect(&browser, &limited).await.unwrap();

        assert_eq!(all.len(), 12);
        let next_clicks = browser
            .clicks()
            .iter()
            .filter(|c| c.as_str() == "a.next:not(.disabled)")
            .count();
        assert_eq!(next_clicks, 4);
        assert_eq!(all[11].provenance().node.as_deref(), Some("Região 1"));
        assert_eq!(all[11].provenance().page, 3);
    }

    #[tokio::test]
    async fn redirect_away_from_the_court_is_an_expired_session() {
        let browser = FakeBrowser::builder()
            .present(&[".tree-region"])
            .on_navigate(|_, state| state.url = "https://sso.outro.gov.br/sajcas/login".to_string())
            .build();

        let err = collect(&browser, &tree()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SessionExpired);
        assert!(err.retryable());
        assert!(browser.clicks().is_empty());
        assert_eq!(browser.evaluations_of(LIST_NODES_SCRIPT), 0);
    }

    #[tokio::test]
    async fn nodes_are_restamped_after_the_tree_rerenders() {
        let browser = tree_site_with(&[2, 3], 1, true);

        let all = collect(&browser, &tree()).await.unwrap();

        assert_eq!(all.len(), 4);
        assert_eq!(browser.evaluations_of(LIST_NODES_SCRIPT), 2);
        assert_eq!(
            browser.clicks(),
            vec![
                node(0),
                format!("{} .inbox", node(0)),
                node(1),
                format!("{} .inbox", node(1)),
            ]
        );
        assert_eq!(all[3].provenance().node.as_deref(), Some("Região 1"));
    }

    #[tokio::test]
    async fn nodes_are_processed_one_after_another() {
        let browser = tree_site(&[2, 5], 2);
        let all = collect(&browser, &tree()).await.unwrap();

        let order: Vec<String> = all
            .iter()
            .map(|r| format!("{}#{}", r.provenance().node.as_deref().unwrap(), r.provenance().page))
            .collect();
        assert_eq!(
            order,
            vec![
                "Região 0#1", "Região 0#1", "Região 0#2", "Região 0#2",
                "Região 1#1", "Região 1#1", "Região 1#2", "Região 1#2",
            ]
        );
    }

    #[tokio::test]
    async fn tree_without_records_yields_nothing() {
        let browser = tree_site(&[0, 0], 1);
        let all = collect(&browser, &tree()).await.unwrap();
        assert!(all.is_empty());
        assert!(browser.clicks().is_empty());
    }

    #[tokio::test]
    async fn missing_table_is_an_extraction_failure() {
        let browser = FakeBrowser::builder()
            .present(&[
                ".tree-region",
                "[data-tribunal-node=\"0\"]",
                "[data-tribunal-node=\"0\"] .inbox",
            ])
            .on_script(|f, _, _| {
                Ok(if f == LIST_NODES_SCRIPT {
                    json!([{ "index": 0, "label": "Capital", "count": 1 }])
                } else {
                    JsonValue::Null
                })
            })
            .build();
        let err = collect(&browser, &tree()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExtractionFailed);
    }
}

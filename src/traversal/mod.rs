//! 遍历引擎
//!
//! 两种策略（REST 分页、树形分页）实现同一个 `PageSource`，
//! `extract` 把它们包装成惰性、有限、不可重启的记录流。

pub mod api_source;
pub mod row_mapping;
pub mod tree_source;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::models::{Navigation, Record, Session, TargetDescriptor};
use crate::taxonomy::{ClassifiedError, ErrorKind, StageResult};

pub use api_source::ApiSource;
pub use row_mapping::{RawRow, RowMapper};
pub use tree_source::TreeSource;

/// 按页产出记录的来源
#[async_trait]
pub trait PageSource: Send {
    /// 取下一页；调用前应先确认 `has_more()`
    async fn fetch_page(&mut self) -> StageResult<Vec<Record>>;

    fn has_more(&self) -> bool;
}

/// 按目标配置选择策略
pub fn source_for<'a>(
    session: &'a Session<'a>,
    target: &'a TargetDescriptor,
) -> StageResult<Box<dyn PageSource + 'a>> {
    Ok(match &target.navigation {
        Navigation::ApiPaginated(api) => Box::new(ApiSource::new(session, &target.id, api)),
        Navigation::TreePaginated(tree) => Box::new(TreeSource::new(session, &target.id, tree)?),
    })
}

struct Cursor<'a> {
    source: Box<dyn PageSource + 'a>,
    cancel: CancellationToken,
    delay: Duration,
    fetched: u32,
}

/// 惰性记录流
///
/// 每次取页前检查取消，两次取页之间等待 `delay`。
/// `NO_DATA_FOUND` 表示来源已经没有数据，流正常结束。
pub fn extract<'a>(
    session: &'a Session<'a>,
    target: &'a TargetDescriptor,
    cancel: &CancellationToken,
    delay: Duration,
) -> BoxStream<'a, StageResult<Record>> {
    match source_for(session, target) {
        Ok(source) => records(source, cancel.clone(), delay),
        Err(err) => stream::once(async move { Err(err) }).boxed(),
    }
}

/// 把任意 `PageSource` 展开为记录流
pub fn records<'a>(
    source: Box<dyn PageSource + 'a>,
    cancel: CancellationToken,
    delay: Duration,
) -> BoxStream<'a, StageResult<Record>> {
    let cursor = Cursor {
        source,
        cancel,
        delay,
        fetched: 0,
    };

    stream::try_unfold(cursor, |mut cursor| async move {
        if !cursor.source.has_more() {
            return Ok(None);
        }
        if cursor.cancel.is_cancelled() {
            return Err(ClassifiedError::new(ErrorKind::Cancelled, "运行已取消"));
        }
        if cursor.fetched > 0 {
            tokio::time::sleep(cursor.delay).await;
        }

        match cursor.source.fetch_page().await {
            Ok(page) => {
                cursor.fetched += 1;
                debug!("第 {} 次取页: {} 条记录", cursor.fetched, page.len());
                Ok(Some((page, cursor)))
            }
            Err(err) if err.kind() == ErrorKind::NoDataFound => {
                info!("来源没有更多数据: {}", err.message());
                Ok(None)
            }
            Err(err) => Err(err),
        }
    })
    .map_ok(|page| stream::iter(page.into_iter().map(Ok::<Record, ClassifiedError>)))
    .try_flatten()
    .boxed()
}

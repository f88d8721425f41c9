use std::future::Future;

use crate::error::SyncResult;
use crate::model::repo::Connection;

/// Drain a cursor-based connection into one ordered list.
///
/// `fetch_page` receives the cursor for the page to load (`None` for the
/// first). The first failing page ends the drain with its error; callers
/// never see a partial list.
pub async fn fetch_all<T, F, Fut>(mut fetch_page: F) -> SyncResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = SyncResult<Connection<T>>>,
{
    let mut nodes = Vec::new();
    let mut cursor = None;
    loop {
        let page = fetch_page(cursor.take()).await?;
        nodes.extend(page.nodes);
        if !page.page_info.has_next_page {
            break;
        }
        // A "more pages" flag without a cursor would loop on page one forever.
        match page.page_info.end_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(nodes)
}

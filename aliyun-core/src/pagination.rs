//! 三种分页方式：页码（PageNumber/PageSize/TotalCount）、Marker（Marker/IsTruncated）、NextToken
//!
//! 循环在以下任意一个条件满足时结束：已经获取到TotalCount个、某一页为空、下一页的游标为空。

use crate::error::Error;
use crate::json::ValueExt;
use serde_json::Value;
use std::future::Future;

pub const MAX_PAGE_SIZE: u32 = 100;

/// 不在`[1, 100]`范围内的分页大小使用默认值
pub fn clamp_page_size(page_size: u32, default: u32) -> u32 {
    if (1..=MAX_PAGE_SIZE).contains(&page_size) {
        page_size
    } else {
        default
    }
}

/// 响应中的总数，不同产品的字段不一样，比如RDS使用`TotalRecordCount`
pub fn total_count(resp: &Value) -> Option<u64> {
    TOTAL_COUNT_PATHS.iter().find_map(|p| resp.get_u64_path(p))
}

const TOTAL_COUNT_PATHS: [&str; 2] = ["TotalCount", "TotalRecordCount"];

/// 页码分页，`fetch(page_number, page_size)`返回这一页的数据和总数
///
/// 没有总数时，遇到空页或者不满一页就结束
pub async fn paginate_by_number<T, F, Fut>(page_size: u32, mut fetch: F) -> Result<Vec<T>, Error>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<u64>), Error>>,
{
    let page_size = clamp_page_size(page_size, MAX_PAGE_SIZE);
    let mut all = Vec::new();
    let mut page_number = 1;
    loop {
        let (items, total) = fetch(page_number, page_size).await?;
        if items.is_empty() {
            break;
        }
        let short = items.len() < page_size as usize;
        all.extend(items);
        match total {
            Some(total) => {
                if all.len() as u64 >= total {
                    // 不能超过服务端返回的总数
                    all.truncate(total as usize);
                    break;
                }
                // 服务端每页返回的数量比page_size少并且总数一直达不到的时候，防止死循环
                let max_pages = total.div_ceil(page_size as u64) + 1;
                if page_number as u64 >= max_pages {
                    break;
                }
            }
            None if short => break,
            None => {}
        }
        page_number += 1;
    }
    Ok(all)
}

/// Marker分页，`fetch(marker)`返回这一页的数据、下一页的Marker和IsTruncated
pub async fn paginate_by_marker<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, Error>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<String>, bool), Error>>,
{
    let mut all = Vec::new();
    let mut marker = None;
    loop {
        let (items, next_marker, is_truncated) = fetch(marker).await?;
        let empty = items.is_empty();
        all.extend(items);
        match next_marker {
            Some(m) if is_truncated && !m.is_empty() && !empty => marker = Some(m),
            _ => break,
        }
    }
    Ok(all)
}

/// NextToken分页，`fetch(token)`返回这一页的数据和NextToken
pub async fn paginate_by_token<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, Error>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<String>), Error>>,
{
    let mut all = Vec::new();
    let mut token = None;
    loop {
        let (items, next_token) = fetch(token).await?;
        let empty = items.is_empty();
        all.extend(items);
        match next_token {
            Some(t) if !t.is_empty() && !empty => token = Some(t),
            _ => break,
        }
    }
    Ok(all)
}

//! Paging helpers shared by the list, returns and history queries.

/// Offset paging with zero-based `page`. A page past the end is empty.
pub fn page_slice<T: Clone>(items: &[T], page: u32, limit: u32) -> Vec<T> {
    let start = (page as usize).saturating_mul(limit as usize);
    if start >= items.len() {
        return Vec::new();
    }
    let end = start.saturating_add(limit as usize).min(items.len());
    items[start..end].to_vec()
}

/// Keeps only the trailing `n` entries; `n == 0` keeps everything.
pub fn last_n<T>(mut items: Vec<T>, n: u32) -> Vec<T> {
    let n = n as usize;
    if n > 0 && n < items.len() {
        items.drain(..items.len() - n);
    }
    items
}

/// Cursor paging over `items` sorted ascending by `key`. Returns up to
/// `limit` entries whose key is greater than `last_id` (from the start when
/// `last_id == 0`) and the key of the last entry returned, or 0 at the end
/// of the stream.
pub fn scroll<T: Clone>(items: &[T], key: impl Fn(&T) -> u64, last_id: u64, limit: usize) -> (Vec<T>, u64) {
    let start = if last_id == 0 {
        0
    } else {
        items.partition_point(|item| key(item) <= last_id)
    };
    let end = start.saturating_add(limit).min(items.len());
    let page = items[start..end].to_vec();
    let next = page.last().map(&key).unwrap_or(0);
    (page, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_slice_clamps_to_length() {
        let items: Vec<u32> = (1..=5).collect();
        assert_eq!(page_slice(&items, 0, 2), vec![1, 2]);
        assert_eq!(page_slice(&items, 2, 2), vec![5]);
        assert!(page_slice(&items, 3, 2).is_empty());
        assert!(page_slice(&items, 0, 0).is_empty());
    }

    #[test]
    fn last_n_keeps_tail() {
        let items: Vec<u32> = (1..=5).collect();
        assert_eq!(last_n(items.clone(), 2), vec![4, 5]);
        assert_eq!(last_n(items.clone(), 0), items);
        assert_eq!(last_n(items.clone(), 50), items);
    }

    #[test]
    fn scroll_continues_after_cursor() {
        let items: Vec<u64> = vec![2, 4, 6, 8, 10];
        let (first, next) = scroll(&items, |i| *i, 0, 2);
        assert_eq!(first, vec![2, 4]);
        assert_eq!(next, 4);

        let (second, next) = scroll(&items, |i| *i, next, 2);
        assert_eq!(second, vec![6, 8]);

        let (third, next) = scroll(&items, |i| *i, next, 2);
        assert_eq!(third, vec![10]);
        assert_eq!(next, 10);

        let (done, next) = scroll(&items, |i| *i, next, 2);
        assert!(done.is_empty());
        assert_eq!(next, 0);
    }

    #[test]
    fn scroll_with_vanished_cursor_skips_smaller_ids() {
        let items: Vec<u64> = vec![2, 4, 6];
        let (page, _) = scroll(&items, |i| *i, 3, 10);
        assert_eq!(page, vec![4, 6]);
    }
}

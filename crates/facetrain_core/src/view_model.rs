use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct PageViewModel<T> {
    pub rows: Vec<RowView<T>>,
    /// Current page, 1-based, clamped to `total_pages`.
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub matching_items: usize,
    pub selected_count: usize,
    pub loaded: bool,
    pub scope: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowView<T> {
    pub item: T,
    pub selected: bool,
    /// An action on this entry is waiting for the server.
    pub pending: bool,
}

/// Group entries by a derived key, keeping list order within each group.
pub fn group_by<'a, T, F>(
    items: impl IntoIterator<Item = &'a T>,
    key_fn: F,
) -> BTreeMap<String, Vec<&'a T>>
where
    T: 'a,
    F: Fn(&T) -> String,
{
    let mut groups: BTreeMap<String, Vec<&'a T>> = BTreeMap::new();
    for item in items {
        groups.entry(key_fn(item)).or_default().push(item);
    }
    groups
}

pub fn group_counts<'a, T, F>(
    items: impl IntoIterator<Item = &'a T>,
    key_fn: F,
) -> BTreeMap<String, usize>
where
    T: 'a,
    F: Fn(&T) -> String,
{
    group_by(items, key_fn)
        .into_iter()
        .map(|(key, members)| (key, members.len()))
        .collect()
}

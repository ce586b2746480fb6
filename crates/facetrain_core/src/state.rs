use std::collections::{BTreeMap, BTreeSet};

use crate::view_model::{PageViewModel, RowView};

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// A remote list entry that a page can filter, select and act upon.
pub trait ListItem: Clone {
    /// Stable identity of the entry within its list.
    fn key(&self) -> &str;

    /// Text matched against the page filter.
    fn search_text(&self) -> String;

    fn selected_by_default(&self) -> bool {
        false
    }
}

/// When a local change is applied relative to the server's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Apply only once the server confirms.
    AfterConfirm,
    /// Apply immediately; revert if the server rejects the action.
    Immediate,
}

/// Local change to the projection implied by an action.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimisticChange<T> {
    Remove,
    Replace(T),
}

/// How the most recent action ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded { key: String },
    Failed { key: String, message: String },
}

impl ActionOutcome {
    pub fn key(&self) -> &str {
        match self {
            ActionOutcome::Succeeded { key } | ActionOutcome::Failed { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction<T, A> {
    pub action: A,
    pub change: OptimisticChange<T>,
    pub mode: UpdateMode,
    /// Position and value of the entry before an immediate change.
    pub(crate) previous: Option<(usize, T)>,
}

/// Local state of a list page: the projection of the last server list plus
/// client-only filter, paging, selection and in-flight actions.
#[derive(Debug, Clone, PartialEq)]
pub struct PageState<T, A> {
    items: Vec<T>,
    loaded: bool,
    filter: String,
    page: usize,
    page_size: usize,
    scope: Option<String>,
    selected: BTreeSet<String>,
    pending: BTreeMap<String, PendingAction<T, A>>,
    last_action: Option<ActionOutcome>,
    error: Option<String>,
    dirty: bool,
}

impl<T: ListItem, A: Clone> Default for PageState<T, A> {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl<T: ListItem, A: Clone> PageState<T, A> {
    pub fn new(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            loaded: false,
            filter: String::new(),
            page: 1,
            page_size: page_size.max(1),
            scope: None,
            selected: BTreeSet::new(),
            pending: BTreeMap::new(),
            last_action: None,
            error: None,
            dirty: false,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn item(&self, key: &str) -> Option<&T> {
        self.items.iter().find(|item| item.key() == key)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.selected.contains(key)
    }

    /// Selected entries in list order.
    pub fn selected_items(&self) -> Vec<&T> {
        self.items
            .iter()
            .filter(|item| self.selected.contains(item.key()))
            .collect()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending(&self, key: &str) -> Option<&PendingAction<T, A>> {
        self.pending.get(key)
    }

    /// Outcome of the last action the server answered. Unaffected by list
    /// fetches, so a failed refetch after a confirmed action leaves it
    /// `Succeeded`.
    pub fn last_action(&self) -> Option<&ActionOutcome> {
        self.last_action.as_ref()
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Entries matching the filter, in list order.
    pub fn matching(&self) -> Vec<&T> {
        let needle = self.filter.trim().to_lowercase();
        self.items
            .iter()
            .filter(|item| {
                needle.is_empty() || item.search_text().to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.matching().len(), self.page_size)
    }

    pub fn view(&self) -> PageViewModel<T> {
        let matching = self.matching();
        let total_pages = total_pages(matching.len(), self.page_size);
        let page = self.page.min(total_pages);
        let rows = matching
            .iter()
            .skip((page - 1) * self.page_size)
            .take(self.page_size)
            .map(|item| RowView {
                item: (*item).clone(),
                selected: self.selected.contains(item.key()),
                pending: self.pending.contains_key(item.key()),
            })
            .collect();

        PageViewModel {
            rows,
            page,
            total_pages,
            total_items: self.items.len(),
            matching_items: matching.len(),
            selected_count: self.selected_items().len(),
            loaded: self.loaded,
            scope: self.scope.clone(),
            error: self.error.clone(),
        }
    }

    pub(crate) fn replace_items(&mut self, items: Vec<T>) {
        self.selected = items
            .iter()
            .filter(|item| item.selected_by_default())
            .map(|item| item.key().to_string())
            .collect();
        self.items = items;
        self.loaded = true;
        self.error = None;
        self.page = self.page.min(self.total_pages());
        self.dirty = true;
    }

    pub(crate) fn record_outcome(&mut self, outcome: ActionOutcome) {
        self.last_action = Some(outcome);
        self.dirty = true;
    }

    pub(crate) fn set_error(&mut self, message: String) {
        self.error = Some(message);
        self.dirty = true;
    }

    pub(crate) fn clear_error(&mut self) {
        if self.error.take().is_some() {
            self.dirty = true;
        }
    }

    pub(crate) fn set_filter(&mut self, filter: String) {
        if self.filter != filter {
            self.filter = filter;
            self.page = 1;
            self.dirty = true;
        }
    }

    pub(crate) fn set_page(&mut self, page: usize) {
        let page = page.clamp(1, self.total_pages());
        if self.page != page {
            self.page = page;
            self.dirty = true;
        }
    }

    pub(crate) fn set_page_size(&mut self, page_size: usize) {
        let page_size = page_size.max(1);
        if self.page_size != page_size {
            self.page_size = page_size;
            self.page = 1;
            self.dirty = true;
        }
    }

    /// Returns true when the scope actually changed.
    pub(crate) fn set_scope(&mut self, scope: String) -> bool {
        if self.scope.as_deref() == Some(scope.as_str()) {
            return false;
        }
        self.scope = Some(scope);
        self.selected.clear();
        self.page = 1;
        self.dirty = true;
        true
    }

    pub(crate) fn toggle_selected(&mut self, key: &str) {
        if !self.items.iter().any(|item| item.key() == key) {
            return;
        }
        if !self.selected.remove(key) {
            self.selected.insert(key.to_string());
        }
        self.dirty = true;
    }

    pub(crate) fn select_where(&mut self, predicate: impl Fn(&T) -> bool) {
        self.selected = self
            .items
            .iter()
            .filter(|item| predicate(item))
            .map(|item| item.key().to_string())
            .collect();
        self.dirty = true;
    }

    pub(crate) fn insert_pending(&mut self, key: String, pending: PendingAction<T, A>) {
        self.pending.insert(key, pending);
        self.dirty = true;
    }

    pub(crate) fn take_pending(&mut self, key: &str) -> Option<PendingAction<T, A>> {
        let pending = self.pending.remove(key);
        if pending.is_some() {
            self.dirty = true;
        }
        pending
    }

    /// Apply a change to the entry with `key`, returning what it replaced.
    pub(crate) fn apply_change(
        &mut self,
        key: &str,
        change: &OptimisticChange<T>,
    ) -> Option<(usize, T)> {
        let index = self.position(key)?;
        let previous = match change {
            OptimisticChange::Remove => {
                self.selected.remove(key);
                self.items.remove(index)
            }
            OptimisticChange::Replace(next) => {
                std::mem::replace(&mut self.items[index], next.clone())
            }
        };
        self.dirty = true;
        Some((index, previous))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.items.iter().position(|item| item.key() == key)
    }

    /// Undo an immediate change recorded by [`Self::apply_change`].
    pub(crate) fn revert_change(&mut self, key: &str, previous: (usize, T)) {
        let (index, item) = previous;
        match self.position(key) {
            Some(current) => self.items[current] = item,
            None => {
                let index = index.min(self.items.len());
                self.items.insert(index, item);
            }
        }
        self.dirty = true;
    }
}

fn total_pages(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size.max(1)).max(1)
}

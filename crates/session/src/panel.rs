use shared::domain::{ClosePageMode, PathId};

/// Ordered list of pages displayed inside a document. Index 0 is the home page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPanel {
    tabbed: bool,
    pages: Vec<PathId>,
    current: usize,
}

impl ContentPanel {
    pub fn new(tabbed: bool) -> Self {
        Self {
            tabbed,
            pages: Vec::new(),
            current: 0,
        }
    }

    pub fn is_tabbed(&self) -> bool {
        self.tabbed
    }

    pub fn pages(&self) -> &[PathId] {
        &self.pages
    }

    pub fn contains(&self, path_id: &PathId) -> bool {
        self.pages.contains(path_id)
    }

    pub fn current_page(&self) -> Option<&PathId> {
        self.pages.get(self.current)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Shows `path_id`, appending it when new. Returns the pages an untabbed
    /// panel discarded to make room.
    pub fn add_content(&mut self, path_id: PathId) -> Vec<PathId> {
        if let Some(position) = self.position(&path_id) {
            self.current = position;
            return Vec::new();
        }

        let discarded = self.untabbed_clear();
        self.current = self.pages.len();
        self.pages.push(path_id);
        discarded
    }

    /// Puts `path_id` at the current position. Returns the page that occupied the
    /// insertion point, if any, plus the pages an untabbed panel discarded.
    pub fn insert_content(&mut self, path_id: PathId) -> (Option<PathId>, Vec<PathId>) {
        if let Some(position) = self.position(&path_id) {
            self.current = position;
            return (None, Vec::new());
        }

        let discarded = self.untabbed_clear();
        if self.pages.len() <= 1 {
            self.current = self.pages.len();
            self.pages.push(path_id);
            return (None, discarded);
        }

        let replaced = self.pages[self.current].clone();
        self.pages.insert(self.current, path_id);
        (Some(replaced), discarded)
    }

    /// Pages that go away when `path_id` closes under `mode`. Index 0 is never
    /// part of a close-others sweep.
    pub fn evaluate_remove_content(&self, path_id: &PathId, mode: ClosePageMode) -> Vec<PathId> {
        let mut to_remove = Vec::new();
        if matches!(mode, ClosePageMode::CloseAll | ClosePageMode::CloseOthers) {
            to_remove.extend(
                self.pages
                    .iter()
                    .skip(1)
                    .filter(|page| *page != path_id)
                    .cloned(),
            );
        }
        if matches!(mode, ClosePageMode::Close | ClosePageMode::CloseAll) && self.contains(path_id)
        {
            to_remove.push(path_id.clone());
        }
        to_remove
    }

    pub fn remove_content(&mut self, to_remove: &[PathId]) {
        for path_id in to_remove {
            let Some(position) = self.position(path_id) else {
                continue;
            };
            self.pages.remove(position);
            if position <= self.current {
                self.current = self.current.saturating_sub(1);
            }
        }
        if self.current >= self.pages.len() {
            self.current = self.pages.len().saturating_sub(1);
        }
    }

    pub fn clear(&mut self) -> Vec<PathId> {
        self.current = 0;
        std::mem::take(&mut self.pages)
    }

    fn position(&self, path_id: &PathId) -> Option<usize> {
        self.pages.iter().position(|page| page == path_id)
    }

    fn untabbed_clear(&mut self) -> Vec<PathId> {
        if self.tabbed {
            return Vec::new();
        }
        self.clear()
    }
}

#[cfg(test)]
#[path = "tests/panel_tests.rs"]
mod tests;

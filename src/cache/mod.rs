//! Request-scoped record of the entities a request touched, so the cache
//! layer in front of the API can invalidate exactly those tags.

use serde::Serialize;
use std::fmt;

use crate::types::RecordId;

/// An invalidation unit: a whole table, or one row of it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheTag {
    pub table: String,
    pub id: Option<RecordId>,
}

impl CacheTag {
    pub fn table(table: impl Into<String>) -> Self {
        Self { table: table.into(), id: None }
    }

    pub fn row(table: impl Into<String>, id: RecordId) -> Self {
        Self { table: table.into(), id: Some(id) }
    }

    pub fn is_row(&self) -> bool {
        self.id.is_some()
    }

    /// A row tag also dirties its table
    pub fn table_tag(&self) -> CacheTag {
        CacheTag::table(self.table.clone())
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "entity_{}_{}", self.table, id),
            None => write!(f, "table_{}", self.table),
        }
    }
}

/// Ordered, de-duplicated collection of tags for one request.
/// Never shared between requests; drained once when the response is emitted.
#[derive(Debug, Default)]
pub struct CacheTagRecorder {
    tags: Vec<CacheTag>,
}

impl CacheTagRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tag. Row tags pull their table tag in behind them.
    pub fn record(&mut self, tag: CacheTag) {
        let implied = tag.is_row().then(|| tag.table_tag());
        self.push_unique(tag);
        if let Some(table_tag) = implied {
            self.push_unique(table_tag);
        }
    }

    pub fn record_table(&mut self, table: &str) {
        self.record(CacheTag::table(table));
    }

    pub fn record_row(&mut self, table: &str, id: RecordId) {
        self.record(CacheTag::row(table, id));
    }

    pub fn tags(&self) -> &[CacheTag] {
        &self.tags
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Hand the collected tags to the caller and reset
    pub fn drain(&mut self) -> Vec<CacheTag> {
        std::mem::take(&mut self.tags)
    }

    fn push_unique(&mut self, tag: CacheTag) {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }
}

/// Comma-separated header value, in recording order
pub fn header_value(tags: &[CacheTag]) -> String {
    tags.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_tags_imply_table_tags() {
        let mut recorder = CacheTagRecorder::new();
        recorder.record_row("directus_bookmarks", 7);
        assert_eq!(
            recorder.tags(),
            &[
                CacheTag::row("directus_bookmarks", 7),
                CacheTag::table("directus_bookmarks"),
            ]
        );
    }

    #[test]
    fn duplicates_are_collapsed_in_first_seen_order() {
        let mut recorder = CacheTagRecorder::new();
        recorder.record_table("a");
        recorder.record_row("b", 1);
        recorder.record_row("a", 2);
        recorder.record_row("b", 1);
        recorder.record_table("b");

        let rendered: Vec<String> = recorder.tags().iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["table_a", "entity_b_1", "table_b", "entity_a_2"]);
    }

    #[test]
    fn drain_empties_the_recorder() {
        let mut recorder = CacheTagRecorder::new();
        recorder.record_row("t", 3);
        let drained = recorder.drain();
        assert_eq!(header_value(&drained), "entity_t_3,table_t");
        assert!(recorder.is_empty());
        assert!(recorder.drain().is_empty());
    }
}

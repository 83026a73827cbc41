/// Per-client query settings.
///
/// Built by value, one setter per knob:
///
/// ```
/// let options = stratus::QueryOptions::default()
///     .use_tags(false)
///     .page_size(100);
/// assert!(!options.tags_enabled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub(crate) use_tags: bool,
    pub(crate) page_size: Option<usize>,
    pub(crate) verify_tag_matches: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            use_tags: true,
            page_size: None,
            verify_tag_matches: false,
        }
    }
}

impl QueryOptions {
    /// Enables the blob tag index. When off, tag-dependent operations fail
    /// with [`QueryError::TagsDisabled`](crate::QueryError::TagsDisabled) and
    /// queries scan with client-side filtering.
    pub fn use_tags(self, use_tags: bool) -> Self {
        QueryOptions { use_tags, ..self }
    }

    /// Requests pages of at most `page_size` items; the backend default applies otherwise.
    pub fn page_size(self, page_size: usize) -> Self {
        QueryOptions {
            page_size: Some(page_size),
            ..self
        }
    }

    /// Re-checks tag-level matches against the full predicate even when the
    /// tag rewrite was exact.
    pub fn verify_tag_matches(self, verify_tag_matches: bool) -> Self {
        QueryOptions {
            verify_tag_matches,
            ..self
        }
    }
}

impl QueryOptions {
    /// Whether the tag index may be used.
    pub fn tags_enabled(&self) -> bool {
        self.use_tags
    }

    /// Requested page size.
    pub fn requested_page_size(&self) -> Option<usize> {
        self.page_size
    }

    /// Whether exact tag matches are re-checked.
    pub fn verifies_tag_matches(&self) -> bool {
        self.verify_tag_matches
    }
}

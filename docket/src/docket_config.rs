use std::sync::Arc;

const DEFAULT_PAGE_SIZE: usize = 100;

/// Immutable runtime configuration, shared by every store a [crate::docket::Docket]
/// hands out.
#[derive(Clone)]
pub struct DocketConfig {
    inner: Arc<DocketConfigInner>,
}

struct DocketConfigInner {
    page_size: usize,
}

impl Default for DocketConfig {
    fn default() -> Self {
        DocketConfig::new()
    }
}

impl DocketConfig {
    pub fn new() -> Self {
        DocketConfig {
            inner: Arc::new(DocketConfigInner {
                page_size: DEFAULT_PAGE_SIZE,
            }),
        }
    }

    pub(crate) fn with_page_size(page_size: usize) -> Self {
        DocketConfig {
            inner: Arc::new(DocketConfigInner {
                page_size: page_size.max(1),
            }),
        }
    }

    /// How many candidate records a backend returns per continuation page.
    pub fn page_size(&self) -> usize {
        self.inner.page_size
    }
}

impl std::fmt::Debug for DocketConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocketConfig")
            .field("page_size", &self.inner.page_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_page_size() {
        assert_eq!(DocketConfig::new().page_size(), 100);
    }

    #[test]
    fn test_page_size_floor() {
        assert_eq!(DocketConfig::with_page_size(0).page_size(), 1);
        assert_eq!(DocketConfig::with_page_size(25).page_size(), 25);
    }
}

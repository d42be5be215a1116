//! Purpose: Immutable paging configuration validated at construction.
//! Exports: `PagingConfig`, `DEFAULT_PAGE_SIZE`.
//! Role: Shared by the pager (page math) and the CLI (flags and config files).
//! Invariants: `page_size > 0`; `prefetch_distance >= 0`; an invalid config is never built.
//! Invariants: Omitted prefetch distance is derived as `page_size / 2`.

use crate::core::error::{Error, ErrorKind};
use serde::Deserialize;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(try_from = "RawPagingConfig")]
pub struct PagingConfig {
    page_size: usize,
    prefetch_distance: usize,
}

impl PagingConfig {
    pub fn new(page_size: usize, prefetch_distance: usize) -> Result<Self, Error> {
        if page_size == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("page size must be strictly positive")
                .with_hint("Use a page size of at least 1."));
        }
        Ok(Self {
            page_size,
            prefetch_distance,
        })
    }

    /// Builds a config with the prefetch distance derived from the page size.
    pub fn with_page_size(page_size: usize) -> Result<Self, Error> {
        Self::new(page_size, page_size / 2)
    }

    /// Number of items requested from the source per fetch.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of items beyond an observed index that should already be loaded.
    pub fn prefetch_distance(&self) -> usize {
        self.prefetch_distance
    }

    /// Index of the page that must be loaded for `index` to be observed comfortably.
    pub fn target_page(&self, index: usize) -> usize {
        index.saturating_add(self.prefetch_distance) / self.page_size
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            prefetch_distance: DEFAULT_PAGE_SIZE / 2,
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPagingConfig {
    #[serde(default)]
    page_size: Option<i64>,
    #[serde(default)]
    prefetch_distance: Option<i64>,
}

impl TryFrom<RawPagingConfig> for PagingConfig {
    type Error = Error;

    fn try_from(raw: RawPagingConfig) -> Result<Self, Self::Error> {
        let page_size = raw.page_size.unwrap_or(DEFAULT_PAGE_SIZE as i64);
        if page_size <= 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("page size must be strictly positive, got {page_size}")));
        }
        let page_size = usize::try_from(page_size)
            .map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message("page size is too large")
                    .with_source(err)
            })?;

        let Some(prefetch_distance) = raw.prefetch_distance else {
            return Self::with_page_size(page_size);
        };
        if prefetch_distance < 0 {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "prefetch distance must not be negative, got {prefetch_distance}"
            )));
        }
        let prefetch_distance = usize::try_from(prefetch_distance).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("prefetch distance is too large")
                .with_source(err)
        })?;
        Self::new(page_size, prefetch_distance)
    }
}

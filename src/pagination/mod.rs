//! Pagination module
//!
//! Supports: Next Link, Offset, None
//!
//! # Overview
//!
//! The pagination module provides the page cursor ([`PageReference`]), the
//! run-scoped [`PaginationPolicy`] and a unified [`Paginator`] interface for
//! the ways an HTML listing exposes its next page.

mod strategies;
mod types;

pub(crate) use strategies::parse_selector;
pub use strategies::{NextLinkPaginator, NoPaginator, OffsetPaginator};
pub use types::{
    PageReference, PaginationPolicy, Paginator, Seed, DEFAULT_INTER_PAGE_DELAY, DEFAULT_MAX_PAGES,
};

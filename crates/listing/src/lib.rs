//! List filtering and pagination shared by every back-office list view.
//!
//! A [`ListQuery`] is parsed from loose request parameters, turned into a
//! [`Predicate`] for a record type's [`FilterSchema`], and the same predicate
//! drives both the total count and the page of results.

pub mod page;
pub mod predicate;
pub mod query;

pub use page::{ALLOWED_PAGE_SIZES, DEFAULT_PAGE_SIZE, Page, PageRequest};
pub use predicate::{Condition, EnumColumn, FilterSchema, Listable, Predicate, like_pattern, paginate, select};
pub use query::{ListQuery, RawListParams};

//! Saved selections ("подборки"): the filter and sort pairs users save to their profile, and the
//! logic deciding whether the view they're looking at is already saved.
pub mod equivalence;
pub mod favorites;
pub mod filters;
pub mod normalize;

pub use equivalence::{find_saved_selection, is_equivalent_selection};
pub use favorites::Favorites;
pub use filters::{Filters, Pagination, Sort};
pub use normalize::normalize_filters;

pub mod eventfilters;
pub mod facets;
#[cfg(test)]
pub mod mock;
pub mod postgres;
pub mod structs;
pub mod tables;

use crate::selection::{Favorites, Pagination, Sort};
use crate::twoface::{Cause, ExternalError, Fallible};
use async_trait::async_trait;
use eventfilters::EventFilters;
use structs::{Event, Locations, NewEvent, NewSelection, NewUser, Selection, User};
use uuid::Uuid;

/// Returned when creating a user whose login is taken.
pub const LOGIN_TAKEN: ExternalError = ExternalError {
    cause: Cause::UserConflict,
    text: "a user with this login already exists",
};

#[async_trait]
/// The interface for storing events, saved selections and users.
pub trait Client: Clone + Send + Sync {
    async fn new_events(&self, new_events: Vec<NewEvent>) -> Fallible<Vec<Event>>;
    async fn find_event(&self, id: Uuid) -> Fallible<Option<Event>>;
    async fn search_events(
        &self,
        filters: EventFilters,
        sort: Sort,
        pagination: Pagination,
    ) -> Fallible<Vec<Event>>;
    async fn count_events(&self, filters: EventFilters) -> Fallible<usize>;
    /// The `location` column of every event.
    async fn event_locations(&self) -> Fallible<Vec<Locations>>;
    /// Sport and disciplines of every event.
    async fn event_disciplines(&self) -> Fallible<Vec<(String, Vec<String>)>>;

    async fn new_selection(&self, new_selection: NewSelection) -> Fallible<Selection>;
    async fn find_selection(&self, id: Uuid) -> Fallible<Option<Selection>>;
    /// Selections in the order of `ids`. Ids with no selection are skipped.
    async fn find_selections(&self, ids: Vec<Uuid>) -> Fallible<Vec<Selection>>;

    async fn new_user(&self, new_user: NewUser) -> Fallible<User>;
    async fn get_user(&self, user_id: Uuid) -> Fallible<Option<User>>;
    async fn list_users(&self) -> Fallible<Vec<User>>;
    async fn set_favorites(&self, user_id: Uuid, favorites: Favorites) -> Fallible<Option<User>>;
    /// Atomically append one selection to the user's favorites. `None` if the user is missing.
    async fn add_favorite(&self, user_id: Uuid, selection_id: Uuid) -> Fallible<Option<User>>;
    /// Atomically drop one selection from the user's favorites. `None` if the user is missing.
    async fn remove_favorite(&self, user_id: Uuid, selection_id: Uuid)
        -> Fallible<Option<User>>;
}

/// Reorder `found` to follow `ids`, dropping ids that weren't found.
pub(crate) fn in_id_order(ids: &[Uuid], found: Vec<Selection>) -> Vec<Selection> {
    ids.iter()
        .filter_map(|id| found.iter().find(|s| s.id == *id).cloned())
        .collect()
}

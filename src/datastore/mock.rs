use crate::datastore::{
    eventfilters::{self, EventFilters},
    in_id_order,
    structs::{Event, Locations, NewEvent, NewSelection, NewUser, Selection, User},
    LOGIN_TAKEN,
};
use crate::selection::{Favorites, Pagination, Sort};
use crate::twoface::{DescribeErr, Fallible};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::offset::Utc;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

type Store<T> = Arc<Mutex<Vec<T>>>;

/// A mock implementation of datastore::Client
#[derive(Clone, Default, Debug)]
pub struct Client {
    events: Store<Event>,
    selections: Store<Selection>,
    users: Store<User>,
}

impl Client {
    pub fn set_events(&mut self, events: Vec<Event>) {
        self.events = Arc::new(Mutex::new(events));
    }

    pub fn selection_count(&self) -> usize {
        self.selections.lock().unwrap().len()
    }

    /// Read, edit and write back one user's favorites under the lock.
    fn edit_favorites(&self, user_id: Uuid, edit: impl FnOnce(&mut Favorites)) -> Option<User> {
        let mut users = self.users.lock().unwrap();
        let user = users.iter_mut().find(|u| u.id == user_id)?;
        let mut favorites = Favorites::from(std::mem::take(&mut user.favorites));
        edit(&mut favorites);
        user.favorites = favorites.into_inner();
        Some(user.clone())
    }
}

#[async_trait]
impl super::Client for Client {
    async fn new_events(&self, new_events: Vec<NewEvent>) -> Fallible<Vec<Event>> {
        let created: Vec<Event> = new_events
            .into_iter()
            .map(|new| Event {
                id: Uuid::new_v4(),
                created_at: Utc::now(),
                ekp_id: new.ekp_id,
                title: new.title,
                description: new.description,
                gender: new.gender,
                age_min: new.age_min,
                age_max: new.age_max,
                sport: new.sport,
                discipline: new.discipline,
                start_date: new.start_date,
                end_date: new.end_date,
                location: new.location,
                participant_count: new.participant_count,
            })
            .collect();
        self.events.lock().unwrap().extend(created.iter().cloned());
        Ok(created)
    }

    async fn find_event(&self, id: Uuid) -> Fallible<Option<Event>> {
        let events = self.events.lock().unwrap();
        Ok(events.iter().find(|e| e.id == id).cloned())
    }

    async fn search_events(
        &self,
        filters: EventFilters,
        sort: Sort,
        pagination: Pagination,
    ) -> Fallible<Vec<Event>> {
        let events = self.events.lock().unwrap().clone();
        Ok(eventfilters::search(events, &filters, sort, pagination))
    }

    async fn count_events(&self, filters: EventFilters) -> Fallible<usize> {
        let events = self.events.lock().unwrap();
        Ok(events.iter().filter(|e| e.matches(&filters)).count())
    }

    async fn event_locations(&self) -> Fallible<Vec<Locations>> {
        let events = self.events.lock().unwrap();
        Ok(events.iter().map(|e| e.location.clone()).collect())
    }

    async fn event_disciplines(&self) -> Fallible<Vec<(String, Vec<String>)>> {
        let events = self.events.lock().unwrap();
        Ok(events
            .iter()
            .map(|e| (e.sport.clone(), e.discipline.clone()))
            .collect())
    }

    async fn new_selection(&self, new_selection: NewSelection) -> Fallible<Selection> {
        let selection = Selection {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            filters: new_selection.filters,
            sort: new_selection.sort,
        };
        self.selections.lock().unwrap().push(selection.clone());
        Ok(selection)
    }

    async fn find_selection(&self, id: Uuid) -> Fallible<Option<Selection>> {
        let selections = self.selections.lock().unwrap();
        Ok(selections.iter().find(|s| s.id == id).cloned())
    }

    async fn find_selections(&self, ids: Vec<Uuid>) -> Fallible<Vec<Selection>> {
        let selections = self.selections.lock().unwrap().clone();
        Ok(in_id_order(&ids, selections))
    }

    async fn new_user(&self, new_user: NewUser) -> Fallible<User> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.login == new_user.login) {
            return Err(anyhow!("login {} taken", new_user.login)).describe_err(LOGIN_TAKEN);
        }
        let user = User {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            login: new_user.login,
            favorites: Vec::new(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> Fallible<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn list_users(&self) -> Fallible<Vec<User>> {
        Ok(self.users.lock().unwrap().clone())
    }

    async fn set_favorites(&self, user_id: Uuid, favorites: Favorites) -> Fallible<Option<User>> {
        let mut users = self.users.lock().unwrap();
        let user = users.iter_mut().find(|u| u.id == user_id).map(|user| {
            user.favorites = favorites.into_inner();
            user.clone()
        });
        Ok(user)
    }

    async fn add_favorite(&self, user_id: Uuid, selection_id: Uuid) -> Fallible<Option<User>> {
        Ok(self.edit_favorites(user_id, |favorites| {
            favorites.add(selection_id);
        }))
    }

    async fn remove_favorite(
        &self,
        user_id: Uuid,
        selection_id: Uuid,
    ) -> Fallible<Option<User>> {
        Ok(self.edit_favorites(user_id, |favorites| {
            favorites.remove(selection_id);
        }))
    }
}

use crate::datastore::{
    eventfilters::{self, EventFilters},
    in_id_order,
    postgres::{
        errors::{BlockingResp, DbPoolResult},
        PostgresStore,
    },
    structs::{Event, Locations, NewEvent, NewSelection, NewUser, Selection, User},
    tables::{events, selections, users},
    Client, LOGIN_TAKEN,
};
use crate::selection::{Favorites, Pagination, Sort};
use crate::twoface::{Describe, Fallible, TfError};
use actix_web::web::block;
use async_trait::async_trait;
use diesel::{
    expression::BoxableExpression,
    expression_methods::BoolExpressionMethods,
    pg::Pg,
    query_dsl::{QueryDsl, RunQueryDsl},
    result::{DatabaseErrorKind, Error as DieselError},
    sql_types::Bool,
    Connection, ExpressionMethods, OptionalExtension, PgConnection,
};
use uuid::Uuid;

impl PostgresStore {
    /// Events passing every filter Postgres can evaluate, in insertion order. Callers still run
    /// `Event::matches` on the rows for the filters that can't be expressed in SQL.
    fn candidate_events(conn: &PgConnection, filters: &EventFilters) -> Result<Vec<Event>, DieselError> {
        let mut query = events::table.into_boxed();
        for filter in filters.as_sql_where() {
            query = query.filter(filter);
        }
        query
            .order_by((events::created_at, events::id))
            .get_results(conn)
    }

    /// Lock the user's row, edit their favorites and write them back, all in one transaction,
    /// so concurrent edits for the same user queue up instead of overwriting each other.
    fn edit_favorites(
        conn: &PgConnection,
        user_id: Uuid,
        edit: impl FnOnce(&mut Favorites),
    ) -> Result<Option<User>, DieselError> {
        conn.transaction(|| {
            let user: Option<User> = users::table
                .find(user_id)
                .for_update()
                .first(conn)
                .optional()?;
            guard!(let Some(user) = user else { return Ok(None) });
            let mut favorites = Favorites::from(user.favorites);
            edit(&mut favorites);
            let updated: User = diesel::update(users::table.find(user_id))
                .set(users::favorites.eq(favorites.into_inner()))
                .get_result(conn)?;
            Ok(Some(updated))
        })
    }
}

#[async_trait]
impl Client for PostgresStore {
    async fn new_events(&self, new_events: Vec<NewEvent>) -> Fallible<Vec<Event>> {
        let conn = self.conn()?;
        let created = block(move || {
            conn.transaction::<_, TfError, _>(|| {
                let created: Vec<Event> = diesel::insert_into(events::table)
                    .values(&new_events)
                    .get_results(&conn)?;
                Ok(created)
            })
        })
        .await
        .to_resp()?;
        Ok(created)
    }

    async fn find_event(&self, id: Uuid) -> Fallible<Option<Event>> {
        let conn = self.conn()?;
        let query_result: DbPoolResult<_> = block(move || {
            let event: Option<Event> = events::table.find(id).first(&conn).optional()?;
            Ok(event)
        })
        .await;
        Ok(query_result.to_resp()?)
    }

    async fn search_events(
        &self,
        filters: EventFilters,
        sort: Sort,
        pagination: Pagination,
    ) -> Fallible<Vec<Event>> {
        let conn = self.conn()?;
        let query_result: DbPoolResult<_> = block(move || {
            let candidates = Self::candidate_events(&conn, &filters)?;
            Ok(eventfilters::search(candidates, &filters, sort, pagination))
        })
        .await;
        Ok(query_result.to_resp()?)
    }

    async fn count_events(&self, filters: EventFilters) -> Fallible<usize> {
        let conn = self.conn()?;
        let query_result: DbPoolResult<_> = block(move || {
            let candidates = Self::candidate_events(&conn, &filters)?;
            Ok(candidates.iter().filter(|e| e.matches(&filters)).count())
        })
        .await;
        Ok(query_result.to_resp()?)
    }

    async fn event_locations(&self) -> Fallible<Vec<Locations>> {
        let conn = self.conn()?;
        let query_result: DbPoolResult<_> = block(move || {
            let locations: Vec<Locations> = events::table.select(events::location).load(&conn)?;
            Ok(locations)
        })
        .await;
        Ok(query_result.to_resp()?)
    }

    async fn event_disciplines(&self) -> Fallible<Vec<(String, Vec<String>)>> {
        let conn = self.conn()?;
        let query_result: DbPoolResult<_> = block(move || {
            let rows: Vec<(String, Vec<String>)> = events::table
                .select((events::sport, events::discipline))
                .load(&conn)?;
            Ok(rows)
        })
        .await;
        Ok(query_result.to_resp()?)
    }

    async fn new_selection(&self, new_selection: NewSelection) -> Fallible<Selection> {
        let conn = self.conn()?;
        let query_result: DbPoolResult<_> = block(move || {
            let selection: Selection = diesel::insert_into(selections::table)
                .values(&new_selection)
                .get_result(&conn)?;
            Ok(selection)
        })
        .await;
        Ok(query_result.to_resp()?)
    }

    async fn find_selection(&self, id: Uuid) -> Fallible<Option<Selection>> {
        let conn = self.conn()?;
        let query_result: DbPoolResult<_> = block(move || {
            let selection: Option<Selection> =
                selections::table.find(id).first(&conn).optional()?;
            Ok(selection)
        })
        .await;
        Ok(query_result.to_resp()?)
    }

    async fn find_selections(&self, ids: Vec<Uuid>) -> Fallible<Vec<Selection>> {
        let conn = self.conn()?;
        let query_result: DbPoolResult<_> = block(move || {
            let found: Vec<Selection> = selections::table
                .filter(selections::id.eq_any(&ids))
                .get_results(&conn)?;
            Ok(in_id_order(&ids, found))
        })
        .await;
        Ok(query_result.to_resp()?)
    }

    async fn new_user(&self, new_user: NewUser) -> Fallible<User> {
        let conn = self.conn()?;
        let user = block(move || {
            let inserted: Result<User, DieselError> = diesel::insert_into(users::table)
                .values(&new_user)
                .get_result(&conn);
            match inserted {
                Err(e @ DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    Err(e.describe(LOGIN_TAKEN))
                }
                other => Ok(other?),
            }
        })
        .await
        .to_resp()?;
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> Fallible<Option<User>> {
        let conn = self.conn()?;
        let query_result: DbPoolResult<_> = block(move || {
            let user: Option<User> = users::table.find(user_id).first(&conn).optional()?;
            Ok(user)
        })
        .await;
        Ok(query_result.to_resp()?)
    }

    async fn list_users(&self) -> Fallible<Vec<User>> {
        let conn = self.conn()?;
        let query_result: DbPoolResult<_> = block(move || {
            let users: Vec<User> = users::table.order_by(users::created_at).get_results(&conn)?;
            Ok(users)
        })
        .await;
        Ok(query_result.to_resp()?)
    }

    async fn set_favorites(&self, user_id: Uuid, favorites: Favorites) -> Fallible<Option<User>> {
        let conn = self.conn()?;
        let query_result: DbPoolResult<_> = block(move || {
            let user: Option<User> = diesel::update(users::table.find(user_id))
                .set(users::favorites.eq(favorites.into_inner()))
                .get_result(&conn)
                .optional()?;
            Ok(user)
        })
        .await;
        Ok(query_result.to_resp()?)
    }

    async fn add_favorite(&self, user_id: Uuid, selection_id: Uuid) -> Fallible<Option<User>> {
        let conn = self.conn()?;
        let query_result: DbPoolResult<_> = block(move || {
            Self::edit_favorites(&conn, user_id, |favorites| {
                favorites.add(selection_id);
            })
        })
        .await;
        Ok(query_result.to_resp()?)
    }

    async fn remove_favorite(
        &self,
        user_id: Uuid,
        selection_id: Uuid,
    ) -> Fallible<Option<User>> {
        let conn = self.conn()?;
        let query_result: DbPoolResult<_> = block(move || {
            Self::edit_favorites(&conn, user_id, |favorites| {
                favorites.remove(selection_id);
            })
        })
        .await;
        Ok(query_result.to_resp()?)
    }
}

impl EventFilters {
    /// The subset of these filters that Postgres can evaluate directly.
    pub fn as_sql_where(
        &self,
    ) -> Vec<Box<dyn BoxableExpression<events::table, Pg, SqlType = Bool>>> {
        let mut wheres: Vec<Box<dyn BoxableExpression<events::table, Pg, SqlType = Bool>>> =
            Vec::new();
        if let Some(ids) = &self.by_ids {
            wheres.push(Box::new(events::id.eq_any(ids.clone())));
            // Nothing else applies when ids are given.
            return wheres;
        }
        if let Some(starts_after) = self.starts_after {
            wheres.push(Box::new(events::start_date.ge(starts_after)))
        }
        if let Some(ends_before) = self.ends_before {
            wheres.push(Box::new(events::end_date.le(ends_before)))
        }
        if let Some(gender) = self.gender {
            wheres.push(Box::new(
                events::gender.eq(gender).or(events::gender.is_null()),
            ))
        }
        if let Some(age) = self.age {
            wheres.push(Box::new(
                events::age_min.le(age.max).or(events::age_min.is_null()),
            ));
            wheres.push(Box::new(
                events::age_max.ge(age.min).or(events::age_max.is_null()),
            ));
        }
        if let Some(min) = self.participant_count_min {
            wheres.push(Box::new(events::participant_count.ge(min)))
        }
        if let Some(max) = self.participant_count_max {
            wheres.push(Box::new(events::participant_count.le(max)))
        }
        if let Some(disciplines) = &self.disciplines {
            let sports: Vec<String> = disciplines.iter().map(|d| d.sport.clone()).collect();
            wheres.push(Box::new(events::sport.eq_any(sports)))
        }
        wheres
    }
}

//! A user's profile and saved selections ("favorites"). Users are addressed by id; the portal
//! gets the id from the Telegram web app it runs in.
use crate::api::userfacing::SelectionBody;
use crate::api::{observe, State};
use crate::datastore::structs::{Selection, User};
use crate::datastore::Client;
use crate::metrics;
use crate::selection::{find_saved_selection, Favorites};
use crate::twoface::{ExternalError, Fallible, OrNotFound};
use actix_web::web;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

pub const USER_NOT_FOUND: ExternalError = ExternalError::not_found("User not found");

pub fn configure<DS: Client + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users/{user_id}")
            .route("", web::get().to(get_user::<DS>))
            .route("/favorites", web::get().to(list_favorites::<DS>))
            .route("/favorites", web::put().to(set_favorites::<DS>))
            .route("/favorites/toggle", web::post().to(toggle_saved::<DS>))
            .route("/favorites/lookup", web::post().to(lookup_saved::<DS>)),
    );
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct UserPath {
    pub user_id: Uuid,
}

/// What users see of themselves.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ViewUser {
    pub id: Uuid,
    pub login: String,
    pub favorites: Vec<Uuid>,
}

impl From<User> for ViewUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            login: u.login,
            favorites: u.favorites,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct FavoritesBody {
    pub favorite_ids: Vec<Uuid>,
}

/// Whether a filter+sort pair is among the user's favorites, and under which selection.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SavedStatus {
    pub saved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_id: Option<Uuid>,
}

async fn get_user<DS: Client>(
    state: web::Data<State<DS>>,
    path: web::Path<UserPath>,
) -> Fallible<web::Json<ViewUser>> {
    observe("get_user", move || async move {
        let user = state
            .ds
            .get_user(path.user_id)
            .await?
            .or_not_found(USER_NOT_FOUND)?;
        Ok(web::Json(user.into()))
    })
    .await
}

async fn list_favorites<DS: Client>(
    state: web::Data<State<DS>>,
    path: web::Path<UserPath>,
) -> Fallible<web::Json<Vec<Selection>>> {
    observe("list_favorites", move || async move {
        let (_, saved) = saved_selections(state.ds.as_ref(), path.user_id).await?;
        Ok(web::Json(saved))
    })
    .await
}

async fn set_favorites<DS: Client>(
    state: web::Data<State<DS>>,
    path: web::Path<UserPath>,
    body: web::Json<FavoritesBody>,
) -> Fallible<web::Json<ViewUser>> {
    observe("set_favorites", move || async move {
        let favorites = Favorites::from(body.into_inner().favorite_ids);
        let user = state
            .ds
            .set_favorites(path.user_id, favorites)
            .await?
            .or_not_found(USER_NOT_FOUND)?;
        Ok(web::Json(user.into()))
    })
    .await
}

/// Save the pair as a new favorite, or unsave the favorite it's equivalent to. Unsaving leaves
/// the selection itself in place, since it may have been shared.
async fn toggle_saved<DS: Client>(
    state: web::Data<State<DS>>,
    path: web::Path<UserPath>,
    body: web::Json<SelectionBody>,
) -> Fallible<web::Json<SavedStatus>> {
    observe("toggle_saved", move || async move {
        let (user, saved) = saved_selections(state.ds.as_ref(), path.user_id).await?;
        let live = body.into_inner().into_new_selection()?;
        let existing = find_saved_selection(&saved, &live.filters, &live.sort).map(|s| s.id);

        let status = match existing {
            Some(selection_id) => {
                state
                    .ds
                    .remove_favorite(user.id, selection_id)
                    .await?
                    .or_not_found(USER_NOT_FOUND)?;
                SavedStatus {
                    saved: false,
                    selection_id: Some(selection_id),
                }
            }
            None => {
                let created = state.ds.new_selection(live).await?;
                state
                    .ds
                    .add_favorite(user.id, created.id)
                    .await?
                    .or_not_found(USER_NOT_FOUND)?;
                SavedStatus {
                    saved: true,
                    selection_id: Some(created.id),
                }
            }
        };

        let action = if status.saved { "save" } else { "unsave" };
        metrics::SELECTION_TOGGLES.with_label_values(&[action]).inc();
        debug!(user_id = %user.id, action, "toggled saved selection");
        Ok(web::Json(status))
    })
    .await
}

async fn lookup_saved<DS: Client>(
    state: web::Data<State<DS>>,
    path: web::Path<UserPath>,
    body: web::Json<SelectionBody>,
) -> Fallible<web::Json<SavedStatus>> {
    observe("lookup_saved", move || async move {
        let (_, saved) = saved_selections(state.ds.as_ref(), path.user_id).await?;
        let live = body.into_inner().into_new_selection()?;
        let selection_id = find_saved_selection(&saved, &live.filters, &live.sort).map(|s| s.id);
        Ok(web::Json(SavedStatus {
            saved: selection_id.is_some(),
            selection_id,
        }))
    })
    .await
}

/// The user and the selections their favorites still point to.
async fn saved_selections<DS: Client>(
    ds: &DS,
    user_id: Uuid,
) -> Fallible<(User, Vec<Selection>)> {
    let user = ds.get_user(user_id).await?.or_not_found(USER_NOT_FOUND)?;
    let saved = ds.find_selections(user.favorites.clone()).await?;
    Ok((user, saved))
}

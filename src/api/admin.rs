//! Endpoints for whoever loads events from the calendar and provisions users. Everything under
//! `/admin` needs `Authorization: Bearer <token>`, where the token's SHA-256 matches the config.
use crate::api::{observe, State};
use crate::datastore::structs::{Event, NewEvent, NewUser, User};
use crate::datastore::Client;
use crate::twoface::{Cause, Describe, ExternalError, Fallible};
use actix_web::{dev::ServiceRequest, middleware::Condition, web};
use actix_web_httpauth::{extractors::bearer::BearerAuth, middleware::HttpAuthentication};
use anyhow::anyhow;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

const BAD_TOKEN: ExternalError = ExternalError {
    cause: Cause::UserBadAuth,
    text: "invalid admin token",
};
const EMPTY_LOGIN: ExternalError = ExternalError {
    cause: Cause::UserInvalidField,
    text: "login must not be empty",
};
const BACKWARDS_DATES: ExternalError = ExternalError {
    cause: Cause::UserInvalidField,
    text: "event ends before it starts",
};

/// How admin requests are authenticated.
#[derive(Clone, Debug, Default)]
pub struct AdminAuth {
    /// Hex SHA-256 of the admin token. With no hash configured, every token is rejected.
    pub token_sha256: Option<String>,
    pub disabled: bool,
}

pub fn configure<DS: Client + 'static>(auth: AdminAuth) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let enabled = !auth.disabled;
        let expected = Arc::new(auth.token_sha256);
        let validator = move |req: ServiceRequest, creds: BearerAuth| {
            let expected = Arc::clone(&expected);
            async move { check_admin_token(req, &creds, expected.as_deref()) }
        };
        cfg.service(
            web::scope("/admin")
                .wrap(Condition::new(enabled, HttpAuthentication::bearer(validator)))
                .route("/users", web::get().to(list_users::<DS>))
                .route("/users", web::post().to(create_user::<DS>))
                .route("/events", web::post().to(create_events::<DS>)),
        );
    }
}

fn check_admin_token(
    req: ServiceRequest,
    creds: &BearerAuth,
    expected_sha256: Option<&str>,
) -> Result<ServiceRequest, actix_web::Error> {
    guard!(let Some(expected) = expected_sha256 else {
        warn!(path = req.path(), "admin request rejected, no admin token configured");
        return Err(anyhow!("no admin token configured").describe(BAD_TOKEN).into())
    });
    if token_matches(creds.token(), expected) {
        Ok(req)
    } else {
        warn!(path = req.path(), "admin request rejected, wrong token");
        Err(anyhow!("admin token hash mismatch").describe(BAD_TOKEN).into())
    }
}

/// Does the token hash to `expected_sha256` (hex, any case)? The digests are compared in
/// constant time.
pub fn token_matches(token: &str, expected_sha256: &str) -> bool {
    guard!(let Ok(expected) = hex::decode(expected_sha256.trim()) else {
        return false
    });
    Sha256::digest(token.as_bytes())
        .as_slice()
        .ct_eq(&expected)
        .into()
}

async fn list_users<DS: Client>(state: web::Data<State<DS>>) -> Fallible<web::Json<Vec<User>>> {
    observe("list_users", move || async move {
        Ok(web::Json(state.ds.list_users().await?))
    })
    .await
}

async fn create_user<DS: Client>(
    state: web::Data<State<DS>>,
    body: web::Json<NewUser>,
) -> Fallible<web::Json<User>> {
    observe("create_user", move || async move {
        let login = body.into_inner().login.trim().to_owned();
        if login.is_empty() {
            return Err(anyhow!("blank login").describe(EMPTY_LOGIN));
        }
        let user = state.ds.new_user(NewUser { login }).await?;
        info!(user_id = %user.id, login = user.login.as_str(), "created user");
        Ok(web::Json(user))
    })
    .await
}

async fn create_events<DS: Client>(
    state: web::Data<State<DS>>,
    body: web::Json<Vec<NewEvent>>,
) -> Fallible<web::Json<Vec<Event>>> {
    observe("create_events", move || async move {
        let new_events = body.into_inner();
        if let Some(bad) = new_events.iter().find(|e| e.end_date < e.start_date) {
            let err = anyhow!("event {} ends before it starts", bad.ekp_id);
            return Err(err.describe(BACKWARDS_DATES));
        }
        let events = state.ds.new_events(new_events).await?;
        info!(count = events.len(), "inserted events");
        Ok(web::Json(events))
    })
    .await
}

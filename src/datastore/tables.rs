#[allow(unused_imports)]
use diesel::sql_types::*;

table! {
    use crate::datastore::structs::GenderMapping;
    #[allow(unused_imports)]
    use diesel::sql_types::*;
    events (id) {
        id -> Uuid,
        created_at -> Timestamptz,
        ekp_id -> Int8,
        title -> Text,
        description -> Nullable<Text>,
        gender -> Nullable<GenderMapping>,
        age_min -> Nullable<Int4>,
        age_max -> Nullable<Int4>,
        sport -> Text,
        discipline -> Array<Text>,
        start_date -> Timestamp,
        end_date -> Timestamp,
        location -> Jsonb,
        participant_count -> Nullable<Int4>,
    }
}

table! {
    selections (id) {
        id -> Uuid,
        created_at -> Timestamptz,
        filters -> Jsonb,
        sort -> Jsonb,
    }
}

table! {
    users (id) {
        id -> Uuid,
        created_at -> Timestamptz,
        login -> Text,
        favorites -> Array<Uuid>,
    }
}

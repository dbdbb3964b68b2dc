diesel::table! {
    comments (id) {
        id -> Int4,
        post_id -> Int4,
        author_id -> Int4,
        text -> Text,
        created -> Timestamptz,
    }
}

diesel::table! {
    follows (id) {
        id -> Int4,
        user_id -> Int4,
        author_id -> Int4,
    }
}

diesel::table! {
    groups (id) {
        id -> Int4,
        title -> Varchar,
        slug -> Varchar,
        description -> Text,
    }
}

diesel::table! {
    posts (id) {
        id -> Int4,
        text -> Text,
        author_id -> Int4,
        group_id -> Nullable<Int4>,
        image -> Nullable<Text>,
        created -> Timestamptz,
    }
}

diesel::table! {
    users (id) {
        id -> Int4,
        username -> Varchar,
        password -> Text,
        email -> Text,
        first_name -> Text,
        last_name -> Text,
    }
}

diesel::joinable!(comments -> posts (post_id));
diesel::joinable!(comments -> users (author_id));
diesel::joinable!(posts -> groups (group_id));
diesel::joinable!(posts -> users (author_id));

diesel::allow_tables_to_appear_in_same_query!(comments, follows, groups, posts, users,);

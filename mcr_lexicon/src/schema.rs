// @generated manually, matches migrations/2024-01-01-000000_create_morpheus.

diesel::table! {
    morpheus (id) {
        id -> Integer,
        wordform -> Text,
        morphtag -> Nullable<Text>,
        lemma -> Nullable<Text>,
        accented -> Nullable<Text>,
    }
}

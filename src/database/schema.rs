// Copyright 2023 Remi Bernotavicius

diesel::table! {
    category (category_id) {
        category_id -> Integer,
        category_name -> Text,
    }
}

diesel::table! {
    ingredient (ingredient_id) {
        ingredient_id -> Integer,
        recipe_id -> Integer,
        unit_id -> Nullable<Integer>,
        ingredient_name -> Text,
        instruction -> Nullable<Text>,
        ingredient_order -> Integer,
        amount -> Nullable<Double>,
    }
}

diesel::table! {
    recipe (recipe_id) {
        recipe_id -> Integer,
        recipe_name -> Text,
        notes -> Nullable<Text>,
        num_servings -> Nullable<Integer>,
        prep_time -> Nullable<Time>,
        cook_time -> Nullable<Time>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    recipe_category (recipe_id, category_id) {
        recipe_id -> Integer,
        category_id -> Integer,
    }
}

diesel::table! {
    step (step_id) {
        step_id -> Integer,
        recipe_id -> Integer,
        step_order -> Integer,
        step_text -> Text,
    }
}

diesel::table! {
    unit (unit_id) {
        unit_id -> Integer,
        unit_name_singular -> Text,
        unit_name_plural -> Text,
    }
}

diesel::joinable!(ingredient -> recipe (recipe_id));
diesel::joinable!(ingredient -> unit (unit_id));
diesel::joinable!(recipe_category -> category (category_id));
diesel::joinable!(recipe_category -> recipe (recipe_id));
diesel::joinable!(step -> recipe (recipe_id));

diesel::allow_tables_to_appear_in_same_query!(
    category,
    ingredient,
    recipe,
    recipe_category,
    step,
    unit,
);

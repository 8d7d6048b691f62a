// Copyright 2023 Remi Bernotavicius

use crate::database::models::{
    Category, Ingredient, IngredientId, NewIngredient, NewRecipe, NewStep, Recipe,
    RecipeAggregate, RecipeId, RecipeIngredient, Step, StepId, Unit,
};
use crate::database::{self, schema, ConnectionProvider};
use crate::Result;
use diesel::connection::SimpleConnection as _;
use diesel::expression::functions::define_sql_function;
use diesel::prelude::OptionalExtension as _;
use diesel::sql_types::{Integer, Text};
use diesel::ExpressionMethods as _;
use diesel::NullableExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::QueryResult;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;

define_sql_function!(fn last_insert_rowid() -> Integer);

/// The tables whose rows carry a per-recipe, 1-based position.
#[derive(Debug, Copy, Clone)]
enum OrderedChild {
    Ingredient,
    Step,
}

impl OrderedChild {
    fn table(&self) -> &'static str {
        match self {
            Self::Ingredient => "ingredient",
            Self::Step => "step",
        }
    }

    fn order_column(&self) -> &'static str {
        match self {
            Self::Ingredient => "ingredient_order",
            Self::Step => "step_order",
        }
    }
}

#[derive(diesel::QueryableByName)]
struct NextOrder {
    #[diesel(sql_type = Integer)]
    next_order: i32,
}

// Read-then-insert; only safe because there is a single writer.
fn next_sequence_number(
    conn: &mut database::Connection,
    child: OrderedChild,
    recipe_id: RecipeId,
) -> QueryResult<i32> {
    let sql = format!(
        "SELECT COALESCE(MAX({}), 0) + 1 AS next_order FROM {} WHERE recipe_id = ?",
        child.order_column(),
        child.table()
    );
    let row: NextOrder = diesel::sql_query(sql)
        .bind::<Integer, _>(recipe_id)
        .get_result(conn)?;
    Ok(row.next_order)
}

fn last_insert_id(conn: &mut database::Connection) -> QueryResult<i32> {
    diesel::select(last_insert_rowid()).get_result(conn)
}

fn fetch_recipe_ingredients(
    conn: &mut database::Connection,
    id: RecipeId,
) -> QueryResult<Vec<RecipeIngredient>> {
    use schema::{ingredient, unit};

    let rows: Vec<(Ingredient, Option<Unit>)> = ingredient::table
        .left_join(unit::table)
        .filter(ingredient::recipe_id.eq(id))
        .order(ingredient::ingredient_order.asc())
        .select((ingredient::all_columns, unit::all_columns.nullable()))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(ingredient, unit)| RecipeIngredient { ingredient, unit })
        .collect())
}

fn fetch_recipe_steps(conn: &mut database::Connection, id: RecipeId) -> QueryResult<Vec<Step>> {
    use schema::step::dsl::*;

    step.select(Step::as_select())
        .filter(recipe_id.eq(id))
        .order(step_order.asc())
        .load(conn)
}

fn fetch_recipe_categories(
    conn: &mut database::Connection,
    id: RecipeId,
) -> QueryResult<Vec<Category>> {
    use schema::{category, recipe_category};

    recipe_category::table
        .inner_join(category::table)
        .filter(recipe_category::recipe_id.eq(id))
        .order(category::category_name.asc())
        .select(Category::as_select())
        .load(conn)
}

/// Every public operation opens its own session and runs as exactly one transaction.
#[derive(Debug, Clone)]
pub struct RecipeDao {
    provider: ConnectionProvider,
}

impl RecipeDao {
    pub fn new(provider: ConnectionProvider) -> Self {
        Self { provider }
    }

    pub fn insert_recipe(&self, new_recipe: &NewRecipe) -> Result<Recipe> {
        log::debug!("inserting recipe {:?}", new_recipe.recipe_name);
        self.provider
            .session()?
            .transaction("insert recipe", |conn| {
                use schema::recipe::dsl::*;

                diesel::insert_into(recipe).values(new_recipe).execute(conn)?;
                let new_id = RecipeId::from(last_insert_id(conn)?);
                Ok(recipe
                    .find(new_id)
                    .select(Recipe::as_select())
                    .first(conn)?)
            })
    }

    pub fn fetch_all_recipes(&self) -> Result<Vec<Recipe>> {
        log::debug!("fetching all recipes");
        self.provider
            .session()?
            .transaction("fetch all recipes", |conn| {
                use schema::recipe::dsl::*;

                Ok(recipe
                    .select(Recipe::as_select())
                    .order(recipe_name.asc())
                    .load(conn)?)
            })
    }

    pub fn fetch_recipe_by_id(&self, id: RecipeId) -> Result<Option<RecipeAggregate>> {
        log::debug!("fetching recipe {id}");
        self.provider
            .session()?
            .transaction("fetch recipe", |conn| {
                let recipe = schema::recipe::table
                    .find(id)
                    .select(Recipe::as_select())
                    .first(conn)
                    .optional()?;
                let Some(recipe) = recipe else {
                    return Ok(None);
                };

                Ok(Some(RecipeAggregate {
                    recipe,
                    ingredients: fetch_recipe_ingredients(conn, id)?,
                    steps: fetch_recipe_steps(conn, id)?,
                    categories: fetch_recipe_categories(conn, id)?,
                }))
            })
    }

    pub fn add_ingredient_to_recipe(&self, new_ingredient: &NewIngredient) -> Result<Ingredient> {
        log::debug!(
            "adding ingredient {:?} to recipe {}",
            new_ingredient.ingredient_name,
            new_ingredient.recipe_id
        );
        self.provider
            .session()?
            .transaction("add ingredient", |conn| {
                use schema::ingredient::dsl::*;

                let order =
                    next_sequence_number(conn, OrderedChild::Ingredient, new_ingredient.recipe_id)?;
                diesel::insert_into(ingredient)
                    .values((
                        recipe_id.eq(new_ingredient.recipe_id),
                        unit_id.eq(new_ingredient.unit_id),
                        ingredient_name.eq(&new_ingredient.ingredient_name),
                        instruction.eq(new_ingredient.instruction.as_deref()),
                        ingredient_order.eq(order),
                        amount.eq(new_ingredient.amount),
                    ))
                    .execute(conn)?;

                let new_id = IngredientId::from(last_insert_id(conn)?);
                Ok(ingredient
                    .find(new_id)
                    .select(Ingredient::as_select())
                    .first(conn)?)
            })
    }

    pub fn add_step_to_recipe(&self, new_step: &NewStep) -> Result<Step> {
        log::debug!("adding step to recipe {}", new_step.recipe_id);
        self.provider
            .session()?
            .transaction("add step", |conn| {
                use schema::step::dsl::*;

                let order = next_sequence_number(conn, OrderedChild::Step, new_step.recipe_id)?;
                diesel::insert_into(step)
                    .values((
                        recipe_id.eq(new_step.recipe_id),
                        step_order.eq(order),
                        step_text.eq(&new_step.step_text),
                    ))
                    .execute(conn)?;

                let new_id = StepId::from(last_insert_id(conn)?);
                Ok(step.find(new_id).select(Step::as_select()).first(conn)?)
            })
    }

    /// Fails, leaving the recipe untouched, when no category has exactly this name.
    pub fn add_category_to_recipe(&self, id: RecipeId, category_name: &str) -> Result<()> {
        log::debug!("adding category {category_name:?} to recipe {id}");
        self.provider
            .session()?
            .transaction("add category", |conn| {
                diesel::sql_query(
                    "INSERT INTO recipe_category (recipe_id, category_id) \
                     VALUES (?, (SELECT category_id FROM category WHERE category_name = ?))",
                )
                .bind::<Integer, _>(id)
                .bind::<Text, _>(category_name)
                .execute(conn)?;
                Ok(())
            })
    }

    pub fn fetch_all_units(&self) -> Result<Vec<Unit>> {
        log::debug!("fetching all units");
        self.provider
            .session()?
            .transaction("fetch all units", |conn| {
                use schema::unit::dsl::*;

                Ok(unit
                    .select(Unit::as_select())
                    .order(unit_name_singular.asc())
                    .load(conn)?)
            })
    }

    pub fn fetch_all_categories(&self) -> Result<Vec<Category>> {
        log::debug!("fetching all categories");
        self.provider
            .session()?
            .transaction("fetch all categories", |conn| {
                use schema::category::dsl::*;

                Ok(category
                    .select(Category::as_select())
                    .order(category_name.asc())
                    .load(conn)?)
            })
    }

    /// Runs the statements in order; if any of them fails none of them take effect.
    pub fn execute_batch(&self, statements: &[String]) -> Result<()> {
        log::debug!("executing a batch of {} statements", statements.len());
        self.provider
            .session()?
            .transaction("execute batch", |conn| {
                for statement in statements {
                    conn.batch_execute(statement)?;
                }
                Ok(())
            })
    }
}

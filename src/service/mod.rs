// Copyright 2023 Remi Bernotavicius

use crate::database::models::{
    Category, Ingredient, NewIngredient, NewRecipe, NewStep, Recipe, RecipeAggregate, RecipeId,
    Step, Unit,
};
use crate::database::query::RecipeDao;
use crate::database::ConnectionProvider;
use crate::{Error, Result};
use std::path::PathBuf;

pub mod script;

pub const SCHEMA_FILE: &str = "recipe_schema.sql";
pub const DATA_FILE: &str = "recipe_data.sql";

/// Where `recipe_schema.sql` and `recipe_data.sql` live in the source tree.
pub const DEFAULT_RESOURCE_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/resources");

/// The one thing the menu talks to.
pub struct RecipeService {
    dao: RecipeDao,
    resource_dir: PathBuf,
}

impl RecipeService {
    pub fn new(provider: ConnectionProvider, resource_dir: impl Into<PathBuf>) -> Self {
        Self {
            dao: RecipeDao::new(provider),
            resource_dir: resource_dir.into(),
        }
    }

    /// Drops and recreates every table, then loads the seed units and categories.
    pub fn create_and_populate_tables(&self) -> Result<()> {
        self.load_from_file(SCHEMA_FILE)?;
        self.load_from_file(DATA_FILE)
    }

    fn load_from_file(&self, file_name: &str) -> Result<()> {
        let statements = script::load_script(self.resource_dir.join(file_name))?;
        self.dao.execute_batch(&statements)
    }

    pub fn add_recipe(&self, recipe: &NewRecipe) -> Result<Recipe> {
        self.dao.insert_recipe(recipe)
    }

    pub fn fetch_recipes(&self) -> Result<Vec<Recipe>> {
        self.dao.fetch_all_recipes()
    }

    pub fn fetch_recipe_by_id(&self, id: RecipeId) -> Result<RecipeAggregate> {
        self.dao.fetch_recipe_by_id(id)?.ok_or(Error::NotFound(id))
    }

    pub fn fetch_units(&self) -> Result<Vec<Unit>> {
        self.dao.fetch_all_units()
    }

    pub fn add_ingredient(&self, ingredient: &NewIngredient) -> Result<Ingredient> {
        self.dao.add_ingredient_to_recipe(ingredient)
    }

    pub fn add_step(&self, step: &NewStep) -> Result<Step> {
        self.dao.add_step_to_recipe(step)
    }

    pub fn fetch_categories(&self) -> Result<Vec<Category>> {
        self.dao.fetch_all_categories()
    }

    pub fn add_category_to_recipe(&self, id: RecipeId, category_name: &str) -> Result<()> {
        self.dao.add_category_to_recipe(id, category_name)
    }
}

#[cfg(test)]
mod tests {
    use super::RecipeService;
    use crate::database::models::{NewRecipe, RecipeId};
    use crate::database::testing::{empty_database, resource_dir};

    fn pancakes() -> NewRecipe {
        NewRecipe {
            recipe_name: "Pancakes".into(),
            notes: Some("fluffy".into()),
            num_servings: Some(4),
            prep_time: None,
            cook_time: None,
        }
    }

    #[test]
    fn bootstrap_is_repeatable() {
        let (_dir, provider) = empty_database();
        let service = RecipeService::new(provider, resource_dir());

        service.create_and_populate_tables().unwrap();
        let units = service.fetch_units().unwrap();
        let categories = service.fetch_categories().unwrap();
        service.add_recipe(&pancakes()).unwrap();

        service.create_and_populate_tables().unwrap();
        assert_eq!(service.fetch_units().unwrap(), units);
        assert_eq!(service.fetch_categories().unwrap(), categories);
        assert!(service.fetch_recipes().unwrap().is_empty());

        let again = service.add_recipe(&pancakes()).unwrap();
        assert_eq!(again.recipe_id, RecipeId::from(1));
    }

    #[test]
    fn missing_recipe_is_not_found() {
        let (_dir, provider) = empty_database();
        let service = RecipeService::new(provider, resource_dir());
        service.create_and_populate_tables().unwrap();

        let e = service.fetch_recipe_by_id(RecipeId::from(5)).unwrap_err();
        assert!(e.is_not_found(), "{e}");
    }

    #[test]
    fn queries_before_bootstrap_are_persistence_errors() {
        let (_dir, provider) = empty_database();
        let service = RecipeService::new(provider, resource_dir());

        let e = service.fetch_recipes().unwrap_err();
        assert!(!e.is_not_found());
        let e = service.fetch_recipe_by_id(RecipeId::from(1)).unwrap_err();
        assert!(!e.is_not_found());
    }

    #[test]
    fn missing_resources_leave_the_database_alone() {
        let (_dir, provider) = empty_database();
        let service = RecipeService::new(provider.clone(), resource_dir());
        service.create_and_populate_tables().unwrap();
        service.add_recipe(&pancakes()).unwrap();

        let empty = tempfile::tempdir().unwrap();
        let broken = RecipeService::new(provider, empty.path());
        assert!(broken.create_and_populate_tables().is_err());

        assert_eq!(service.fetch_recipes().unwrap().len(), 1);
    }
}

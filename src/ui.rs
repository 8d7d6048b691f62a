// Copyright 2023 Remi Bernotavicius

use crate::database::models::{
    minutes_to_time, Amount, NewIngredient, NewRecipe, NewStep, RecipeAggregate, RecipeId, UnitId,
};
use crate::service::RecipeService;
use crate::{Error, Result};
use std::io::{self, BufRead, Write};

const OPERATIONS: [&str; 7] = [
    "1) Create and populate all tables",
    "2) Add a recipe",
    "3) List recipes",
    "4) Select working recipe",
    "5) Add ingredient to current recipe",
    "6) Add step to current recipe",
    "7) Add category to current recipe",
];

/// The numbered-menu loop. Generic over its streams so a whole session can be scripted.
pub struct RecipeMenu<R, W> {
    service: RecipeService,
    input: R,
    output: W,
    current: Option<RecipeAggregate>,
}

impl<R: BufRead, W: Write> RecipeMenu<R, W> {
    pub fn new(service: RecipeService, input: R, output: W) -> Self {
        Self {
            service,
            input,
            output,
            current: None,
        }
    }

    /// Loops until an empty line (or end of input). Errors from an operation are printed and the
    /// menu is shown again. A terminal that can't be read from or written to ends the loop; a line
    /// that isn't valid UTF-8 is just reported.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            match self.next_operation() {
                Ok(None) => {
                    writeln!(self.output, "\nExiting the menu")?;
                    return Ok(());
                }
                Ok(Some(operation)) => {
                    if let Err(e) = self.dispatch(operation) {
                        log::debug!("operation {operation} failed: {e:?}");
                        self.report(e)?;
                    }
                }
                Err(e) => self.report(e)?,
            }
        }
    }

    fn report(&mut self, e: Error) -> io::Result<()> {
        let e = match e.into_io_error() {
            Ok(e) if e.kind() != io::ErrorKind::InvalidData => return Err(e),
            Ok(e) => Error::from(e),
            Err(e) => e,
        };
        writeln!(self.output, "\nError: {e} Try again!")
    }

    fn dispatch(&mut self, operation: i32) -> Result<()> {
        match operation {
            1 => self.create_tables(),
            2 => self.add_recipe(),
            3 => self.list_recipes().map(|_| ()),
            4 => self.set_current_recipe(),
            5 => self.add_ingredient_to_current_recipe(),
            6 => self.add_step_to_current_recipe(),
            7 => self.add_category_to_current_recipe(),
            _ => {
                writeln!(self.output, "\n{operation} is not valid. Try again!")?;
                Ok(())
            }
        }
    }

    fn next_operation(&mut self) -> Result<Option<i32>> {
        self.print_operations()?;
        self.get_int_input("\nEnter an operation number (press Enter to quit)")
    }

    fn print_operations(&mut self) -> Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "Here's what you can do:")?;
        for op in OPERATIONS {
            writeln!(self.output, "   {op}")?;
        }
        match &self.current {
            None => writeln!(self.output, "\n**You are not working with a recipe**")?,
            Some(r) => writeln!(
                self.output,
                "\n**You are working with recipe {}**",
                r.recipe
            )?,
        }
        Ok(())
    }

    fn create_tables(&mut self) -> Result<()> {
        self.service.create_and_populate_tables()?;
        self.current = None;
        writeln!(self.output, "\nTables created and populated")?;
        Ok(())
    }

    fn add_recipe(&mut self) -> Result<()> {
        let name = self.get_string_input("Enter the recipe name")?;
        let notes = self.get_string_input("Enter the recipe notes")?;
        let num_servings = self.get_int_input("Enter the number of servings")?;
        let prep_minutes = self.get_int_input("Enter prep time in minutes")?;
        let cook_minutes = self.get_int_input("Enter cook time in minutes")?;

        let new_recipe = NewRecipe {
            recipe_name: name.unwrap_or_default(),
            notes,
            num_servings,
            prep_time: Some(minutes_to_time(prep_minutes.unwrap_or(0))?),
            cook_time: Some(minutes_to_time(cook_minutes.unwrap_or(0))?),
        };

        let recipe = self.service.add_recipe(&new_recipe)?;
        let aggregate = self.service.fetch_recipe_by_id(recipe.recipe_id)?;
        writeln!(self.output, "\nYou added this recipe:\n{aggregate}")?;
        self.current = Some(aggregate);
        Ok(())
    }

    fn list_recipes(&mut self) -> Result<Vec<RecipeId>> {
        let recipes = self.service.fetch_recipes()?;
        writeln!(self.output, "\nRecipes:")?;
        for recipe in &recipes {
            writeln!(self.output, "   {recipe}")?;
        }
        Ok(recipes.into_iter().map(|r| r.recipe_id).collect())
    }

    fn set_current_recipe(&mut self) -> Result<()> {
        let ids = self.list_recipes()?;
        let selected = self.get_int_input("Select a recipe ID")?.map(RecipeId::from);

        self.current = None;
        if let Some(id) = selected.filter(|id| ids.contains(id)) {
            self.current = Some(self.service.fetch_recipe_by_id(id)?);
        }

        match &self.current {
            Some(recipe) => writeln!(self.output, "\n{recipe}")?,
            None => writeln!(self.output, "\nInvalid recipe selected")?,
        }
        Ok(())
    }

    fn current_recipe_id(&mut self) -> Result<Option<RecipeId>> {
        let id = self.current.as_ref().map(|r| r.recipe.recipe_id);
        if id.is_none() {
            writeln!(self.output, "\nPlease select a recipe first")?;
        }
        Ok(id)
    }

    fn refresh_current_recipe(&mut self, id: RecipeId) -> Result<()> {
        let recipe = self.service.fetch_recipe_by_id(id)?;
        writeln!(self.output, "\n{recipe}")?;
        self.current = Some(recipe);
        Ok(())
    }

    fn add_ingredient_to_current_recipe(&mut self) -> Result<()> {
        let Some(recipe_id) = self.current_recipe_id()? else {
            return Ok(());
        };

        let name = self.get_string_input("Enter the ingredient name")?;
        let instruction =
            self.get_string_input("Enter an instruction, if any (finely chopped, etc.)")?;
        let amount = self
            .get_string_input("Enter the ingredient amount (numbers only)")?
            .map(|a| a.parse::<Amount>())
            .transpose()?;

        writeln!(self.output, "Units:")?;
        for unit in self.service.fetch_units()? {
            writeln!(self.output, "    {unit}")?;
        }
        let unit_id = self
            .get_int_input("Enter a unit ID (press Enter for none)")?
            .map(UnitId::from);

        let ingredient = NewIngredient {
            recipe_id,
            unit_id,
            ingredient_name: name.unwrap_or_default(),
            instruction,
            amount,
        };
        self.service.add_ingredient(&ingredient)?;
        self.refresh_current_recipe(recipe_id)
    }

    fn add_step_to_current_recipe(&mut self) -> Result<()> {
        let Some(recipe_id) = self.current_recipe_id()? else {
            return Ok(());
        };

        if let Some(step_text) = self.get_string_input("Enter the step text")? {
            self.service.add_step(&NewStep {
                recipe_id,
                step_text,
            })?;
            self.refresh_current_recipe(recipe_id)?;
        }
        Ok(())
    }

    fn add_category_to_current_recipe(&mut self) -> Result<()> {
        let Some(recipe_id) = self.current_recipe_id()? else {
            return Ok(());
        };

        for category in self.service.fetch_categories()? {
            writeln!(self.output, "   {category}")?;
        }

        if let Some(category) = self.get_string_input("Enter the category to add")? {
            self.service.add_category_to_recipe(recipe_id, &category)?;
            self.refresh_current_recipe(recipe_id)?;
        }
        Ok(())
    }

    fn get_int_input(&mut self, prompt: &str) -> Result<Option<i32>> {
        let Some(input) = self.get_string_input(prompt)? else {
            return Ok(None);
        };
        input
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid(format!("{input} is not a valid number.")))
    }

    /// A blank line, or end of input, reads as `None`.
    fn get_string_input(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt}: ")?;
        self.output.flush()?;

        let mut line = String::new();
        self.input.read_line(&mut line)?;
        let line = line.trim();
        Ok((!line.is_empty()).then(|| line.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::RecipeMenu;
    use crate::database::models::RecipeId;
    use crate::database::testing::{empty_database, resource_dir};
    use crate::service::RecipeService;
    use std::io::{self, Cursor};

    fn run_session(service: RecipeService, lines: &[&str]) -> String {
        let input = Cursor::new(lines.join("\n") + "\n");
        let mut output = vec![];
        RecipeMenu::new(service, input, &mut output).run().unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn create_add_and_list() {
        let (_dir, provider) = empty_database();
        let output = run_session(
            RecipeService::new(provider, resource_dir()),
            &[
                "1", "3", //
                "2", "Pancakes", "fluffy", "4", "10", "15", //
                "3", "",
            ],
        );

        assert!(output.contains("Tables created and populated"), "{output}");
        assert!(output.contains("You added this recipe:\nRecipe 1: Pancakes"));
        assert!(output.contains("  Prep time: 00:10\n  Cook time: 00:15"));
        assert!(output.contains("**You are working with recipe 1: Pancakes**"));
        assert!(output.contains("Recipes:\n   1: Pancakes\n"));
        assert!(output.ends_with("Exiting the menu\n"));
    }

    #[test]
    fn decorate_the_current_recipe() {
        let (_dir, provider) = empty_database();
        let service = RecipeService::new(provider.clone(), resource_dir());
        service.create_and_populate_tables().unwrap();
        let cup = service
            .fetch_units()
            .unwrap()
            .into_iter()
            .find(|u| u.unit_name_singular == "cup")
            .unwrap();

        let cup_id = cup.unit_id.to_string();
        let output = run_session(
            service,
            &[
                "5", // nothing selected yet
                "2", "Pancakes", "", "", "", "", //
                "4", "1", //
                "5", "flour", "sifted", "1.5", &cup_id, //
                "5", "salt", "", "", "", //
                "6", "mix", //
                "6", "bake", //
                "7", "Breakfast", //
                "7", "Nonexistent", //
                "",
            ],
        );
        assert!(output.contains("Please select a recipe first"), "{output}");
        assert!(output.contains("    1: 1.50 cups flour, sifted\n    2: salt\n"));
        assert!(output.contains("  Steps:\n    1: mix\n    2: bake\n"));
        assert!(output.contains("Error: persistence error"));

        let service = RecipeService::new(provider, resource_dir());
        let recipe = service.fetch_recipe_by_id(RecipeId::from(1)).unwrap();
        let names: Vec<_> = recipe
            .categories
            .iter()
            .map(|c| c.category_name.as_str())
            .collect();
        assert_eq!(names, ["Breakfast"]);
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].unit.as_ref(), Some(&cup));
    }

    #[test]
    fn bad_input_reprints_the_menu() {
        let (_dir, provider) = empty_database();
        let output = run_session(
            RecipeService::new(provider, resource_dir()),
            &["abc", "42", "4", "9", ""],
        );
        assert!(output.contains("Error: persistence error: abc is not a valid number."));
        assert!(output.contains("\n42 is not valid. Try again!"));
        // Listing fails before the tables exist, so "9" is read as the next operation.
        assert!(output.contains("\n9 is not valid. Try again!"));
        assert_eq!(output.matches("Here's what you can do:").count(), 5);
        assert!(output.ends_with("Exiting the menu\n"));
    }

    #[test]
    fn end_of_input_exits() {
        let (_dir, provider) = empty_database();
        let input = Cursor::new(String::new());
        let mut output = vec![];
        RecipeMenu::new(RecipeService::new(provider, resource_dir()), input, &mut output)
            .run()
            .unwrap();
        assert!(String::from_utf8(output)
            .unwrap()
            .ends_with("Exiting the menu\n"));
    }

    struct BrokenInput;

    impl io::Read for BrokenInput {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("device gone"))
        }
    }

    impl io::BufRead for BrokenInput {
        fn fill_buf(&mut self) -> io::Result<&[u8]> {
            Err(io::Error::other("device gone"))
        }

        fn consume(&mut self, _amt: usize) {}
    }

    #[test]
    fn unreadable_input_ends_the_menu() {
        let (_dir, provider) = empty_database();
        let mut output = vec![];
        let e = RecipeMenu::new(
            RecipeService::new(provider, resource_dir()),
            BrokenInput,
            &mut output,
        )
        .run()
        .unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::Other);

        let output = String::from_utf8(output).unwrap();
        assert_eq!(output.matches("Here's what you can do:").count(), 1);
        assert!(!output.contains("Try again!"), "{output}");
    }

    #[test]
    fn invalid_utf8_is_reported_and_the_menu_continues() {
        let (_dir, provider) = empty_database();
        let input = Cursor::new(b"\xff\xfe\n\n".to_vec());
        let mut output = vec![];
        RecipeMenu::new(RecipeService::new(provider, resource_dir()), input, &mut output)
            .run()
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Try again!"), "{output}");
        assert_eq!(output.matches("Here's what you can do:").count(), 2);
        assert!(output.ends_with("Exiting the menu\n"));
    }

    #[test]
    fn unknown_recipe_id_clears_the_selection() {
        let (_dir, provider) = empty_database();
        let service = RecipeService::new(provider, resource_dir());
        service.create_and_populate_tables().unwrap();
        let output = run_session(service, &["2", "Soup", "", "", "", "", "4", "7", ""]);
        assert!(output.contains("Invalid recipe selected"), "{output}");
        let last_menu = output.rsplit("Here's what you can do:").next().unwrap();
        assert!(last_menu.contains("**You are not working with a recipe**"));
    }
}

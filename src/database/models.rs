// Copyright 2023 Remi Bernotavicius

use crate::{Error, Result};
use chrono::{NaiveDateTime, NaiveTime};
use derive_more::{Display, From};
use diesel::deserialize::{self, FromSql, FromSqlRow, Queryable};
use diesel::expression::{AsExpression, Selectable};
use diesel::prelude::Insertable;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Double;
use diesel::sqlite::{Sqlite, SqliteValue};
use diesel_derive_newtype::DieselNewType;
use std::fmt;
use std::str::FromStr;

#[derive(DieselNewType, Display, From, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub struct RecipeId(i32);

#[derive(DieselNewType, Display, From, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub struct IngredientId(i32);

#[derive(DieselNewType, Display, From, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub struct StepId(i32);

#[derive(DieselNewType, Display, From, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub struct UnitId(i32);

#[derive(DieselNewType, Display, From, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub struct CategoryId(i32);

/// A non-negative quantity with exactly two fractional digits, kept as hundredths so that `1.5`
/// entered at the prompt is `1.50` everywhere after.
#[derive(AsExpression, FromSqlRow, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
#[diesel(sql_type = Double)]
pub struct Amount {
    hundredths: i64,
}

impl Amount {
    pub const ONE: Self = Self::from_hundredths(100);

    /// The largest value an `amount DECIMAL(7, 2)` column holds.
    pub const MAX: Self = Self::from_hundredths(99_999_99);

    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self { hundredths }
    }

    fn from_f64(value: f64) -> Self {
        Self {
            hundredths: (value * 100.0).round() as i64,
        }
    }

    fn as_f64(&self) -> f64 {
        self.hundredths as f64 / 100.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.hundredths < 0 { "-" } else { "" };
        let abs = self.hundredths.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::invalid(format!("{s} is not a valid amount."));

        let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty())
            || fraction.len() > 2
            || !all_digits(whole)
            || !all_digits(fraction)
        {
            return Err(invalid());
        }

        // Five whole digits at most; anything longer overflows the column.
        if whole.trim_start_matches('0').len() > 5 {
            return Err(invalid());
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };

        Ok(Self::from_hundredths(whole * 100 + fraction))
    }
}

impl ToSql<Double, Sqlite> for Amount {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        if *self > Self::MAX {
            return Err(format!("amount {self} does not fit in DECIMAL(7, 2)").into());
        }
        out.set_value(self.as_f64());
        Ok(IsNull::No)
    }
}

impl FromSql<Double, Sqlite> for Amount {
    fn from_sql(value: SqliteValue<'_, '_, '_>) -> deserialize::Result<Self> {
        let value = <f64 as FromSql<Double, Sqlite>>::from_sql(value)?;
        Ok(Self::from_f64(value))
    }
}

/// Prep and cook times are stored as a time of day; a count of minutes becomes `hh:mm`.
pub fn minutes_to_time(minutes: i32) -> Result<NaiveTime> {
    let invalid = || Error::invalid(format!("{minutes} minutes is not a valid duration."));
    if minutes < 0 {
        return Err(invalid());
    }
    let hours = (minutes / 60) as u32;
    let minutes_past = (minutes % 60) as u32;
    NaiveTime::from_hms_opt(hours, minutes_past, 0).ok_or_else(invalid)
}

fn fmt_duration(time: &NaiveTime) -> impl fmt::Display {
    time.format("%H:%M")
}

#[derive(Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::database::schema::recipe)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Recipe {
    pub recipe_id: RecipeId,
    pub recipe_name: String,
    pub notes: Option<String>,
    pub num_servings: Option<i32>,
    pub prep_time: Option<NaiveTime>,
    pub cook_time: Option<NaiveTime>,
    pub created_at: NaiveDateTime,
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.recipe_id, self.recipe_name)
    }
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::database::schema::recipe)]
pub struct NewRecipe {
    pub recipe_name: String,
    pub notes: Option<String>,
    pub num_servings: Option<i32>,
    pub prep_time: Option<NaiveTime>,
    pub cook_time: Option<NaiveTime>,
}

#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = crate::database::schema::unit)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Unit {
    pub unit_id: UnitId,
    pub unit_name_singular: String,
    pub unit_name_plural: String,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.unit_id, self.unit_name_singular, self.unit_name_plural
        )
    }
}

#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = crate::database::schema::category)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Category {
    pub category_id: CategoryId,
    pub category_name: String,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.category_name)
    }
}

// Field order follows the column order in `schema::ingredient`; the recipe query loads these
// positionally next to a nullable `Unit`.
#[derive(Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::database::schema::ingredient)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Ingredient {
    pub ingredient_id: IngredientId,
    pub recipe_id: RecipeId,
    pub unit_id: Option<UnitId>,
    pub ingredient_name: String,
    pub instruction: Option<String>,
    pub ingredient_order: i32,
    pub amount: Option<Amount>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewIngredient {
    pub recipe_id: RecipeId,
    pub unit_id: Option<UnitId>,
    pub ingredient_name: String,
    pub instruction: Option<String>,
    pub amount: Option<Amount>,
}

/// An ingredient line as it appears in a recipe, with its unit resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeIngredient {
    pub ingredient: Ingredient,
    pub unit: Option<Unit>,
}

impl fmt::Display for RecipeIngredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let i = &self.ingredient;
        if let Some(amount) = &i.amount {
            write!(f, "{amount} ")?;
        }
        if let Some(unit) = &self.unit {
            let name = match i.amount {
                Some(a) if a != Amount::ONE => &unit.unit_name_plural,
                _ => &unit.unit_name_singular,
            };
            write!(f, "{name} ")?;
        }
        write!(f, "{}", i.ingredient_name)?;
        if let Some(instruction) = &i.instruction {
            write!(f, ", {instruction}")?;
        }
        Ok(())
    }
}

#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = crate::database::schema::step)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Step {
    pub step_id: StepId,
    pub recipe_id: RecipeId,
    pub step_order: i32,
    pub step_text: String,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step_order, self.step_text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStep {
    pub recipe_id: RecipeId,
    pub step_text: String,
}

/// A recipe together with its ordered ingredients, ordered steps and categories.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeAggregate {
    pub recipe: Recipe,
    pub ingredients: Vec<RecipeIngredient>,
    pub steps: Vec<Step>,
    pub categories: Vec<Category>,
}

impl fmt::Display for RecipeAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.recipe;
        writeln!(f, "Recipe {r}")?;
        if let Some(notes) = &r.notes {
            writeln!(f, "  Notes: {notes}")?;
        }
        if let Some(servings) = r.num_servings {
            writeln!(f, "  Servings: {servings}")?;
        }
        if let Some(prep) = &r.prep_time {
            writeln!(f, "  Prep time: {}", fmt_duration(prep))?;
        }
        if let Some(cook) = &r.cook_time {
            writeln!(f, "  Cook time: {}", fmt_duration(cook))?;
        }
        writeln!(f, "  Created: {}", r.created_at)?;

        writeln!(f, "  Ingredients:")?;
        for i in &self.ingredients {
            writeln!(f, "    {}: {i}", i.ingredient.ingredient_order)?;
        }
        writeln!(f, "  Steps:")?;
        for s in &self.steps {
            writeln!(f, "    {s}")?;
        }
        write!(f, "  Categories:")?;
        for c in &self.categories {
            write!(f, "\n    {c}")?;
        }
        Ok(())
    }
}

#[test]
fn amount_parse_and_display() {
    use maplit::btreemap;

    let good = btreemap! {
        "1.5" => (150, "1.50"),
        "1.50" => (150, "1.50"),
        "2" => (200, "2.00"),
        "2." => (200, "2.00"),
        ".25" => (25, "0.25"),
        "0.05" => (5, "0.05"),
        "12.34" => (1234, "12.34"),
        "99999.99" => (99_999_99, "99999.99"),
        "0099999.99" => (99_999_99, "99999.99"),
    };
    for (input, (hundredths, displayed)) in good {
        let amount: Amount = input.parse().unwrap();
        assert_eq!(amount, Amount::from_hundredths(hundredths), "{input}");
        assert_eq!(amount.to_string(), displayed, "{input}");
    }

    for bad in [
        "",
        ".",
        "1.234",
        "-1",
        "abc",
        "1.2.3",
        "1,5",
        " 1",
        "100000",
        "123456789012345.67",
        "90071992547409.93",
    ] {
        assert!(bad.parse::<Amount>().is_err(), "{bad:?}");
    }
}

#[test]
fn amount_from_double() {
    assert_eq!(Amount::from_f64(1.5), Amount::from_hundredths(150));
    assert_eq!(Amount::from_f64(0.1 + 0.2), Amount::from_hundredths(30));
    assert_eq!(Amount::from_f64(2.0).as_f64(), 2.0);
    assert_eq!(Amount::from_hundredths(-150).to_string(), "-1.50");
}

#[test]
fn minutes_become_hours_and_minutes() {
    assert_eq!(
        minutes_to_time(0).unwrap(),
        NaiveTime::from_hms_opt(0, 0, 0).unwrap()
    );
    assert_eq!(
        minutes_to_time(10).unwrap(),
        NaiveTime::from_hms_opt(0, 10, 0).unwrap()
    );
    assert_eq!(
        minutes_to_time(135).unwrap(),
        NaiveTime::from_hms_opt(2, 15, 0).unwrap()
    );
    assert_eq!(
        minutes_to_time(24 * 60 - 1).unwrap(),
        NaiveTime::from_hms_opt(23, 59, 0).unwrap()
    );
    assert!(minutes_to_time(24 * 60).is_err());
    assert!(minutes_to_time(-5).is_err());
}

#[test]
fn recipe_ingredient_display() {
    let cup = Unit {
        unit_id: UnitId(3),
        unit_name_singular: "cup".into(),
        unit_name_plural: "cups".into(),
    };
    let mut line = RecipeIngredient {
        ingredient: Ingredient {
            ingredient_id: IngredientId(1),
            recipe_id: RecipeId(1),
            unit_id: Some(cup.unit_id),
            ingredient_name: "flour".into(),
            instruction: Some("sifted".into()),
            ingredient_order: 1,
            amount: Some(Amount::from_hundredths(150)),
        },
        unit: Some(cup),
    };
    assert_eq!(line.to_string(), "1.50 cups flour, sifted");

    line.ingredient.amount = Some(Amount::ONE);
    line.ingredient.instruction = None;
    assert_eq!(line.to_string(), "1.00 cup flour");

    line.ingredient.amount = None;
    line.unit = None;
    line.ingredient.unit_id = None;
    assert_eq!(line.to_string(), "flour");
}

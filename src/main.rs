// Copyright 2023 Remi Bernotavicius

use clap::Parser;
use clap::Subcommand;
use database::models::RecipeId;
use database::ConnectionProvider;
use service::RecipeService;
use std::path::PathBuf;

mod database;
mod error;
mod service;
mod ui;

pub use error::Error;
type Result<T> = std::result::Result<T, Error>;

#[derive(Parser, Debug)]
struct Args {
    /// SQLite database file to use. Defaults to one in the user data directory.
    #[arg(long, env = "RECIPES_DATABASE_URL")]
    database: Option<String>,

    /// Directory holding `recipe_schema.sql` and `recipe_data.sql`.
    #[arg(long, env = "RECIPES_RESOURCE_DIR", default_value = service::DEFAULT_RESOURCE_DIR)]
    resource_dir: PathBuf,

    #[arg(long, default_value = "warn")]
    log_level: log::LevelFilter,

    #[command(subcommand)]
    commands: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// The interactive menu (the default).
    Run,
    /// Drop, create and seed every table.
    Init,
    List,
    Show { id: i32 },
}

/// This is where the database lives on-disk when `--database` isn't given. On Linux it should be
/// like: `~/.local/share/recipes/`
fn data_path() -> Result<PathBuf> {
    let dirs = directories::BaseDirs::new()
        .ok_or_else(|| Error::invalid("failed to get user home directory"))?;
    let path = dirs.data_dir().join("recipes");
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

fn database_url(args: &Args) -> Result<String> {
    if let Some(url) = &args.database {
        return Ok(url.clone());
    }
    let path = data_path()?.join("recipes.sqlite");
    path.to_str()
        .map(String::from)
        .ok_or_else(|| Error::invalid(format!("{path:?} is not valid UTF-8")))
}

fn run(service: RecipeService) -> Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    ui::RecipeMenu::new(service, stdin.lock(), stdout.lock()).run()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    simple_logger::SimpleLogger::new()
        .with_level(args.log_level)
        .init()
        .map_err(|e| Error::invalid(e.to_string()))?;

    let provider = ConnectionProvider::new(database_url(&args)?);
    log::info!("using database {}", provider.database_url());
    let service = RecipeService::new(provider, &args.resource_dir);

    match args.commands.unwrap_or(Commands::Run) {
        Commands::Run => run(service)?,
        Commands::Init => {
            service.create_and_populate_tables()?;
            println!("Tables created and populated");
        }
        Commands::List => {
            for recipe in service.fetch_recipes()? {
                println!("{recipe}");
            }
        }
        Commands::Show { id } => match service.fetch_recipe_by_id(RecipeId::from(id)) {
            Ok(recipe) => println!("{recipe}"),
            Err(e) if e.is_not_found() => println!("{e}"),
            Err(e) => return Err(e),
        },
    }
    Ok(())
}

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ebm_core::config::LogLevel;
use ebm_core::{
    CancellationToken, CatalogBook, Config, Ebm, EditorReviewer, NoReview, Reviewer,
};
use log::{info, warn, LevelFilter};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "ebm")]
#[command(about = "Catalogue e-books into a managed library")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Library directory (overrides the configuration file)
    #[arg(short, long, global = true)]
    library: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect e-books from a file or directory and import them
    Import {
        /// File or directory to import from
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Number of parser and staging workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Skip the metadata review in the editor
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List catalogued books
    List {
        /// Full-text search over titles, authors and tags
        #[arg(short, long)]
        search: Option<String>,

        /// Columns to show: title, authors, formats
        #[arg(short, long, value_delimiter = ',', default_value = "title,authors")]
        fields: Vec<Field>,
    },

    /// Remove books from the catalog and delete their files
    Remove {
        /// Book ids, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<i64>,
    },

    /// Copy the files of some books into a directory
    Export {
        /// Book ids, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<i64>,

        /// Destination directory
        #[arg(default_value = ".")]
        dest: PathBuf,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file
        #[arg(default_value = "ebm.json")]
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Authors,
    Formats,
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(Field::Title),
            "authors" => Ok(Field::Authors),
            "formats" => Ok(Field::Formats),
            other => Err(format!(
                "unknown field '{}' (expected title, authors or formats)",
                other
            )),
        }
    }
}

impl Field {
    fn header(self) -> &'static str {
        match self {
            Field::Title => "Title",
            Field::Authors => "Authors",
            Field::Formats => "Formats",
        }
    }

    fn value(self, book: &CatalogBook) -> String {
        match self {
            Field::Title => book.title.clone(),
            Field::Authors => book.joined_authors(),
            Field::Formats => book
                .formats()
                .iter()
                .map(|f| f.as_str())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    // Parse command line arguments
    let cli = Cli::parse();

    if let Commands::GenerateConfig { path } = &cli.command {
        let config = Config::default();
        config.save_to_file(path)?;
        println!("Configuration file generated at: {}", path.display());
        return Ok(());
    }

    // Set up configuration
    let mut config = match &cli.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => Config::default(),
    };
    if let Some(library) = cli.library {
        config.library_dir = library;
    }
    config.log_level = match cli.verbose {
        0 => config.log_level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    config.validate()?;

    init_logging(&config)?;

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, cancelling...");
        handler_token.cancel();
    })
    .context("Failed to install the interrupt handler")?;

    match cli.command {
        Commands::Import {
            path,
            recursive,
            workers,
            yes,
        } => {
            if let Some(workers) = workers {
                config.workers = workers;
            }
            let recursive = recursive || config.recursive;
            let reviewer: Box<dyn Reviewer> = if yes {
                Box::new(NoReview)
            } else {
                Box::new(EditorReviewer::from_config(&config))
            };

            let mut ebm = Ebm::new(config)?.with_cancellation(cancel);
            info!("Starting import from {}...", path.display());
            let imported = ebm.import(&path, recursive, reviewer.as_ref())?;
            println!("Imported {} books", imported.len());
            for book in &imported {
                println!("{:>6}  {} - {}", book.id, book.title, book.joined_authors());
            }
            Ok(())
        }

        Commands::List { search, fields } => {
            let ebm = Ebm::new(config)?;
            let books = ebm
                .library()
                .find_books(search.as_deref().unwrap_or(""))?;
            print_table(&books, &fields);
            Ok(())
        }

        Commands::Remove { ids } => {
            let mut ebm = Ebm::new(config)?;
            let removed = ebm.library_mut().remove_books(&ids)?;
            if removed.is_empty() {
                bail!("No books found with ids {:?}", ids);
            }
            for book in &removed {
                println!("Removed {:>6}  {}", book.id, book.title);
            }
            Ok(())
        }

        Commands::Export { ids, dest } => {
            let ebm = Ebm::new(config)?;
            let summary = ebm.library().export_books(&ids, &dest)?;
            println!(
                "Exported {} files to {}",
                summary.copied.len(),
                dest.display()
            );
            for failure in &summary.failed {
                println!("  failed: {} ({})", failure.path.display(), failure.error);
            }
            Ok(())
        }

        Commands::GenerateConfig { .. } => Ok(()),
    }
}

/// Console logging by default, the rolling file log when a directory is configured
fn init_logging(config: &Config) -> anyhow::Result<()> {
    let level = LevelFilter::from(config.log_level);
    match &config.log_dir {
        Some(dir) => {
            let dir = ebm_core::expand_home(dir)?;
            ebm_core::logging::init_logger(&dir, level)
                .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
        }
        None => {
            env_logger::Builder::new()
                .filter_level(level)
                .parse_env("EBM_LOG")
                .init();
        }
    }
    Ok(())
}

fn print_table(books: &[CatalogBook], fields: &[Field]) {
    let mut widths: Vec<usize> = fields.iter().map(|f| f.header().len()).collect();
    let rows: Vec<Vec<String>> = books
        .iter()
        .map(|book| fields.iter().map(|f| f.value(book)).collect())
        .collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut header = format!("{:>6}", "ID");
    for (field, width) in fields.iter().zip(&widths) {
        header.push_str(&format!("  {:<width$}", field.header(), width = *width));
    }
    println!("{}", header.trim_end());

    for (book, row) in books.iter().zip(&rows) {
        let mut line = format!("{:>6}", book.id);
        for (cell, width) in row.iter().zip(&widths) {
            line.push_str(&format!("  {:<width$}", cell, width = *width));
        }
        println!("{}", line.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_list_fields_parse() {
        let cli = Cli::parse_from(["ebm", "list", "-f", "title,formats", "-s", "rust"]);
        match cli.command {
            Commands::List { search, fields } => {
                assert_eq!(search.as_deref(), Some("rust"));
                assert_eq!(fields, vec![Field::Title, Field::Formats]);
            }
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn test_ids_are_comma_separated() {
        let cli = Cli::parse_from(["ebm", "--library", "/tmp/lib", "remove", "--ids", "1,2,3"]);
        assert_eq!(cli.library, Some(PathBuf::from("/tmp/lib")));
        match cli.command {
            Commands::Remove { ids } => assert_eq!(ids, vec![1, 2, 3]),
            _ => panic!("expected remove"),
        }
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(Cli::try_parse_from(["ebm", "list", "-f", "isbn"]).is_err());
    }
}

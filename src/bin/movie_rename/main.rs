//! movierename - Identify movie folders with an AI chat service and rename them.
//!
//! Flattens all folders under the given root directory
//! and renames each one to `Movie Name [Year]` after confirmation.

mod cli;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use movie_tools::movie_rename::{FileLogger, FolderOrganizer, MovieIdentifier};
use movie_tools::print_error;

use crate::cli::MovieRenameArgs;

#[tokio::main]
async fn main() -> Result<()> {
    let args = MovieRenameArgs::parse();
    if let Some(ref shell) = args.completion {
        return movie_tools::generate_shell_completion(
            *shell,
            MovieRenameArgs::command(),
            true,
            env!("CARGO_BIN_NAME"),
        );
    }

    // Optional .env file with the API key
    let _ = dotenv::dotenv();

    let config = args.to_config()?;
    if config.debug {
        println!("{config}");
    }

    let mut logger = match FileLogger::new(&config.log_dir, config.verbose) {
        Ok(logger) => logger,
        Err(error) => {
            print_error!("{error:#}");
            std::process::exit(1);
        }
    };

    let Some(path) = args.path.as_deref() else {
        logger.error(format!("Usage: {} <directory_path>", env!("CARGO_BIN_NAME")));
        logger.finish()?;
        std::process::exit(1);
    };

    let root = match movie_tools::resolve_root_directory(path) {
        Ok(root) => root,
        Err(error) => {
            logger.error(error.to_string());
            logger.finish()?;
            std::process::exit(1);
        }
    };

    if config.api_key.is_none() {
        logger.warning(format!(
            "{} is not set, requests will be sent without authorization",
            movie_tools::movie_rename::API_KEY_ENV
        ));
    }

    logger.info(format!("Starting script with directory: {}", root.display()));
    logger.debug(format!("Log file: {}", logger.path().display()));

    let identifier = MovieIdentifier::new(&config)?;
    let stdin = std::io::stdin();
    let stats = {
        let mut organizer = FolderOrganizer::new(root, &config, &identifier, &mut logger, stdin.lock());
        organizer.organize().await
    };

    match stats {
        Ok(stats) => {
            logger.log_stats(&stats);
            logger.info("Finished renaming and restructuring movie folders.");
            println!("{stats}");
            logger.finish()
        }
        Err(error) => {
            logger.error(format!("{error:#}"));
            logger.finish()?;
            Err(error)
        }
    }
}

use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use colored::Colorize;
use walkdir::WalkDir;

use crate::movie_rename::{Config, FileLogger, MovieGuess, MovieIdentifier, RunStats};
use crate::{get_normalized_dir_name, get_relative_path_or_filename, is_hidden_below};

/// A directory found under the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    /// Path at the time of collection.
    pub path: PathBuf,
    /// Directory name before any move or rename.
    pub original_name: String,
    /// Depth below the root, where direct children of root are 1.
    pub depth: usize,
}

/// Terminal state of a processed folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderOutcome {
    Renamed,
    /// Already has the identified name.
    Unchanged,
    Declined,
    Unidentified,
}

/// Flattens movie folders to the root and renames them after confirmation.
pub struct FolderOrganizer<'a, R> {
    root: PathBuf,
    auto: bool,
    dryrun: bool,
    skip_hidden: bool,
    identifier: &'a MovieIdentifier,
    logger: &'a mut FileLogger,
    input: R,
    /// Dry run: paths that a real run would have created.
    claimed: HashSet<PathBuf>,
    /// Dry run: paths that a real run would have moved away.
    vacated: HashSet<PathBuf>,
}

impl<'a, R: BufRead> FolderOrganizer<'a, R> {
    /// Create a new organizer for the given root directory.
    ///
    /// Confirmation answers are read line by line from `input`.
    pub fn new(
        root: PathBuf,
        config: &Config,
        identifier: &'a MovieIdentifier,
        logger: &'a mut FileLogger,
        input: R,
    ) -> Self {
        Self {
            root,
            auto: config.auto,
            dryrun: config.dryrun,
            skip_hidden: config.skip_hidden,
            identifier,
            logger,
            input,
            claimed: HashSet::new(),
            vacated: HashSet::new(),
        }
    }

    /// Flatten and rename all folders under root.
    ///
    /// # Errors
    /// Returns an error if the tree cannot be read or a folder cannot be moved.
    pub async fn organize(&mut self) -> Result<RunStats> {
        let start = Instant::now();
        self.logger.info(format!(
            "Starting folder rename and flatten process in directory: {}",
            self.root.display()
        ));

        let folders = Self::collect_folders(&self.root, self.skip_hidden)?;
        let mut stats = RunStats {
            folders_found: folders.len(),
            ..RunStats::default()
        };
        self.logger.debug(format!("Found {} folder(s)", folders.len()));

        for entry in &folders {
            let outcome = self.process_folder(entry, &mut stats).await?;
            stats.record(outcome);
        }

        stats.total_duration = start.elapsed();
        Ok(stats)
    }

    /// Collect all directories under root, children before their parents.
    ///
    /// Siblings are returned in directory listing order.
    /// Hidden directories and their contents are skipped when `skip_hidden` is set.
    ///
    /// # Errors
    /// Returns an error if a directory cannot be read.
    pub fn collect_folders(root: &Path, skip_hidden: bool) -> Result<Vec<FolderEntry>> {
        let mut folders = Vec::new();
        // Contents first yields a directory only after its children,
        // so hidden subtrees are filtered by path instead of `filter_entry`.
        for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
            let entry = entry.with_context(|| format!("Failed to read directory tree: {}", root.display()))?;
            if !entry.file_type().is_dir() || (skip_hidden && is_hidden_below(entry.path(), root)) {
                continue;
            }
            folders.push(FolderEntry {
                original_name: get_normalized_dir_name(entry.path())?,
                depth: entry.depth(),
                path: entry.into_path(),
            });
        }
        Ok(folders)
    }

    async fn process_folder(&mut self, entry: &FolderEntry, stats: &mut RunStats) -> Result<FolderOutcome> {
        let current_path = self.flatten(entry, stats)?;

        let Some(guess) = self.identifier.identify(&entry.original_name, self.logger).await else {
            self.logger
                .warning(format!("Could not identify movie for folder: {}", entry.original_name));
            return Ok(FolderOutcome::Unidentified);
        };

        let new_name = guess.folder_name();
        if !self.confirm_rename(&entry.original_name, &new_name)? {
            self.logger
                .debug(format!("Keeping folder name: {}", entry.original_name));
            return Ok(FolderOutcome::Declined);
        }

        self.rename_folder(&entry.original_name, &current_path, &guess)
    }

    /// Move a nested folder directly under root.
    ///
    /// Returns the folder path after the move.
    fn flatten(&mut self, entry: &FolderEntry, stats: &mut RunStats) -> Result<PathBuf> {
        let parent = entry.path.parent().unwrap_or(self.root.as_path());
        if parent == self.root {
            return Ok(entry.path.clone());
        }

        let file_name = entry
            .path
            .file_name()
            .with_context(|| format!("Failed to get directory name: {}", entry.path.display()))?;
        let target = self.root.join(file_name);
        if self.is_taken(&target) {
            anyhow::bail!(
                "Cannot move '{}' to root directory: destination path '{}' already exists",
                entry.path.display(),
                target.display()
            );
        }

        self.logger.info(format!(
            "Moving folder '{}' from '{}' to root directory.",
            entry.original_name,
            get_relative_path_or_filename(parent, &self.root)
        ));
        if self.dryrun {
            self.record_dryrun_move(&entry.path, &target);
        } else {
            fs::rename(&entry.path, &target).with_context(|| {
                format!(
                    "Failed to move '{}' to '{}'",
                    entry.path.display(),
                    target.display()
                )
            })?;
        }
        stats.folders_flattened += 1;
        Ok(target)
    }

    /// Check if a path is in use, including the moves a dry run has only logged.
    fn is_taken(&self, path: &Path) -> bool {
        if self.dryrun {
            self.claimed.contains(path) || (path.exists() && !self.vacated.contains(path))
        } else {
            path.exists()
        }
    }

    fn record_dryrun_move(&mut self, from: &Path, to: &Path) {
        self.claimed.remove(from);
        self.vacated.insert(from.to_path_buf());
        self.vacated.remove(to);
        self.claimed.insert(to.to_path_buf());
    }

    /// Ask the user whether to rename. Only `y` or `Y` confirms.
    fn confirm_rename(&mut self, old_name: &str, new_name: &str) -> Result<bool> {
        if self.auto {
            self.logger
                .info(format!("Auto-confirmed rename '{old_name}' to '{new_name}'"));
            return Ok(true);
        }

        crate::show_diff(old_name, new_name);
        print!(
            "{}",
            format!("Do you want to rename '{old_name}' to '{new_name}'? (y/n): ").magenta()
        );
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let mut input = String::new();
        self.input.read_line(&mut input).context("Failed to read input")?;
        let answer = input.trim().to_lowercase();

        self.logger.info(format!(
            "User response to rename '{old_name}' to '{new_name}': {answer}"
        ));
        Ok(answer == "y")
    }

    fn rename_folder(&mut self, old_name: &str, current_path: &Path, guess: &MovieGuess) -> Result<FolderOutcome> {
        let Some(target) = Self::available_path(&self.root, current_path, guess, |path| self.is_taken(path)) else {
            self.logger
                .debug(format!("Folder already named: {}", guess.folder_name()));
            return Ok(FolderOutcome::Unchanged);
        };

        let new_name = crate::path_to_filename_string(&target);
        if self.dryrun {
            self.logger
                .info(format!("Dryrun: would rename {old_name} to {new_name}"));
            self.record_dryrun_move(current_path, &target);
        } else {
            fs::rename(current_path, &target).with_context(|| {
                format!(
                    "Failed to rename '{}' to '{}'",
                    current_path.display(),
                    target.display()
                )
            })?;
            self.logger.info(format!("Renamed: {old_name} to {new_name}"));
        }
        Ok(FolderOutcome::Renamed)
    }

    /// Find a free path under root for the guessed name.
    ///
    /// Appends ` (n)` with n starting from 1 while `is_taken` reports the path as used by another folder.
    /// Returns `None` if the folder at `current_path` already has the chosen name.
    pub fn available_path(
        root: &Path,
        current_path: &Path,
        guess: &MovieGuess,
        is_taken: impl Fn(&Path) -> bool,
    ) -> Option<PathBuf> {
        let mut target = root.join(guess.folder_name());
        let mut number = 1;
        while target != current_path && is_taken(&target) {
            target = root.join(guess.numbered_folder_name(number));
            number += 1;
        }
        (target != current_path).then_some(target)
    }
}

#[cfg(test)]
mod organize_tests {
    use super::*;

    use std::io::Cursor;

    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::{TempDir, tempdir};

    struct TestContext {
        root: TempDir,
        log_dir: TempDir,
        server: MockServer,
    }

    impl TestContext {
        async fn new() -> Self {
            Self {
                root: tempdir().unwrap(),
                log_dir: tempdir().unwrap(),
                server: MockServer::start_async().await,
            }
        }

        fn config(&self) -> Config {
            Config {
                api_key: Some("test-key".to_string()),
                endpoint: self.server.url("/api/chat/completions"),
                ..Config::default()
            }
        }

        fn mkdir(&self, relative: &str) {
            fs::create_dir_all(self.root.path().join(relative)).unwrap();
        }

        fn exists(&self, relative: &str) -> bool {
            self.root.path().join(relative).is_dir()
        }

        async fn movie_reply(&self, folder_name: &str, movie_name: &str, year: &str) {
            let content = json!({"movie_name": movie_name, "release_year": year}).to_string();
            let prompt = format!("folder name: {folder_name}.");
            self.server
                .mock_async(|when, then| {
                    when.method(POST).body_contains(prompt.as_str());
                    then.status(200)
                        .json_body(json!({"choices": [{"message": {"role": "assistant", "content": content}}]}));
                })
                .await;
        }

        async fn run(&self, config: &Config, input: &str) -> RunStats {
            let identifier = MovieIdentifier::new(config).unwrap();
            let mut logger = FileLogger::new(self.log_dir.path(), false).unwrap();
            let mut organizer = FolderOrganizer::new(
                self.root.path().to_path_buf(),
                config,
                &identifier,
                &mut logger,
                Cursor::new(input.to_string()),
            );
            organizer.organize().await.unwrap()
        }

        fn log_lines(&self) -> Vec<String> {
            let log_file = fs::read_dir(self.log_dir.path())
                .unwrap()
                .filter_map(Result::ok)
                .next()
                .unwrap()
                .path();
            fs::read_to_string(log_file)
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }

        fn root_dirs(&self) -> Vec<String> {
            let mut names: Vec<String> = fs::read_dir(self.root.path())
                .unwrap()
                .filter_map(Result::ok)
                .filter(|e| e.path().is_dir())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect();
            names.sort();
            names
        }
    }

    fn inception() -> MovieGuess {
        MovieGuess {
            movie_name: "Inception".to_string(),
            release_year: "2010".to_string(),
        }
    }

    #[test]
    fn collect_folders_returns_children_before_parents() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("A/B/C")).unwrap();
        fs::create_dir_all(dir.path().join("D")).unwrap();
        fs::write(dir.path().join("A/movie.mkv"), b"").unwrap();

        let folders = FolderOrganizer::<Cursor<String>>::collect_folders(dir.path(), false).unwrap();
        let names: Vec<&str> = folders.iter().map(|f| f.original_name.as_str()).collect();
        assert_eq!(names.len(), 4);

        let position = |name: &str| names.iter().position(|n| *n == name).unwrap();
        assert!(position("C") < position("B"));
        assert!(position("B") < position("A"));

        let c = &folders[position("C")];
        assert_eq!(c.depth, 3);
        assert_eq!(c.path, dir.path().join("A/B/C"));
    }

    #[test]
    fn collect_folders_includes_hidden_by_default() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".cache/inner")).unwrap();
        fs::create_dir_all(dir.path().join("Heat.1995")).unwrap();

        let folders = FolderOrganizer::<Cursor<String>>::collect_folders(dir.path(), false).unwrap();
        let mut names: Vec<&str> = folders.iter().map(|f| f.original_name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec![".cache", "Heat.1995", "inner"]);
    }

    #[test]
    fn collect_folders_skips_hidden_subtree() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".extras/Inception.2010/Subs")).unwrap();
        fs::create_dir_all(dir.path().join("A/.cache")).unwrap();
        fs::create_dir_all(dir.path().join("A/B")).unwrap();

        let folders = FolderOrganizer::<Cursor<String>>::collect_folders(dir.path(), true).unwrap();
        let mut names: Vec<&str> = folders.iter().map(|f| f.original_name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn available_path_uses_first_free_counter() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("Inception [2010]")).unwrap();
        fs::create_dir(root.join("Inception [2010] (1)")).unwrap();
        fs::create_dir(root.join("Inception.2010")).unwrap();

        let target = FolderOrganizer::<Cursor<String>>::available_path(
            root,
            &root.join("Inception.2010"),
            &inception(),
            Path::exists,
        );
        assert_eq!(target, Some(root.join("Inception [2010] (2)")));
    }

    #[test]
    fn available_path_is_none_when_already_named() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("Inception [2010]")).unwrap();

        let target = FolderOrganizer::<Cursor<String>>::available_path(
            root,
            &root.join("Inception [2010]"),
            &inception(),
            Path::exists,
        );
        assert_eq!(target, None);
    }

    #[test]
    fn available_path_skips_paths_reported_taken() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let planned = root.join("Inception [2010]");

        let target = FolderOrganizer::<Cursor<String>>::available_path(
            root,
            &root.join("Inception.2010"),
            &inception(),
            |path| path == planned,
        );
        assert_eq!(target, Some(root.join("Inception [2010] (1)")));
    }

    #[tokio::test]
    async fn renames_nested_folder_at_root() {
        let context = TestContext::new().await;
        context.mkdir("A/Inception.2010.1080p");
        context
            .movie_reply("Inception.2010.1080p", "Inception", "2010")
            .await;

        let stats = context.run(&context.config(), "y\n").await;

        assert_eq!(context.root_dirs(), vec!["A", "Inception [2010]"]);
        assert_eq!(stats.folders_found, 2);
        assert_eq!(stats.folders_flattened, 1);
        assert_eq!(stats.folders_renamed, 1);
        assert_eq!(stats.folders_unidentified, 1);
    }

    #[tokio::test]
    async fn declined_rename_keeps_flattened_folder() {
        let context = TestContext::new().await;
        context.mkdir("A/Heat.1995");
        context.movie_reply("Heat.1995", "Heat", "1995").await;

        let stats = context.run(&context.config(), "n\n").await;

        assert_eq!(context.root_dirs(), vec!["A", "Heat.1995"]);
        assert_eq!(stats.folders_declined, 1);
        assert_eq!(stats.folders_renamed, 0);
    }

    #[tokio::test]
    async fn any_answer_other_than_y_declines() {
        let context = TestContext::new().await;
        context.mkdir("Heat.1995");
        context.movie_reply("Heat.1995", "Heat", "1995").await;

        let stats = context.run(&context.config(), "yes\n").await;

        assert!(context.exists("Heat.1995"));
        assert_eq!(stats.folders_declined, 1);
    }

    #[tokio::test]
    async fn uppercase_y_confirms() {
        let context = TestContext::new().await;
        context.mkdir("Heat.1995");
        context.movie_reply("Heat.1995", "Heat", "1995").await;

        context.run(&context.config(), "Y\n").await;

        assert_eq!(context.root_dirs(), vec!["Heat [1995]"]);
    }

    #[tokio::test]
    async fn end_of_input_declines() {
        let context = TestContext::new().await;
        context.mkdir("Heat.1995");
        context.movie_reply("Heat.1995", "Heat", "1995").await;

        let stats = context.run(&context.config(), "").await;

        assert!(context.exists("Heat.1995"));
        assert_eq!(stats.folders_declined, 1);
    }

    #[tokio::test]
    async fn auto_confirm_does_not_read_input() {
        let context = TestContext::new().await;
        context.mkdir("Heat.1995");
        context.movie_reply("Heat.1995", "Heat", "1995").await;

        let config = Config {
            auto: true,
            ..context.config()
        };
        context.run(&config, "").await;

        assert_eq!(context.root_dirs(), vec!["Heat [1995]"]);
    }

    #[tokio::test]
    async fn existing_name_gets_counter() {
        let context = TestContext::new().await;
        context.mkdir("Inception [2010]");
        context.mkdir("Inception [2010] (1)");
        context.mkdir("Inception.2010.1080p");
        context
            .movie_reply("Inception.2010.1080p", "Inception", "2010")
            .await;

        context.run(&context.config(), "y\n").await;

        assert_eq!(
            context.root_dirs(),
            vec!["Inception [2010]", "Inception [2010] (1)", "Inception [2010] (2)"]
        );
    }

    #[tokio::test]
    async fn folder_with_identified_name_is_unchanged() {
        let context = TestContext::new().await;
        context.mkdir("Inception [2010]");
        context.movie_reply("Inception [2010]", "Inception", "2010").await;

        let stats = context.run(&context.config(), "y\n").await;

        assert_eq!(context.root_dirs(), vec!["Inception [2010]"]);
        assert_eq!(stats.folders_unchanged, 1);
        assert_eq!(stats.folders_renamed, 0);
    }

    #[tokio::test]
    async fn dryrun_does_not_touch_filesystem() {
        let context = TestContext::new().await;
        context.mkdir("A/Inception.2010.1080p");
        context
            .movie_reply("Inception.2010.1080p", "Inception", "2010")
            .await;

        let config = Config {
            dryrun: true,
            ..context.config()
        };
        let stats = context.run(&config, "y\n").await;

        assert!(context.exists("A/Inception.2010.1080p"));
        assert_eq!(context.root_dirs(), vec!["A"]);
        assert_eq!(stats.folders_flattened, 1);
        assert_eq!(stats.folders_renamed, 1);
    }

    #[tokio::test]
    async fn dryrun_numbers_colliding_renames() {
        let context = TestContext::new().await;
        context.mkdir("Inception.2010.1080p");
        context.mkdir("Inception.2010.720p");
        context
            .movie_reply("Inception.2010.1080p", "Inception", "2010")
            .await;
        context
            .movie_reply("Inception.2010.720p", "Inception", "2010")
            .await;

        let config = Config {
            auto: true,
            dryrun: true,
            ..context.config()
        };
        let stats = context.run(&config, "").await;

        assert_eq!(context.root_dirs(), vec!["Inception.2010.1080p", "Inception.2010.720p"]);
        assert_eq!(stats.folders_renamed, 2);

        let planned: Vec<String> = context
            .log_lines()
            .into_iter()
            .filter(|line| line.contains("Dryrun: would rename"))
            .collect();
        assert_eq!(planned.len(), 2);
        assert!(planned.iter().any(|line| line.ends_with(" to Inception [2010]")));
        assert!(planned.iter().any(|line| line.ends_with(" to Inception [2010] (1)")));
    }

    #[tokio::test]
    async fn dryrun_flatten_collision_is_an_error() {
        let context = TestContext::new().await;
        context.mkdir("A/Extras");
        context.mkdir("B/Extras");

        let config = Config {
            dryrun: true,
            ..context.config()
        };
        let identifier = MovieIdentifier::new(&config).unwrap();
        let mut logger = FileLogger::new(context.log_dir.path(), false).unwrap();
        let mut organizer = FolderOrganizer::new(
            context.root.path().to_path_buf(),
            &config,
            &identifier,
            &mut logger,
            Cursor::new(String::new()),
        );

        assert!(organizer.organize().await.is_err());
        assert!(context.exists("A/Extras"));
        assert!(context.exists("B/Extras"));
    }

    #[tokio::test]
    async fn hidden_folders_are_flattened_by_default() {
        let context = TestContext::new().await;
        context.mkdir(".extras/Inception.2010");

        let stats = context.run(&context.config(), "").await;

        assert_eq!(context.root_dirs(), vec![".extras", "Inception.2010"]);
        assert_eq!(stats.folders_found, 2);
        assert_eq!(stats.folders_flattened, 1);
    }

    #[tokio::test]
    async fn skip_hidden_leaves_hidden_subtree_untouched() {
        let context = TestContext::new().await;
        context.mkdir(".extras/Inception.2010");
        context.mkdir("A/B");

        let config = Config {
            skip_hidden: true,
            ..context.config()
        };
        let stats = context.run(&config, "").await;

        assert_eq!(context.root_dirs(), vec![".extras", "A", "B"]);
        assert!(context.exists(".extras/Inception.2010"));
        assert_eq!(stats.folders_found, 2);
        assert!(
            !context
                .log_lines()
                .iter()
                .any(|line| line.contains("Inception.2010"))
        );
    }

    #[tokio::test]
    async fn flatten_collision_is_an_error() {
        let context = TestContext::new().await;
        context.mkdir("A/Extras");
        context.mkdir("B/Extras");

        let config = context.config();
        let identifier = MovieIdentifier::new(&config).unwrap();
        let mut logger = FileLogger::new(context.log_dir.path(), false).unwrap();
        let mut organizer = FolderOrganizer::new(
            context.root.path().to_path_buf(),
            &config,
            &identifier,
            &mut logger,
            Cursor::new(String::new()),
        );

        assert!(organizer.organize().await.is_err());
    }
}

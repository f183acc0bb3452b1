use std::fmt;
use std::time::Duration;

use colored::Colorize;

use crate::movie_rename::FolderOutcome;

/// Counters for a single organize run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub folders_found: usize,
    pub folders_flattened: usize,
    pub folders_renamed: usize,
    pub folders_unchanged: usize,
    pub folders_declined: usize,
    pub folders_unidentified: usize,
    pub total_duration: Duration,
}

impl RunStats {
    /// Count the terminal state of one folder.
    pub const fn record(&mut self, outcome: FolderOutcome) {
        match outcome {
            FolderOutcome::Renamed => self.folders_renamed += 1,
            FolderOutcome::Unchanged => self.folders_unchanged += 1,
            FolderOutcome::Declined => self.folders_declined += 1,
            FolderOutcome::Unidentified => self.folders_unidentified += 1,
        }
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "Statistics:".bold())?;
        writeln!(f, "  Folders found:        {}", self.folders_found)?;
        writeln!(f, "  Folders flattened:    {}", self.folders_flattened)?;
        writeln!(f, "  Folders renamed:      {}", self.folders_renamed.to_string().green())?;
        writeln!(f, "  Folders unchanged:    {}", self.folders_unchanged)?;
        writeln!(f, "  Renames declined:     {}", self.folders_declined)?;
        writeln!(
            f,
            "  Folders unidentified: {}",
            if self.folders_unidentified > 0 {
                self.folders_unidentified.to_string().yellow()
            } else {
                self.folders_unidentified.to_string().normal()
            }
        )?;
        write!(f, "  Total time: {}", crate::format_duration(self.total_duration))
    }
}

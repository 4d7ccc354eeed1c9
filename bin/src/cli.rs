use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface configuration
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the discovered one
    #[arg(long, global = true, env = "SCRIBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log file, or directory to put it in
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render markdown as display markup
    Display {
        /// Markdown file, `-` for stdin
        file: PathBuf,
    },
    /// Write display markup back out as markdown
    Source {
        /// Markup file, `-` for stdin
        file: PathBuf,
    },
    /// Print the plain text a reader sees
    Plain {
        /// Markdown file, `-` for stdin
        file: PathBuf,
    },
    /// List matches of a pattern in the plain text
    Search {
        /// Markdown file, `-` for stdin
        file: PathBuf,
        /// Regular expression
        pattern: String,
        #[arg(long)]
        case_sensitive: bool,
    },
    /// Toggle an inline tag over a plain-text range
    Format {
        /// Markdown file, `-` for stdin
        file: PathBuf,
        /// Start offset in UTF-16 units of the plain text
        start: usize,
        /// End offset, exclusive
        end: usize,
        /// Inline element such as `strong` or `em`
        #[arg(default_value = "strong")]
        tag: String,
    },
    /// Replace every match of a pattern, leaf by leaf
    Replace {
        /// Markdown file, `-` for stdin
        file: PathBuf,
        /// Regular expression
        pattern: String,
        /// Literal replacement text
        replacement: String,
        #[arg(long)]
        case_sensitive: bool,
    },
}

impl Command {
    pub fn file(&self) -> &PathBuf {
        match self {
            Self::Display { file }
            | Self::Source { file }
            | Self::Plain { file }
            | Self::Search { file, .. }
            | Self::Format { file, .. }
            | Self::Replace { file, .. } => file,
        }
    }
}

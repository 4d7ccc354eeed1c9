//! Subcommand implementations. Each takes the input text and returns what
//! should be printed.

use crate::cli::Command;
use anyhow::{bail, Context, Result};
use scribe_config::Config;
use scribe_editor::{Composer, InputSettings, MemorySurface, Platform};
use scribe_source::{Converter, MarkdownConverter, Query, Source};
use std::{fmt::Write as _, io::Read, path::Path};

pub fn run(command: &Command, config: &Config) -> Result<String> {
    let input = read_input(command.file())?;
    let case_insensitive = |case_sensitive: bool| !case_sensitive && config.search.case_insensitive;

    match command {
        Command::Display { .. } => Ok(display(&input, config)),
        Command::Source { .. } => Ok(source(&input, config)),
        Command::Plain { .. } => Ok(plain(&input, config)),
        Command::Search {
            pattern,
            case_sensitive,
            ..
        } => search(&input, pattern, case_insensitive(*case_sensitive), config),
        Command::Format {
            start, end, tag, ..
        } => format(&input, *start..*end, tag, config),
        Command::Replace {
            pattern,
            replacement,
            case_sensitive,
            ..
        } => replace(
            &input,
            pattern,
            replacement,
            case_insensitive(*case_sensitive),
            config,
        ),
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read stdin")?;
        return Ok(input);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn converter(config: &Config) -> MarkdownConverter {
    MarkdownConverter::new(config.markdown.bullet)
}

pub fn display(markdown: &str, config: &Config) -> String {
    converter(config).to_display(markdown)
}

pub fn source(markup: &str, config: &Config) -> String {
    converter(config).to_source(markup)
}

pub fn plain(markdown: &str, config: &Config) -> String {
    let mut source = Source::new(converter(config));
    source.set_input(markdown);
    source.plain().to_string()
}

/// One line per match: the UTF-16 range and the matched text.
pub fn search(
    markdown: &str,
    pattern: &str,
    case_insensitive: bool,
    config: &Config,
) -> Result<String> {
    let mut source = Source::new(converter(config));
    source.set_input(markdown);
    source.set_query(Query::new(pattern, case_insensitive)?);

    let plain: Vec<u16> = source.plain().encode_utf16().collect();
    let mut out = String::new();
    for range in source.query_results() {
        let matched = String::from_utf16_lossy(&plain[range.clone()]);
        writeln!(out, "{}..{}\t{matched}", range.start, range.end)?;
    }
    tracing::debug!(matches = source.query_results().len(), "search finished");
    Ok(out)
}

pub fn format(
    markdown: &str,
    range: std::ops::Range<usize>,
    tag: &str,
    config: &Config,
) -> Result<String> {
    let mut composer = composer(markdown, config)?;
    if !composer.editor_mut().select_text(range.clone()) {
        bail!("Range {}..{} is outside the document", range.start, range.end);
    }
    if !composer.format_selection(tag)? {
        tracing::info!(?range, tag, "nothing to format");
    }
    Ok(composer.value())
}

pub fn replace(
    markdown: &str,
    pattern: &str,
    replacement: &str,
    case_insensitive: bool,
    config: &Config,
) -> Result<String> {
    let mut composer = composer(markdown, config)?;
    composer.set_query(Query::new(pattern, case_insensitive)?);
    let changed = composer.replace_all(replacement);
    tracing::info!(changed, "replaced matches");
    Ok(composer.value())
}

fn composer(markdown: &str, config: &Config) -> Result<Composer<MemorySurface>> {
    let composer = Composer::new(
        MemorySurface::new(),
        Source::new(converter(config)),
        markdown,
        Platform::in_memory(),
        InputSettings::from(&config.editor),
    )?;
    Ok(composer)
}

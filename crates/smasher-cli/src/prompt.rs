//! Interactive prompts
//!
//! All prompts read one line from stdin. When stdin is not a terminal they
//! return without reading so scripted runs never block.

use anyhow::Result;
use std::io::{self, Write};

fn interactive() -> bool {
    atty::is(atty::Stream::Stdin)
}

fn read_line() -> Result<String> {
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Prompt for confirmation
///
/// Returns true if user confirms, false otherwise.
/// In non-interactive mode (no TTY), returns false.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !interactive() {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    Ok(is_yes(&read_line()?))
}

/// Prompt with a default value, returns None if user keeps default
pub fn prompt_with_default(prompt: &str, default: &str) -> Result<Option<String>> {
    if !interactive() {
        return Ok(None);
    }

    if default.is_empty() {
        print!("{}: ", prompt);
    } else {
        print!("{} [{}]: ", prompt, default);
    }
    Ok(non_empty(read_line()?))
}

/// Like [`prompt_with_default`], but answering `-` yields `Some("")`
///
/// For optional fields, where an empty answer already means "keep".
pub fn prompt_clearable(prompt: &str, default: &str) -> Result<Option<String>> {
    let prompt = format!("{} (- to clear)", prompt);
    Ok(clear_marker(prompt_with_default(&prompt, default)?))
}

fn clear_marker(input: Option<String>) -> Option<String> {
    match input {
        Some(text) if text == "-" => Some(String::new()),
        other => other,
    }
}

fn is_yes(input: &str) -> bool {
    let input = input.to_lowercase();
    input == "y" || input == "yes"
}

fn non_empty(input: String) -> Option<String> {
    if input.is_empty() {
        None
    } else {
        Some(input)
    }
}

/// Split `a, b,,c` into trimmed, non-empty tags
pub fn parse_tag_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

//! Link command handlers

use std::path::Path;

use anyhow::{bail, Context, Result};

use smasher_core::{Link, LinkInput, LinkPatch, LinkRepository};

use crate::output::{short_id, Output};
use crate::prompt::{confirm, parse_tag_list, prompt_clearable, prompt_with_default};

/// Field changes requested on the command line
#[derive(Debug, Default)]
pub struct LinkEdits {
    pub url: Option<String>,
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
}

impl LinkEdits {
    fn into_patch(self) -> LinkPatch {
        LinkPatch {
            url: self.url,
            title: self.title,
            tags: self.tags,
            notes: self.notes,
            ..LinkPatch::default()
        }
    }
}

/// Save a link, merging into the existing entry for the same URL
pub async fn add(
    links: &LinkRepository,
    url: String,
    title: Option<String>,
    tags: Vec<String>,
    notes: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut input = LinkInput::new(url).tags(tags);
    if let Some(title) = title {
        input = input.title(title);
    }
    if let Some(notes) = notes {
        input = input.notes(notes);
    }

    let link = links.add(input).await.context("Failed to save link")?;

    output.success(&format!("Saved link: {}", link.id));
    output.print_link(&link);

    Ok(())
}

/// List all links, optionally only those for one hostname
pub async fn list(links: &LinkRepository, host: Option<String>, output: &Output) -> Result<()> {
    let found = match host {
        Some(ref h) => links.get_by_hostname(h).await?,
        None => links.get_all().await?,
    };

    output.print_links(&found);
    Ok(())
}

/// Show a single link
pub async fn show(links: &LinkRepository, id: String, output: &Output) -> Result<()> {
    let link = find_link(links, &id).await?;
    output.print_link(&link);
    Ok(())
}

/// Edit a link
///
/// With no field flags in human mode, each field is prompted for.
pub async fn edit(
    links: &LinkRepository,
    id: String,
    edits: LinkEdits,
    output: &Output,
) -> Result<()> {
    let link = find_link(links, &id).await?;

    let mut patch = edits.into_patch();
    if patch.is_empty() && output.should_prompt() {
        patch = prompt_for_patch(&link)?;
    }
    if patch.is_empty() {
        output.message("Nothing to change.");
        return Ok(());
    }

    let updated = links
        .update(&link.id, patch)
        .await
        .context("Failed to update link")?
        .ok_or_else(|| anyhow::anyhow!("Link not found: {}", id))?;

    output.success("Link updated");
    output.print_link(&updated);

    Ok(())
}

fn prompt_for_patch(link: &Link) -> Result<LinkPatch> {
    println!("Editing link: {}", link.id);
    println!("Press Enter to keep current value, or type new value.\n");

    let title = prompt_with_default("Title", &link.title)?;
    let url = prompt_with_default("URL", &link.url)?;
    let tags = prompt_clearable("Tags (comma-separated)", &link.tags.join(", "))?;
    let notes = prompt_clearable("Notes", link.notes.as_deref().unwrap_or(""))?;
    Ok(patch_from_answers(title, url, tags, notes))
}

/// Build a patch from prompt answers; `None` keeps a field, `Some("")` clears it
fn patch_from_answers(
    title: Option<String>,
    url: Option<String>,
    tags: Option<String>,
    notes: Option<String>,
) -> LinkPatch {
    LinkPatch {
        title,
        url,
        tags: tags.map(|t| parse_tag_list(&t)),
        notes,
        ..LinkPatch::default()
    }
}

/// Delete a link
pub async fn delete(links: &LinkRepository, id: String, yes: bool, output: &Output) -> Result<()> {
    let link = find_link(links, &id).await?;

    // Confirm deletion
    if !yes && output.should_prompt() {
        println!("Delete link: {} - {}", short_id(&link.id), link.title);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    links
        .delete(&link.id)
        .await
        .context("Failed to delete link")?;

    output.success(&format!("Deleted link: {}", link.id));

    Ok(())
}

/// Search links
pub async fn search(links: &LinkRepository, query: String, output: &Output) -> Result<()> {
    let found = links.search(&query).await?;
    output.print_links(&found);
    Ok(())
}

/// Open a link in the default browser
pub async fn open(links: &LinkRepository, id: String, output: &Output) -> Result<()> {
    let link = find_link(links, &id).await?;

    open::that(&link.url).with_context(|| format!("Failed to open {}", link.url))?;

    output.message(&format!("Opened {}", link.url));
    Ok(())
}

/// Export the whole collection as JSON
pub async fn export(links: &LinkRepository, path: Option<&Path>, output: &Output) -> Result<()> {
    let json = links.export_all().await.context("Failed to export links")?;

    match path {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write export file: {:?}", path))?;
            output.success(&format!("Exported links to {}", path.display()));
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Import links from a JSON export
pub async fn import(links: &LinkRepository, path: &Path, output: &Output) -> Result<()> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read import file: {:?}", path))?;

    let added = links
        .import_all(&text)
        .await
        .context("Failed to import links")?;

    if output.is_json() {
        println!("{}", serde_json::json!({"imported": added}));
    } else {
        output.success(&format!("Imported {} link(s)", added));
    }

    Ok(())
}

/// Resolve a full id or unique id prefix to a link
async fn find_link(links: &LinkRepository, id: &str) -> Result<Link> {
    let all = links.get_all().await?;
    resolve_link_id(all, id)
}

fn resolve_link_id(all: Vec<Link>, id: &str) -> Result<Link> {
    if id.is_empty() {
        bail!("Link ID cannot be empty");
    }

    // Exact match first
    if let Some(link) = all.iter().find(|l| l.id == id) {
        return Ok(link.clone());
    }

    let mut matches: Vec<Link> = all.into_iter().filter(|l| l.id.starts_with(id)).collect();

    match matches.len() {
        0 => bail!("No link found matching: {}", id),
        1 => Ok(matches.remove(0)),
        _ => {
            eprintln!("Multiple links match '{}':", id);
            for link in &matches {
                eprintln!("  {} - {}", link.id, link.title);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

//! Tag command handlers

use anyhow::Result;

use smasher_core::LinkRepository;

use crate::output::Output;

/// List all tags with usage counts
pub async fn list(links: &LinkRepository, output: &Output) -> Result<()> {
    let tags = links.tags_with_counts().await?;
    output.print_tags(&tags);
    Ok(())
}

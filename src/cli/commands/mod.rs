//! Subcommand handlers.

pub mod lineage;
pub mod run;

use anyhow::{bail, Context, Result};
use clap::Args;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::adapters::{ChangesetListSource, CommitPositionSource};
use crate::domain::models::{Lineage, RevisionId};

/// Revision range selection shared by the subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct LineageSelection {
    /// Oldest commit position (expected to show the old behavior)
    #[arg(long, requires = "upper", conflicts_with = "revisions_file")]
    pub lower: Option<u64>,

    /// Newest commit position (expected to show the new behavior)
    #[arg(long, requires = "lower")]
    pub upper: Option<u64>,

    /// File with one changeset id per line, oldest first
    #[arg(long)]
    pub revisions_file: Option<PathBuf>,

    /// Restrict evaluation targets to the ids listed in this file
    #[arg(long)]
    pub targets_file: Option<PathBuf>,
}

impl LineageSelection {
    pub fn build_lineage(&self) -> Result<Lineage> {
        let targets = self
            .targets_file
            .as_deref()
            .map(read_ids)
            .transpose()?
            .map(|ids| ids.into_iter().collect::<HashSet<_>>());

        let lineage = match (&self.revisions_file, self.lower, self.upper) {
            (Some(path), _, _) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let source = ChangesetListSource::parse(&text)
                    .with_context(|| format!("Invalid revisions file {}", path.display()))?;
                let (Some(first), Some(last)) = (source.first(), source.last()) else {
                    bail!("{} lists no revisions", path.display());
                };
                Lineage::from_source(&source, first, last, targets.as_ref())?
            }
            (None, Some(lower), Some(upper)) => {
                if lower >= upper {
                    bail!("--lower ({lower}) must be below --upper ({upper})");
                }
                Lineage::from_source(
                    &CommitPositionSource,
                    &RevisionId::Position(lower),
                    &RevisionId::Position(upper),
                    targets.as_ref(),
                )?
            }
            _ => bail!("Select revisions with --lower/--upper or --revisions-file"),
        };
        Ok(lineage)
    }
}

fn read_ids(path: &Path) -> Result<Vec<RevisionId>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.parse::<RevisionId>().map_err(Into::into))
        .collect()
}

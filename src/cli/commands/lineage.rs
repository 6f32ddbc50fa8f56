//! `bci lineage`: print a revision range without evaluating it.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::LineageSelection;
use crate::cli::output::{output, CommandOutput};
use crate::cli::table::TableFormatter;
use crate::domain::models::{Lineage, Revision};

#[derive(Args, Debug)]
pub struct LineageArgs {
    #[command(flatten)]
    pub selection: LineageSelection,
}

#[derive(Debug, Serialize)]
pub struct LineageRow {
    pub index: usize,
    #[serde(flatten)]
    pub revision: Revision,
    pub parents: Vec<usize>,
    pub result: String,
}

#[derive(Debug, Serialize)]
pub struct LineageOutput {
    pub total: usize,
    pub targets: usize,
    pub revisions: Vec<LineageRow>,
    #[serde(skip)]
    rendered: String,
}

impl From<&Lineage> for LineageOutput {
    fn from(lineage: &Lineage) -> Self {
        let revisions: Vec<LineageRow> = lineage
            .results()
            .enumerate()
            .map(|(index, (revision, result))| LineageRow {
                index,
                revision: revision.clone(),
                parents: lineage
                    .links(index)
                    .map(|links| links.parents.clone())
                    .unwrap_or_default(),
                result: result.to_string(),
            })
            .collect();
        Self {
            total: revisions.len(),
            targets: revisions.iter().filter(|r| r.revision.evaluation_target).count(),
            revisions,
            rendered: TableFormatter::new().format_lineage(lineage),
        }
    }
}

impl CommandOutput for LineageOutput {
    fn to_human(&self) -> String {
        format!(
            "{} revision(s), {} evaluation target(s):\n{}",
            self.total, self.targets, self.rendered
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: LineageArgs, json_mode: bool) -> Result<()> {
    let lineage = args.selection.build_lineage()?;
    output(&LineageOutput::from(&lineage), json_mode);
    Ok(())
}

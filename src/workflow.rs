use crate::config::Settings;
use crate::error::Result;
use crate::report::Report;
use crate::{column_registry, column_stats, table_registry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Tables,
    Columns,
    Stats,
    /// Tables, then columns, then stats; stops at the first failure.
    All,
}

pub async fn run(stage: Stage, settings: &Settings, report: &mut Report) -> Result<()> {
    match stage {
        Stage::Tables => table_registry::run(settings, report).await.map(drop),
        Stage::Columns => column_registry::run(settings, report).await.map(drop),
        Stage::Stats => column_stats::run(settings, report).map(drop),
        Stage::All => {
            table_registry::run(settings, report).await?;
            column_registry::run(settings, report).await?;
            column_stats::run(settings, report)?;
            Ok(())
        }
    }
}

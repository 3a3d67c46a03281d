//! The `mosaic show` and `mosaic delete` commands.

use clap::Args;
use mosaic_core::Config;

use super::catalog;
use super::output::Output;

/// Arguments for the `show` command.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Image id
    #[arg(required = true)]
    pub id: String,
}

/// Arguments for the `delete` command.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Image id
    #[arg(required = true)]
    pub id: String,
}

/// Execute the show command.
pub async fn execute_show(args: ShowArgs, config: &Config, output: &Output) -> anyhow::Result<()> {
    let id = catalog::parse_id(&args.id)?;
    let service = catalog::open(config).await?;
    let record = service.get(&id).await?;
    output.emit(&record)
}

/// Execute the delete command. Prints the removed record.
pub async fn execute_delete(
    args: DeleteArgs,
    config: &Config,
    output: &Output,
) -> anyhow::Result<()> {
    let id = catalog::parse_id(&args.id)?;
    let service = catalog::open(config).await?;
    let record = service.delete(&id).await?;
    tracing::info!("Deleted {id}");
    output.emit(&record)
}

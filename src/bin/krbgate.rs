use anyhow::Result;
use krbgate::cli;

#[tokio::main]
async fn main() -> Result<()> {
    let action = cli::start()?;

    action.execute().await?;

    Ok(())
}

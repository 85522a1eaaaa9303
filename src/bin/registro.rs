use anyhow::Result;
use registro::cli;

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    // Start the program
    let action = cli::start()?;

    action.execute().await?;

    Ok(())
}

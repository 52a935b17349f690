use anyhow::Context;
use prtg_reconciler::{load, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = std::env::args_os()
        .nth(1)
        .context("usage: prtg-reconciler <desired-state.yaml>")?;
    let file = load(&path).with_context(|| format!("failed to load {path:?}"))?;

    let result = run(file).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.failed {
        std::process::exit(1);
    }

    Ok(())
}

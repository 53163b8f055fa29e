use anyhow::{Context, bail};
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use openai_text_api::{Args, metrics, openai_text_api};

// the JSON parameters for this run, from --params or --prompt
fn load_parameters(args: &Args) -> anyhow::Result<Value> {
    if let Some(path) = &args.params {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        return serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()));
    }

    match args.prompt_parameters()? {
        Some(parameters) => Ok(parameters),
        None => bail!("either --params or --prompt with --model is required"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // logs go to stderr, stdout carries only the result
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let parameters = load_parameters(&args)?;
    let config = args.dispatch_config();

    let result = openai_text_api(args.mode, parameters, &config).await;

    if args.metrics {
        eprint!("{}", metrics::render());
    }

    let entry = result.context("request failed")?;
    println!("{}", serde_json::to_string_pretty(&entry)?);
    Ok(())
}

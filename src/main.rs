use clap::Parser;
use log::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use address_standardizer::cli::{Cli, Command, IoArgs, VerifyArgs, DEFAULT_PARSED_OUTPUT, DEFAULT_STANDARDIZED_OUTPUT};
use address_standardizer::pipeline::{process, Layout, PipelineOptions};
use address_standardizer::samples::write_samples;
use address_standardizer::verify::Verify;

#[tokio::main]
async fn main() {
    install_tracing();

    match run(Cli::parse()).await {
        Err(e) => {
            error!("Error: {:?}", e);
            std::process::exit(1);
        }
        _ => {}
    }
}

/// logs go to stderr, stdout may carry CSV
fn install_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(ErrorLayer::default())
        .init();
}

async fn run(cli: Cli) -> color_eyre::Result<()> {
    color_eyre::install()?;

    match cli.command {
        Command::Standardize(args) => {
            let options = PipelineOptions {
                layout: Layout::Components { columns: args.columns },
                prefix: args.prefix,
                throttle: args.verify.throttle(),
                concurrency: usize::from(args.verify.concurrency),
            };
            process_file(&args.io, DEFAULT_STANDARDIZED_OUTPUT, &options, &args.verify).await
        }
        Command::Parse(args) => {
            let options = PipelineOptions {
                layout: Layout::FullAddress { column: args.column },
                prefix: args.prefix,
                throttle: args.verify.throttle(),
                concurrency: usize::from(args.verify.concurrency),
            };
            process_file(&args.io, DEFAULT_PARSED_OUTPUT, &options, &args.verify).await
        }
        Command::Samples(args) => {
            let verifier = args.verify.build_verifier()?;
            write_samples(std::io::stdout(), verifier.as_ref()).await?;
            Ok(())
        }
    }
}

async fn process_file(
    io: &IoArgs,
    default_output: &str,
    options: &PipelineOptions,
    verify: &VerifyArgs,
) -> color_eyre::Result<()> {
    let verifier = verify.build_verifier()?;
    if let Some(verifier) = &verifier {
        info!("verifying addresses with [{}]", verifier.name());
    }

    let (input, output, target) = io.open(default_output)?;
    let summary = process(input, output, options, verifier.as_ref()).await?;

    info!(
        "processed [{}] rows, [{}] verified, [{}] fell back to local normalization",
        summary.rows, summary.verified, summary.fallbacks
    );
    info!("output written to [{}]", target);
    Ok(())
}

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::WrapErr;
use log::warn;
use crate::record::COMPONENT_NAMES;
use crate::verify::smarty::SmartyClientProxy;
use crate::verify::usps::UspsClient;
use crate::verify::Verifier;

pub const DEFAULT_STANDARDIZED_OUTPUT: &str = "standardized_output.csv";
pub const DEFAULT_PARSED_OUTPUT: &str = "parsed_output.csv";

#[derive(Debug, Parser)]
#[command(
    name = "addrstd",
    version,
    about = "Normalize U.S. mailing addresses in CSV files, optionally verifying them remotely"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Normalize addresses spread over five columns.
    Standardize(StandardizeArgs),

    /// Split and normalize addresses held in a single free-text column.
    Parse(ParseArgs),

    /// Print the built-in sample addresses with their normalization.
    Samples(SamplesArgs),
}

#[derive(Debug, Args)]
pub struct StandardizeArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// Input column names, in order: street, secondary, city, state, zip.
    #[arg(long, value_name = "A,B,C,D,E", default_value = "address1,address2,city,state,zip", value_parser = parse_columns)]
    pub columns: [String; 5],

    /// Prefix of the generated columns.
    #[arg(long, default_value = "std_")]
    pub prefix: String,

    #[command(flatten)]
    pub verify: VerifyArgs,
}

#[derive(Debug, Args)]
pub struct ParseArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// Column holding the full address (matched case-insensitively).
    #[arg(long, default_value = "FullAddress")]
    pub column: String,

    /// Prefix of the generated columns.
    #[arg(long, default_value = "parsed_")]
    pub prefix: String,

    #[command(flatten)]
    pub verify: VerifyArgs,
}

#[derive(Debug, Args)]
pub struct SamplesArgs {
    #[command(flatten)]
    pub verify: VerifyArgs,
}

#[derive(Debug, Args)]
pub struct IoArgs {
    /// Input CSV file; `-` or absent reads stdin.
    pub input: Option<PathBuf>,

    /// Output CSV file; `-` writes stdout.
    pub output: Option<PathBuf>,
}

impl IoArgs {
    /// Where output goes, `None` meaning stdout.
    ///
    /// Without an explicit output, reading stdin writes stdout and reading a
    /// file writes `default_output`.
    pub fn output_path(&self, default_output: &str) -> Option<PathBuf> {
        match (&self.input, &self.output) {
            (_, Some(output)) if is_stdio(output) => None,
            (_, Some(output)) => Some(output.clone()),
            (Some(input), None) if !is_stdio(input) => Some(PathBuf::from(default_output)),
            _ => None,
        }
    }

    /// open input and output, returning a printable name of the output
    pub fn open(&self, default_output: &str) -> color_eyre::Result<(Box<dyn Read>, Box<dyn Write>, String)> {
        let input: Box<dyn Read> = match &self.input {
            Some(path) if !is_stdio(path) => Box::new(
                File::open(path).wrap_err_with(|| format!("cannot open input [{}]", path.display()))?,
            ),
            _ => Box::new(std::io::stdin()),
        };

        let (output, target): (Box<dyn Write>, String) = match self.output_path(default_output) {
            Some(path) => (Box::new(create_file(&path)?), path.display().to_string()),
            None => (Box::new(std::io::stdout()), "stdout".to_string()),
        };
        Ok((input, output, target))
    }
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn create_file(path: &Path) -> color_eyre::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    File::create(path).wrap_err_with(|| format!("cannot create output [{}]", path.display()))
}

fn parse_columns(raw: &str) -> Result<[String; 5], String> {
    let names = raw
        .split(',')
        .map(|name| name.trim().to_string())
        .collect::<Vec<_>>();
    let names: [String; 5] = names
        .try_into()
        .map_err(|names: Vec<String>| format!("expected 5 column names ({}), got {}", COMPONENT_NAMES.join(","), names.len()))?;
    if names.iter().any(String::is_empty) {
        return Err("column names cannot be empty".to_string());
    }
    Ok(names)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VerifierKind {
    Usps,
    Smarty,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Remote service used to verify normalized addresses.
    #[arg(long, value_enum, default_value = "usps")]
    pub verifier: VerifierKind,

    /// Only normalize locally.
    #[arg(long)]
    pub no_verify: bool,

    /// USPS Web Tools user id.
    #[arg(long, env = "USPS_USERID", hide_env_values = true)]
    pub usps_userid: Option<String>,

    /// Smarty accounts as `ID=SECRET[,ID=SECRET]*`.
    #[arg(long, env = "SMARTY_CREDENTIALS", hide_env_values = true)]
    pub smarty_credentials: Option<String>,

    /// Milliseconds to wait after every remote call.
    #[arg(long, default_value_t = 200)]
    pub throttle_ms: u64,

    /// Timeout of a single USPS request, in seconds.
    #[arg(long, default_value_t = 15)]
    pub timeout_secs: u64,

    /// Extra attempts after a transient USPS failure.
    #[arg(long, default_value_t = 0)]
    pub retries: usize,

    /// Remote calls in flight at once; output keeps input order.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: u16,
}

impl VerifyArgs {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// The configured verifier, or `None` for local-only normalization.
    ///
    /// Missing credentials are not an error: a warning is logged and the run
    /// continues without verification.
    pub fn build_verifier(&self) -> color_eyre::Result<Option<Verifier>> {
        if self.no_verify {
            return Ok(None);
        }

        match self.verifier {
            VerifierKind::Usps => {
                let Some(user_id) = non_blank(&self.usps_userid) else {
                    warn!("no USPS user id (--usps-userid or USPS_USERID), using local normalization only");
                    return Ok(None);
                };
                let client = UspsClient::new(user_id, Duration::from_secs(self.timeout_secs), self.retries)?;
                Ok(Some(Verifier::Usps(client)))
            }
            VerifierKind::Smarty => {
                let Some(raw) = non_blank(&self.smarty_credentials) else {
                    warn!("no Smarty credentials (--smarty-credentials or SMARTY_CREDENTIALS), using local normalization only");
                    return Ok(None);
                };
                let credentials = SmartyClientProxy::parse_credentials(raw)?;
                Ok(Some(Verifier::Smarty(SmartyClientProxy::new(&credentials)?)))
            }
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use super::*;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(args.iter().copied()).unwrap().command
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn standardize_defaults() {
        let Command::Standardize(args) = parse(&["addrstd", "standardize", "--no-verify"]) else {
            panic!("expected standardize");
        };
        assert_eq!(args.columns, COMPONENT_NAMES.map(String::from));
        assert_eq!(args.prefix, "std_");
        assert_eq!(args.verify.throttle(), Duration::from_millis(200));
        assert_eq!(args.verify.concurrency, 1);
        assert!(args.verify.build_verifier().unwrap().is_none());
    }

    #[test]
    fn columns_are_trimmed_and_counted() {
        let Command::Standardize(args) = parse(&["addrstd", "standardize", "--columns", "Street, Unit ,Town,St,Postal"]) else {
            panic!("expected standardize");
        };
        assert_eq!(args.columns, ["Street", "Unit", "Town", "St", "Postal"].map(String::from));

        assert!(Cli::try_parse_from(["addrstd", "standardize", "--columns", "a,b,c"]).is_err());
        assert!(Cli::try_parse_from(["addrstd", "standardize", "--columns", "a,,c,d,e"]).is_err());
    }

    #[test]
    fn parse_defaults() {
        let Command::Parse(args) = parse(&["addrstd", "parse", "in.csv"]) else {
            panic!("expected parse");
        };
        assert_eq!(args.column, "FullAddress");
        assert_eq!(args.prefix, "parsed_");
        assert_eq!(args.io.output_path(DEFAULT_PARSED_OUTPUT), Some(PathBuf::from("parsed_output.csv")));
    }

    #[test]
    fn output_follows_input() {
        let io = |input: Option<&str>, output: Option<&str>| IoArgs {
            input: input.map(PathBuf::from),
            output: output.map(PathBuf::from),
        };
        let default = DEFAULT_STANDARDIZED_OUTPUT;

        assert_eq!(io(None, None).output_path(default), None);
        assert_eq!(io(Some("-"), None).output_path(default), None);
        assert_eq!(io(Some("in.csv"), None).output_path(default), Some(PathBuf::from(default)));
        assert_eq!(io(Some("in.csv"), Some("-")).output_path(default), None);
        assert_eq!(io(None, Some("out.csv")).output_path(default), Some(PathBuf::from("out.csv")));
    }

    #[test]
    fn blank_credentials_fall_back_to_local() {
        let Command::Standardize(args) = parse(&["addrstd", "standardize", "--usps-userid", " "]) else {
            panic!("expected standardize");
        };
        assert!(args.verify.build_verifier().unwrap().is_none());

        let Command::Parse(args) = parse(&["addrstd", "parse", "--verifier", "smarty", "--smarty-credentials", ""]) else {
            panic!("expected parse");
        };
        assert!(args.verify.build_verifier().unwrap().is_none());
    }

    #[test]
    fn malformed_smarty_credentials_are_rejected() {
        let Command::Samples(args) = parse(&["addrstd", "samples", "--verifier", "smarty", "--smarty-credentials", "no-secret"]) else {
            panic!("expected samples");
        };
        assert!(args.verify.build_verifier().is_err());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        assert!(Cli::try_parse_from(["addrstd", "standardize", "--concurrency", "0"]).is_err());
    }
}

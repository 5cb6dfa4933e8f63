use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "nxdb",
    about = "Nxdb: evaluate queries and inspect configuration",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Evaluate a query expression
    Query(QueryArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct QueryArgs {
    pub expression: String,
    /// Bind a variable: `name=value`
    #[arg(long = "var", value_parser = parse_binding)]
    pub vars: Vec<(String, String)>,
    /// Bind a collection: `name=v1,v2`; an empty name sets the default
    /// collection
    #[arg(long = "collection", value_parser = parse_binding)]
    pub collections: Vec<(String, String)>,
    /// Initial context as comma-separated values
    #[arg(long)]
    pub context: Option<String>,
}

#[derive(Args)]
pub struct ConfigArgs {}

/// Split `name=value` at the first `=`.
pub fn parse_binding(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query() {
        let cli = Cli::try_parse_from(["nxdb", "query", "$x + 1", "--var", "x=5"]).unwrap();
        if let Command::Query(args) = cli.command {
            assert_eq!(args.expression, "$x + 1");
            assert_eq!(args.vars, vec![("x".to_string(), "5".to_string())]);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_collections_and_context() {
        let cli = Cli::try_parse_from([
            "nxdb", "query", ".", "--collection", "=1,2,3", "--collection", "n=4", "--context", "7",
        ])
        .unwrap();
        if let Command::Query(args) = cli.command {
            assert_eq!(
                args.collections,
                vec![("".to_string(), "1,2,3".to_string()), ("n".to_string(), "4".to_string())]
            );
            assert_eq!(args.context, Some("7".into()));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn binding_without_equals_rejected() {
        assert!(Cli::try_parse_from(["nxdb", "query", "1", "--var", "x"]).is_err());
    }

    #[test]
    fn value_may_contain_equals() {
        assert_eq!(parse_binding("s=a=b").unwrap(), ("s".to_string(), "a=b".to_string()));
    }

    #[test]
    fn parse_config_with_path() {
        let cli = Cli::try_parse_from(["nxdb", "config", "--config", "nxdb.toml"]).unwrap();
        assert!(matches!(cli.command, Command::Config(_)));
        assert_eq!(cli.config, Some(PathBuf::from("nxdb.toml")));
    }

    #[test]
    fn parse_verbose_count() {
        let cli = Cli::try_parse_from(["nxdb", "-vv", "config"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["nxdb", "--format", "json", "query", "1"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}

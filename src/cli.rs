//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "servatrice")]
#[command(version, about = "Servatrice game server", long_about = None)]
pub struct Args {
    /// Run the random number generator quality test at startup
    #[arg(long)]
    pub test_random: bool,

    /// Run the password hash benchmark at startup
    #[arg(long)]
    pub test_hash: bool,

    /// Mirror diagnostics to the console until the server is initialized
    #[arg(long)]
    pub log_to_console: bool,

    /// Settings file to use instead of the default search path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_flags() {
        let args = Args::parse_from([
            "servatrice",
            "--test-random",
            "--test-hash",
            "--log-to-console",
            "--config",
            "/tmp/servatrice.toml",
        ]);
        assert!(args.test_random && args.test_hash && args.log_to_console);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/servatrice.toml")));
    }

    #[test]
    fn flags_default_off() {
        let args = Args::parse_from(["servatrice"]);
        assert!(!args.test_random && !args.test_hash && !args.log_to_console);
        assert!(args.config.is_none());
    }
}

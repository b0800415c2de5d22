//! Command-line arguments of the `simulated-perception` and
//! `integrity-check` binaries.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "simulated-perception")]
#[command(about = "Crop ground-truth cones to a sensor field of view and republish them")]
pub struct PerceptionArgs {
    /// Record all bus traffic into this session database
    #[arg(long, value_name = "SESSION.db3")]
    pub record: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(name = "integrity-check")]
#[command(about = "Check recorded session databases for missing or empty streams")]
pub struct IntegrityArgs {
    /// Session databases to check
    #[arg(required = true, value_name = "SESSION.db3")]
    pub databases: Vec<PathBuf>,
}

/// Exit code for an argument error: 0 for `--help`/`--version`, 1 otherwise.
pub fn exit_code_for(err: &clap::Error) -> u8 {
    if err.use_stderr() { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_is_opt_in() {
        let args = PerceptionArgs::try_parse_from(["simulated-perception"]).unwrap();
        assert_eq!(args.record, None);

        let args =
            PerceptionArgs::try_parse_from(["simulated-perception", "--record", "lap1.db3"])
                .unwrap();
        assert_eq!(args.record, Some(PathBuf::from("lap1.db3")));
    }

    #[test]
    fn databases_are_collected_in_order() {
        let args =
            IntegrityArgs::try_parse_from(["integrity-check", "a.db3", "runs/b.db3"]).unwrap();
        assert_eq!(
            args.databases,
            vec![PathBuf::from("a.db3"), PathBuf::from("runs/b.db3")]
        );
    }

    #[test]
    fn no_databases_exits_with_one() {
        let err = IntegrityArgs::try_parse_from(["integrity-check"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        assert_eq!(exit_code_for(&err), 1);
    }

    #[test]
    fn help_exits_with_zero() {
        let err = IntegrityArgs::try_parse_from(["integrity-check", "--help"]).unwrap_err();
        assert_eq!(exit_code_for(&err), 0);
    }
}

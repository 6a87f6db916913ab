//! CLI parse tests.

use super::{Cli, CliCommand};
use clap::Parser;
use std::path::PathBuf;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn cli_parse_run_with_urls() {
    let cli = parse(&["fetchpool", "run", "https://v.test/1", "https://v.test/2"]);
    assert!(!cli.verbose);
    match cli.command {
        CliCommand::Run {
            urls,
            input,
            min_workers,
            max_workers,
            deadline,
            ..
        } => {
            assert_eq!(urls, vec!["https://v.test/1", "https://v.test/2"]);
            assert!(input.is_none());
            assert!(min_workers.is_none());
            assert!(max_workers.is_none());
            assert!(deadline.is_none());
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_with_overrides() {
    let cli = parse(&[
        "fetchpool",
        "run",
        "--input",
        "list.txt",
        "--min-workers",
        "1",
        "--max-workers",
        "4",
        "-o",
        "/tmp/out",
        "--deadline",
        "60",
        "-v",
    ]);
    assert!(cli.verbose);
    match cli.command {
        CliCommand::Run {
            urls,
            input,
            min_workers,
            max_workers,
            output_dir,
            deadline,
        } => {
            assert!(urls.is_empty());
            assert_eq!(input, Some(PathBuf::from("list.txt")));
            assert_eq!(min_workers, Some(1));
            assert_eq!(max_workers, Some(4));
            assert_eq!(output_dir, Some(PathBuf::from("/tmp/out")));
            assert_eq!(deadline, Some(60));
        }
        _ => panic!("expected Run with overrides"),
    }
}

#[test]
fn cli_parse_status_and_reset() {
    assert!(matches!(parse(&["fetchpool", "status"]).command, CliCommand::Status));
    assert!(matches!(
        parse(&["fetchpool", "reset-history"]).command,
        CliCommand::ResetHistory
    ));
}

#[test]
fn cli_rejects_non_numeric_workers() {
    assert!(Cli::try_parse_from(["fetchpool", "run", "--min-workers", "many"]).is_err());
}

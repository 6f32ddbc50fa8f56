use bci::cli::{Cli, Commands};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn test_parse_run_with_positions() {
    let cli = Cli::try_parse_from([
        "bci",
        "run",
        "--lower",
        "1000",
        "--upper",
        "1100",
        "--framework",
        "custom",
        "--automation",
        "selenium",
        "--browser",
        "chromium",
        "--mech-group",
        "Set-Cookie",
        "--strategy",
        "comp_search",
        "--sequence-limit",
        "12",
    ])
    .unwrap();

    assert!(!cli.json);
    match cli.command {
        Commands::Run(args) => {
            assert_eq!(args.selection.lower, Some(1000));
            assert_eq!(args.selection.upper, Some(1100));
            assert_eq!(args.strategy.as_deref(), Some("comp_search"));
            assert_eq!(args.sequence_limit, Some(12));
            assert_eq!(args.config_option, "default");
            assert!(args.concurrency.is_none());
        }
        other => panic!("Wrong command: {other:?}"),
    }
}

#[test]
fn test_parse_lineage_from_file_with_global_flags() {
    let cli = Cli::try_parse_from([
        "bci",
        "lineage",
        "--revisions-file",
        "revs.txt",
        "--json",
        "--config",
        "custom.yaml",
    ])
    .unwrap();

    assert!(cli.json);
    assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
    match cli.command {
        Commands::Lineage(args) => {
            assert_eq!(args.selection.revisions_file, Some(PathBuf::from("revs.txt")));
            assert!(args.selection.lower.is_none());
        }
        other => panic!("Wrong command: {other:?}"),
    }
}

#[test]
fn test_lower_requires_upper() {
    assert!(Cli::try_parse_from(["bci", "lineage", "--lower", "5"]).is_err());
}

#[test]
fn test_positions_conflict_with_revisions_file() {
    let result = Cli::try_parse_from([
        "bci",
        "lineage",
        "--lower",
        "1",
        "--upper",
        "2",
        "--revisions-file",
        "revs.txt",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_run_requires_a_mechanism_group() {
    let result = Cli::try_parse_from([
        "bci",
        "run",
        "--lower",
        "1",
        "--upper",
        "9",
        "--framework",
        "custom",
        "--automation",
        "selenium",
        "--browser",
        "chromium",
    ]);
    assert!(result.is_err());
}

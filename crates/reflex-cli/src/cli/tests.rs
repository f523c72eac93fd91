use super::*;
use clap::Parser;
use reflex_core::GraphFormat;

#[test]
fn root_defaults_to_dot_reflex() {
    let cli = Cli::try_parse_from(["reflex-cli", "rule", "list"]).expect("parse");
    assert_eq!(cli.root, PathBuf::from(".reflex"));
    assert!(matches!(
        cli.command,
        Commands::Rule(RuleArgs {
            command: RuleCommand::List
        })
    ));
}

#[test]
fn compile_parses_explicit_format() {
    let cli = Cli::try_parse_from([
        "reflex-cli",
        "compile",
        "--graph",
        "rules/cd4.txt",
        "--format",
        "yaml",
    ])
    .expect("parse");
    match cli.command {
        Commands::Compile(args) => {
            assert_eq!(args.graph, PathBuf::from("rules/cd4.txt"));
            assert_eq!(args.format, Some(GraphFormat::Yaml));
        }
        _ => panic!("expected compile command"),
    }
}

#[test]
fn compile_rejects_unknown_format() {
    let parsed = Cli::try_parse_from([
        "reflex-cli",
        "compile",
        "--graph",
        "g.json",
        "--format",
        "xml",
    ]);
    assert!(parsed.is_err(), "xml is not a graph format");
}

#[test]
fn rule_save_parses_header_fields() {
    let cli = Cli::try_parse_from([
        "reflex-cli",
        "--root",
        "/tmp/reflex",
        "rule",
        "save",
        "--graph",
        "g.json",
        "--name",
        "CD4 reflex",
        "--uid",
        "cd4",
        "--priority",
        "-3",
    ])
    .expect("parse");
    assert_eq!(cli.root, PathBuf::from("/tmp/reflex"));
    match cli.command {
        Commands::Rule(RuleArgs {
            command:
                RuleCommand::Save {
                    name,
                    uid,
                    priority,
                    description,
                    format,
                    ..
                },
        }) => {
            assert_eq!(name, "CD4 reflex");
            assert_eq!(uid.as_deref(), Some("cd4"));
            assert_eq!(priority, -3);
            assert!(description.is_empty());
            assert!(format.is_none());
        }
        _ => panic!("expected rule save command"),
    }
}

#[test]
fn rule_save_requires_name() {
    let parsed = Cli::try_parse_from(["reflex-cli", "rule", "save", "--graph", "g.json"]);
    assert!(parsed.is_err(), "name is required");
}

#[test]
fn rule_import_publish_flag_defaults_off() {
    let cli = Cli::try_parse_from(["reflex-cli", "rule", "import", "--dir", "graphs"]).expect("parse");
    match cli.command {
        Commands::Rule(RuleArgs {
            command: RuleCommand::Import { dir, publish },
        }) => {
            assert_eq!(dir, PathBuf::from("graphs"));
            assert!(!publish);
        }
        _ => panic!("expected rule import command"),
    }
}

#[test]
fn logs_limit_must_be_positive() {
    assert!(Cli::try_parse_from(["reflex-cli", "logs", "--limit", "0"]).is_err());
    let cli = Cli::try_parse_from(["reflex-cli", "logs"]).expect("parse");
    match cli.command {
        Commands::Logs(args) => assert_eq!(args.limit, 100),
        _ => panic!("expected logs command"),
    }
}

#[test]
fn run_requires_sample_path() {
    assert!(Cli::try_parse_from(["reflex-cli", "run"]).is_err());
    let cli = Cli::try_parse_from(["reflex-cli", "run", "--sample", "s.json"]).expect("parse");
    assert!(matches!(cli.command, Commands::Run(SampleArgs { .. })));
}

#[test]
fn retry_needs_both_the_sample_and_the_failed_report() {
    assert!(
        Cli::try_parse_from(["reflex-cli", "retry", "--sample", "s.json"]).is_err(),
        "--failed is required"
    );
    let cli = Cli::try_parse_from([
        "reflex-cli",
        "retry",
        "--sample",
        "s.json",
        "--failed",
        "run.json",
    ])
    .expect("parse");
    match cli.command {
        Commands::Retry(args) => {
            assert_eq!(args.sample, PathBuf::from("s.json"));
            assert_eq!(args.failed, PathBuf::from("run.json"));
        }
        _ => panic!("expected retry command"),
    }
}

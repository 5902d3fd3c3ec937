use super::*;

#[test]
fn parses_migrate_command() {
    let cli = Cli::try_parse_from(["revdb-cli", "migrate"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Migrate)));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["revdb-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn sweep_defaults_to_the_system_clock() {
    let cli = Cli::try_parse_from(["revdb-cli", "sweep"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Sweep { at: None })));
}

#[test]
fn sweep_accepts_a_pinned_instant() {
    let cli = Cli::try_parse_from(["revdb-cli", "sweep", "--at", "2026-10-18T03:00:00Z"]).unwrap();
    let Some(Commands::Sweep { at: Some(at) }) = cli.command else {
        panic!("expected sweep with --at");
    };
    assert_eq!(at.to_rfc3339(), "2026-10-18T03:00:00+00:00");
}

#[test]
fn sweep_rejects_garbage_instant() {
    assert!(Cli::try_parse_from(["revdb-cli", "sweep", "--at", "tomorrow"]).is_err());
}

#[test]
fn metrics_requires_a_uuid() {
    let id = "6f1c1d4e-9a52-4d8e-b0b5-3a1f2d7c9e10";
    let cli = Cli::try_parse_from(["revdb-cli", "metrics", "--user", id]).unwrap();
    let Some(Commands::Metrics { user }) = cli.command else {
        panic!("expected metrics");
    };
    assert_eq!(user.to_string(), id);

    assert!(Cli::try_parse_from(["revdb-cli", "metrics", "--user", "bob"]).is_err());
    assert!(Cli::try_parse_from(["revdb-cli", "metrics"]).is_err());
}

#[test]
fn activity_paging_defaults() {
    let id = "6f1c1d4e-9a52-4d8e-b0b5-3a1f2d7c9e10";
    let cli = Cli::try_parse_from(["revdb-cli", "activity", "--user", id]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Activity {
            page: 1,
            size: 20,
            ..
        })
    ));

    let cli = Cli::try_parse_from([
        "revdb-cli", "activity", "--user", id, "--page", "3", "--size", "50",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Activity {
            page: 3,
            size: 50,
            ..
        })
    ));
}

#[test]
fn register_parses_plan() {
    let cli = Cli::try_parse_from([
        "revdb-cli",
        "register",
        "--email",
        "owner@example.com",
        "--plan",
        "professional",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Register {
            plan: PlanType::Professional,
            ..
        })
    ));

    let cli =
        Cli::try_parse_from(["revdb-cli", "register", "--email", "owner@example.com"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Register {
            plan: PlanType::Free,
            ..
        })
    ));

    assert!(Cli::try_parse_from([
        "revdb-cli", "register", "--email", "x@example.com", "--plan", "gold",
    ])
    .is_err());
}

#[test]
fn create_brand_is_kebab_cased() {
    let id = "6f1c1d4e-9a52-4d8e-b0b5-3a1f2d7c9e10";
    let cli =
        Cli::try_parse_from(["revdb-cli", "create-brand", "--user", id, "--name", "Cafe"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::CreateBrand { .. })));
}

#[test]
fn durations_are_human_readable() {
    assert_eq!(commands::format_duration(5), "5s");
    assert_eq!(commands::format_duration(125), "2m 5s");
    assert_eq!(commands::format_duration(3725), "1h 2m 5s");
    assert_eq!(commands::format_duration(-60), "-1m 0s");
}

#[test]
fn page_count_rounds_up() {
    assert_eq!(commands::page_count(0, 20), 0);
    assert_eq!(commands::page_count(20, 20), 1);
    assert_eq!(commands::page_count(21, 20), 2);
}

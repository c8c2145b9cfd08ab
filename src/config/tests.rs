use clap::Parser;

use super::*;

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr, "127.0.0.1:4000".parse::<SocketAddr>().expect("addr"));
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.database.url, None);
    assert_eq!(settings.database.max_connections.get(), 8);
    assert_eq!(settings.templates.directory, PathBuf::from("templates"));
    assert_eq!(settings.templates.flush_threshold.get(), DEFAULT_FLUSH_THRESHOLD);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(5000);
    raw.logging.level = Some("info".to_string());
    raw.database.url = Some("postgres://from-file".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        database: DatabaseOverride {
            database_url: Some("postgres://from-cli".to_string()),
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.database.url.as_deref(), Some("postgres://from-cli"));
}

#[test]
fn blank_database_url_is_treated_as_absent() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.database.url, None);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn rejects_zero_port() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero port");
    assert!(matches!(err, LoadError::Invalid { key: "server.port", .. }));
}

#[test]
fn rejects_zero_pool_size() {
    let mut raw = RawSettings::default();
    raw.database.max_connections = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero pool");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "database.max_connections",
            ..
        }
    ));
}

#[test]
fn rejects_zero_flush_threshold() {
    let mut raw = RawSettings::default();
    raw.templates.flush_threshold_bytes = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero threshold");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "templates.flush_threshold_bytes",
            ..
        }
    ));
}

#[test]
fn rejects_empty_template_directory() {
    let mut raw = RawSettings::default();
    raw.templates.directory = Some(PathBuf::new());

    let err = Settings::from_raw(raw).expect_err("empty directory");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "templates.directory",
            ..
        }
    ));
}

#[test]
fn rejects_unparseable_log_level() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());

    let err = Settings::from_raw(raw).expect_err("bad level");
    assert!(matches!(err, LoadError::Invalid { key: "logging.level", .. }));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["snippetbox"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "snippetbox",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--templates-directory",
        "/srv/templates",
        "--templates-flush-threshold-bytes",
        "1024",
        "--database-url",
        "postgres://override",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.templates_directory.as_deref(),
                Some(std::path::Path::new("/srv/templates"))
            );
            assert_eq!(serve.overrides.templates_flush_threshold_bytes, Some(1024));
            assert_eq!(
                serve.overrides.database.database_url.as_deref(),
                Some("postgres://override")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_create_arguments() {
    let args = CliArgs::parse_from([
        "snippetbox",
        "create",
        "--title",
        "O snail",
        "--content",
        "Climb Mount Fuji",
        "--expires-days",
        "7",
        "--database-url",
        "postgres://example",
    ]);

    match args.command.expect("create command") {
        Command::Create(create) => {
            assert_eq!(create.title, "O snail");
            assert_eq!(create.content, "Climb Mount Fuji");
            assert_eq!(create.expires_days, 7);
            assert_eq!(
                create.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn create_defaults_to_one_year() {
    let args = CliArgs::parse_from([
        "snippetbox",
        "create",
        "--title",
        "t",
        "--content",
        "c",
    ]);

    match args.command.expect("create command") {
        Command::Create(create) => assert_eq!(create.expires_days, 365),
        _ => panic!("wrong command parsed"),
    }
}

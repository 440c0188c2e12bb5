pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

pub const CMD_LOGIN: &str = "login";

pub const ARG_BACKEND_URL: &str = "backend-url";
pub const ARG_ANON_KEY: &str = "anon-key";
pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_WATCH: &str = "watch";

fn login() -> Command {
    Command::new(CMD_LOGIN)
        .about("Sign in as an admin and check the dashboard gate")
        .arg(
            Arg::new(ARG_BACKEND_URL)
                .short('u')
                .long("backend-url")
                .help("Backend project URL, example: https://<project>.backend.example")
                .env("STOREFRONT_GATE_BACKEND_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ANON_KEY)
                .short('k')
                .long("anon-key")
                .help("Backend anonymous (public) API key")
                .env("STOREFRONT_GATE_ANON_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_EMAIL)
                .short('e')
                .long("email")
                .help("Admin email address")
                .env("STOREFRONT_GATE_EMAIL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_PASSWORD)
                .short('p')
                .long("password")
                .help("Admin password")
                .env("STOREFRONT_GATE_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_WATCH)
                .short('w')
                .long("watch")
                .help("Keep the gate running and print every transition until Ctrl-C, then sign out")
                .action(ArgAction::SetTrue),
        )
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("storefront-gate")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(login());

    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKEND_URL: &str = "https://shop.backend.example";

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "storefront-gate");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some(env!("CARGO_PKG_DESCRIPTION").to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_login_args() {
        temp_env::with_vars(
            [
                ("STOREFRONT_GATE_BACKEND_URL", None::<&str>),
                ("STOREFRONT_GATE_ANON_KEY", None),
                ("STOREFRONT_GATE_EMAIL", None),
                ("STOREFRONT_GATE_PASSWORD", None),
            ],
            || {
                let matches = new().get_matches_from(vec![
                    "storefront-gate",
                    "login",
                    "--backend-url",
                    BACKEND_URL,
                    "--anon-key",
                    "anon",
                    "--email",
                    "Admin@Example.com",
                    "--password",
                    "correct-horse",
                    "--watch",
                ]);

                let login = matches
                    .subcommand_matches(CMD_LOGIN)
                    .expect("login subcommand");
                assert_eq!(
                    login.get_one::<String>(ARG_BACKEND_URL).cloned(),
                    Some(BACKEND_URL.to_string())
                );
                assert_eq!(
                    login.get_one::<String>(ARG_EMAIL).cloned(),
                    Some("Admin@Example.com".to_string())
                );
                assert!(login.get_flag(ARG_WATCH));
            },
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("STOREFRONT_GATE_BACKEND_URL", Some(BACKEND_URL)),
                ("STOREFRONT_GATE_ANON_KEY", Some("anon")),
                ("STOREFRONT_GATE_EMAIL", Some("admin@example.com")),
                ("STOREFRONT_GATE_PASSWORD", Some("correct-horse")),
                ("STOREFRONT_GATE_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["storefront-gate", "login"]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );

                let login = matches
                    .subcommand_matches(CMD_LOGIN)
                    .expect("login subcommand");
                assert_eq!(
                    login.get_one::<String>(ARG_ANON_KEY).cloned(),
                    Some("anon".to_string())
                );
                assert_eq!(
                    login.get_one::<String>(ARG_PASSWORD).cloned(),
                    Some("correct-horse".to_string())
                );
                assert!(!login.get_flag(ARG_WATCH));
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("STOREFRONT_GATE_LOG_LEVEL", Some(level)),
                    ("STOREFRONT_GATE_BACKEND_URL", Some(BACKEND_URL)),
                    ("STOREFRONT_GATE_ANON_KEY", Some("anon")),
                    ("STOREFRONT_GATE_EMAIL", Some("admin@example.com")),
                    ("STOREFRONT_GATE_PASSWORD", Some("correct-horse")),
                ],
                || {
                    let matches = new().get_matches_from(vec!["storefront-gate", "login"]);
                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        u8::try_from(index).ok()
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5_usize {
            temp_env::with_vars(
                [
                    ("STOREFRONT_GATE_LOG_LEVEL", None::<&str>),
                    ("STOREFRONT_GATE_BACKEND_URL", Some(BACKEND_URL)),
                    ("STOREFRONT_GATE_ANON_KEY", Some("anon")),
                ],
                || {
                    let mut args = vec![
                        "storefront-gate".to_string(),
                        "login".to_string(),
                        "--email".to_string(),
                        "admin@example.com".to_string(),
                        "--password".to_string(),
                        "correct-horse".to_string(),
                    ];

                    if index > 0 {
                        args.push(format!("-{}", "v".repeat(index)));
                    }

                    // Global values given after the subcommand land in its matches.
                    let matches = new().get_matches_from(args);
                    let login = matches
                        .subcommand_matches(CMD_LOGIN)
                        .expect("login subcommand");
                    assert_eq!(
                        login.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        u8::try_from(index).ok()
                    );
                },
            );
        }
    }

    #[test]
    fn test_missing_backend_url_is_an_error() {
        temp_env::with_vars([("STOREFRONT_GATE_BACKEND_URL", None::<&str>)], || {
            let result = new().try_get_matches_from(vec![
                "storefront-gate",
                "login",
                "--anon-key",
                "anon",
                "--email",
                "admin@example.com",
                "--password",
                "correct-horse",
            ]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_command_definition_is_valid() {
        new().debug_assert();
    }
}

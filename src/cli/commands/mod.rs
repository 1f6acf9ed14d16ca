pub mod logging;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_PORT: &str = "port";
pub const ARG_ZITADEL_API_URL: &str = "zitadel-api-url";
pub const ARG_ZITADEL_SERVICE_TOKEN: &str = "zitadel-service-token";
pub const ARG_UI_ORIGIN: &str = "ui-origin";
pub const ARG_ORGANIZATION: &str = "organization";
pub const ARG_REQUIRE_EMAIL_VERIFICATION: &str = "require-email-verification";
pub const ARG_SESSION_LIFETIME: &str = "session-lifetime";

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

    let command = Command::new("ensaluti")
        .about("Hosted login flow engine")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("3001")
                .env("ENSALUTI_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_ZITADEL_API_URL)
                .long("zitadel-api-url")
                .help("Base URL of the ZITADEL-compatible API")
                .env("ENSALUTI_ZITADEL_API_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ZITADEL_SERVICE_TOKEN)
                .long("zitadel-service-token")
                .help("Service-user token for the identity API")
                .env("ENSALUTI_ZITADEL_SERVICE_TOKEN")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_UI_ORIGIN)
                .long("ui-origin")
                .help("Origin the login UI is served from, used for CORS and IDP callbacks")
                .default_value("http://localhost:3000")
                .env("ENSALUTI_UI_ORIGIN"),
        )
        .arg(
            Arg::new(ARG_ORGANIZATION)
                .long("organization")
                .help("Organization applied to requests that carry none")
                .env("ENSALUTI_ORGANIZATION"),
        )
        .arg(
            Arg::new(ARG_REQUIRE_EMAIL_VERIFICATION)
                .long("require-email-verification")
                .help("Treat sessions of users with an unverified email as invalid")
                .env("ENSALUTI_REQUIRE_EMAIL_VERIFICATION")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_SESSION_LIFETIME)
                .long("session-lifetime")
                .help("Lifetime of newly created sessions, in seconds")
                .default_value("86400")
                .env("ENSALUTI_SESSION_LIFETIME_SECONDS")
                .value_parser(clap::value_parser!(u64)),
        );

    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "ensaluti");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Hosted login flow engine".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_check_args() {
        let command = new();
        let matches = command.get_matches_from(vec![
            "ensaluti",
            "--port",
            "3001",
            "--zitadel-api-url",
            "https://idp.example.com",
            "--zitadel-service-token",
            "token",
            "--ui-origin",
            "https://login.example.com",
            "--organization",
            "org1",
        ]);

        assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(3001));
        assert_eq!(
            matches.get_one::<String>(ARG_ZITADEL_API_URL).cloned(),
            Some("https://idp.example.com".to_string())
        );
        assert_eq!(
            matches.get_one::<String>(ARG_UI_ORIGIN).cloned(),
            Some("https://login.example.com".to_string())
        );
        assert_eq!(
            matches.get_one::<String>(ARG_ORGANIZATION).cloned(),
            Some("org1".to_string())
        );
        assert_eq!(
            matches.get_one::<bool>(ARG_REQUIRE_EMAIL_VERIFICATION).copied(),
            Some(false)
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("ENSALUTI_PORT", Some("443")),
                ("ENSALUTI_ZITADEL_API_URL", Some("https://idp.example.com")),
                ("ENSALUTI_ZITADEL_SERVICE_TOKEN", Some("token")),
                ("ENSALUTI_UI_ORIGIN", Some("https://login.example.com")),
                ("ENSALUTI_SESSION_LIFETIME_SECONDS", Some("3600")),
                ("ENSALUTI_LOG_LEVEL", Some("info")),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["ensaluti"]);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>(ARG_ZITADEL_API_URL).cloned(),
                    Some("https://idp.example.com".to_string())
                );
                assert_eq!(
                    matches.get_one::<u64>(ARG_SESSION_LIFETIME).copied(),
                    Some(3600)
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        // loop cover all possible value_parse
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("ENSALUTI_LOG_LEVEL", Some(level)),
                    ("ENSALUTI_ZITADEL_API_URL", Some("https://idp.example.com")),
                    ("ENSALUTI_ZITADEL_SERVICE_TOKEN", Some("token")),
                ],
                || {
                    let command = new();
                    let matches = command.get_matches_from(vec!["ensaluti"]);
                    let verbosity = u8::try_from(index).unwrap_or_default();
                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        Some(verbosity)
                    );
                },
            );
        }
    }
}

use clap::{Arg, Command};

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_PASSCODE_TTL_SECONDS: &str = "passcode-ttl-seconds";
pub const ARG_PASSCODE_MAX_ATTEMPTS: &str = "passcode-max-attempts";
pub const ARG_PASSCODE_RESEND_COOLDOWN_SECONDS: &str = "passcode-resend-cooldown-seconds";
pub const ARG_SIGNATURE_MAX_SKEW_SECONDS: &str = "signature-max-skew-seconds";
pub const ARG_RATE_LIMIT_WINDOW_SECONDS: &str = "rate-limit-window-seconds";
pub const ARG_RATE_LIMIT_MAX_ATTEMPTS: &str = "rate-limit-max-attempts";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend origin allowed by CORS; an https origin marks the session cookie Secure")
                .env("WICKET_FRONTEND_BASE_URL")
                .default_value("https://wicket.dev"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session lifetime in seconds")
                .env("WICKET_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64).range(60..)),
        )
        .arg(
            Arg::new(ARG_PASSCODE_TTL_SECONDS)
                .long(ARG_PASSCODE_TTL_SECONDS)
                .help("Password reset passcode lifetime in seconds")
                .env("WICKET_PASSCODE_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64).range(60..)),
        )
        .arg(
            Arg::new(ARG_PASSCODE_MAX_ATTEMPTS)
                .long(ARG_PASSCODE_MAX_ATTEMPTS)
                .help("Wrong guesses allowed before a passcode is burned")
                .env("WICKET_PASSCODE_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(i32).range(1..)),
        )
        .arg(
            Arg::new(ARG_PASSCODE_RESEND_COOLDOWN_SECONDS)
                .long(ARG_PASSCODE_RESEND_COOLDOWN_SECONDS)
                .help("Minimum seconds between two passcodes for the same identity")
                .env("WICKET_PASSCODE_RESEND_COOLDOWN_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(i64).range(0..)),
        )
        .arg(
            Arg::new(ARG_SIGNATURE_MAX_SKEW_SECONDS)
                .long(ARG_SIGNATURE_MAX_SKEW_SECONDS)
                .help("Accepted clock skew for signed requests, in seconds")
                .env("WICKET_SIGNATURE_MAX_SKEW_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_WINDOW_SECONDS)
                .long(ARG_RATE_LIMIT_WINDOW_SECONDS)
                .help("Rate limit window for auth endpoints, in seconds")
                .env("WICKET_RATE_LIMIT_WINDOW_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_MAX_ATTEMPTS)
                .long(ARG_RATE_LIMIT_MAX_ATTEMPTS)
                .help("Attempts allowed per client IP and per email within one window")
                .env("WICKET_RATE_LIMIT_MAX_ATTEMPTS")
                .default_value("20")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
}

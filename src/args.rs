use clap::{Arg, ArgAction, Command};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ProbeError, ProbeResult};

static MESSAGE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((?:[a-z0-9_]+\.)*[a-z0-9_]+)\.([A-Z][A-Za-z0-9_]*)$").unwrap());

/// Parsed and validated CLI configuration (spec.md §6).
pub struct Config {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub max_depth: i32,
    pub output_dir: String,
    pub package: String,
    pub message: String,
    pub verbose: bool,
    pub log_file: String,
}

fn command() -> Command {
    Command::new("protoprobe")
        .about("Reverse-engineers a JSON-over-HTTP RPC endpoint's protobuf request schema")
        .arg(
            Arg::new("method")
                .short('X')
                .default_value("POST")
                .help("HTTP method used for every probe"),
        )
        .arg(
            Arg::new("url")
                .short('u')
                .required(true)
                .help("target URL"),
        )
        .arg(
            Arg::new("header")
                .short('H')
                .action(ArgAction::Append)
                .help("header in 'Key: Value' form, repeatable"),
        )
        .arg(
            Arg::new("max_depth")
                .short('d')
                .default_value("-1")
                .help("maximum probe depth; -1 for unlimited"),
        )
        .arg(
            Arg::new("output_dir")
                .short('o')
                .default_value("output")
                .help("output directory for emitted .proto files"),
        )
        .arg(
            Arg::new("message")
                .short('p')
                .default_value("google.example.Request")
                .help("fully-qualified request message name"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("verbose logging"),
        )
        .arg(
            Arg::new("log_file")
                .long("log-file")
                .default_value("latest.log")
                .help("file that log output is duplicated into"),
        )
}

/// Parses `std::env::args()` into a validated `Config`, failing with `ProbeError::Configuration`
/// on a malformed message name, header, method, or depth — all caught before any network call.
pub fn parse() -> ProbeResult<Config> {
    let matches = command().get_matches();
    build_config(&matches)
}

fn build_config(matches: &clap::ArgMatches) -> ProbeResult<Config> {
    let method = matches.get_one::<String>("method").unwrap().clone();
    let url = matches.get_one::<String>("url").unwrap().clone();

    let headers = matches
        .get_many::<String>("header")
        .map(|values| values.map(|v| v.as_str()).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter()
        .map(parse_header)
        .collect::<ProbeResult<Vec<_>>>()?;

    let max_depth: i32 = matches
        .get_one::<String>("max_depth")
        .unwrap()
        .parse()
        .map_err(|_| ProbeError::Configuration("max depth must be an integer".to_string()))?;

    let output_dir = matches.get_one::<String>("output_dir").unwrap().clone();
    let message_name = matches.get_one::<String>("message").unwrap().clone();
    let verbose = matches.get_flag("verbose");
    let log_file = matches.get_one::<String>("log_file").unwrap().clone();

    let (package, message) = split_message_name(&message_name)?;

    Ok(Config {
        method,
        url,
        headers,
        max_depth,
        output_dir,
        package,
        message,
        verbose,
        log_file,
    })
}

fn parse_header(raw: &str) -> ProbeResult<(String, String)> {
    let (key, value) = raw
        .split_once(':')
        .ok_or_else(|| ProbeError::Configuration(format!("malformed header {raw:?}, expected 'Key: Value'")))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

/// Validates `^(lowercase.dotted.package)\.(UppercaseTypeName)$` and splits into its two halves
/// (spec.md §6).
fn split_message_name(name: &str) -> ProbeResult<(String, String)> {
    let captures = MESSAGE_NAME_RE.captures(name).ok_or_else(|| {
        ProbeError::Configuration(format!(
            "message name {name:?} must match ^(lowercase.dotted.package)\\.(UppercaseTypeName)$"
        ))
    })?;
    Ok((
        captures.get(1).unwrap().as_str().to_string(),
        captures.get(2).unwrap().as_str().to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_valid_message_name() {
        let (package, message) = split_message_name("google.internal.people.v2.minimal.ListRankedTargetsRequest").unwrap();
        assert_eq!(package, "google.internal.people.v2.minimal");
        assert_eq!(message, "ListRankedTargetsRequest");
    }

    #[test]
    fn rejects_message_name_without_package() {
        assert!(split_message_name("Request").is_err());
    }

    #[test]
    fn rejects_message_name_with_uppercase_package() {
        assert!(split_message_name("Google.Request").is_err());
    }

    #[test]
    fn parses_header_pair() {
        let (key, value) = parse_header("Authorization: Bearer abc").unwrap();
        assert_eq!(key, "Authorization");
        assert_eq!(value, "Bearer abc");
    }

    #[test]
    fn rejects_header_without_colon() {
        assert!(parse_header("no colon here").is_err());
    }

    #[test]
    fn command_parses_required_and_defaults() {
        let matches = command().get_matches_from(vec!["protoprobe", "-u", "https://example.com"]);
        let config = build_config(&matches).unwrap();
        assert_eq!(config.method, "POST");
        assert_eq!(config.url, "https://example.com");
        assert_eq!(config.max_depth, -1);
        assert_eq!(config.output_dir, "output");
        assert_eq!(config.package, "google.example");
        assert_eq!(config.message, "Request");
        assert!(!config.verbose);
        assert_eq!(config.log_file, "latest.log");
    }
}

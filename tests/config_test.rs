//! Configuration layering: bundled defaults, file override, environment.
//!
//! Kept to a single test because `Config::load` reads process-wide
//! environment variables.

use std::io::Write;

use searchbox::Config;

#[test]
fn test_file_and_environment_override_bundled_defaults() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    writeln!(
        file,
        r#"
[provider]
index = "articles"

[[provider.filters]]
field = "topic"
name = "Topic"
kind = "taxonomy"
terms = ["ml", "ops"]

[channel]
host = "wss://search.internal/socket"
"#
    )
    .unwrap();

    std::env::set_var("SEARCHBOX_CONFIG", file.path());
    std::env::set_var("SEARCHBOX_CHANNEL__REQUEST_TIMEOUT_SECS", "7");

    let config = Config::load().unwrap();

    std::env::remove_var("SEARCHBOX_CONFIG");
    std::env::remove_var("SEARCHBOX_CHANNEL__REQUEST_TIMEOUT_SECS");

    // The file wins over the bundled defaults
    assert_eq!(config.provider.index, "articles");
    assert_eq!(config.channel.host, "wss://search.internal/socket");
    assert_eq!(config.provider.filters.len(), 1);
    assert_eq!(config.provider.filters[0].field, "topic");

    // The environment wins over the file
    assert_eq!(config.channel.request_timeout_secs, 7);

    // Keys neither source touches keep their defaults
    assert_eq!(config.provider.analyzer, "string_search");
    assert_eq!(config.provider.fields, vec!["title", "body"]);
    assert_eq!(config.channel.connect_timeout_secs, 10);
}

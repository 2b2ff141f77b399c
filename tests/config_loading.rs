use std::io::Write;

use trellis_core::config::AppConfig;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[model]
model_id = "gpt-4.1-nano"
base_url = "https://openrouter.ai/api/v1"
api_key = "sk-test-key"
max_tokens = 512
temperature = 0.2

[embedding]
model = "nomic-embed-text"
base_url = "http://localhost:11434/v1"
dimensions = 768

[ocr]
model = "mistral-ocr-latest"
api_key = "ocr-test-key"

[store]
db_path = "/tmp/trellis-test/vectors.db"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.model_id, "gpt-4.1-nano");
    assert_eq!(config.model.api_key, Some("sk-test-key".to_string()));
    assert_eq!(config.model.max_tokens, 512);
    assert!((config.model.temperature - 0.2).abs() < f32::EPSILON);
    assert_eq!(config.embedding.dimensions, 768);
    assert_eq!(config.ocr.api_key, Some("ocr-test-key".to_string()));
    assert_eq!(config.store.db_path, "/tmp/trellis-test/vectors.db");
}

#[test]
fn test_api_key_env_expansion() {
    std::env::set_var("TRELLIS_TEST_API_KEY", "sk-from-env");

    let toml_content = r#"
[model]
model_id = "gpt-4.1-nano"
api_key = "${TRELLIS_TEST_API_KEY}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.model.api_key, Some("sk-from-env".to_string()));

    std::env::remove_var("TRELLIS_TEST_API_KEY");
}

#[test]
fn test_missing_config_file() {
    let result = AppConfig::load(std::path::Path::new("/nonexistent/trellis.toml"));
    assert!(result.is_err());
}

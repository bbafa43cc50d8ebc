//! End-to-end convert/restore round trips over a mixed-format project.

use assert_fs::prelude::*;
use pretty_assertions::assert_eq;

use stencil::core::project::ProjectConfig;
use stencil::core::runner::{run_convert, run_restore, run_test};
use stencil::ValueMap;

const CONFIG: &str = r#"
[placeholders]
PROJECT_NAME = "project name"
PORT = "dev server port"
PAGE_TITLE = "site title"

[[rule]]
files = ["package.json"]
selectors = ["name"]
placeholder = "PROJECT_NAME"

[[rule]]
files = ["config.toml"]
selectors = ["server.port"]
placeholder = "PORT"

[[rule]]
files = ["index.html"]
selectors = ["title"]
placeholder = "PAGE_TITLE"

[[rule]]
files = ["README.md"]
selectors = ["heading:^acme-app$"]
placeholder = "PROJECT_NAME"

[[rule]]
files = ["App.tsx"]
selectors = ["h1.hero"]
placeholder = "PROJECT_NAME"
"#;

const PACKAGE_JSON: &str = "{\n  \"name\": \"acme-app\",\n  \"version\": \"1.2.3\"\n}\n";
const CONFIG_TOML: &str = "[server]\nport = 8080\nhost = \"localhost\"\n";
const INDEX_HTML: &str =
    "<html>\n<head><title>Acme Site</title></head>\n<body><p>hello</p></body>\n</html>\n";
const README_MD: &str = "# acme-app\n\nA project like any other.\n";
const APP_TSX: &str = "export default function App() {\n  return <h1 className=\"hero\">acme-app</h1>;\n}\n";

fn fixture() -> (assert_fs::TempDir, ProjectConfig) {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("package.json").write_str(PACKAGE_JSON).unwrap();
    tmp.child("config.toml").write_str(CONFIG_TOML).unwrap();
    tmp.child("index.html").write_str(INDEX_HTML).unwrap();
    tmp.child("README.md").write_str(README_MD).unwrap();
    tmp.child("App.tsx").write_str(APP_TSX).unwrap();

    let config: ProjectConfig = toml::from_str(CONFIG).expect("parse config");
    config.validate().expect("valid config");
    (tmp, config)
}

fn values() -> ValueMap {
    let mut values = ValueMap::new();
    values.insert("PROJECT_NAME".to_string(), "acme-app".to_string());
    values.insert("PORT".to_string(), "8080".to_string());
    values.insert("PAGE_TITLE".to_string(), "Acme Site".to_string());
    values
}

fn read(tmp: &assert_fs::TempDir, name: &str) -> String {
    std::fs::read_to_string(tmp.child(name).path()).unwrap()
}

#[test]
fn convert_replaces_values_with_tokens() {
    // Given
    let (tmp, config) = fixture();

    // When
    let report = run_convert(tmp.path(), &config, None, false).expect("run");

    // Then
    assert_eq!(report.errors, 0);
    assert_eq!(report.changed, 5);
    assert_eq!(
        read(&tmp, "package.json"),
        "{\n  \"name\": \"{{PROJECT_NAME}}\",\n  \"version\": \"1.2.3\"\n}\n"
    );
    // Non-string scalar becomes a quoted token.
    assert_eq!(
        read(&tmp, "config.toml"),
        "[server]\nport = \"{{PORT}}\"\nhost = \"localhost\"\n"
    );
    assert_eq!(
        read(&tmp, "index.html"),
        "<html>\n<head><title>{{PAGE_TITLE}}</title></head>\n<body><p>hello</p></body>\n</html>\n"
    );
    assert_eq!(read(&tmp, "README.md"), "# {{PROJECT_NAME}}\n\nA project like any other.\n");
    assert_eq!(
        read(&tmp, "App.tsx"),
        "export default function App() {\n  return <h1 className=\"hero\">{{PROJECT_NAME}}</h1>;\n}\n"
    );
}

#[test]
fn restore_returns_every_byte() {
    // Given a converted tree
    let (tmp, config) = fixture();
    run_convert(tmp.path(), &config, None, false).expect("convert");

    // When
    let report = run_restore(tmp.path(), &values(), &[], None, false).expect("restore");

    // Then all five files are byte-identical to the originals, with the
    // quoted PORT token unquoted back to a bare integer.
    assert_eq!(report.errors, 0);
    assert_eq!(read(&tmp, "package.json"), PACKAGE_JSON);
    assert_eq!(read(&tmp, "config.toml"), CONFIG_TOML);
    assert_eq!(read(&tmp, "index.html"), INDEX_HTML);
    assert_eq!(read(&tmp, "README.md"), README_MD);
    assert_eq!(read(&tmp, "App.tsx"), APP_TSX);
}

#[test]
fn second_convert_is_idempotent() {
    // Given
    let (tmp, config) = fixture();
    run_convert(tmp.path(), &config, None, false).expect("first");
    let after_first: Vec<String> = ["package.json", "config.toml", "index.html", "README.md", "App.tsx"]
        .iter()
        .map(|n| read(&tmp, n))
        .collect();

    // When
    let report = run_convert(tmp.path(), &config, None, false).expect("second");

    // Then no bytes move
    assert_eq!(report.errors, 0);
    let after_second: Vec<String> = ["package.json", "config.toml", "index.html", "README.md", "App.tsx"]
        .iter()
        .map(|n| read(&tmp, n))
        .collect();
    assert_eq!(after_first, after_second);
}

#[test]
fn test_command_verifies_round_trip_in_memory() {
    // Given
    let (tmp, config) = fixture();
    let originals: Vec<String> = ["package.json", "config.toml"]
        .iter()
        .map(|n| read(&tmp, n))
        .collect();

    // When
    let report = run_test(tmp.path(), &config).expect("test run");

    // Then every file round-trips and nothing on disk moved
    assert_eq!(report.errors, 0);
    assert_eq!(report.ok, 5);
    assert_eq!(read(&tmp, "package.json"), originals[0]);
    assert_eq!(read(&tmp, "config.toml"), originals[1]);
}

#[test]
fn dry_run_reports_without_writing() {
    // Given
    let (tmp, config) = fixture();

    // When
    let report = run_convert(tmp.path(), &config, None, true).expect("dry run");

    // Then
    assert_eq!(report.changed, 5);
    assert_eq!(read(&tmp, "package.json"), PACKAGE_JSON);
}

#[test]
fn restore_single_file_with_format_override() {
    // Given a converted template file with a non-standard extension
    let tmp = assert_fs::TempDir::new().unwrap();
    tmp.child("app.conf")
        .write_str("{\n  \"name\": \"{{PROJECT_NAME}}\"\n}\n")
        .unwrap();

    // When restoring just that file as JSON
    let format = stencil::FileFormat::from_name("json").unwrap();
    let report = run_restore(
        tmp.child("app.conf").path(),
        &values(),
        &[],
        Some(format),
        false,
    )
    .expect("restore");

    // Then
    assert_eq!(report.changed, 1);
    assert_eq!(read(&tmp, "app.conf"), "{\n  \"name\": \"acme-app\"\n}\n");
}

#[test]
fn toml_literal_strings_round_trip() {
    // Given a TOML file whose value sits in a literal (single-quoted)
    // string, where backslashes carry no escape meaning
    let tmp = assert_fs::TempDir::new().unwrap();
    tmp.child("paths.toml")
        .write_str("install = 'C:\\temp'\n")
        .unwrap();
    let config: ProjectConfig = toml::from_str(
        r#"
[placeholders]
INSTALL_PATH = "install location"

[[rule]]
files = ["paths.toml"]
selectors = ["install"]
placeholder = "INSTALL_PATH"
"#,
    )
    .unwrap();
    config.validate().unwrap();

    // When converting and then restoring the original value
    run_convert(tmp.path(), &config, None, false).expect("convert");
    assert_eq!(read(&tmp, "paths.toml"), "install = '{{INSTALL_PATH}}'\n");

    let mut values = ValueMap::new();
    values.insert("INSTALL_PATH".to_string(), "C:\\temp".to_string());
    let report = run_restore(tmp.path(), &values, &[], None, false).expect("restore");

    // Then every byte comes back, with no doubled backslash
    assert_eq!(report.changed, 1);
    assert_eq!(read(&tmp, "paths.toml"), "install = 'C:\\temp'\n");
}

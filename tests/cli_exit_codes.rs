use assert_cmd::Command;
use mockito::Server;
use predicates::str::contains;
use std::fs;
use std::path::Path;

const FIXTURE: &str = "exports[`renders correctly`] = `\nObject {\n  \"text\": \"hi\",\n}\n`;\n";

fn cli(config: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("snapshot-render"));
    cmd.env_remove("RUST_LOG").arg("--config").arg(config);
    cmd
}

fn empty_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.json");
    fs::write(&path, "{}").unwrap();
    path
}

#[test]
fn missing_paths_exit_with_failure() {
    let dir = tempfile::tempdir().unwrap();

    cli(&empty_config(dir.path()))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("Please specify both an output and an input path."));
}

#[test]
fn unreadable_config_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("snapshot-render.ron");
    fs::write(&config, "(in: ").unwrap();

    cli(&config)
        .args(["--in", "fixtures", "--out", "shots"])
        .assert()
        .code(1)
        .stderr(contains("config error"));
}

#[test]
fn missing_input_root_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();

    cli(&empty_config(dir.path()))
        .arg("--in")
        .arg(dir.path().join("no-such-dir"))
        .arg("--out")
        .arg(dir.path().join("shots"))
        .assert()
        .code(1)
        .stderr(contains("discovery error"));
}

#[test]
fn empty_run_succeeds_without_a_browser() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("fixtures");
    fs::create_dir_all(&input).unwrap();

    cli(&empty_config(dir.path()))
        .arg("--in")
        .arg(&input)
        .arg("--out")
        .arg(dir.path().join("shots"))
        .arg("--webdriver-url")
        .arg("http://127.0.0.1:9")
        .assert()
        .success()
        .stdout(contains("Fetching 0 screenshots from message builder"))
        .stdout(contains("Message builder fetching complete. Created 0 files"));
}

#[test]
fn failed_renders_still_exit_with_success() {
    let mut server = Server::new();
    let session = server
        .mock("POST", "/session")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"value":{"sessionId":"cli","capabilities":{}}}"#)
        .create();
    let _resize = server
        .mock("POST", "/session/cli/window/rect")
        .with_status(200)
        .with_body(r#"{"value":{}}"#)
        .create();
    let navigate = server
        .mock("POST", "/session/cli/url")
        .with_status(500)
        .with_body(r#"{"value":{"error":"unknown error","message":"net::ERR_CONNECTION_REFUSED"}}"#)
        .expect(2)
        .create();
    let close = server
        .mock("DELETE", "/session/cli")
        .with_status(200)
        .with_body(r#"{"value":null}"#)
        .expect(1)
        .create();

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("fixtures");
    fs::create_dir_all(input.join("Button")).unwrap();
    fs::write(input.join("Button/snap.test.js.snap"), FIXTURE).unwrap();
    let output = dir.path().join("shots");

    cli(&empty_config(dir.path()))
        .arg("--in")
        .arg(&input)
        .arg("--out")
        .arg(&output)
        .arg("--webdriver-url")
        .arg(server.url())
        .assert()
        .success()
        .stdout(contains("Fetching 1 screenshot from message builder"))
        .stdout(contains("Retrying"))
        .stdout(contains("Created 0 files"))
        .stderr(contains("1 snapshot(s) could not be rendered"));

    session.assert();
    navigate.assert();
    close.assert();
    assert!(!output.join("Button/renders correctly.png").exists());
}

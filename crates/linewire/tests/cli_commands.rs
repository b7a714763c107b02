#![cfg(all(unix, feature = "cli"))]

use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/lwcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    loop {
        if UnixStream::connect(path).is_ok() {
            return;
        }
        if start.elapsed() >= timeout {
            panic!("server socket never became connectable");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn linewire() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_linewire"));
    cmd.arg("--log-level").arg("error");
    cmd
}

#[test]
fn send_against_echo_server_prints_replies() {
    let dir = unique_temp_dir("echo");
    let sock_path = dir.join("echo.sock");

    let mut server = linewire()
        .arg("echo")
        .arg(&sock_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("echo command should start");
    wait_for_socket(&sock_path, Duration::from_secs(3));

    let output = linewire()
        .arg("--format")
        .arg("raw")
        .arg("send")
        .arg(&sock_path)
        .arg("--data")
        .arg("hello")
        .arg("--data")
        .arg("wörld")
        .arg("--wait")
        .arg("2")
        .output()
        .expect("send should run");

    let _ = server.kill();
    let _ = server.wait();
    let _ = std::fs::remove_dir_all(&dir);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\nwörld\n");
}

#[test]
fn listen_prints_json_and_exits_after_count() {
    let dir = unique_temp_dir("listen");
    let sock_path = dir.join("listen.sock");

    let listener = linewire()
        .arg("--format")
        .arg("json")
        .arg("listen")
        .arg(&sock_path)
        .arg("--count")
        .arg("2")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("listen command should start");
    wait_for_socket(&sock_path, Duration::from_secs(3));

    let status = linewire()
        .arg("send")
        .arg(&sock_path)
        .arg("--data")
        .arg("first")
        .arg("--data")
        .arg("second")
        .status()
        .expect("send should run");
    assert!(status.success());

    let output = listener
        .wait_with_output()
        .expect("listen should exit after two lines");
    let _ = std::fs::remove_dir_all(&dir);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"line\":\"first\""));
    assert!(lines[1].contains("\"line\":\"second\""));
    assert!(lines[0].contains("\"kind\":\"line-received\""));
}

#[test]
fn send_to_missing_socket_fails_with_nonzero_code() {
    let dir = unique_temp_dir("missing");
    let output = linewire()
        .arg("send")
        .arg(dir.join("absent.sock"))
        .arg("--data")
        .arg("x")
        .output()
        .expect("send should run");
    let _ = std::fs::remove_dir_all(&dir);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));
}

#[test]
fn version_reports_package_version() {
    let output = linewire()
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("linewire {}", env!("CARGO_PKG_VERSION"))
    );
}

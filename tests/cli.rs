use std::process::Command;

fn metronome() -> Command {
    Command::new(env!("CARGO_BIN_EXE_metronome"))
}

#[test]
fn help_lists_tempo_flag() {
    let output = metronome().arg("--help").output().expect("run metronome --help");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--bpm"));
    assert!(stdout.contains("--accent"));
}

#[test]
fn zero_bpm_exits_with_error() {
    let output = metronome()
        .args(["--bpm", "0", "--dry-run"])
        .output()
        .expect("run metronome --bpm 0");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr was: {stderr}");
}

#[test]
fn missing_click_file_exits_with_error() {
    let output = metronome()
        .args(["--dry-run", "--click", "/nonexistent/click.wav"])
        .output()
        .expect("run metronome with missing click");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("click.wav"), "stderr was: {stderr}");
}

#[test]
fn missing_config_file_exits_with_error() {
    let output = metronome()
        .args(["--dry-run", "--config", "/nonexistent/metronome.json"])
        .output()
        .expect("run metronome with missing config");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("metronome.json"), "stderr was: {stderr}");
}

#[cfg(unix)]
#[test]
fn dry_run_stops_cleanly_on_sigterm() {
    use std::process::Stdio;
    use std::time::Duration;

    let mut child = metronome()
        .args(["--dry-run", "--bpm", "240"])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn metronome --dry-run");

    std::thread::sleep(Duration::from_millis(1000));
    let status = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .expect("send SIGTERM");
    assert!(status.success());

    let output = child.wait_with_output().expect("wait for metronome");
    assert!(
        output.status.success(),
        "metronome exited with {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
}

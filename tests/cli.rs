use std::process::{Command, Output};

fn mom_transcribe(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mom-transcribe"))
        .args(args)
        .env_remove("MOM_TRANSCRIBE_LOG")
        .output()
        .expect("failed to spawn mom-transcribe")
}

#[test]
fn no_arguments_exits_non_zero_without_output() {
    let out = mom_transcribe(&[]);
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty(), "unexpected stdout: {:?}", out.stdout);
}

#[test]
fn missing_file_emits_single_error_event() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("standup.m4a");

    let out = mom_transcribe(&[missing.to_str().expect("utf-8 path")]);
    assert_eq!(out.status.code(), Some(1));

    let stdout = String::from_utf8(out.stdout)?;
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1, "stdout was: {stdout}");

    let event: serde_json::Value = serde_json::from_str(lines[0])?;
    assert_eq!(event["type"], "error");
    assert!(
        event["message"]
            .as_str()
            .is_some_and(|m| m.contains("File not found"))
    );
    Ok(())
}

#[test]
fn missing_model_emits_error_event() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let audio = dir.path().join("silence.wav");
    std::fs::write(&audio, b"not really audio")?;

    let model = dir.path().join("ggml-absent.bin");
    let out = mom_transcribe(&[
        audio.to_str().expect("utf-8 path"),
        "--model",
        model.to_str().expect("utf-8 path"),
    ]);
    assert_eq!(out.status.code(), Some(1));

    let stdout = String::from_utf8(out.stdout)?;
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1, "stdout was: {stdout}");

    let event: serde_json::Value = serde_json::from_str(lines[0])?;
    assert_eq!(event["type"], "error");
    assert!(
        event["message"]
            .as_str()
            .is_some_and(|m| m.contains("model not found"))
    );
    Ok(())
}

#[test]
fn help_still_works() {
    let out = mom_transcribe(&["--help"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("mom-transcribe"));
}

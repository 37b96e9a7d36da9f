use std::io::Write;
use std::process::Command;

fn run_image(image: &str) -> std::process::Output {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(image.as_bytes()).unwrap();
    Command::new(env!("CARGO_BIN_EXE_ls8"))
        .arg(file.path())
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn prints_program_output() {
    let output = run_image(include_str!("../programs/print8.ls8"));
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "8\n");
}

#[test]
fn unrecognized_opcode_exits_with_failure() {
    let output = run_image("11111111 # not an instruction\n");
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("0b11111111"), "stderr: {stderr}");
}

#[test]
fn malformed_image_exits_with_failure() {
    let output = run_image("10000010\n2\n");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Line 2"), "stderr: {stderr}");
}

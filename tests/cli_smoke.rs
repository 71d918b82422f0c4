use std::path::PathBuf;

fn push_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[test]
fn cli_decode_writes_png() {
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();

    let config_path = dir.join("render.json");
    let capture_path = dir.join("capture.bin");
    let out_path = dir.join("out.png");
    let _ = std::fs::remove_file(&out_path);

    let config = tilewire::RenderConfig::new(4, 4);
    let f = std::fs::File::create(&config_path).unwrap();
    serde_json::to_writer_pretty(f, &config).unwrap();

    // One full-window 4x4x4 tile of mid-gray.
    let mut stream = Vec::new();
    push_u32(&mut stream, 1);
    push_u32(&mut stream, 20 + 16 * 4 * 4);
    for v in [0u32, 0, 4, 4, 4] {
        push_u32(&mut stream, v);
    }
    for _ in 0..16 {
        for c in [0.5f32, 0.5, 0.5, 1.0] {
            stream.extend_from_slice(&c.to_le_bytes());
        }
    }
    std::fs::write(&capture_path, &stream).unwrap();

    let exe = std::env::var_os("CARGO_BIN_EXE_tilewire")
        .map(PathBuf::from)
        .expect("cargo provides the binary path for integration tests");

    let status = std::process::Command::new(exe)
        .arg("decode")
        .arg("--in")
        .arg(&capture_path)
        .arg("--config")
        .arg(&config_path)
        .arg("--out")
        .arg(&out_path)
        .status()
        .unwrap();

    assert!(status.success());
    let png = std::fs::read(&out_path).unwrap();
    assert_eq!(&png[1..4], &b"PNG"[..]);
}

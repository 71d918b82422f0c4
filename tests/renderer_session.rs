#![cfg(unix)]

use std::path::PathBuf;
use std::process::Command;

use tilewire::{
    CancelToken, DisplaySink, PixelRect, RenderConfig, Renderer, StreamEnd, TilewireResult,
};

fn push_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn tile_data_chunk(buf: &mut Vec<u8>, x: u32, y: u32, w: u32, h: u32, samples: &[f32]) {
    push_u32(buf, 1);
    push_u32(buf, 20 + samples.len() as u32 * 4);
    for v in [x, y, w, h, 1] {
        push_u32(buf, v);
    }
    for &s in samples {
        buf.extend_from_slice(&s.to_le_bytes());
    }
}

#[derive(Default)]
struct RecordingSink {
    commits: Vec<PixelRect>,
}

impl DisplaySink for RecordingSink {
    fn commit(&mut self, rect: &PixelRect) -> TilewireResult<()> {
        self.commits.push(rect.clone());
        Ok(())
    }
}

fn write_capture(name: &str, stream: &[u8]) -> PathBuf {
    let dir = PathBuf::from("target").join("renderer_session");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, stream).unwrap();
    path
}

fn cat_command(path: &PathBuf) -> Command {
    let mut command = Command::new("cat");
    command.arg(path);
    command
}

#[test]
fn render_decodes_a_subprocess_stream_end_to_end() {
    let mut stream = Vec::new();
    tile_data_chunk(&mut stream, 0, 0, 4, 4, &[0.5; 16]);
    tile_data_chunk(&mut stream, 4, 0, 4, 4, &[0.25; 16]);
    let capture = write_capture("complete.bin", &stream);

    let mut config = RenderConfig::new(8, 4);
    config.passes = 1;

    let mut sink = RecordingSink::default();
    let mut fractions = Vec::new();
    let summary = Renderer::new()
        .render(
            &config,
            cat_command(&capture),
            &mut sink,
            CancelToken::new(),
            |f| fractions.push(f),
        )
        .unwrap();

    assert_eq!(summary.end, StreamEnd::Completed);
    assert_eq!(summary.rendered_pixels, 32);
    assert_eq!(sink.commits.len(), 2);
    assert!((fractions.last().unwrap() - 1.0).abs() < 1e-6);
}

#[test]
fn render_reports_a_truncated_subprocess_stream() {
    let mut stream = Vec::new();
    tile_data_chunk(&mut stream, 0, 0, 4, 4, &[0.5; 16]);
    stream.truncate(8 + 20 + 32);
    let capture = write_capture("truncated.bin", &stream);

    let config = RenderConfig::new(8, 4);
    let mut sink = RecordingSink::default();
    let summary = Renderer::new()
        .render(
            &config,
            cat_command(&capture),
            &mut sink,
            CancelToken::new(),
            |_| {},
        )
        .unwrap();

    assert!(matches!(summary.end, StreamEnd::Truncated { .. }));
    assert!(sink.commits.is_empty());
}

#[test]
fn render_surfaces_spawn_failures() {
    let config = RenderConfig::new(8, 4);
    let mut sink = RecordingSink::default();
    let err = Renderer::new()
        .render(
            &config,
            Command::new("tilewire-test-no-such-renderer"),
            &mut sink,
            CancelToken::new(),
            |_| {},
        )
        .unwrap_err();
    assert!(err.to_string().contains("failed to spawn renderer"));
}

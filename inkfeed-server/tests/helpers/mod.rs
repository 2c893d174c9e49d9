//! Shared fixtures for inkfeed-server integration tests
//!
//! Each test binary uses a subset of these.
#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use inkfeed_server::config::CompositeSettings;
use inkfeed_server::services::{
    CaptionFont, ClassroomPost, CommentError, CommentGenerator, CommentStyle, CompositeBuilder,
    GeneratedComment, Notifier, NotifyError,
};
use inkfeed_server::{AppState, ServiceConfig};
use tempfile::TempDir;

pub const PUBLIC_BASE_URL: &str = "http://class.test";

/// Comment generator with a fixed outcome
pub struct FakeGenerator {
    outcome: Result<GeneratedComment, CommentError>,
    calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn succeeding(text: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(GeneratedComment {
                text: text.to_string(),
                model: "qwen-vl-max".to_string(),
                elapsed_ms: 1234,
            }),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(error: CommentError) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(error),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommentGenerator for FakeGenerator {
    async fn generate(
        &self,
        image_path: &Path,
        _student_name: &str,
        _style: CommentStyle,
    ) -> Result<GeneratedComment, CommentError> {
        assert!(image_path.exists(), "work photo must be stored before generation");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Notifier that records posts and returns a fixed outcome
pub struct FakeNotifier {
    outcome: Result<(), NotifyError>,
    posts: Mutex<Vec<ClassroomPost>>,
}

impl FakeNotifier {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(()),
            posts: Mutex::new(Vec::new()),
        })
    }

    pub fn rejecting(error: NotifyError) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(error),
            posts: Mutex::new(Vec::new()),
        })
    }

    pub fn posts(&self) -> Vec<ClassroomPost> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, post: &ClassroomPost) -> Result<(), NotifyError> {
        self.posts.lock().unwrap().push(post.clone());
        self.outcome.clone()
    }
}

/// Temporary data root plus state wired to fakes
pub struct TestEnv {
    pub dir: TempDir,
    pub state: AppState,
}

impl TestEnv {
    pub fn new(generator: Arc<FakeGenerator>, notifier: Arc<FakeNotifier>) -> Self {
        Self::with_generator(generator, notifier)
    }

    /// State wired to any generator, such as a real client against a local server
    pub fn with_generator(generator: Arc<dyn CommentGenerator>, notifier: Arc<FakeNotifier>) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = ServiceConfig::for_root(dir.path().to_path_buf());
        config.public_base_url = PUBLIC_BASE_URL.to_string();
        std::fs::create_dir_all(config.uploads_path()).unwrap();

        let composer = Arc::new(CompositeBuilder::with_font(
            CompositeSettings::default(),
            CaptionFont::Builtin,
        ));
        let state = AppState::new(config, generator, notifier, composer);
        Self { dir, state }
    }

    pub fn uploads(&self) -> std::path::PathBuf {
        self.state.config.uploads_path()
    }

    pub fn upload_count(&self) -> usize {
        std::fs::read_dir(self.uploads()).unwrap().count()
    }
}

/// Encoded PNG of a solid color
pub fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Encoded JPEG of a solid color
pub fn jpeg_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Jpeg).unwrap();
    out.into_inner()
}

/// Hand-built `multipart/form-data` body
pub struct MultipartBuilder {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self {
            boundary: "----inkfeed-test-boundary".to_string(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.boundary, name, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

/// Form with all required fields and two small photos
pub fn complete_form(class_name: &str, student_name: &str, comment: &str) -> MultipartBuilder {
    MultipartBuilder::new()
        .text("class_name", class_name)
        .text("student_name", student_name)
        .text("comment", comment)
        .file("posture", "posture.png", &png_bytes(60, 80, [200, 40, 40]))
        .file("work", "work.jpg", &jpeg_bytes(120, 90, [40, 40, 200]))
}

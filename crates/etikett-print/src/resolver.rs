// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image locator resolution.
//
// Host apps hand us either a plain path, a `file://` URL, or an opaque
// `content://` locator (a document picked through the platform's content
// provider). Drivers need a local file, so content locators are copied into
// the cache directory first.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use etikett_core::error::{EtikettError, Result};

const COPY_BUF_SIZE: usize = 4096;

/// Opens the byte stream behind a `content://` locator.
pub trait ContentSource: Send + Sync {
    fn open(&self, locator: &Url) -> std::io::Result<Box<dyn Read + Send>>;
}

/// Serves `content://<authority>/<path>` from `<root>/<authority>/<path>`.
///
/// Stands in for a platform content provider on desktop builds.
#[derive(Debug, Clone)]
pub struct DirectoryContentSource {
    root: PathBuf,
}

impl DirectoryContentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ContentSource for DirectoryContentSource {
    fn open(&self, locator: &Url) -> std::io::Result<Box<dyn Read + Send>> {
        let authority = locator.host_str().unwrap_or_default();
        let relative = Path::new(authority).join(locator.path().trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(std::io::Error::new(
                ErrorKind::PermissionDenied,
                "locator escapes content root",
            ));
        }
        Ok(Box::new(File::open(self.root.join(relative))?))
    }
}

/// A local image file ready for the driver.
///
/// Copies made from content locators are deleted when this is dropped.
#[derive(Debug)]
pub struct ResolvedImage {
    path: PathBuf,
    temporary: bool,
}

impl ResolvedImage {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file is a copy owned by this value.
    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Check the file exists, optionally decode its header, and return its
    /// size in bytes.
    pub fn verify(&self, decode_header: bool) -> Result<u64> {
        let meta = std::fs::metadata(&self.path).map_err(|_| {
            EtikettError::File(format!("Image file does not exist: {}", self.path.display()))
        })?;
        if !meta.is_file() {
            return Err(EtikettError::File(format!(
                "Image file does not exist: {}",
                self.path.display()
            )));
        }
        debug!(path = %self.path.display(), size = meta.len(), "image file exists");

        if decode_header {
            let unreadable = |e: &dyn std::fmt::Display| {
                EtikettError::File(format!("Not a readable image: {} ({e})", self.path.display()))
            };
            // Cache copies carry no meaningful extension, so sniff the format.
            let (width, height) = image::ImageReader::open(&self.path)
                .and_then(|reader| reader.with_guessed_format())
                .map_err(|e| unreadable(&e))?
                .into_dimensions()
                .map_err(|e| unreadable(&e))?;
            debug!(width, height, "image header decoded");
        }
        Ok(meta.len())
    }
}

impl Drop for ResolvedImage {
    fn drop(&mut self) {
        if self.temporary
            && let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), error = %e, "failed to remove temp image");
        }
    }
}

/// Turns host locators into local file paths.
#[derive(Clone)]
pub struct ImageResolver {
    cache_dir: PathBuf,
    content: Option<Arc<dyn ContentSource>>,
}

impl ImageResolver {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            content: None,
        }
    }

    pub fn with_content_source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.content = Some(source);
        self
    }

    /// Resolve `locator` to a local file.
    ///
    /// Plain paths and `file://` URLs come back unchanged, with no copy.
    /// `content://` locators are streamed into a fresh file in the cache
    /// directory. Anything else is a file error.
    pub fn resolve(&self, locator: &str) -> Result<ResolvedImage> {
        debug!(locator, "resolving image locator");
        let unresolvable =
            || EtikettError::File(format!("Could not resolve file path from URI: {locator}"));

        let url = match Url::parse(locator) {
            Ok(url) if url.scheme().len() > 1 => url,
            // No scheme, or a Windows drive letter: a plain path.
            Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
                return Ok(ResolvedImage {
                    path: PathBuf::from(locator),
                    temporary: false,
                });
            }
            Err(e) => {
                warn!(locator, error = %e, "malformed locator");
                return Err(unresolvable());
            }
        };

        match url.scheme() {
            "file" => {
                let path = url.to_file_path().map_err(|()| unresolvable())?;
                debug!(path = %path.display(), "locator is already a file path");
                Ok(ResolvedImage {
                    path,
                    temporary: false,
                })
            }
            "content" => self.materialise(&url).map_err(|e| {
                warn!(locator, error = %e, "failed to copy content locator");
                unresolvable()
            }),
            other => {
                warn!(locator, scheme = other, "unsupported locator scheme");
                Err(unresolvable())
            }
        }
    }

    /// Copy the content behind `url` into the cache directory.
    fn materialise(&self, url: &Url) -> std::io::Result<ResolvedImage> {
        let source = self.content.as_ref().ok_or_else(|| {
            std::io::Error::new(ErrorKind::Unsupported, "no content source configured")
        })?;
        let mut input = source.open(url)?;

        std::fs::create_dir_all(&self.cache_dir)?;
        let path = self.cache_dir.join(format!("print-{}.img", Uuid::new_v4()));
        // From here on the guard owns the file and removes it on any error.
        let image = ResolvedImage {
            path,
            temporary: true,
        };
        let mut output = File::create(&image.path)?;

        let total = copy_stream(&mut input, &mut output)?;
        output.sync_all()?;

        info!(path = %image.path.display(), bytes = total, "content copied to cache");
        Ok(image)
    }
}

/// Copy until end-of-stream, looping over short reads.
fn copy_stream(input: &mut dyn Read, output: &mut dyn Write) -> std::io::Result<u64> {
    let mut buf = [0u8; COPY_BUF_SIZE];
    let mut total: u64 = 0;
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        output.write_all(&buf[..n])?;
        total += n as u64;
    }
    output.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::Cursor;

    use super::*;

    /// Hands out data in tiny pieces, with an interruption thrown in.
    struct TrickleReader {
        data: Cursor<Vec<u8>>,
        script: VecDeque<Option<usize>>,
    }

    impl Read for TrickleReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.script.pop_front() {
                Some(None) => Err(std::io::Error::from(ErrorKind::Interrupted)),
                Some(Some(n)) => {
                    let n = n.min(buf.len());
                    self.data.read(&mut buf[..n])
                }
                None => {
                    let n = 3.min(buf.len());
                    self.data.read(&mut buf[..n])
                }
            }
        }
    }

    struct TrickleSource(Vec<u8>);

    impl ContentSource for TrickleSource {
        fn open(&self, _locator: &Url) -> std::io::Result<Box<dyn Read + Send>> {
            Ok(Box::new(TrickleReader {
                data: Cursor::new(self.0.clone()),
                script: VecDeque::from([Some(1), None, Some(5)]),
            }))
        }
    }

    struct FailingSource;

    impl ContentSource for FailingSource {
        fn open(&self, _locator: &Url) -> std::io::Result<Box<dyn Read + Send>> {
            struct Broken(usize);
            impl Read for Broken {
                fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                    if self.0 == 0 {
                        return Err(std::io::Error::other("provider went away"));
                    }
                    self.0 -= 1;
                    buf[0] = 7;
                    Ok(1)
                }
            }
            Ok(Box::new(Broken(4)))
        }
    }

    fn files_in(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn plain_path_is_returned_unchanged() {
        let cache = tempfile::tempdir().unwrap();
        let resolver = ImageResolver::new(cache.path());

        let image = resolver.resolve("/data/labels/ticket.png").unwrap();
        assert_eq!(image.path(), Path::new("/data/labels/ticket.png"));
        assert!(!image.is_temporary());
        assert_eq!(files_in(cache.path()), 0);
    }

    #[test]
    fn file_url_is_returned_as_its_path() {
        let cache = tempfile::tempdir().unwrap();
        let resolver = ImageResolver::new(cache.path());

        let image = resolver.resolve("file:///data/labels/ticket.png").unwrap();
        assert_eq!(image.path(), Path::new("/data/labels/ticket.png"));
        assert!(!image.is_temporary());
        assert_eq!(files_in(cache.path()), 0);
    }

    #[test]
    fn content_locator_is_streamed_to_cache() {
        let cache = tempfile::tempdir().unwrap();
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 256) as u8).collect();
        let resolver = ImageResolver::new(cache.path())
            .with_content_source(Arc::new(TrickleSource(payload.clone())));

        let image = resolver
            .resolve("content://media/external/images/42")
            .unwrap();
        assert!(image.is_temporary());
        assert!(image.path().starts_with(cache.path()));
        assert_eq!(std::fs::read(image.path()).unwrap(), payload);

        let path = image.path().to_path_buf();
        drop(image);
        assert!(!path.exists());
    }

    #[test]
    fn failed_copy_leaves_no_partial_file() {
        let cache = tempfile::tempdir().unwrap();
        let resolver =
            ImageResolver::new(cache.path()).with_content_source(Arc::new(FailingSource));

        let err = resolver.resolve("content://media/broken").unwrap_err();
        assert_eq!(err.kind(), "FILE_ERROR");
        assert_eq!(files_in(cache.path()), 0);
    }

    #[test]
    fn content_without_source_is_file_error() {
        let cache = tempfile::tempdir().unwrap();
        let err = ImageResolver::new(cache.path())
            .resolve("content://media/external/images/42")
            .unwrap_err();
        assert_eq!(err.kind(), "FILE_ERROR");
        assert!(err.to_string().contains("content://media/external/images/42"));
    }

    #[test]
    fn unsupported_scheme_is_file_error() {
        let cache = tempfile::tempdir().unwrap();
        let err = ImageResolver::new(cache.path())
            .resolve("https://example.com/label.png")
            .unwrap_err();
        assert_eq!(err.kind(), "FILE_ERROR");
    }

    #[test]
    fn directory_source_serves_files_and_blocks_escapes() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("media/labels")).unwrap();
        std::fs::write(root.path().join("media/labels/a.png"), b"abc").unwrap();
        let source = DirectoryContentSource::new(root.path());

        let mut body = Vec::new();
        source
            .open(&Url::parse("content://media/labels/a.png").unwrap())
            .unwrap()
            .read_to_end(&mut body)
            .unwrap();
        assert_eq!(body, b"abc");

        let escape = Url::parse("content://media/labels/%2e%2e/%2e%2e/etc/passwd").unwrap();
        assert!(source.open(&escape).is_err());
    }

    #[test]
    fn verify_reports_missing_and_undecodable_files() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ImageResolver::new(dir.path());

        let missing = resolver
            .resolve(dir.path().join("nope.png").to_str().unwrap())
            .unwrap();
        let err = missing.verify(false).unwrap_err();
        assert!(err.to_string().starts_with("Image file does not exist"));

        let junk_path = dir.path().join("junk.png");
        std::fs::write(&junk_path, b"definitely not a png").unwrap();
        let junk = resolver.resolve(junk_path.to_str().unwrap()).unwrap();
        assert_eq!(junk.verify(false).unwrap(), 20);
        assert_eq!(junk.verify(true).unwrap_err().kind(), "FILE_ERROR");
    }

    #[test]
    fn verify_accepts_a_real_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label.png");
        image::RgbImage::new(4, 2).save(&path).unwrap();

        let image = ImageResolver::new(dir.path())
            .resolve(path.to_str().unwrap())
            .unwrap();
        assert!(image.verify(true).unwrap() > 0);
    }
}

//! DjVu backend
//!
//! Decoding is delegated to the DjVuLibre command line tools (`djvused`,
//! `ddjvu`, `djvutxt`), which must be on `PATH`. Page geometry is read once
//! at open; every render is a separate `ddjvu` run writing PPM to stdout.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, LazyLock};

use image::ImageFormat;
use log::{debug, warn};
use regex::Regex;

use super::{DocumentError, DocumentKind, DocumentSource, PageSize, PixelRect, SourceFactory};
use crate::render::Bitmap;

const DJVUSED: &str = "djvused";
const DDJVU: &str = "ddjvu";
const DJVUTXT: &str = "djvutxt";

static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"width=(\d+)\s+height=(\d+)").expect("size pattern is valid")
});

static DPI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*dpi").expect("dpi pattern is valid"));

pub struct DjvuSource {
    path: PathBuf,
    sizes: Vec<PageSize>,
}

impl DjvuSource {
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        if !path.is_file() {
            return Err(DocumentError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }

        let count_out = run(DJVUSED, [OsStr::new("-e"), OsStr::new("n"), path.as_os_str()])?;
        let page_count: usize = String::from_utf8_lossy(&count_out)
            .trim()
            .parse()
            .map_err(|_| DocumentError::djvu("unreadable page count"))?;
        if page_count == 0 {
            return Err(DocumentError::Empty);
        }

        let script = size_script(page_count);
        let size_out = run(
            DJVUSED,
            [OsStr::new("-e"), OsStr::new(&script), path.as_os_str()],
        )?;
        let sizes = parse_sizes(&String::from_utf8_lossy(&size_out));
        if sizes.len() != page_count {
            return Err(DocumentError::djvu(format!(
                "expected {page_count} page sizes, got {}",
                sizes.len()
            )));
        }

        debug!("Opened DjVu {path:?} with {page_count} pages");
        Ok(Self {
            path: path.to_path_buf(),
            sizes,
        })
    }
}

impl DocumentSource for DjvuSource {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Djvu
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn page_count(&self) -> usize {
        self.sizes.len()
    }

    fn page_size(&self, page: usize) -> Result<PageSize, DocumentError> {
        self.check_page(page)?;
        Ok(self.sizes[page])
    }

    fn render_region(
        &self,
        page: usize,
        rect: PixelRect,
        scale: f32,
    ) -> Result<Bitmap, DocumentError> {
        let full = self.page_size(page)?.scaled(scale);
        let mut args = vec![
            "-format=ppm".to_string(),
            "-aspect=no".to_string(),
            format!("-page={}", page + 1),
            format!("-size={}x{}", full.0, full.1),
        ];
        if !rect.covers(full) {
            args.push(format!(
                "-segment={}x{}+{}+{}",
                rect.width, rect.height, rect.x, rect.y
            ));
        }

        let mut command_args: Vec<&OsStr> = args.iter().map(OsStr::new).collect();
        command_args.push(self.path.as_os_str());
        let ppm = run(DDJVU, command_args)?;

        let img = image::load_from_memory_with_format(&ppm, ImageFormat::Pnm)?.to_rgb8();
        Ok(Bitmap::from_rgb_image(img)?)
    }

    fn page_text(&self, page: usize) -> Result<String, DocumentError> {
        self.check_page(page)?;
        let page_arg = format!("--page={}", page + 1);
        let out = run(DJVUTXT, [OsStr::new(&page_arg), self.path.as_os_str()])?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn resolution(&self, page: usize) -> Option<u32> {
        self.check_page(page).ok()?;
        let script = format!("select {}; dump", page + 1);
        match run(
            DJVUSED,
            [OsStr::new("-e"), OsStr::new(&script), self.path.as_os_str()],
        ) {
            Ok(out) => parse_dpi(&String::from_utf8_lossy(&out)),
            Err(e) => {
                warn!("Could not read resolution of page {page}: {e}");
                None
            }
        }
    }

    fn reopen(&self) -> SourceFactory {
        // Geometry is immutable, so a clone is as good as a fresh open.
        let path = self.path.clone();
        let sizes = self.sizes.clone();
        Arc::new(move || {
            Ok(Box::new(DjvuSource {
                path: path.clone(),
                sizes: sizes.clone(),
            }) as Box<dyn DocumentSource>)
        })
    }
}

fn run<I, S>(program: &str, args: I) -> Result<Vec<u8>, DocumentError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(program).args(args).output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DocumentError::djvu(format!("{program} not found; install DjVuLibre"))
        } else {
            DocumentError::Io(e)
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DocumentError::djvu(format!(
            "{program} failed ({}): {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(output.stdout)
}

fn size_script(page_count: usize) -> String {
    (1..=page_count)
        .map(|n| format!("select {n}; size"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn parse_sizes(output: &str) -> Vec<PageSize> {
    SIZE_RE
        .captures_iter(output)
        .filter_map(|caps| {
            let width: f32 = caps[1].parse().ok()?;
            let height: f32 = caps[2].parse().ok()?;
            Some(PageSize::new(width, height))
        })
        .collect()
}

fn parse_dpi(dump: &str) -> Option<u32> {
    DPI_RE.captures(dump)?[1].parse().ok()
}

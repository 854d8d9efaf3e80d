use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use bookreader::history::{ReadingHistory, default_history_path};
use bookreader::panic_handler;
use bookreader::settings::SettingsStore;
use bookreader::{Bitmap, SearchDirection, Session, Viewport};

const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Parser)]
#[command(name = "bookreader")]
#[command(about = "Headless DjVu and PDF reader")]
#[command(version)]
struct Cli {
    /// Log file
    #[arg(long, default_value = "bookreader.log", global = true)]
    log_file: PathBuf,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Do not read or write preferences and reading history
    #[arg(long, global = true)]
    no_persist: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print document information.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render the view of a page to PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 1024)]
        width: u32,
        #[arg(long, default_value_t = 768)]
        height: u32,
        #[arg(long, value_enum, default_value_t = LayoutArg::Single)]
        layout: LayoutArg,
        /// Zoom steps from fit-to-window; negative zooms out
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        zoom: i32,
        #[arg(long)]
        night: bool,
        #[arg(long)]
        warmth: Option<u8>,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Write every page thumbnail as PNG.
    Thumbnails {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, short)]
        output_dir: PathBuf,
        #[arg(long)]
        night: bool,
    },
    /// Export a DjVu document to PDF.
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Find the next page containing some text.
    Search {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        query: String,
        /// Page to search from, starting at 1
        #[arg(long, default_value_t = 1)]
        from: usize,
        #[arg(long)]
        backward: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LayoutArg {
    Single,
    Continuous,
    Facing,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    WriteLogger::init(level, Config::default(), File::create(&cli.log_file)?)?;
    panic_handler::initialize_panic_handler();

    info!("Starting bookreader");

    let mut session = start_session(cli.no_persist);
    let result = match cli.command {
        Commands::Info { file } => run_info(&mut session, &file),
        Commands::Render {
            file,
            page,
            width,
            height,
            layout,
            zoom,
            night,
            warmth,
            output,
        } => {
            session.set_viewport(width, height);
            let options = RenderOptions {
                page,
                layout,
                zoom,
                night,
                warmth,
            };
            run_render(&mut session, &file, &options, &output)
        }
        Commands::Thumbnails {
            file,
            output_dir,
            night,
        } => run_thumbnails(&mut session, &file, &output_dir, night),
        Commands::Export { file, output } => run_export(&mut session, &file, output.as_deref()),
        Commands::Search {
            file,
            query,
            from,
            backward,
        } => run_search(&mut session, &file, &query, from, backward),
    };

    print_notices(&mut session);
    session.shutdown();
    info!("Shutting down bookreader");
    result
}

fn start_session(no_persist: bool) -> Session {
    let viewport = Viewport::new(1024, 768);
    if no_persist {
        return Session::start(SettingsStore::ephemeral(), ReadingHistory::ephemeral(), viewport);
    }
    let history_path = default_history_path();
    Session::start(
        SettingsStore::load(),
        ReadingHistory::load_or_ephemeral(history_path.as_deref()),
        viewport,
    )
}

fn open(session: &mut Session, file: &Path) -> Result<()> {
    if !session.open(file) {
        print_notices(session);
        bail!("could not open {}", file.display());
    }
    Ok(())
}

fn print_notices(session: &mut Session) {
    for notice in session.take_notices() {
        eprintln!("{:?}: {}", notice.level, notice.message);
    }
}

fn run_info(session: &mut Session, file: &Path) -> Result<()> {
    open(session, file)?;
    if let Some(info) = session.file_info() {
        println!("{info}");
    }
    Ok(())
}

struct RenderOptions {
    page: usize,
    layout: LayoutArg,
    zoom: i32,
    night: bool,
    warmth: Option<u8>,
}

fn run_render(
    session: &mut Session,
    file: &Path,
    options: &RenderOptions,
    output: &Path,
) -> Result<()> {
    open(session, file)?;

    session.set_continuous(options.layout == LayoutArg::Continuous);
    session.set_facing(options.layout == LayoutArg::Facing);
    session.go_to_page(options.page.saturating_sub(1));
    if let Some(warmth) = options.warmth {
        session.set_warmth(warmth);
    }
    session.set_night_mode(options.night);

    session.fit_to_window(true);
    for _ in 0..options.zoom.unsigned_abs() {
        if options.zoom > 0 {
            session.zoom_in();
        } else {
            session.zoom_out();
        }
    }
    session.rerender_with_progress(&mut |done, total| debug!("Rendered {done}/{total} pages"));

    let Some(bitmap) = session.surface().to_bitmap() else {
        bail!("nothing was rendered");
    };
    write_png(bitmap, output)?;
    println!("{}", output.display());
    Ok(())
}

fn run_thumbnails(session: &mut Session, file: &Path, output_dir: &Path, night: bool) -> Result<()> {
    open(session, file)?;
    session.set_show_thumbnails(true);
    session.set_night_mode(night);
    if !session.wait_for_thumbnails(THUMBNAIL_TIMEOUT) {
        bail!("timed out waiting for thumbnails");
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let thumbnails = session.thumbnails();
    for (page, thumbnail) in thumbnails.iter() {
        let path = output_dir.join(format!("page-{:04}.png", page + 1));
        write_png(thumbnail.display.clone(), &path)?;
    }
    println!(
        "{} of {} thumbnails written to {}",
        thumbnails.filled(),
        thumbnails.len(),
        output_dir.display()
    );
    Ok(())
}

fn run_export(session: &mut Session, file: &Path, output: Option<&Path>) -> Result<()> {
    open(session, file)?;
    let summary = session
        .export_pdf(output, &mut |done, total| debug!("Exported {done}/{total} pages"))
        .context("export failed")?;
    println!("{} ({} pages)", summary.path.display(), summary.pages);
    if !summary.blank_pages.is_empty() {
        let pages: Vec<String> = summary.blank_pages.iter().map(|p| (p + 1).to_string()).collect();
        println!("left blank: {}", pages.join(", "));
    }
    Ok(())
}

fn run_search(
    session: &mut Session,
    file: &Path,
    query: &str,
    from: usize,
    backward: bool,
) -> Result<()> {
    open(session, file)?;
    session.go_to_page(from.saturating_sub(1));
    let direction = if backward {
        SearchDirection::Backward
    } else {
        SearchDirection::Forward
    };
    if let Some(page) = session.search(query, direction) {
        println!("{}", page + 1);
    }
    Ok(())
}

fn write_png(bitmap: Bitmap, path: &Path) -> Result<()> {
    let image = bitmap
        .into_rgb_image()
        .context("bitmap does not match its dimensions")?;
    image
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

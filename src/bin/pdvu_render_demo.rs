//! Demonstration binary driving [`pdvu_render::RenderEngine`] against a
//! synthetic, solid-fill document, so the render pipeline can be exercised
//! without a real PDF decoding backend.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser as ClapParser, ValueEnum};
use pdvu_render::{EngineConfig, EngineResult, Medium, Parser, Rect, RenderEngine};

#[derive(Clone, Copy, ValueEnum)]
enum MediumArg {
    Shm,
    Tempfile,
}

#[derive(ClapParser)]
#[command(name = "pdvu-render-demo")]
#[command(about = "Render pipeline core demonstration", long_about = None)]
#[command(version)]
struct Cli {
    /// Page number to render.
    #[arg(long, default_value_t = 0)]
    page: u32,

    /// Zoom factor.
    #[arg(long, default_value_t = 1.0)]
    zoom: f32,

    /// Rotation in degrees (0, 90, 180, or 270).
    #[arg(long, default_value_t = 0)]
    rotation: u16,

    /// Worker pool size.
    #[arg(long, default_value_t = 2)]
    pool_size: usize,

    /// Pixel hand-off medium.
    #[arg(long, value_enum, default_value_t = MediumArg::Tempfile)]
    medium: MediumArg,

    /// Disable the display-list and page caches.
    #[arg(long)]
    no_cache: bool,

    /// Page count of the synthetic document.
    #[arg(long, default_value_t = 4)]
    pages: usize,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

/// A document whose pages are solid-filled with a value derived from the
/// page index, standing in for a real decoding backend.
#[derive(Clone)]
struct SyntheticParser {
    pages: usize,
    page_width: f64,
    page_height: f64,
}

impl Parser for SyntheticParser {
    type DisplayList = u8;

    fn num_pages(&self) -> usize {
        self.pages
    }

    fn page_bounds(&self, _page: usize) -> EngineResult<Rect> {
        Ok(Rect::new(0.0, 0.0, self.page_width, self.page_height))
    }

    fn get_display_list(&self, page: usize) -> EngineResult<Arc<Self::DisplayList>> {
        Ok(Arc::new((page % 256) as u8))
    }

    fn write_section(
        &self,
        display_list: &Self::DisplayList,
        _clip: Rect,
        _zoom: f64,
        _rotation: u16,
        dst: &mut [u8],
    ) -> EngineResult<()> {
        dst.fill(*display_list);
        Ok(())
    }

    fn duplicate(&self) -> EngineResult<Self> {
        Ok(self.clone())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    log::info!("starting pdvu-render-demo v{}", env!("CARGO_PKG_VERSION"));

    let parser = SyntheticParser {
        pages: cli.pages,
        page_width: 400.0,
        page_height: 300.0,
    };
    let config = EngineConfig {
        pool_size: cli.pool_size,
        use_cache: !cli.no_cache,
        ..EngineConfig::default()
    };

    let engine = RenderEngine::new(parser, config)?;
    let medium = match cli.medium {
        MediumArg::Shm => Medium::SharedMemory,
        MediumArg::Tempfile => Medium::TempFile,
    };

    engine.request(cli.page, cli.zoom, cli.rotation, medium);

    loop {
        if let Some(result) = engine.poll_result() {
            if result.error.is_empty() {
                log::info!(
                    "rendered page {} ({}x{}) in {}ms -> {}",
                    result.page,
                    result.width,
                    result.height,
                    result.render_ms,
                    result.path
                );
            } else {
                log::warn!("render failed: {}", result.error);
            }
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    log::info!("exiting pdvu-render-demo");
    Ok(())
}

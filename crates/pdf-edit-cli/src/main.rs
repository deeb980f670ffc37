use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pdf_edit::{
    EditorOptions, EditorSession, PageModificationTracker, SignatureFailurePolicy, SourceDocument,
};
use std::path::{Path, PathBuf};

mod logger;
mod manifest;

#[derive(Parser)]
#[command(name = "pdfe", about = "PDF page editing and annotation CLI", version)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    export: ExportArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ExportArgs {
    /// Editor options JSON file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Draw a placeholder box for signatures that cannot be embedded instead of failing
    #[arg(long, global = true)]
    placeholder_signatures: bool,

    /// Write uncompressed content streams
    #[arg(long, global = true)]
    no_compress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit pages in a new order (1-based page numbers, repeats allowed)
    Reorder {
        /// Input PDF file
        #[arg(short, long)]
        input: PathBuf,

        /// Output PDF file
        #[arg(short, long)]
        output: PathBuf,

        /// New page order, e.g. 3,1,2
        #[arg(long, required = true, value_delimiter = ',')]
        order: Vec<usize>,
    },

    /// Remove pages (1-based page numbers)
    Delete {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Pages to remove, e.g. 2,4
        #[arg(long, required = true, value_delimiter = ',')]
        pages: Vec<usize>,
    },

    /// Rotate a single page (0-based page index)
    Rotate {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Page index, starting at 0
        #[arg(long)]
        page: usize,

        /// Degrees to add, a multiple of 90
        #[arg(long, allow_negative_numbers = true)]
        degrees: i32,
    },

    /// Draw annotations from a JSON array (text, shape and signature)
    Annotate {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// JSON file with an array of annotations
        #[arg(short, long)]
        annotations: PathBuf,
    },

    /// Apply a full editing session (working order and annotations) in one pass
    Compose {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Session manifest JSON file
        #[arg(short, long)]
        manifest: PathBuf,
    },

    /// Render page previews to PNG files
    Thumbnails {
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for page-NNN.png files
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Optional session manifest; only its working order is used
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Render scale (overrides the config)
        #[arg(long)]
        scale: Option<f32>,
    },

    /// Show page count
    Info {
        #[arg(short, long)]
        input: PathBuf,
    },
}

impl ExportArgs {
    async fn options(&self) -> Result<EditorOptions> {
        let mut options = match &self.config {
            Some(path) => EditorOptions::load(path)
                .await
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EditorOptions::default(),
        };
        if self.placeholder_signatures {
            options.signature_failure = SignatureFailurePolicy::Placeholder;
        }
        if self.no_compress {
            options.compress_output = false;
        }
        options.validate()?;
        Ok(options)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::StderrLogger::from_verbosity(cli.verbose).init()?;
    let options = cli.export.options().await?;

    match cli.command {
        Commands::Reorder {
            input,
            output,
            order,
        } => {
            let bytes = read_pdf(&input).await?;
            let out = pdf_edit::reorder_pages(&bytes, &order, &options).await?;
            write_pdf(&output, out).await?;
            println!("Reordered {} pages → {}", order.len(), output.display());
        }

        Commands::Delete {
            input,
            output,
            pages,
        } => {
            let bytes = read_pdf(&input).await?;
            let out = pdf_edit::delete_pages(&bytes, &pages, &options).await?;
            write_pdf(&output, out).await?;
            println!("Deleted {} pages → {}", pages.len(), output.display());
        }

        Commands::Rotate {
            input,
            output,
            page,
            degrees,
        } => {
            let bytes = read_pdf(&input).await?;
            let out = pdf_edit::rotate_page(&bytes, page, degrees, &options).await?;
            write_pdf(&output, out).await?;
            println!("Rotated page {} by {}° → {}", page, degrees, output.display());
        }

        Commands::Annotate {
            input,
            output,
            annotations,
        } => {
            let store = manifest::load_annotations(&annotations).await?;
            let source = SourceDocument::load(&input).await?;
            let pages = PageModificationTracker::new(source.page_count());
            let count = store.len();

            let session = EditorSession::restore(source, pages, store, options)?;
            write_pdf(&output, session.export().await?).await?;
            println!("Drew {} annotations → {}", count, output.display());
        }

        Commands::Compose {
            input,
            output,
            manifest: manifest_path,
        } => {
            let manifest = manifest::Manifest::load(&manifest_path).await?;
            let store = manifest
                .annotation_store(manifest::base_dir(&manifest_path))
                .await?;
            let source = SourceDocument::load(&input).await?;
            let pages = working_order(&manifest, &source)?;
            let page_count = pages.visible_count();

            let session = EditorSession::restore(source, pages, store, options)?;
            write_pdf(&output, session.export().await?).await?;
            println!("Composed {} pages → {}", page_count, output.display());
        }

        Commands::Thumbnails {
            input,
            output_dir,
            manifest: manifest_path,
            scale,
        } => {
            let mut options = options;
            if let Some(scale) = scale {
                options.thumbnail_scale = scale;
            }
            let source = SourceDocument::load(&input).await?;
            let pages = match manifest_path {
                Some(path) => working_order(&manifest::Manifest::load(&path).await?, &source)?,
                None => PageModificationTracker::new(source.page_count()),
            };
            let written = thumbnails::write_thumbnails(&source, &pages, &options, &output_dir).await?;
            println!("Wrote {} thumbnails → {}", written, output_dir.display());
        }

        Commands::Info { input } => {
            let source = SourceDocument::load(&input).await?;
            println!("{}: {} pages", input.display(), source.page_count());
        }
    }

    Ok(())
}

fn working_order(
    manifest: &manifest::Manifest,
    source: &SourceDocument,
) -> Result<PageModificationTracker> {
    Ok(match &manifest.pages {
        Some(entries) => PageModificationTracker::from_entries(entries.clone(), source.page_count())?,
        None => PageModificationTracker::new(source.page_count()),
    })
}

async fn read_pdf(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn write_pdf(path: &Path, bytes: Vec<u8>) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

mod thumbnails {
    use anyhow::{Context, Result, bail};
    use pdf_edit::thumbnail::PdfiumRasterizer;
    use pdf_edit::{
        EditorOptions, PageModificationTracker, SourceDocument, ThumbnailImage, ThumbnailRenderer,
    };
    use std::path::Path;

    pub async fn write_thumbnails(
        source: &SourceDocument,
        pages: &PageModificationTracker,
        options: &EditorOptions,
        output_dir: &Path,
    ) -> Result<usize> {
        let renderer = ThumbnailRenderer::new(PdfiumRasterizer, options)?;
        let Some(thumbnails) = renderer.render(source, &pages.working_order()).await else {
            bail!("Thumbnail render was superseded");
        };

        tokio::fs::create_dir_all(output_dir).await?;
        let mut written = 0;
        for thumbnail in thumbnails {
            let raster = match thumbnail.image {
                ThumbnailImage::Rendered(raster) => raster,
                ThumbnailImage::Placeholder { reason } => {
                    log::warn!("Skipping page {}: {}", thumbnail.position + 1, reason);
                    continue;
                }
            };

            let Some(image) =
                image::RgbaImage::from_raw(raster.width, raster.height, raster.rgba.clone())
            else {
                log::warn!("Skipping page {}: bad raster size", thumbnail.position + 1);
                continue;
            };
            let path = output_dir.join(format!("page-{:03}.png", thumbnail.position + 1));
            image
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::debug!(
                "Wrote {} (source page {}, rotation {})",
                path.display(),
                thumbnail.original_index + 1,
                thumbnail.rotation
            );
            written += 1;
        }
        Ok(written)
    }
}

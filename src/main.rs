use std::fs::{self, File};
use std::io::{self, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use docload::analytics::{AnalyticsEvent, ReadingAnalytics};
use docload::cipher::{self, XorKey};
use docload::handoff::{Readiness, Renderer, deliver};
use docload::paths::resolve_log_path;
use docload::settings::{self, Settings};
use docload::{DisplayOptions, LoadPipeline, LoadRequest, LoadService, StreamEndpoint};

#[derive(Parser, Debug)]
#[command(name = "docload", version, about = "Load and decrypt documents for a viewer")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level regardless of settings
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a document, decrypt it and write the result out
    Open(OpenArgs),
    /// Apply the XOR cipher to a file (encrypts and decrypts alike)
    Xor {
        #[arg(long)]
        key: String,
        input: PathBuf,
        output: PathBuf,
    },
    /// Serve a file once over TCP for `open --stream-len`
    Serve {
        #[arg(long)]
        port: Option<u16>,
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
#[group(id = "source", required = true, multiple = false)]
struct SourceArgs {
    /// Read from a local file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Read a bundled asset by name
    #[arg(long)]
    asset: Option<String>,

    /// Read this many bytes from the stream endpoint
    #[arg(long)]
    stream_len: Option<usize>,
}

#[derive(Args, Debug)]
struct OpenArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// XOR decryption key
    #[arg(long)]
    key: Option<String>,

    /// Password forwarded to the renderer
    #[arg(long)]
    password: Option<String>,

    /// Track reading time under this document id
    #[arg(long)]
    id: Option<String>,

    /// Write the document here instead of stdout
    #[arg(long, short)]
    out: Option<PathBuf>,

    #[arg(long)]
    night_mode: bool,

    #[arg(long)]
    swipe_horizontal: bool,

    /// Only show these pages (comma separated, 0-based)
    #[arg(long, value_delimiter = ',')]
    pages: Option<Vec<u32>>,

    /// Override the asset directory from settings
    #[arg(long)]
    asset_root: Option<PathBuf>,

    /// Override the stream port from settings
    #[arg(long)]
    port: Option<u16>,

    /// Stream read timeout in seconds, 0 waits forever
    #[arg(long)]
    timeout: Option<u64>,
}

/// Writes the document bytes to a file or stdout.
///
/// It does not paginate, so it always reports zero pages.
struct SinkRenderer {
    out: Option<PathBuf>,
}

impl Renderer for SinkRenderer {
    fn display(
        &mut self,
        bytes: Vec<u8>,
        _password: Option<&str>,
        options: &DisplayOptions,
    ) -> docload::Result<usize> {
        info!("sink display options: {options:?}");
        let written = match &self.out {
            Some(path) => fs::write(path, &bytes),
            None => io::stdout().lock().write_all(&bytes),
        };
        written.map_err(|e| docload::LoadError::render(format!("cannot write document: {e}")))?;
        Ok(0)
    }
}

fn init_logging(settings: &Settings, verbose: bool) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        settings.log_level_filter()
    };
    let log_path = resolve_log_path()?;
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&log_path)
            .with_context(|| format!("Failed to create log file {log_path:?}"))?,
    )?;
    Ok(())
}

fn main() -> Result<()> {
    docload::panic_handler::initialize_panic_handler();
    let cli = Cli::parse();

    match &cli.config {
        Some(path) => settings::load_settings_from_path(path),
        None => settings::load_settings(),
    }
    let mut settings = settings::get_settings();
    init_logging(&settings, cli.verbose)?;

    info!("Starting docload");

    let result = match cli.command {
        Command::Open(args) => open(&mut settings, args),
        Command::Xor { key, input, output } => xor_file(&key, &input, &output),
        Command::Serve { port, file } => serve(port.unwrap_or(settings.stream_port), &file),
    };

    if let Err(err) = &result {
        error!("Application error: {err:?}");
    }
    info!("Shutting down docload");
    result
}

fn open(settings: &mut Settings, args: OpenArgs) -> Result<()> {
    if let Some(root) = args.asset_root {
        settings.asset_root = Some(root);
    }
    if let Some(port) = args.port {
        settings.stream_port = port;
    }
    if let Some(timeout) = args.timeout {
        settings.read_timeout_secs = timeout;
    }

    let mut request = match (args.source.file, args.source.asset, args.source.stream_len) {
        (Some(path), _, _) => LoadRequest::from_file(path),
        (_, Some(name), _) => LoadRequest::from_asset(name),
        (_, _, Some(len)) => LoadRequest::from_stream(StreamEndpoint::new(
            settings.stream_host.clone(),
            settings.stream_port,
            len,
        )),
        _ => bail!("one of --file, --asset or --stream-len is required"),
    };
    if let Some(key) = args.key {
        request = request.with_key(key);
    }
    if let Some(password) = args.password {
        request = request.with_password(password);
    }
    if let Some(id) = args.id {
        request = request.with_document_id(id);
    }
    request = request.with_display(DisplayOptions {
        night_mode: args.night_mode,
        swipe_horizontal: args.swipe_horizontal,
        pages: args.pages,
        ..DisplayOptions::default()
    });

    let mut service = LoadService::new(LoadPipeline::new(settings.sources()));
    let id = service.submit(request)?;
    let response = service
        .wait_next()
        .context("load worker exited without a response")?;
    debug_assert_eq!(response.id, id);

    let mut analytics = ReadingAnalytics::new();
    let mut renderer = SinkRenderer { out: args.out };
    let delivered = deliver(
        response.outcome,
        &mut renderer,
        |readiness| match readiness {
            Readiness::Ready { .. } => eprintln!("ready"),
            Readiness::Failed { kind, reason } => eprintln!("{kind}: {reason}"),
        },
        Some(&analytics),
    );
    if delivered.is_ok() {
        // The sink shows the whole document as its first page.
        analytics.handle(AnalyticsEvent::PageChanged(0));
        analytics.enable(settings.analytics_period())?;
    }
    analytics.disable();

    if let Some(records) = analytics.records_json(None)? {
        info!("reading analytics: {records}");
    }
    delivered?;
    Ok(())
}

fn xor_file(key: &str, input: &Path, output: &Path) -> Result<()> {
    let key = XorKey::new(key)?;
    let bytes = fs::read(input).with_context(|| format!("Failed to read {input:?}"))?;
    let len = bytes.len();
    fs::write(output, cipher::transform(bytes, &key))
        .with_context(|| format!("Failed to write {output:?}"))?;
    info!("xor {input:?} -> {output:?} ({len} bytes)");
    Ok(())
}

fn serve(port: u16, file: &Path) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("Failed to read {file:?}"))?;
    let listener = TcpListener::bind(("127.0.0.1", port))
        .with_context(|| format!("Failed to bind port {port}"))?;
    eprintln!("serving {} bytes on port {port}", bytes.len());

    let (mut socket, peer) = listener.accept()?;
    socket.set_write_timeout(Some(Duration::from_secs(30)))?;
    socket.write_all(&bytes)?;
    info!("served {} bytes to {peer}", bytes.len());
    Ok(())
}

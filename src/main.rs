//! CLI entry point for the station ranking dashboards.
//!
//! Provides subcommands for rendering one ranking, listing the selectable
//! dates and categories of a data file, and exploring selections
//! interactively against a cached record set.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::ffi::OsStr;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use station_rank::error::{Notice, NoticeLevel};
use station_rank::filter::{CategoryFilter, Selection, parse_selection_date};
use station_rank::output::{print_pretty, render_text, write_chart_json, write_table, write_table_file};
use station_rank::page::{Page, PageOutcome, RenderedPage};
use station_rank::profile::PageProfile;
use tracing::{debug, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "station_rank")]
#[command(about = "Rank the busiest stations of a subway or bike-share data file", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum PageKind {
    /// Subway boardings and alightings per station
    Subway,
    /// Bike-share rentals and returns per station
    Bike,
}

#[derive(Args)]
struct PageArgs {
    /// Built-in page profile
    #[arg(short, long, value_enum, default_value_t = PageKind::Subway)]
    page: PageKind,

    /// JSON profile file, used instead of the built-in page
    #[arg(long)]
    profile_file: Option<PathBuf>,

    /// CSV data file (may be gzip-compressed with a .gz extension)
    #[arg(short, long)]
    source: PathBuf,

    /// Number of stations to rank (defaults to the profile's top_n)
    #[arg(short = 'n', long)]
    top: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one ranking for a date and category
    Rank {
        #[command(flatten)]
        page: PageArgs,

        /// Date to analyze, YYYYMMDD or YYYY-MM-DD (defaults to the first date in the data)
        #[arg(short, long)]
        date: Option<String>,

        /// Category (e.g. subway line) to restrict to, or "all"
        #[arg(short, long, default_value = "all")]
        category: String,

        /// Write the chart as JSON to this file
        #[arg(long)]
        chart_json: Option<PathBuf>,

        /// Write the ranked table as CSV to this file
        #[arg(long)]
        table_csv: Option<PathBuf>,
    },
    /// List the dates and categories available in a data file
    Options {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Read selections from stdin, one per line: `<date> [category]`
    Explore {
        #[command(flatten)]
        page: PageArgs,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/station_rank.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("station_rank.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rank {
            page,
            date,
            category,
            chart_json,
            table_csv,
        } => {
            let mut page = open_page(&page)?;
            let date = date
                .as_deref()
                .map(parse_selection_date)
                .transpose()
                .context("invalid --date, expected YYYYMMDD or YYYY-MM-DD")?;
            let category: CategoryFilter = category.parse()?;

            let selection = match date {
                Some(date) => Selection::new(Some(date), category),
                // Without a date, start from the first loaded day like the dashboard does.
                None => match page.options() {
                    Ok(options) => Selection::new(options.default_selection().date, category),
                    Err(_) => Selection::new(None, category),
                },
            };

            match page.render(&selection) {
                PageOutcome::Rendered(rendered) => {
                    show(&rendered)?;
                    if let Some(path) = chart_json {
                        write_chart_json(&path, &rendered.chart)?;
                    }
                    if let Some(path) = table_csv {
                        write_table_file(&path, &rendered.table)?;
                    }
                }
                PageOutcome::Notice(notice) => {
                    show_notice(&notice);
                    if notice.level == NoticeLevel::Error {
                        bail!("{}", notice.message);
                    }
                }
            }
        }
        Commands::Options { page } => {
            let mut page = open_page(&page)?;
            let options = page.options().map_err(|e| anyhow::anyhow!(e.notice().message))?;

            match (options.min_date, options.max_date) {
                (Some(min), Some(max)) => println!("dates: {min} ..= {max}"),
                _ => println!("dates: (none)"),
            }
            if page.profile().category_column.is_some() {
                println!("categories: all, {}", options.categories.join(", "));
            }
            info!(
                min_date = ?options.min_date,
                max_date = ?options.max_date,
                categories = options.categories.len(),
                "Selection options"
            );
        }
        Commands::Explore { page } => {
            let mut page = open_page(&page)?;
            explore(&mut page)?;
        }
    }

    Ok(())
}

/// Resolves the profile from the command line and binds it to the data file.
fn open_page(args: &PageArgs) -> Result<Page> {
    let profile = match &args.profile_file {
        Some(path) => PageProfile::load(path)?,
        None => match args.page {
            PageKind::Subway => PageProfile::subway(),
            PageKind::Bike => PageProfile::bike_share(),
        },
    };
    info!(profile = %profile.name, source = %args.source.display(), "Page opened");

    let page = Page::new(profile, &args.source);
    Ok(match args.top {
        Some(top) => page.with_top_n(top),
        None => page,
    })
}

/// Prints the chart and its table to stdout.
fn show(rendered: &RenderedPage) -> Result<()> {
    print_pretty(&rendered.chart);
    print!("{}", render_text(&rendered.chart));
    println!();
    write_table(std::io::stdout().lock(), &rendered.table)?;
    Ok(())
}

fn show_notice(notice: &Notice) {
    let tag = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    };
    println!("[{tag}] {}", notice.message);
}

/// Parses an explore line: empty for defaults, otherwise `<date> [category]`.
fn parse_explore_line(line: &str, default: &Selection) -> Result<Selection> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(default.clone());
    }
    let (date, category) = match line.split_once(char::is_whitespace) {
        Some((date, category)) => (date, category.trim()),
        None => (line, ""),
    };
    let date = parse_selection_date(date)
        .with_context(|| format!("invalid date '{date}', expected YYYYMMDD or YYYY-MM-DD"))?;
    Ok(Selection::new(Some(date), category.parse()?))
}

/// Renders one page per stdin line until EOF, reusing the loaded records.
fn explore(page: &mut Page) -> Result<()> {
    let default = match page.options() {
        Ok(options) => {
            if let (Some(min), Some(max)) = (options.min_date, options.max_date) {
                println!("dates: {min} ..= {max}");
            }
            if !options.categories.is_empty() {
                println!("categories: all, {}", options.categories.join(", "));
            }
            options.default_selection()
        }
        Err(e) => {
            show_notice(&e.notice());
            Selection::default()
        }
    };

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let selection = match parse_explore_line(&line, &default) {
            Ok(selection) => selection,
            Err(e) => {
                show_notice(&Notice::warning(format!("{e:#}")));
                continue;
            }
        };
        match page.render(&selection) {
            PageOutcome::Rendered(rendered) => show(&rendered)?,
            PageOutcome::Notice(notice) => show_notice(&notice),
        }
        debug!(loads = page.cache().loads(), "Explore iteration done");
    }

    info!(loads = page.cache().loads(), "Explore session finished");
    Ok(())
}

//! volmatrix CLI
//!
//! Fetches an options snapshot and prints one page of the IV matrix.
//!
//! Usage:
//!   POLYGON_API_KEY=... cargo run --bin volmatrix -- SPY --side put --sort iv --column 2

use clap::{Parser, ValueEnum};
use std::process::ExitCode;

use volmatrix::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "volmatrix", about = "Implied volatility matrix for an options chain")]
struct Args {
    /// Underlying ticker symbol
    symbol: String,

    /// Option side to show
    #[arg(long, default_value = "call")]
    side: ContractType,

    /// Sort key
    #[arg(long, value_enum)]
    sort: Option<SortArg>,

    /// Expiration column for `--sort iv`
    #[arg(long, default_value = "0")]
    column: usize,

    /// Sort descending instead of ascending
    #[arg(long)]
    descending: bool,

    /// Zero-based page of strikes to print
    #[arg(long, default_value = "0")]
    page: usize,

    /// Strikes per page (0 = all)
    #[arg(long, default_value = "30")]
    page_size: usize,

    /// API root
    #[arg(long, default_value = "https://api.polygon.io")]
    base_url: String,

    /// Plain output without ANSI colors
    #[arg(long)]
    no_color: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Strike,
    Expiration,
    Iv,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::level_filters::LevelFilter::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> MatrixResult<()> {
    let api_key = ApiKey::new(std::env::var("POLYGON_API_KEY").unwrap_or_default())
        .map_err(|_| MatrixError::invalid_input("POLYGON_API_KEY is not set"))?;

    let mut fetch = FetchConfig::new(api_key);
    fetch.base_url = args.base_url.clone();
    let client = SnapshotClient::new(fetch)?;

    let records = client.fetch_chain(&args.symbol)?;
    let (matrix, stats) = SurfaceMatrix::build_with_stats(args.side, &records)?;

    let matrix = match args.sort {
        Some(arg) => {
            let key = match arg {
                SortArg::Strike => SortKey::Strike,
                SortArg::Expiration => SortKey::Expiration,
                SortArg::Iv => SortKey::IvAtExpiration(args.column),
            };
            let direction = if args.descending {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            sort(&matrix, &SortConfig::new(key, direction))?
        }
        None => matrix,
    };

    let page = RowPage::of(&matrix, args.page, args.page_size);

    println!(
        "{} {}s | Spot: ${:.2} | {} strikes x {} expirations | {} quoted cells",
        args.symbol.trim().to_uppercase(),
        matrix.contract_type(),
        matrix.underlying_price(),
        matrix.strikes().len(),
        matrix.expirations().len(),
        matrix.quoted_cells()
    );
    if stats.duplicates > 0 || stats.skipped > 0 {
        println!(
            "({} duplicate keys overwritten, {} unusable records skipped)",
            stats.duplicates, stats.skipped
        );
    }
    println!();

    print_page(&matrix, &page, !args.no_color);

    println!(
        "\nPage {}/{}  (* at the money, ~ within ${:.0})",
        page.page + 1,
        page.page_count,
        NEAR_ATM_BAND
    );
    Ok(())
}

fn print_page(matrix: &SurfaceMatrix, page: &RowPage, color: bool) {
    let colors = matrix.color_grid();
    let flags = matrix.moneyness_flags();
    let columns = matrix.expirations().len();

    print!("{:>10} |", "Strike");
    for j in 0..columns {
        print!(" {:>8}", matrix.expirations()[j].format("%y-%m-%d").to_string());
    }
    println!();
    println!("{}", "-".repeat(11 + 9 * columns));

    for i in page.rows.clone() {
        let marker = match flags[i] {
            MoneynessFlag::Atm => '*',
            MoneynessFlag::NearAtm => '~',
            MoneynessFlag::Away => ' ',
        };
        print!("{}{:>9.2} |", marker, matrix.strikes()[i]);

        for j in 0..columns {
            let text = if matrix.is_empty_cell(i, j) {
                format!("{:>8}", "-")
            } else {
                format!("{:>7.1}%", matrix.ivs()[[i, j]] * 100.0)
            };

            if color && !matrix.is_empty_cell(i, j) {
                let (r, g, b) = colors[[i, j]].rgb();
                let fg = if colors[[i, j]].light_text() { 255 } else { 0 };
                print!(
                    " \x1b[48;2;{};{};{}m\x1b[38;2;{fg};{fg};{fg}m{}\x1b[0m",
                    r, g, b, text
                );
            } else {
                print!(" {}", text);
            }
        }
        println!();
    }
}

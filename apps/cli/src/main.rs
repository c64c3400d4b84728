use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use posprint_printing::{
    Completion, PosPrinter, PrintLine, PrintOptions, VirtualPrintBackend, VirtualSurfaceHost,
};
use serde::Deserialize;

#[derive(Parser)]
#[command(
    name = "posprint-cli",
    about = "Render and spool POS receipt jobs from the command line",
    author,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 僅渲染收據並輸出結果，不送交列印。 / Render a receipt job and show the result without printing.
    Preview(PreviewArgs),
    /// 渲染收據並送交列印佇列。 / Render a receipt job and spool it to a printer.
    Print(PrintArgs),
}

#[derive(Args)]
struct PreviewArgs {
    /// 收據作業描述檔（JSON）。 / Receipt job description (JSON).
    #[arg(value_name = "JOB_FILE")]
    job: PathBuf,
}

#[derive(Args)]
struct PrintArgs {
    /// 收據作業描述檔（JSON）。 / Receipt job description (JSON).
    #[arg(value_name = "JOB_FILE")]
    job: PathBuf,

    /// 目標印表機名稱；覆寫作業檔中的設定。 / Target printer name; overrides the job file.
    #[arg(long, value_name = "NAME")]
    printer: Option<String>,

    /// 不顯示作業系統列印對話框。 / Suppress the OS print dialog.
    #[arg(long)]
    silent: bool,

    /// 列印份數；覆寫作業檔中的設定。 / Number of copies; overrides the job file.
    #[arg(long, value_name = "N")]
    copies: Option<u32>,

    /// 每行的逾時預算（毫秒）。 / Per-line timeout budget in milliseconds.
    #[arg(long, value_name = "MILLIS")]
    time_out_per_line: Option<u64>,
}

/// On-disk job description: optional options block plus the content lines.
#[derive(Deserialize)]
struct JobFile {
    #[serde(default)]
    options: PrintOptions,
    lines: Vec<PrintLine>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    match Cli::parse().command {
        Commands::Preview(args) => execute_preview(args),
        Commands::Print(args) => execute_print(args),
    }
}

fn execute_preview(args: PreviewArgs) -> Result<()> {
    let job = load_job(&args.job)?;
    let mut options = job.options;
    options.preview = true;

    let host = VirtualSurfaceHost::new();
    let printer = PosPrinter::new(host.clone(), VirtualPrintBackend::new());
    printer
        .print(&job.lines, &options)
        .with_context(|| format!("preview of {} failed", args.job.display()))?;

    let rendered = print_receipts(&host);
    println!("Preview rendered ({rendered} lines)");
    Ok(())
}

fn execute_print(args: PrintArgs) -> Result<()> {
    let job = load_job(&args.job)?;
    let mut options = job.options;
    options.preview = false;
    if let Some(printer) = args.printer {
        options.printer_name = Some(printer);
    }
    if args.silent {
        options.silent = true;
    }
    if let Some(copies) = args.copies {
        options.copies = copies;
    }
    if let Some(millis) = args.time_out_per_line {
        options.time_out_per_line = millis;
    }

    let host = VirtualSurfaceHost::new();
    let backend = VirtualPrintBackend::new();
    let printer = PosPrinter::new(host.clone(), backend.clone());
    let outcome = printer
        .print(&job.lines, &options)
        .with_context(|| format!("print job {} failed", args.job.display()))?;

    print_receipts(&host);
    match outcome.complete {
        Completion::Device { accepted: true } => {
            for ticket in backend.submitted() {
                println!(
                    "Spooled to '{}' ({} copies{})",
                    ticket.device_name,
                    ticket.copies,
                    if ticket.silent { ", silent" } else { "" }
                );
            }
        }
        Completion::Device { accepted: false } => {
            bail!("the print subsystem did not accept the job");
        }
        Completion::Preview => unreachable!("print jobs never resolve as previews"),
    }
    Ok(())
}

fn load_job(path: &Path) -> Result<JobFile> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let job: JobFile = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse job file {}", path.display()))?;
    if job.lines.is_empty() {
        bail!("job file {} contains no lines", path.display());
    }
    Ok(job)
}

fn print_receipts(host: &VirtualSurfaceHost) -> usize {
    let mut rendered = 0;
    for receipt in host.drain_receipts() {
        for line in &receipt.lines {
            println!("{line}");
        }
        rendered += receipt.lines.len();
    }
    rendered
}

use anyhow::{anyhow, Result};
use console::{style, Style};
use indicatif::{ProgressBar, ProgressStyle};
use ormbench_engine::chunk::{ChunkProgress, ProgressSink};
use ormbench_engine::report::{ComparisonReport, ReportGenerator};
use ormbench_engine::{BenchmarkResult, RunContext, RunDelta, ScalabilityReport, Winner};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    Prometheus,
}

pub struct OutputManager {
    format: OutputFormat,
    colored: bool,
    quiet: bool,
}

impl OutputManager {
    pub fn new(format: OutputFormat, colored: bool, quiet: bool) -> Self {
        Self {
            format,
            colored,
            quiet,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Results of a `run`; `metrics` is the Prometheus text of the engine
    pub fn print_run(&self, ctx: &RunContext, metrics: &str) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(ctx)?,
            OutputFormat::Csv => print!("{}", ReportGenerator::results_to_csv(&ctx.results)?),
            OutputFormat::Prometheus => print!("{}", metrics),
            OutputFormat::Table => {
                for result in &ctx.results {
                    self.print_result_table(result);
                }
                if let Some(comparison) = &ctx.comparison {
                    self.print_comparison_table(&ReportGenerator::comparison(comparison));
                }
                for failure in &ctx.failures {
                    self.print_error(&format!("{}: {}", failure.backend, failure.message));
                }
                for warning in &ctx.warnings {
                    self.print_warning(warning);
                }
                for path in &ctx.persisted {
                    self.print_info(&format!("Saved {}", path.display()));
                }
            }
        }
        Ok(())
    }

    pub fn print_comparison(&self, report: &ComparisonReport) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(report),
            OutputFormat::Table => {
                self.print_comparison_table(report);
                Ok(())
            }
            OutputFormat::Csv => {
                print!("{}", ReportGenerator::comparison_to_csv(report)?);
                Ok(())
            }
            OutputFormat::Prometheus => Err(anyhow!(
                "Prometheus output is only available for the run command"
            )),
        }
    }

    pub fn print_deltas(&self, deltas: &[RunDelta]) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(&deltas),
            OutputFormat::Csv => {
                print!("{}", ReportGenerator::deltas_to_csv(deltas)?);
                Ok(())
            }
            OutputFormat::Table => {
                if !deltas.is_empty() {
                    self.heading("Run-over-run improvement");
                }
                for delta in deltas {
                    println!("{}", ReportGenerator::render_delta(delta));
                }
                Ok(())
            }
            OutputFormat::Prometheus => Err(anyhow!(
                "Prometheus output is only available for the run command"
            )),
        }
    }

    pub fn print_scalability(&self, report: &ScalabilityReport) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(report),
            OutputFormat::Table => {
                self.heading("Scalability");
                print!("{}", ReportGenerator::render_scalability(report));
                Ok(())
            }
            OutputFormat::Csv => {
                print!("{}", ReportGenerator::scalability_to_csv(report)?);
                Ok(())
            }
            OutputFormat::Prometheus => Err(anyhow!(
                "Prometheus output is only available for the run command"
            )),
        }
    }

    fn heading(&self, text: &str) {
        if self.colored {
            println!("\n{}", style(text).bold().underlined());
        } else {
            println!("\n{}", text);
        }
    }

    fn print_result_table(&self, result: &BenchmarkResult) {
        self.heading(&format!("{} ({} records)", result.backend_name, result.sample_size));
        let label = |text: &str| {
            if self.colored {
                style(text.to_string()).bold().to_string()
            } else {
                text.to_string()
            }
        };
        println!(
            "  {}: {} ops/s",
            label("Insert"),
            ormbench_engine::report::format_number(result.insert_ops_per_second())
        );
        println!(
            "  {}: {} ops/s",
            label("Query"),
            ormbench_engine::report::format_number(result.query_ops_per_second())
        );
        println!("  {}: {:.2}s", label("Total time"), result.total_time());
        println!("  {}: {:+.1}MB", label("Memory"), result.total_memory());
    }

    fn print_comparison_table(&self, report: &ComparisonReport) {
        self.heading(&format!("{} vs {}", report.backend_a, report.backend_b));
        print!("{}", ReportGenerator::render_table(report));

        println!();
        for line in ReportGenerator::narrative(report) {
            if self.colored && line.starts_with("Overall") {
                let tone = match report.summary.overall {
                    Winner::Backend(_) => Style::new().green().bold(),
                    Winner::Tie => Style::new().yellow().bold(),
                };
                println!("{}", tone.apply_to(line));
            } else {
                println!("{}", line);
            }
        }
    }

    pub fn print_success(&self, message: &str) {
        if self.quiet {
            return;
        }
        if self.colored {
            println!("{} {}", style("✓").green().bold(), message);
        } else {
            println!("✓ {}", message);
        }
    }

    pub fn print_warning(&self, message: &str) {
        if self.colored {
            eprintln!("{} {}", style("⚠").yellow().bold(), message);
        } else {
            eprintln!("⚠ {}", message);
        }
    }

    pub fn print_error(&self, message: &str) {
        if self.colored {
            eprintln!("{} {}", style("✗").red().bold(), message);
        } else {
            eprintln!("✗ {}", message);
        }
    }

    pub fn print_info(&self, message: &str) {
        if self.quiet {
            return;
        }
        if self.colored {
            println!("{} {}", style("ℹ").blue().bold(), message);
        } else {
            println!("ℹ {}", message);
        }
    }

    /// Bar driven by chunk progress; hidden unless printing a table
    pub fn create_progress_bar(&self) -> ProgressBar {
        if self.quiet || self.format != OutputFormat::Table {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(0);
        if let Ok(bar_style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}")
        {
            pb.set_style(bar_style.progress_chars("#>-"));
        }
        pb
    }
}

/// Chunk progress on an indicatif bar
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarProgress {
    fn on_chunk(&self, progress: &ChunkProgress) {
        if progress.chunk_index == 0 {
            self.bar.reset();
            self.bar.set_length(progress.chunk_count as u64);
        }
        self.bar.set_position(progress.chunk_index as u64 + 1);
        self.bar.set_message(format!(
            "{} records, {:.1}MB -> {:.1}MB",
            progress.items_in_chunk, progress.memory_before_mb, progress.memory_after_mb
        ));
    }
}

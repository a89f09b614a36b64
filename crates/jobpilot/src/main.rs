mod logging;
mod prompt;

use clap::{CommandFactory, Parser};
use jobpilot_e::{WebDriverBackend, WebDriverOptions};
use jobpilot_engine::backend::Backend;
use jobpilot_engine::config::{ConfigLoader, JobPilotConfig};
use jobpilot_engine::formatter::{format_job_list, format_outcomes, format_trigger_line};
use jobpilot_engine::orchestrator::{Flow, FlowReport, Orchestrator, OrchestratorError, RunReport};
use jobpilot_h::{HeadlessBackend, LaunchOptions};
use prompt::StdinPrompt;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "jobpilot",
    version,
    about = "Run jobs in a web orchestration console through a real browser",
    after_help = "Examples:\n  jobpilot --job \"My Process\"\n  jobpilot --list-jobs\n  jobpilot --all\n  jobpilot --job \"Job1\" --job \"Job2\""
)]
struct Args {
    /// Name of a job to run (can be given multiple times)
    #[arg(long = "job", value_name = "NAME")]
    jobs: Vec<String>,

    /// List all available jobs
    #[arg(long)]
    list_jobs: bool,

    /// Run all available jobs
    #[arg(long)]
    all: bool,

    /// Configuration file (default: ./jobpilot.yaml, then ~/.jobpilot/config.yaml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long)]
    headless: bool,

    /// Drive a browser through this WebDriver server instead of launching Chromium
    #[arg(long, value_name = "URL")]
    webdriver_url: Option<String>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Listing wins over running everything, which wins over named jobs.
    fn flow(&self) -> Option<Flow> {
        if self.list_jobs {
            Some(Flow::ListJobs)
        } else if self.all {
            Some(Flow::RunAll)
        } else if !self.jobs.is_empty() {
            Some(Flow::RunJobs(self.jobs.clone()))
        } else {
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let Some(flow) = args.flow() else {
        Args::command().print_help()?;
        println!("\nPlease specify --job, --list-jobs, or --all");
        return Ok(());
    };

    dotenvy::dotenv().ok();
    let mut config = ConfigLoader::load(args.config.as_deref()).await?;
    if args.headless {
        config.browser.headless = true;
    }
    if let Some(url) = &args.webdriver_url {
        config.browser.webdriver_url = Some(url.clone());
    }

    let _log_guard = logging::init(&config.logging, args.verbose)?;

    let debug_screenshot = config.artifacts.debug_screenshot_path();
    let report = match WebDriverOptions::from_config(&config.browser) {
        Some(options) => execute(WebDriverBackend::new(options), config, flow.clone()).await?,
        None => {
            let options = LaunchOptions::from(&config.browser);
            execute(HeadlessBackend::with_options(options), config, flow.clone()).await?
        }
    };

    if let Some(report) = report {
        print_report(&flow, &report, &debug_screenshot.display().to_string());
    }
    Ok(())
}

/// `None` when the operator interrupted the run; teardown has already happened.
async fn execute<B: Backend>(
    backend: B,
    config: JobPilotConfig,
    flow: Flow,
) -> anyhow::Result<Option<RunReport>> {
    let mut orchestrator =
        Orchestrator::new(backend, config)?.with_prompt(Box::new(StdinPrompt::new()));
    match orchestrator.run_until(flow, tokio::signal::ctrl_c()).await {
        Ok(report) => Ok(Some(report)),
        Err(OrchestratorError::Interrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn print_report(flow: &Flow, report: &RunReport, debug_screenshot: &str) {
    match (&report.result, flow) {
        (FlowReport::Jobs(jobs), _) => {
            println!("\n{}", format_job_list(jobs, debug_screenshot));
        }
        (FlowReport::Outcomes(outcomes), Flow::RunAll) => {
            println!("\n{}", format_outcomes("Job Execution Results", outcomes));
        }
        (FlowReport::Outcomes(outcomes), _) => {
            for outcome in outcomes.iter() {
                println!("{}", format_trigger_line(&outcome.name, outcome.succeeded));
            }
            println!("\n{}", format_outcomes("Summary", outcomes));
        }
    }
}

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use modelwhiz_client::{
    AuthProvider, EnvAuthProvider, EvaluationJob, EvaluationRequest, HistorySummary, JobOutcome,
    JobStatus, ManualMetrics, MetricLogEntry, ModelComparison, ModelWhizConfig, Services, Session,
    TrendDirection, UploadRequest, WatchEvent, Winner,
};

#[derive(Parser)]
#[command(name = "modelwhiz")]
#[command(about = "ModelWhiz - ML model evaluation dashboard client", long_about = None)]
struct Cli {
    /// Evaluation API base URL (overrides MODELWHIZ_API_BASE)
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// User id attached to requests (overrides MODELWHIZ_USER_ID)
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List uploaded models
    Models {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Upload a model to the catalog
    Upload {
        /// Display name for the model
        #[arg(short, long)]
        name: String,

        /// Model file (.pkl / .joblib)
        #[arg(short, long)]
        file: PathBuf,

        /// Optional test CSV for an immediate scoring pass
        #[arg(long)]
        test_file: Option<PathBuf>,
    },

    /// Re-score an existing model against a test dataset
    Score {
        model_id: i64,

        /// Test CSV file
        #[arg(long)]
        test_file: PathBuf,
    },

    /// Delete a model
    Delete { model_id: i64 },

    /// Record manually entered metrics for a model
    SetMetrics {
        model_id: i64,

        #[arg(long)]
        accuracy: f64,

        #[arg(long)]
        f1_score: f64,

        #[arg(long)]
        auc: f64,
    },

    /// Append an entry to a model's metric history
    LogMetrics {
        model_id: i64,

        #[arg(long)]
        accuracy: f64,

        #[arg(long)]
        f1_score: f64,

        #[arg(long)]
        auc: f64,
    },

    /// Submit an evaluation job and watch it to a terminal state
    Evaluate {
        /// Model file to evaluate
        #[arg(long)]
        model_file: PathBuf,

        /// Test dataset CSV
        #[arg(long)]
        dataset: PathBuf,

        /// Display name for the job
        #[arg(short, long)]
        name: String,

        /// Target column in the dataset
        #[arg(long)]
        target_column: String,

        /// Preprocessor file, when the model needs one
        #[arg(long)]
        preprocessor: Option<PathBuf>,

        /// Submit only; print the job id without polling
        #[arg(long)]
        no_watch: bool,
    },

    /// Watch an existing evaluation job until it finishes
    Watch { job_id: i64 },

    /// Evaluation job history for the current user
    Jobs,

    /// Terminal snapshot of an evaluation job
    Results {
        job_id: i64,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Metric history, best values and trends for a model
    History { model_id: i64 },

    /// Compare two models side by side
    Compare { model_a: i64, model_b: i64 },

    /// Automated insights for a model
    Insights { model_id: i64 },

    /// Check API connectivity
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = ModelWhizConfig::from_env();
    if let Some(base) = &cli.api_base {
        config.api.base_url = base.clone();
    }
    let services = Services::from_config(&config);

    // Seed the session: an explicit --user wins, otherwise whatever the
    // environment-backed provider reports.
    if let Some(user_id) = &cli.user {
        services.session.set(Some(Session { user_id: user_id.clone(), email: None }));
    } else if let Ok(session) = EnvAuthProvider.current_session().await {
        services.session.set(session);
    }

    match cli.command {
        Commands::Models { output } => cmd_models(&services, &output).await?,
        Commands::Upload { name, file, test_file } => {
            cmd_upload(&services, name, file, test_file).await?
        }
        Commands::Score { model_id, test_file } => {
            cmd_score(&services, model_id, test_file).await?
        }
        Commands::Delete { model_id } => cmd_delete(&services, model_id).await?,
        Commands::SetMetrics { model_id, accuracy, f1_score, auc } => {
            cmd_set_metrics(&services, model_id, ManualMetrics { accuracy, f1_score, auc }).await?
        }
        Commands::LogMetrics { model_id, accuracy, f1_score, auc } => {
            cmd_log_metrics(&services, model_id, accuracy, f1_score, auc).await?
        }
        Commands::Evaluate {
            model_file,
            dataset,
            name,
            target_column,
            preprocessor,
            no_watch,
        } => {
            cmd_evaluate(&services, model_file, dataset, name, target_column, preprocessor, no_watch)
                .await?
        }
        Commands::Watch { job_id } => cmd_watch(&services, job_id).await?,
        Commands::Jobs => cmd_jobs(&services).await?,
        Commands::Results { job_id, output } => cmd_results(&services, job_id, &output).await?,
        Commands::History { model_id } => cmd_history(&services, model_id).await?,
        Commands::Compare { model_a, model_b } => cmd_compare(&services, model_a, model_b).await?,
        Commands::Insights { model_id } => cmd_insights(&services, model_id).await?,
        Commands::Status => cmd_status(&services).await?,
    }

    Ok(())
}

async fn cmd_models(services: &Services, output: &str) -> Result<()> {
    let user_id = services.session.user_id();
    let models = services.api.list_models(user_id.as_deref()).await?;

    if output == "json" {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    println!();
    println!("Uploaded Models:");
    println!("{:-<100}", "");
    println!(
        "  {:<5} {:<28} {:<8} {:<14} {:<28} {}",
        "ID", "NAME", "VERSION", "TASK", "LATEST METRICS", "UPLOADED"
    );
    println!("{:-<100}", "");
    for model in &models {
        let metrics = model
            .latest_metrics()
            .map(|m| {
                m.entries()
                    .iter()
                    .map(|(name, value)| format!("{name} {value:.3}"))
                    .collect::<Vec<_>>()
                    .join("  ")
            })
            .unwrap_or_else(|| "not evaluated".to_string());
        println!(
            "  {:<5} {:<28} {:<8} {:<14} {:<28} {}",
            model.id,
            model.name,
            model.version,
            model.task_type.label(),
            metrics,
            model.upload_time.format("%Y-%m-%d %H:%M")
        );
    }
    println!();

    Ok(())
}

async fn cmd_upload(
    services: &Services,
    name: String,
    file: PathBuf,
    test_file: Option<PathBuf>,
) -> Result<()> {
    let mut catalog = services.catalog();
    catalog.upload(&UploadRequest { name: name.clone(), file, test_file }).await?;
    println!("Model '{name}' uploaded ({} models in catalog)", catalog.models().len());
    Ok(())
}

async fn cmd_score(services: &Services, model_id: i64, test_file: PathBuf) -> Result<()> {
    let mut catalog = services.catalog();
    catalog.evaluate(model_id, &test_file).await?;
    match catalog.find(model_id).and_then(|model| model.latest_metrics()) {
        Some(metrics) => {
            println!("Evaluation complete:");
            for (name, value) in metrics.entries() {
                println!("  {:<10} {:.3}", name, value);
            }
        }
        None => println!("Evaluation complete; no metrics reported yet"),
    }
    Ok(())
}

async fn cmd_delete(services: &Services, model_id: i64) -> Result<()> {
    let mut catalog = services.catalog();
    catalog.delete(model_id).await?;
    println!("Model {model_id} deleted ({} models remain)", catalog.models().len());
    Ok(())
}

async fn cmd_set_metrics(
    services: &Services,
    model_id: i64,
    metrics: ManualMetrics,
) -> Result<()> {
    let mut catalog = services.catalog();
    catalog.update_metrics(model_id, &metrics).await?;
    println!("Metrics updated for model {model_id}");
    Ok(())
}

async fn cmd_log_metrics(
    services: &Services,
    model_id: i64,
    accuracy: f64,
    f1_score: f64,
    auc: f64,
) -> Result<()> {
    services
        .api
        .log_metrics(&MetricLogEntry { model_id, accuracy, f1_score, auc })
        .await?;
    println!("History entry logged for model {model_id}");
    Ok(())
}

async fn cmd_evaluate(
    services: &Services,
    model_file: PathBuf,
    dataset: PathBuf,
    name: String,
    target_column: String,
    preprocessor: Option<PathBuf>,
    no_watch: bool,
) -> Result<()> {
    let user_id = require_user(services)?;
    let request = EvaluationRequest {
        model_file,
        dataset,
        model_name: name,
        target_column,
        user_id,
        needs_preprocessor: preprocessor.is_some(),
        preprocessor_file: preprocessor,
    };

    let job_id = services.api.start_evaluation(&request).await?;
    println!("Evaluation job {job_id} submitted");

    if no_watch {
        println!("Run `modelwhiz watch {job_id}` to follow it");
        return Ok(());
    }
    watch_job(services, job_id).await
}

async fn cmd_watch(services: &Services, job_id: i64) -> Result<()> {
    watch_job(services, job_id).await
}

/// Poll the job to a terminal state, streaming progress lines. Ctrl-C
/// cancels the watch without touching the job server-side.
async fn watch_job(services: &Services, job_id: i64) -> Result<()> {
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        let mut last_status: Option<JobStatus> = None;
        while let Some(event) = rx.recv().await {
            if let WatchEvent::Polling { status } = event {
                if last_status != Some(status) {
                    println!("  status: {status}");
                    last_status = Some(status);
                }
            }
        }
    });

    let outcome = services.poller.watch(job_id, cancel, Some(tx)).await?;
    let _ = printer.await;

    match outcome {
        JobOutcome::Completed(job) => {
            println!();
            render_results(services, &job);
            Ok(())
        }
        JobOutcome::Failed(job) => {
            let message = job
                .error_message
                .unwrap_or_else(|| "An unknown error occurred.".to_string());
            anyhow::bail!("evaluation failed: {message}")
        }
        JobOutcome::Cancelled => {
            println!("Watch cancelled; job {job_id} keeps running server-side");
            Ok(())
        }
    }
}

async fn cmd_jobs(services: &Services) -> Result<()> {
    let user_id = require_user(services)?;
    let jobs = services.api.list_jobs(&user_id).await?;

    if jobs.is_empty() {
        println!("No evaluations found. Run `modelwhiz evaluate` to start one.");
        return Ok(());
    }

    println!();
    println!("Evaluation History:");
    println!("{:-<70}", "");
    println!("  {:<6} {:<28} {:<12} {}", "ID", "MODEL NAME", "STATUS", "CREATED");
    println!("{:-<70}", "");
    for job in &jobs {
        println!(
            "  {:<6} {:<28} {:<12} {}",
            job.id,
            job.model_name,
            job.status.as_str(),
            job.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();

    Ok(())
}

async fn cmd_results(services: &Services, job_id: i64, output: &str) -> Result<()> {
    let job = services.api.job_results(job_id).await?;

    if output == "json" {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }

    match job.status {
        JobStatus::Completed => render_results(services, &job),
        JobStatus::Failed => {
            println!("Evaluation failed: {}", job.error_message.as_deref().unwrap_or("An unknown error occurred."));
        }
        status => {
            println!("Job {job_id} is still {status}. Run `modelwhiz watch {job_id}` to follow it.");
        }
    }

    Ok(())
}

fn render_results(services: &Services, job: &EvaluationJob) {
    println!("Evaluation Results: {}", job.model_name);
    println!("{:-<44}", "");
    for (name, value) in job.metric_entries() {
        println!("  {:<14} {}", name.replace('_', " ").to_uppercase(), value);
    }
    if let Some(plot) = job.plot_url() {
        println!();
        println!("  Plot: {}", services.api.asset_url(plot));
    }
    let insights = job.insights();
    if !insights.is_empty() {
        println!();
        println!("Automated Insights:");
        for line in insights {
            println!("  - {line}");
        }
    }
}

async fn cmd_history(services: &Services, model_id: i64) -> Result<()> {
    let models = services.api.list_models(services.session.user_id().as_deref()).await?;
    let Some(model) = models.iter().find(|m| m.id == model_id) else {
        println!("Model not found");
        return Ok(());
    };

    let points = modelwhiz_client::normalize(&model.metrics);
    if points.is_empty() {
        println!("No historical data to display.");
        return Ok(());
    }

    println!();
    println!("{} - {} evaluations", model.name, points.len());
    println!("{:-<60}", "");
    for point in &points {
        let row = point
            .values
            .iter()
            .map(|(name, value)| format!("{name} {value:.3}"))
            .collect::<Vec<_>>()
            .join("  ");
        println!("  {}  {}", point.timestamp.format("%Y-%m-%d %H:%M"), row);
    }

    let summary = HistorySummary::from_points(model.task_type, &points);
    println!();
    println!("Best observed:");
    for (name, value) in &summary.best {
        println!("  {:<10} {:.3}", name, value);
    }

    let trends = modelwhiz_client::trends(&points);
    if !trends.is_empty() {
        println!();
        println!("Trend vs previous evaluation:");
        for (name, trend) in &trends {
            let arrow = match trend.direction {
                TrendDirection::Positive => "up",
                TrendDirection::Negative => "down",
                TrendDirection::Neutral => "flat",
            };
            println!("  {:<10} {:+.1}% ({arrow})", name, trend.change_pct);
        }
    }
    println!();

    Ok(())
}

async fn cmd_compare(services: &Services, model_a: i64, model_b: i64) -> Result<()> {
    let models = services.api.list_models(services.session.user_id().as_deref()).await?;
    let Some(a) = models.iter().find(|m| m.id == model_a) else {
        println!("Model {model_a} not found");
        return Ok(());
    };
    let Some(b) = models.iter().find(|m| m.id == model_b) else {
        println!("Model {model_b} not found");
        return Ok(());
    };

    let comparison = ModelComparison::compute(a, b)?;

    println!();
    println!("Comparing {} (A) vs {} (B)", comparison.model_a, comparison.model_b);
    println!("{:-<72}", "");
    for metric in &comparison.metrics {
        let winner = metric.winner.label(&comparison.model_a, &comparison.model_b);
        println!(
            "  {:<10} A {:.3} | B {:.3}  Winner: {}",
            metric.metric, metric.value_a, metric.value_b, winner
        );
        if metric.winner != Winner::Tie {
            println!(
                "             better by {:.3} ({:.1}% improvement)",
                metric.abs_difference, metric.relative_improvement_pct
            );
        }
    }
    if let Some(overall) = comparison.overall {
        let leader = overall.label(&comparison.model_a, &comparison.model_b);
        println!();
        println!("Overall performance leader: {leader}");
    }
    println!();

    Ok(())
}

async fn cmd_insights(services: &Services, model_id: i64) -> Result<()> {
    let insights = services.api.model_insights(model_id).await?;
    if insights.is_empty() {
        println!("No insights available for model {model_id}");
        return Ok(());
    }
    for line in insights {
        println!("  - {line}");
    }
    Ok(())
}

async fn cmd_status(services: &Services) -> Result<()> {
    println!("System Status:");
    println!("{:-<44}", "");
    println!("  API Base: {}", services.api.base_url());

    match services.api.list_models(None).await {
        Ok(models) => {
            println!("  API: connected ({} models available)", models.len());
        }
        Err(e) => {
            println!("  API: disconnected ({e})");
        }
    }

    Ok(())
}

fn require_user(services: &Services) -> Result<String> {
    services
        .session
        .user_id()
        .ok_or_else(|| anyhow::anyhow!("no user id; pass --user or set MODELWHIZ_USER_ID"))
}

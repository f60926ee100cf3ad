//! CV analysis example
//!
//! Runs the full flow against a live service:
//! - Loading configuration from the environment
//! - Validating and uploading a CV
//! - Starting analysis and following the job timeline
//! - Printing the final report
//!
//! Usage: `cargo run --example analyze_cv -- path/to/resume.pdf [provider]`
//!
//! Set `CV_ANALYZER_API_URL` to point at the service and `CV_ANALYZER_TOKEN`
//! to send a bearer token.

use cv_analyzer_client::error::UPLOAD_FAILED_MESSAGE;
use cv_analyzer_client::{
    AnalysisSession, AnalyzeRequest, Artifact, Config, PollEvent, ReportOutcome, SessionState,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cv_analyzer_client=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: analyze_cv <file> [provider]");
        std::process::exit(2);
    };
    let provider = args.next();

    let config = Config::from_env()?;
    let credentials = match std::env::var("CV_ANALYZER_TOKEN") {
        Ok(token) => SessionState::with_token(token),
        Err(_) => SessionState::new(),
    };
    let mut session = AnalysisSession::new(&config, credentials)?;

    let artifact = Artifact::from_path(&path).await?;
    if let Err(e) = session.select_artifact(artifact) {
        eprintln!("✗ {}", e.notice().message());
        std::process::exit(1);
    }

    let receipt = match session.upload().await {
        Ok(receipt) => receipt,
        Err(e) => {
            eprintln!("✗ {}", e.notice_or(UPLOAD_FAILED_MESSAGE).message());
            std::process::exit(1);
        }
    };
    println!("✓ Uploaded {} as {}", receipt.filename, receipt.cv_id);

    let started = session
        .start_analysis(AnalyzeRequest {
            provider,
            prompt_version: None,
        })
        .await?;
    println!("✓ Analysis started, job {}", started.job_id);

    if let Some(mut events) = session.subscribe() {
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    PollEvent::Snapshot { status, .. } => println!("  status: {}", status),
                    PollEvent::StatusUnavailable { error, .. } => {
                        println!("  status unavailable ({}), retrying", error.user_message())
                    }
                    PollEvent::Completed { .. } => println!("✓ Analysis complete"),
                    PollEvent::JobFailed { error, .. } => {
                        println!("✗ Analysis failed: {}", error.unwrap_or_default())
                    }
                }
            }
        });
    }

    match session.report().await {
        Ok(ReportOutcome::Ready(report)) => {
            println!();
            if let Some(overall) = report.overall_score() {
                println!("Overall score: {:.1}", overall);
            }
            for score in &report.scores {
                println!("  {:<20} {:>5.1}  {}", score.category, score.score, score.description);
            }
            if let Some(summary) = &report.summary {
                println!("\n{}", summary);
            }
        }
        Ok(ReportOutcome::JobFailed { error }) => {
            eprintln!("✗ No report: {}", error.unwrap_or_else(|| "job failed".into()));
        }
        Ok(ReportOutcome::Cancelled) => eprintln!("✗ Polling was cancelled"),
        Err(e) => eprintln!("✗ {}", e.notice().message()),
    }

    Ok(())
}

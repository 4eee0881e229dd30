//! jsjudge - judge a JavaScript submission against assertions
//!
//! Prints exactly one JSON result on stdout. Logs go to stderr.

use std::io::Write;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use jsjudge::{
    Assertion, ExternalCompiler, Judge, JudgeConfig, JudgeRequest, RequestError,
};

/// Exit code for requests that could not be judged
const EXIT_BAD_REQUEST: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "jsjudge", version, about = "Judge a JavaScript submission against assertions")]
struct Cli {
    /// Submitted source text
    source: String,

    /// JSON array of `{"id", "assertion", "is_public"}` objects
    assertions: String,

    /// JSON boolean; `false` sends the source through the front-end compiler
    #[arg(default_value = "true")]
    use_raw_source: String,

    /// Wall-clock budget for the whole run
    #[arg(long, env = "JSJUDGE_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// V8 heap limit in MiB
    #[arg(long, env = "JSJUDGE_MAX_HEAP_MB")]
    max_heap_mb: Option<usize>,

    /// Front-end compiler command, e.g. `node tsc-bridge.js`
    #[arg(long, env = "JSJUDGE_COMPILER")]
    compiler: Option<String>,

    /// Emit only public outcomes plus the number of failed secret ones
    #[arg(long)]
    public_only: bool,
}

impl Cli {
    fn config(&self) -> JudgeConfig {
        let mut config = JudgeConfig::default();
        if let Some(timeout_ms) = self.timeout_ms {
            config = config.with_timeout_ms(timeout_ms);
        }
        if let Some(megabytes) = self.max_heap_mb {
            config = config.with_max_heap_mb(megabytes);
        }
        config
    }

    fn request(&self) -> Result<JudgeRequest, RequestError> {
        let assertions: Vec<Assertion> = serde_json::from_str(&self.assertions)?;
        let use_raw_source: bool = serde_json::from_str(&self.use_raw_source)?;
        Ok(JudgeRequest {
            source: self.source.clone(),
            assertions,
            use_raw_source,
        })
    }
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let mut judge = Judge::new(cli.config());
    if let Some(command) = cli.compiler.as_deref() {
        let compiler = ExternalCompiler::from_command_line(command)
            .context("--compiler must name a command")?;
        judge = judge.with_front_end(Box::new(compiler));
    }

    let request = match cli.request() {
        Ok(request) => request,
        Err(e) => {
            error!("{e}");
            return Ok(ExitCode::from(EXIT_BAD_REQUEST));
        }
    };

    let result = match judge.judge(&request) {
        Ok(result) => result,
        Err(e) => {
            error!("{e}");
            return Ok(ExitCode::from(EXIT_BAD_REQUEST));
        }
    };

    let json = if cli.public_only {
        serde_json::to_string(&result.public_view())?
    } else {
        serde_json::to_string(&result)?
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}").context("failed to write result")?;
    Ok(ExitCode::SUCCESS)
}

fn main() -> anyhow::Result<ExitCode> {
    // stdout carries only the result
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    run(&cli)
}

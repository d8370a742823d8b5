//! skillctl - find the right skill for a request and audit skill scripts.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use clap::{Args, Parser, Subcommand};
use eyre::{bail, WrapErr};
use skill_core::lifecycle::{RequestLifecycle, RequestState};
use skill_core::{match_skills, Config, RequestAnalysis};
use skill_core::skills::extract_body;
use skillctl::render::{self, MatchJson, ScanJson, ShowJson, SkillListJson};
use skillctl::{discover_skills, scan_all, scan_skill, ScanOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Local skill registry and matcher.
#[derive(Parser)]
#[command(name = "skillctl")]
#[command(about = "Match requests to installed skills and scan skill scripts")]
#[command(version)]
struct Cli {
    /// Config file path (layered over .skillctl/config)
    #[arg(long, global = true, env = "SKILLCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Skills directory to search; repeat to search several (replaces skills_dirs)
    #[arg(long = "skills-dir", global = true)]
    skills_dirs: Vec<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List discovered skills
    List,
    /// Show one skill's metadata and SKILL.md body
    Show {
        /// Skill name
        name: String,
    },
    /// Rank skills against a request
    Match(MatchArgs),
    /// Scan skill scripts for suspicious code
    Scan {
        /// Scan only this skill
        #[arg(long)]
        skill: Option<String>,

        /// Skills root to scan (default: first global skills dir)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Args)]
struct MatchArgs {
    /// Request keyword; repeat for several
    #[arg(short, long = "keyword")]
    keywords: Vec<String>,

    /// Free-text request; keywords are extracted from it
    #[arg(short, long, conflicts_with = "keywords")]
    query: Option<String>,

    /// Analysis JSON file: {"keywords": [...], "intent": "...", "confidence": 0.9}
    #[arg(long, conflicts_with_all = ["keywords", "query"])]
    analysis: Option<PathBuf>,

    /// Request intent, compared against skill categories
    #[arg(short, long)]
    intent: Option<String>,

    /// Analyser confidence in [0, 1]
    #[arg(long)]
    confidence: Option<f64>,

    /// Maximum results to show (0 = all)
    #[arg(short, long)]
    limit: Option<usize>,

    #[arg(long)]
    keyword_weight: Option<f64>,

    #[arg(long)]
    intent_weight: Option<f64>,

    /// Results must score above this
    #[arg(long)]
    threshold: Option<f64>,
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays parseable.
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Runs a command and returns the process exit code.
fn run(cli: Cli) -> eyre::Result<i32> {
    let workspace_root = find_workspace_root()?;
    let mut config = Config::load_workspace(&workspace_root, cli.config.as_deref())
        .wrap_err("failed to load config")?;
    if !cli.skills_dirs.is_empty() {
        config.skills_dirs = cli.skills_dirs;
    }
    debug!(workspace = %workspace_root.display(), "workspace root");

    match cli.command {
        Command::List => run_list(&config, &workspace_root, cli.json).map(|()| 0),
        Command::Show { name } => run_show(&config, &workspace_root, &name, cli.json).map(|()| 0),
        Command::Match(args) => run_match(&mut config, &workspace_root, args, cli.json).map(|()| 0),
        Command::Scan { skill, dir } => run_scan(&config, &workspace_root, skill, dir, cli.json),
    }
}

fn run_list(config: &Config, workspace_root: &Path, json: bool) -> eyre::Result<()> {
    let discovery = discover_skills(config, workspace_root);
    if json {
        println!("{}", render::to_json(&SkillListJson::from(&discovery))?);
    } else {
        print!("{}", render::format_skill_list(&discovery));
    }
    Ok(())
}

fn run_show(config: &Config, workspace_root: &Path, name: &str, json: bool) -> eyre::Result<()> {
    let discovery = discover_skills(config, workspace_root);
    let Some(skill) = discovery.find(name) else {
        bail!("skill not found: {name}");
    };

    let skill_md = skill.path.join("SKILL.md");
    let content = std::fs::read_to_string(&skill_md)
        .wrap_err_with(|| format!("failed to read {}", skill_md.display()))?;
    let body = extract_body(&content)?;

    if json {
        println!("{}", render::to_json(&ShowJson { skill, body })?);
    } else {
        print!("{}", render::format_skill_detail(skill, body));
    }
    Ok(())
}

fn run_match(
    config: &mut Config,
    workspace_root: &Path,
    args: MatchArgs,
    json: bool,
) -> eyre::Result<()> {
    if let Some(w) = args.keyword_weight {
        config.keyword_weight = w;
    }
    if let Some(w) = args.intent_weight {
        config.intent_weight = w;
    }
    if let Some(t) = args.threshold {
        config.score_threshold = t;
    }
    if let Some(limit) = args.limit {
        config.max_results = limit;
    }

    let mut lifecycle = RequestLifecycle::new();
    let analysis = build_analysis(&args)?;
    lifecycle.advance(RequestState::Analyzed)?;
    info!(
        request_id = %lifecycle.id,
        keywords = analysis.keywords.len(),
        intent = %analysis.intent,
        "request analyzed"
    );

    let discovery = discover_skills(config, workspace_root);
    let records = discovery.records();
    let mut results = match_skills(&analysis, &records, &config.match_weights())
        .wrap_err("failed to match skills")?;
    lifecycle.advance(RequestState::Matched)?;

    if config.max_results > 0 {
        results.truncate(config.max_results);
    }
    if !results.is_empty() {
        lifecycle.advance(RequestState::Presented)?;
    }
    info!(
        request_id = %lifecycle.id,
        candidates = records.len(),
        matches = results.len(),
        state = %lifecycle.state(),
        "request matched"
    );

    if json {
        let doc = MatchJson {
            request: &lifecycle,
            analysis: &analysis,
            results: &results,
        };
        println!("{}", render::to_json(&doc)?);
    } else {
        print!("{}", render::format_match_results(&results));
    }
    Ok(())
}

/// Analysis file, else explicit keywords, else keywords extracted from the query.
fn build_analysis(args: &MatchArgs) -> eyre::Result<RequestAnalysis> {
    let intent = args.intent.clone().unwrap_or_default();

    let mut analysis = if let Some(path) = &args.analysis {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read analysis file {}", path.display()))?;
        let mut analysis: RequestAnalysis = serde_json::from_str(&content)
            .wrap_err_with(|| format!("invalid analysis file {}", path.display()))?;
        if args.intent.is_some() {
            analysis.intent = intent.into();
        }
        analysis
    } else if let Some(query) = &args.query {
        RequestAnalysis::from_text(query, intent)
    } else {
        RequestAnalysis::new(&args.keywords, intent, 1.0)
    };

    if let Some(confidence) = args.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            bail!("confidence must be between 0 and 1, got {confidence}");
        }
        analysis.confidence = confidence;
    }
    Ok(analysis)
}

fn run_scan(
    config: &Config,
    workspace_root: &Path,
    skill: Option<String>,
    dir: Option<PathBuf>,
    json: bool,
) -> eyre::Result<i32> {
    let root = match dir {
        Some(dir) => dir,
        None => match config.global_skills_dir(workspace_root) {
            Some(dir) => dir.to_path_buf(),
            None => bail!("no global skills directory configured; pass --dir"),
        },
    };
    let options = ScanOptions::from_config(config);

    let reports = match skill {
        Some(name) => {
            let skill_dir = root.join(&name);
            if !skill_dir.is_dir() {
                bail!("skill not found: {}", skill_dir.display());
            }
            vec![scan_skill(&skill_dir, &options)]
        }
        None => scan_all(&root, &options)?,
    };

    if json {
        println!("{}", render::to_json(&ScanJson::new(&reports))?);
    } else {
        print!("{}", render::format_scan(&reports));
    }

    let high_risk = reports.iter().any(|r| r.has_high_risk());
    Ok(i32::from(high_risk))
}

/// Find the workspace root (git root or cwd).
fn find_workspace_root() -> eyre::Result<PathBuf> {
    let output = std::process::Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .output();

    match output {
        Ok(out) if out.status.success() => {
            let path = String::from_utf8_lossy(&out.stdout).trim().to_string();
            Ok(PathBuf::from(path))
        }
        _ => std::env::current_dir().wrap_err("failed to determine current directory"),
    }
}

//! MLOps Synth - pipeline stack synthesizer CLI
//!
//! The `mlops-synth` command turns context configuration into deployable
//! templates for the build, train and deploy pipelines.
//!
//! ## Commands
//!
//! - `synth`: Synthesize stacks and write the cloud assembly
//! - `list`: List the available stacks
//! - `digest`: Print each stack's canonical template digest

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, Level};

use mlops_core::assembly::{template_file_name, write_assembly};
use mlops_core::{Environment, SynthesizedStack};
use mlops_stacks::{Context, StackKind};

/// Context file read when `--context-file` is not given, if present.
const DEFAULT_CONTEXT_FILE: &str = "cdk.json";

#[derive(Parser)]
#[command(name = "mlops-synth")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Synthesize MLOps build, train and deploy pipeline stacks", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize stacks and write templates plus a manifest
    Synth {
        /// Stacks to synthesize (default: all)
        stacks: Vec<String>,

        #[command(flatten)]
        context: ContextArgs,

        /// Output directory for the cloud assembly
        #[arg(short, long, default_value = "cdk.out")]
        output: PathBuf,
    },

    /// List the available stacks
    List,

    /// Print the canonical template digest of each stack
    Digest {
        /// Stacks to digest (default: all)
        stacks: Vec<String>,

        #[command(flatten)]
        context: ContextArgs,
    },
}

#[derive(Args, Debug, Default)]
struct ContextArgs {
    /// Context value as key=value (repeatable, overrides the context file)
    #[arg(short = 'c', long = "context", value_name = "KEY=VALUE")]
    assignments: Vec<String>,

    /// JSON context file (`{"context": {...}}` or a flat object)
    #[arg(long)]
    context_file: Option<PathBuf>,

    /// Target region (falls back to context `region`, then CDK_INTEG_REGION,
    /// then CDK_DEFAULT_REGION)
    #[arg(long)]
    region: Option<String>,

    /// Target account (unset keeps the deploy-time AWS::AccountId)
    #[arg(long)]
    account: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    mlops_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Synth {
            stacks,
            context,
            output,
        } => cmd_synth(&stacks, &context, &output).await,
        Commands::List => cmd_list(),
        Commands::Digest { stacks, context } => cmd_digest(&stacks, &context).await,
    }
}

/// Synthesize the selected stacks and write the assembly.
async fn cmd_synth(stacks: &[String], args: &ContextArgs, output: &Path) -> Result<()> {
    let kinds = select_stacks(stacks)?;
    let ctx = load_context(args)?;
    let env = resolve_environment(args, &ctx, |key| std::env::var(key).ok())?;
    info!(env = %env.uri(), stacks = kinds.len(), "Synthesizing stacks");

    let synthesized = synthesize_concurrently(kinds, ctx, env).await?;
    let manifest = write_assembly(output, &synthesized)
        .with_context(|| format!("Failed to write assembly to {}", output.display()))?;

    for stack in &synthesized {
        let resources = manifest
            .artifacts
            .get(stack.name())
            .map(|a| a.resource_count)
            .unwrap_or_default();
        println!(
            "{}  {} resources  {}",
            stack.name(),
            resources,
            output.join(template_file_name(stack.name())).display()
        );
    }
    println!("Assembly written to {}", output.display());
    Ok(())
}

fn cmd_list() -> Result<()> {
    for name in StackKind::names() {
        println!("{}", name);
    }
    Ok(())
}

/// Print `<digest>  <stack>` lines without writing any file.
async fn cmd_digest(stacks: &[String], args: &ContextArgs) -> Result<()> {
    let kinds = select_stacks(stacks)?;
    let ctx = load_context(args)?;
    let env = resolve_environment(args, &ctx, |key| std::env::var(key).ok())?;

    for stack in synthesize_concurrently(kinds, ctx, env).await? {
        let digest = stack
            .digest()
            .with_context(|| format!("Failed to digest {}", stack.name()))?;
        println!("{}  {}", digest, stack.name());
    }
    Ok(())
}

/// Parse stack selectors; no selector means every stack.
fn select_stacks(names: &[String]) -> Result<Vec<StackKind>> {
    if names.is_empty() {
        return Ok(StackKind::ALL.to_vec());
    }
    let mut kinds = Vec::with_capacity(names.len());
    for name in names {
        let kind: StackKind = name.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

/// Context file (explicit, else `cdk.json` if present) overlaid with `-c`
/// assignments.
fn load_context(args: &ContextArgs) -> Result<Context> {
    let mut ctx = match &args.context_file {
        Some(path) => Context::from_file(path)
            .with_context(|| format!("Failed to load context file {}", path.display()))?,
        None => {
            let default = Path::new(DEFAULT_CONTEXT_FILE);
            if default.is_file() {
                debug!(path = DEFAULT_CONTEXT_FILE, "Loading default context file");
                Context::from_file(default)?
            } else {
                Context::new()
            }
        }
    };

    for assignment in &args.assignments {
        ctx.apply_assignment(assignment)?;
    }
    Ok(ctx)
}

/// Region: flag, context `region`, CDK_INTEG_REGION, CDK_DEFAULT_REGION.
/// Account: `--account` only; CDK_DEFAULT_ACCOUNT is not consulted.
fn resolve_environment(
    args: &ContextArgs,
    ctx: &Context,
    env_var: impl Fn(&str) -> Option<String>,
) -> Result<Environment> {
    let region = match &args.region {
        Some(region) => Some(region.clone()),
        None => ctx
            .optional("region")?
            .or_else(|| env_var("CDK_INTEG_REGION"))
            .or_else(|| env_var("CDK_DEFAULT_REGION")),
    };
    Ok(Environment::new(args.account.clone(), region))
}

/// Run each synthesizer on a blocking task and collect results in input
/// order. Any failure fails the whole batch.
async fn synthesize_concurrently(
    kinds: Vec<StackKind>,
    ctx: Context,
    env: Environment,
) -> Result<Vec<SynthesizedStack>> {
    let ctx = Arc::new(ctx);
    let tasks = kinds.into_iter().map(|kind| {
        let ctx = Arc::clone(&ctx);
        let env = env.clone();
        tokio::task::spawn_blocking(move || kind.synthesize(&ctx, &env))
    });

    let results = futures::future::try_join_all(tasks)
        .await
        .context("Synthesis task failed to complete")?;

    let mut stacks = Vec::with_capacity(results.len());
    for result in results {
        stacks.push(result?);
    }
    Ok(stacks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_assignments() -> Vec<String> {
        let mut assignments = Vec::new();
        for prefix in ["build", "train", "deploy"] {
            assignments.push(format!("{}_codecommit_repo={}-repo", prefix, prefix));
            assignments.push(format!("{}_codecommit_branch=main", prefix));
            assignments.push(format!("{}_codebuild_project={}-build", prefix, prefix));
            assignments.push(format!("{}_codepipeline_name={}-pipeline", prefix, prefix));
        }
        assignments.push("ecr_repo=images".to_string());
        assignments
    }

    fn full_context() -> Context {
        let mut ctx = Context::new();
        for assignment in full_assignments() {
            ctx.apply_assignment(&assignment).unwrap();
        }
        ctx
    }

    #[test]
    fn test_select_stacks_defaults_to_all() {
        assert_eq!(select_stacks(&[]).unwrap(), StackKind::ALL.to_vec());
        let picked = select_stacks(&["deploy".to_string(), "Deploy".to_string()]).unwrap();
        assert_eq!(picked, vec![StackKind::Deploy]);
        assert!(select_stacks(&["nope".to_string()]).is_err());
    }

    #[test]
    fn test_region_precedence() {
        let mut ctx = Context::new();
        let vars = |key: &str| match key {
            "CDK_INTEG_REGION" => Some("eu-central-1".to_string()),
            "CDK_DEFAULT_REGION" => Some("us-east-1".to_string()),
            _ => None,
        };

        let args = ContextArgs::default();
        assert_eq!(
            resolve_environment(&args, &ctx, vars).unwrap().region.as_deref(),
            Some("eu-central-1")
        );
        assert_eq!(
            resolve_environment(&args, &ctx, |k| if k == "CDK_DEFAULT_REGION" {
                Some("us-east-1".to_string())
            } else {
                None
            })
            .unwrap()
            .region
            .as_deref(),
            Some("us-east-1")
        );

        ctx.set("region", "ap-south-1");
        assert_eq!(
            resolve_environment(&args, &ctx, vars).unwrap().region.as_deref(),
            Some("ap-south-1")
        );

        let args = ContextArgs {
            region: Some("us-west-2".to_string()),
            account: Some("123456789012".to_string()),
            ..Default::default()
        };
        let env = resolve_environment(&args, &ctx, vars).unwrap();
        assert_eq!(env.region.as_deref(), Some("us-west-2"));
        assert_eq!(env.account.as_deref(), Some("123456789012"));
    }

    #[test]
    fn test_account_ignores_environment_variables() {
        let ctx = Context::new();
        let vars = |key: &str| match key {
            "CDK_DEFAULT_ACCOUNT" => Some("123456789012".to_string()),
            "CDK_DEFAULT_REGION" => Some("us-east-1".to_string()),
            _ => None,
        };
        let env = resolve_environment(&ContextArgs::default(), &ctx, vars).unwrap();
        assert_eq!(env.account, None);
        assert_eq!(env.region.as_deref(), Some("us-east-1"));
    }

    #[test]
    fn test_account_flag_is_opt_in() {
        let cli = Cli::try_parse_from(["mlops-synth", "digest"]).unwrap();
        match cli.command {
            Commands::Digest { context, .. } => assert_eq!(context.account, None),
            _ => panic!("expected digest command"),
        }
        let cli =
            Cli::try_parse_from(["mlops-synth", "digest", "--account", "123456789012"]).unwrap();
        match cli.command {
            Commands::Digest { context, .. } => {
                assert_eq!(context.account.as_deref(), Some("123456789012"))
            }
            _ => panic!("expected digest command"),
        }
    }

    #[test]
    fn test_non_string_region_in_context_is_an_error() {
        let ctx = Context::from_json_str(r#"{ "context": { "region": 42 } }"#).unwrap();
        let err = resolve_environment(&ContextArgs::default(), &ctx, |_| None).unwrap_err();
        assert!(err.to_string().contains("region"));
    }

    #[test]
    fn test_assignments_override_context_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        std::fs::write(
            &path,
            r#"{"context": {"build_codecommit_branch": "master", "ecr_repo": "images"}}"#,
        )
        .unwrap();

        let args = ContextArgs {
            assignments: vec!["build_codecommit_branch=release".to_string()],
            context_file: Some(path),
            ..Default::default()
        };
        let ctx = load_context(&args).unwrap();
        assert_eq!(ctx.get("build_codecommit_branch"), Some("release"));
        assert_eq!(ctx.get("ecr_repo"), Some("images"));
    }

    #[tokio::test]
    async fn test_concurrent_synthesis_preserves_order() {
        let stacks = synthesize_concurrently(
            vec![StackKind::Deploy, StackKind::Build, StackKind::Train],
            full_context(),
            Environment::agnostic(),
        )
        .await
        .unwrap();
        let names: Vec<&str> = stacks.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["DeployPipelineStack", "BuildPipelineStack", "TrainPipelineStack"]
        );
    }

    #[tokio::test]
    async fn test_synth_writes_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("cdk.out");
        let args = ContextArgs {
            assignments: full_assignments(),
            context_file: None,
            region: Some("us-east-1".to_string()),
            account: Some("123456789012".to_string()),
        };

        cmd_synth(&[], &args, &out).await.unwrap();
        for name in StackKind::names() {
            assert!(out.join(template_file_name(name)).is_file());
        }
        assert!(out.join(mlops_core::assembly::MANIFEST_FILE).is_file());
    }

    #[tokio::test]
    async fn test_failed_stack_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("cdk.out");
        let mut assignments = full_assignments();
        assignments.push("ecr_repo=".to_string());
        let args = ContextArgs {
            assignments,
            context_file: None,
            region: Some("us-east-1".to_string()),
            account: None,
        };

        let err = cmd_synth(&[], &args, &out).await.unwrap_err();
        assert!(err.to_string().contains("ecr_repo"));
        assert!(!out.exists());
    }
}

mod display;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use log::{debug, info};

use ecsmcp_aws::SimulatedProvider;
use ecsmcp_aws::routing::{FixedSecret, ListenerModel, Request};
use ecsmcp_core::differ::{create_plan, destroy_plan};
use ecsmcp_core::interpreter::{ApplyResult, EffectOutcome, Interpreter, InterpreterConfig};
use ecsmcp_core::provider::Provider;
use ecsmcp_core::resolve::Bindings;
use ecsmcp_core::resource::{ResourceId, State};
use ecsmcp_provider_awscc::AwsccProvider;
use ecsmcp_stack::constructs::load_balancer::HTTP_PORT;
use ecsmcp_stack::{ProviderKind, StackConfig, SynthesizedStack};
use ecsmcp_state::{LocalBackend, StateBackend, StateFile};

/// Account used for identifiers when the simulated provider runs without one
const SIMULATED_ACCOUNT: &str = "123456789012";
const DEFAULT_OUT_DIR: &str = "ecsmcp.out";

#[derive(Parser)]
#[command(name = "ecsmcp")]
#[command(about = "Synthesize and deploy the ECS MCP server sample stack", long_about = None)]
struct Cli {
    /// Path to the stack configuration (optional)
    #[arg(long, global = true, default_value = "ecsmcp.toml")]
    config: PathBuf,

    /// Provider that realizes resources (overrides the configuration)
    #[arg(long, global = true)]
    provider: Option<ProviderKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the CloudFormation template and asset manifest
    Synth {
        /// Output directory
        #[arg(long, default_value = DEFAULT_OUT_DIR)]
        out: PathBuf,
    },
    /// Validate schemas, dependencies and the rule pack
    Validate,
    /// Show execution plan without applying changes
    Plan,
    /// Apply changes to reach the desired state
    Apply {
        /// Resolve and report every effect without touching the provider
        #[arg(long)]
        dry_run: bool,
    },
    /// Destroy every resource recorded in the state
    Destroy {
        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Show the outputs recorded by the last apply
    Outputs,
    /// Diff the template against the last synthesized one
    Diff {
        /// Directory of the last synth
        #[arg(long, default_value = DEFAULT_OUT_DIR)]
        out: PathBuf,
    },
    /// Evaluate a request against the port 80 listener
    Route {
        /// Request path
        #[arg(long, default_value = "/")]
        path: String,

        /// Request header as NAME=VALUE (repeatable)
        #[arg(long = "header", value_name = "NAME=VALUE")]
        headers: Vec<String>,

        /// Value the API key secret holds
        #[arg(long)]
        secret_value: String,
    },
    /// Release a state lock left behind by an interrupted run
    ForceUnlock {
        /// Lock ID shown in the lock error
        lock_id: String,
    },
    /// Generate shell completions
    Completions {
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = match load_config(&cli.config, cli.provider) {
        Ok(config) => match cli.command {
            Commands::Synth { out } => run_synth(&config, &out),
            Commands::Validate => run_validate(&config),
            Commands::Plan => run_plan(&config).await,
            Commands::Apply { dry_run } => run_apply(&config, dry_run).await,
            Commands::Destroy { auto_approve } => run_destroy(&config, auto_approve).await,
            Commands::Outputs => run_outputs(&config).await,
            Commands::Diff { out } => run_diff(&config, &out),
            Commands::Route {
                path,
                headers,
                secret_value,
            } => run_route(&config, &path, &headers, secret_value),
            Commands::ForceUnlock { lock_id } => run_force_unlock(&config, &lock_id).await,
            Commands::Completions { shell } => {
                clap_complete::generate(shell, &mut Cli::command(), "ecsmcp", &mut std::io::stdout());
                Ok(())
            }
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn load_config(path: &Path, provider: Option<ProviderKind>) -> Result<StackConfig, String> {
    let mut config = StackConfig::load(path)
        .map_err(|e| e.to_string())?
        .with_process_env();
    if let Some(provider) = provider {
        config.provider = provider;
    }
    debug!("Configuration: {:?}", config);
    Ok(config)
}

/// Build the stack and run every check that must pass before a provider call
fn build_checked(config: &StackConfig) -> Result<SynthesizedStack, String> {
    let stack = ecsmcp_stack::build(config).map_err(|e| e.to_string())?;
    let report = stack.validate().map_err(|e| e.to_string())?;
    info!(
        "{} resources validated, {} findings suppressed",
        stack.resources.len(),
        report.suppressed().len()
    );
    Ok(stack)
}

fn run_synth(config: &StackConfig, out: &Path) -> Result<(), String> {
    let stack = build_checked(config)?;
    fs::create_dir_all(out).map_err(|e| format!("Failed to create {}: {}", out.display(), e))?;

    let template_path = template_path(out, &stack.name);
    write_json(&template_path, &stack.template().map_err(|e| e.to_string())?)?;

    let manifest_path = out.join(format!("{}.assets.json", stack.name));
    let manifest = serde_json::to_value(stack.asset_manifest()).map_err(|e| e.to_string())?;
    write_json(&manifest_path, &manifest)?;

    println!(
        "{}",
        format!("✓ Synthesized {} ({} resources)", stack.name, stack.resources.len())
            .green()
            .bold()
    );
    println!("  • {}", template_path.display());
    println!("  • {}", manifest_path.display());
    for asset in &stack.assets {
        println!("    {} {} ({})", "image".cyan(), asset.id, &asset.hash[..12]);
    }
    Ok(())
}

fn template_path(out: &Path, stack_name: &str) -> PathBuf {
    out.join(format!("{}.template.json", stack_name))
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<(), String> {
    let content = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    fs::write(path, content + "\n").map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

fn run_validate(config: &StackConfig) -> Result<(), String> {
    println!("{}", "Validating...".cyan());

    let stack = ecsmcp_stack::build(config).map_err(|e| e.to_string())?;
    let report = stack.validate().map_err(|e| e.to_string())?;

    println!(
        "{}",
        format!("✓ {} resources validated successfully.", stack.resources.len())
            .green()
            .bold()
    );
    for resource in &stack.resources {
        println!("  • {}", resource.id);
    }
    display::print_suppressions(&report);
    Ok(())
}

fn open_backend(config: &StackConfig) -> Result<LocalBackend, String> {
    LocalBackend::open(&config.state_path).map_err(|e| e.to_string())
}

async fn read_state(backend: &dyn StateBackend, stack_name: &str) -> Result<StateFile, String> {
    backend.read_stack_state(stack_name).await.map_err(|e| e.to_string())
}

/// Account for pseudo references; only the simulated provider may invent one
fn account_for(stack: &SynthesizedStack, kind: ProviderKind) -> Result<String, String> {
    match (&stack.environment.account, kind) {
        (Some(account), _) => Ok(account.clone()),
        (None, ProviderKind::Simulated) => Ok(SIMULATED_ACCOUNT.to_string()),
        (None, ProviderKind::Awscc) => Err(format!(
            "The AWS account is unknown: set {} or `account` in the configuration",
            ecsmcp_stack::config::ACCOUNT_ENV
        )),
    }
}

fn bindings_for(stack: &SynthesizedStack, account: &str, states: &HashMap<ResourceId, State>) -> Bindings {
    let mut bindings = stack.bindings(account);
    for state in states.values() {
        bindings.insert_state(state);
    }
    bindings
}

async fn get_provider(
    kind: ProviderKind,
    region: &str,
    account: &str,
    states: &HashMap<ResourceId, State>,
) -> Result<Box<dyn Provider>, String> {
    match kind {
        ProviderKind::Simulated => {
            println!("{}", format!("Using simulated provider (region: {})", region).cyan());
            // Resources recorded by earlier runs must be known to delete or update them
            let provider = SimulatedProvider::new(account, region);
            provider.restore(states.values()).map_err(|e| e.to_string())?;
            Ok(Box::new(provider))
        }
        ProviderKind::Awscc => {
            println!("{}", format!("Using AWS Cloud Control provider (region: {})", region).cyan());
            Ok(Box::new(AwsccProvider::new(region).await))
        }
    }
}

async fn run_plan(config: &StackConfig) -> Result<(), String> {
    let stack = build_checked(config)?;
    let backend = open_backend(config)?;
    let state = read_state(&backend, &stack.name).await?;

    let current = state.current_states();
    let account = account_for(&stack, config.provider)?;
    let bindings = bindings_for(&stack, &account, &current);
    let plan = create_plan(&stack.resources, &current, &bindings).map_err(|e| e.to_string())?;
    display::print_plan(&plan);
    Ok(())
}

/// Run `operation` while holding the state lock
async fn with_lock<T>(
    backend: &dyn StateBackend,
    stack_name: &str,
    operation: &str,
    run: impl std::future::Future<Output = Result<T, String>>,
) -> Result<T, String> {
    let lock = backend.acquire_lock(stack_name, operation).await.map_err(|e| e.to_string())?;
    let result = run.await;
    backend.release_lock(&lock).await.map_err(|e| e.to_string())?;
    result
}

async fn run_apply(config: &StackConfig, dry_run: bool) -> Result<(), String> {
    let stack = build_checked(config)?;
    let backend = open_backend(config)?;
    with_lock(
        &backend,
        &stack.name,
        "apply",
        apply_stack(config, &stack, &backend, dry_run),
    )
    .await
}

async fn apply_stack(
    config: &StackConfig,
    stack: &SynthesizedStack,
    backend: &dyn StateBackend,
    dry_run: bool,
) -> Result<(), String> {
    let mut state = read_state(backend, &stack.name).await?;
    let current = state.current_states();
    let account = account_for(stack, config.provider)?;
    let mut bindings = bindings_for(stack, &account, &current);

    let plan = create_plan(&stack.resources, &current, &bindings).map_err(|e| e.to_string())?;
    if plan.is_empty() {
        println!("{}", "No changes needed.".green());
        return Ok(());
    }
    display::print_plan(&plan);
    println!();

    let region = &stack.environment.region;
    let provider = get_provider(config.provider, region, &account, &current).await?;
    let interpreter = Interpreter::new(provider).with_config(InterpreterConfig {
        dry_run,
        continue_on_error: false,
    });

    let heading = if dry_run { "Dry run..." } else { "Applying changes..." };
    println!("{}", heading.cyan().bold());
    println!();
    let result = interpreter.apply(&plan, &mut bindings).await;
    display::print_apply_result(&plan, &result, "Apply");
    if dry_run {
        return Ok(());
    }

    record_outcomes(&mut state, &result, interpreter.provider().name());
    state.outputs.clear();
    for output in &stack.outputs {
        if let Ok(value) = bindings.resolve_value(&output.value)
            && let Some(value) = value.as_str()
        {
            state.outputs.insert(output.name.clone(), value.to_string());
        }
    }
    state.increment_serial();
    backend.write_state(&state).await.map_err(|e| e.to_string())?;

    if result.is_success() {
        print_outputs(&state);
        Ok(())
    } else {
        Err(format!("{} effects failed", result.failure_count))
    }
}

/// Fold what the provider reported back into the state file
fn record_outcomes(state: &mut StateFile, result: &ApplyResult, provider: &str) {
    for outcome in result.outcomes.iter().flatten() {
        match outcome {
            EffectOutcome::Created { state: applied } | EffectOutcome::Updated { state: applied } => {
                state.record(applied, provider);
            }
            EffectOutcome::Deleted { id } | EffectOutcome::Retained { id } => {
                state.remove_resource(&id.resource_type, &id.name);
            }
            EffectOutcome::Read { .. } | EffectOutcome::Skipped { .. } => {}
        }
    }
}

async fn run_destroy(config: &StackConfig, auto_approve: bool) -> Result<(), String> {
    let stack_name = config.stack_name.clone();
    let backend = open_backend(config)?;
    with_lock(
        &backend,
        &stack_name,
        "destroy",
        destroy_stack(config, &stack_name, &backend, auto_approve),
    )
    .await
}

async fn destroy_stack(
    config: &StackConfig,
    stack_name: &str,
    backend: &dyn StateBackend,
    auto_approve: bool,
) -> Result<(), String> {
    let mut state = read_state(backend, stack_name).await?;
    let current = state.current_states();
    if current.is_empty() {
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    }

    let plan = destroy_plan(&current).map_err(|e| e.to_string())?;
    println!("{}", "Destroy Plan:".red().bold());
    println!();
    display::print_plan(&plan);
    println!();

    if !auto_approve && !confirm_destroy()? {
        println!();
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    // Teardown only needs the environment, not the build contexts
    let environment = config.environment().map_err(|e| e.to_string())?;
    let account = environment.account.as_deref().unwrap_or(SIMULATED_ACCOUNT);
    let provider = get_provider(config.provider, &environment.region, account, &current).await?;
    let interpreter = Interpreter::new(provider);

    println!("{}", "Destroying resources...".red().bold());
    println!();
    let mut bindings = Bindings::from_states(current.values());
    let result = interpreter.apply(&plan, &mut bindings).await;
    display::print_apply_result(&plan, &result, "Destroy");

    record_outcomes(&mut state, &result, interpreter.provider().name());
    if state.resources.is_empty() {
        state.outputs.clear();
    }
    state.increment_serial();
    backend.write_state(&state).await.map_err(|e| e.to_string())?;

    if result.is_success() {
        Ok(())
    } else {
        Err(format!("{} effects failed", result.failure_count))
    }
}

fn confirm_destroy() -> Result<bool, String> {
    println!(
        "{}",
        "Do you really want to destroy all resources?".yellow().bold()
    );
    println!(
        "  {}",
        "This action cannot be undone. Type 'yes' to confirm.".yellow()
    );
    print!("\n  Enter a value: ");
    std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    println!();
    Ok(input.trim() == "yes")
}

async fn run_outputs(config: &StackConfig) -> Result<(), String> {
    let backend = open_backend(config)?;
    let state = read_state(&backend, &config.stack_name).await?;
    if state.outputs.is_empty() {
        println!("{}", "No outputs recorded. Run `ecsmcp apply` first.".yellow());
        return Ok(());
    }
    print_outputs(&state);
    Ok(())
}

fn print_outputs(state: &StateFile) {
    if state.outputs.is_empty() {
        return;
    }
    println!();
    println!("{}", "Outputs:".cyan().bold());
    for (name, value) in &state.outputs {
        println!("  {} = {}", name.bold(), value);
    }
}

fn run_diff(config: &StackConfig, out: &Path) -> Result<(), String> {
    let stack = ecsmcp_stack::build(config).map_err(|e| e.to_string())?;
    let template = stack.template().map_err(|e| e.to_string())?;
    let current = serde_json::to_string_pretty(&template).map_err(|e| e.to_string())? + "\n";

    let path = template_path(out, &stack.name);
    let previous = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("{}", format!("No previous synth at {}", path.display()).yellow());
            String::new()
        }
        Err(e) => return Err(format!("Failed to read {}: {}", path.display(), e)),
    };

    if previous == current {
        println!("{}", "No differences.".green());
        return Ok(());
    }
    display::print_diff(&path, &previous, &current);
    Ok(())
}

/// Split a `NAME=VALUE` header argument
fn parse_header(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("Invalid header '{}': expected NAME=VALUE", arg)),
    }
}

fn run_route(
    config: &StackConfig,
    path: &str,
    headers: &[String],
    secret_value: String,
) -> Result<(), String> {
    let stack = ecsmcp_stack::build(config).map_err(|e| e.to_string())?;
    let listener =
        ListenerModel::from_resources(&stack.resources, HTTP_PORT).map_err(|e| e.to_string())?;

    let mut request = Request::get(path);
    for header in headers {
        let (name, value) = parse_header(header)?;
        request = request.with_header(name, value);
    }

    let action = listener
        .evaluate(&request, &FixedSecret(secret_value))
        .map_err(|e| e.to_string())?;
    display::print_action(action);
    Ok(())
}

async fn run_force_unlock(config: &StackConfig, lock_id: &str) -> Result<(), String> {
    let backend = open_backend(config)?;
    backend
        .force_unlock(lock_id)
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", format!("Lock {} released.", lock_id).green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> StackConfig {
        let services = dir.join("services");
        for service in ["ai-agent", "mcp-one", "mcp-two"] {
            fs::create_dir_all(services.join(service)).unwrap();
            fs::write(
                services.join(service).join("Dockerfile"),
                format!("FROM scratch\nLABEL service={}\n", service),
            )
            .unwrap();
        }
        StackConfig {
            region: Some("us-east-1".to_string()),
            services_dir: services,
            state_path: dir.join("ecsmcp.state.json"),
            ..Default::default()
        }
    }

    #[test]
    fn header_arguments_split_on_first_equals() {
        assert_eq!(
            parse_header("x-api-key=a=b").unwrap(),
            ("x-api-key".to_string(), "a=b".to_string())
        );
        assert!(parse_header("x-api-key").is_err());
        assert!(parse_header("=value").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn provider_flag_overrides_config() {
        let cli = Cli::parse_from(["ecsmcp", "--provider", "awscc", "plan"]);
        assert_eq!(cli.provider, Some(ProviderKind::Awscc));
        let cli = Cli::parse_from(["ecsmcp", "route", "--secret-value", "s", "--header", "a=b"]);
        assert!(matches!(cli.command, Commands::Route { ref headers, .. } if headers.len() == 1));
    }

    #[test]
    fn awscc_needs_an_account() {
        let dir = tempfile::tempdir().unwrap();
        let stack = ecsmcp_stack::build(&config(dir.path())).unwrap();
        assert_eq!(account_for(&stack, ProviderKind::Simulated).unwrap(), SIMULATED_ACCOUNT);
        assert!(account_for(&stack, ProviderKind::Awscc).is_err());
    }

    #[test]
    fn synth_then_diff_reports_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let out = dir.path().join("out");
        run_synth(&config, &out).unwrap();

        let template = fs::read_to_string(template_path(&out, &config.stack_name)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&template).unwrap();
        assert!(json["Outputs"]["LoadBalancerDNS"].is_object());
        assert!(out.join(format!("{}.assets.json", config.stack_name)).exists());
        run_diff(&config, &out).unwrap();
    }

    #[tokio::test]
    async fn apply_records_state_and_destroy_releases_it() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        run_apply(&config, false).await.unwrap();
        let backend = open_backend(&config).unwrap();
        let state = read_state(&backend, &config.stack_name).await.unwrap();
        let stack = ecsmcp_stack::build(&config).unwrap();
        assert_eq!(state.resources.len(), stack.resources.len());
        assert!(state.outputs["LoadBalancerDNS"].ends_with(".elb.amazonaws.com"));
        assert!(state.outputs["SecretARN"].starts_with("arn:aws:secretsmanager:us-east-1:"));

        // second apply converges
        let current = state.current_states();
        let bindings = bindings_for(&stack, SIMULATED_ACCOUNT, &current);
        let plan = create_plan(&stack.resources, &current, &bindings).unwrap();
        assert!(plan.is_empty(), "{:?}", plan);

        run_destroy(&config, true).await.unwrap();
        let state = read_state(&backend, &config.stack_name).await.unwrap();
        assert!(state.resources.is_empty());
        assert!(state.outputs.is_empty());
        assert!(!backend_lock_exists(&config));
    }

    #[tokio::test]
    async fn dry_run_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        run_apply(&config, true).await.unwrap();
        assert!(!config.state_path.exists());
    }

    #[tokio::test]
    async fn state_of_another_stack_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let backend = open_backend(&config).unwrap();
        backend
            .write_state(&StateFile::new().for_stack("OtherStack"))
            .await
            .unwrap();
        let err = read_state(&backend, &config.stack_name).await.unwrap_err();
        assert!(err.contains("OtherStack"));
    }

    fn backend_lock_exists(config: &StackConfig) -> bool {
        config.state_path.with_extension("lock").exists()
    }
}

use std::{collections::HashMap, env, error::Error, io::IsTerminal, process, str::FromStr, sync::Arc};

use fusion_config::{
    load_config,
    log::{LogFormat, LoggingConfig},
};
use fusion_executor::{
    execute_operation,
    schema::{id::OpaqueIdSerializer, metadata::SchemaMetadata},
    utils::cancellation::CancellationToken,
    ErrorSettings, FusionExecutionContext, Operation, QueryPlan, SubgraphExecutorMap,
};
use tracing::{info, warn};
use tracing_subscriber::{
    fmt::{self, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const USAGE: &str = "Usage: fusion-dev-cli execute <operation.json> <plan.json> [--variables <variables.json>] [--config <path>] [--pretty]
       fusion-dev-cli plan <plan.json>";

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("{}", USAGE);
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "execute" => execute(&args[2..]).await,
        "plan" => print_plan(&args[2]),
        _ => {
            eprintln!("Unknown command. Available commands: execute, plan");
            eprintln!("{}", USAGE);
            process::exit(1);
        }
    };

    if let Err(error) = result {
        eprintln!("error: {}", error);
        process::exit(1);
    }
}

fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::from_str(config.env_filter_str())?;
    let registry = tracing_subscriber::registry();
    let is_terminal = std::io::stderr().is_terminal();

    match config.format {
        LogFormat::PrettyTree => registry
            .with(
                tracing_tree::HierarchicalLayer::new(2)
                    .with_ansi(is_terminal)
                    .with_bracketed_fields(true)
                    .with_deferred_spans(false)
                    .with_wraparound(25)
                    .with_indent_lines(true)
                    .with_timer(tracing_tree::time::Uptime::default())
                    .with_thread_names(false)
                    .with_thread_ids(false)
                    .with_targets(false),
            )
            .with(filter)
            .init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_timer(UtcTime::rfc_3339()),
            )
            .with(filter)
            .init(),
        LogFormat::PrettyCompact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_ansi(is_terminal)
                    .with_timer(UtcTime::rfc_3339()),
            )
            .with(filter)
            .init(),
    };

    Ok(())
}

struct ExecuteArgs<'a> {
    operation_path: &'a str,
    plan_path: &'a str,
    variables_path: Option<&'a str>,
    config_path: Option<&'a str>,
    pretty: bool,
}

fn parse_execute_args(args: &[String]) -> Result<ExecuteArgs<'_>, String> {
    let (Some(operation_path), Some(plan_path)) = (args.first(), args.get(1)) else {
        return Err(USAGE.to_string());
    };

    let mut parsed = ExecuteArgs {
        operation_path: operation_path.as_str(),
        plan_path: plan_path.as_str(),
        variables_path: None,
        config_path: None,
        pretty: false,
    };

    let mut rest = args[2..].iter();
    while let Some(flag) = rest.next() {
        match flag.as_str() {
            "--variables" => {
                parsed.variables_path = Some(rest.next().ok_or("--variables expects a path")?.as_str())
            }
            "--config" => {
                parsed.config_path = Some(rest.next().ok_or("--config expects a path")?.as_str())
            }
            "--pretty" => parsed.pretty = true,
            other => return Err(format!("Unknown argument \"{}\"\n{}", other, USAGE)),
        }
    }

    Ok(parsed)
}

async fn execute(args: &[String]) -> Result<(), Box<dyn Error>> {
    let args = parse_execute_args(args)?;

    let config = load_config(args.config_path.map(str::to_string))?;
    init_logging(&config.log)?;

    let operation: Operation = sonic_rs::from_str(&std::fs::read_to_string(args.operation_path)?)?;
    let plan: QueryPlan = sonic_rs::from_str(&std::fs::read_to_string(args.plan_path)?)?;
    let variables: HashMap<String, sonic_rs::Value> = match args.variables_path {
        Some(path) => sonic_rs::from_str(&std::fs::read_to_string(path)?)?,
        None => HashMap::new(),
    };

    for node in &plan.nodes {
        if !config.subgraphs.contains_key(&node.subgraph) {
            warn!(subgraph = %node.subgraph, node = %node.id, "subgraph is not configured");
        }
    }

    let executors = SubgraphExecutorMap::from_config(&config)?;
    let schema_metadata = Arc::new(SchemaMetadata::from_type_mappings(&config.type_mappings));
    let id_serializer = OpaqueIdSerializer::new(schema_metadata.clone());

    let cancellation = CancellationToken::new();
    let on_interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    info!(nodes = plan.len(), "executing operation");
    let ctx = FusionExecutionContext::new(
        &operation,
        &plan,
        &variables,
        &executors,
        &schema_metadata,
        &id_serializer,
        cancellation,
        ErrorSettings {
            include_subgraph_name: config.errors.include_subgraph_name,
        },
    );
    let response = execute_operation(ctx).await?;

    if args.pretty {
        let value: serde_json::Value = serde_json::from_slice(&response)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", String::from_utf8(response)?);
    }

    Ok(())
}

fn print_plan(plan_path: &str) -> Result<(), Box<dyn Error>> {
    let plan: QueryPlan = sonic_rs::from_str(&std::fs::read_to_string(plan_path)?)?;
    println!("{}", plan);
    Ok(())
}

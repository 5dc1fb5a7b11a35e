

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use cascade_cleanup::{
    CascadeConfig, CascadeController, CleanupTrigger, DocumentPath, FirestoreStore, PathPattern,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

enum Target {
    Parent(String),
    Event(PathBuf),
}

fn print_help() {
    println!("cascade-cleanup: delete every collection nested under a removed document");
    println!();
    println!("USAGE:");
    println!("    cascade-cleanup --parent <document path> [OPTIONS]");
    println!("    cascade-cleanup --event <event.json> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <file>    Config file (TOML/JSON/YAML), layered under CASCADE_* env vars");
    println!("    -p, --parent <path>    Deleted parent document, e.g. projects/p1");
    println!("    -e, --event <file>     Deletion event payload: {{\"document\": \"projects/p1\"}}");
    println!("        --recursive        Also purge collections nested below child documents");
    println!("        --help             Print this help");
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn").add_directive("cascade_cleanup=info".parse().unwrap())
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut target: Option<Target> = None;
    let mut recursive = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--parent" | "-p" => {
                if i + 1 < args.len() {
                    target = Some(Target::Parent(args[i + 1].clone()));
                    i += 1;
                }
            }
            "--event" | "-e" => {
                if i + 1 < args.len() {
                    target = Some(Target::Event(PathBuf::from(&args[i + 1])));
                    i += 1;
                }
            }
            "--recursive" => recursive = true,
            "--help" | "-h" => {
                print_help();
                return Ok(ExitCode::SUCCESS);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                return Ok(ExitCode::from(2));
            }
        }
        i += 1;
    }

    let Some(target) = target else {
        print_help();
        return Ok(ExitCode::from(2));
    };

    let mut config = CascadeConfig::load(config_path.as_deref()).context("loading configuration")?;
    if recursive {
        config.recursive = true;
    }

    let store = FirestoreStore::from_config(&config).context("creating Firestore client")?;
    let controller = Arc::new(CascadeController::from_config(Arc::new(store), &config));

    let outcome = match target {
        Target::Parent(raw) => {
            let parent = DocumentPath::parse(&raw).with_context(|| format!("invalid parent {}", raw))?;
            controller.run(&parent).await.map_err(anyhow::Error::from)
        }
        Target::Event(path) => {
            let payload = fs::read_to_string(&path)
                .with_context(|| format!("reading event {}", path.display()))?;
            let pattern = PathPattern::parse(&config.trigger_pattern)?;
            let trigger = CleanupTrigger::new(pattern, Arc::clone(&controller));
            trigger.handle_json(&payload).await.map_err(anyhow::Error::from)
        }
    };

    match outcome {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let partial = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<cascade_cleanup::InvocationError>())
                .map(|invocation| &invocation.result);
            if let Some(result) = partial {
                println!("{}", serde_json::to_string_pretty(result)?);
            }
            eprintln!("Cleanup failed: {:#}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

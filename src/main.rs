//! The runner host: serves the runtime control surface as JSON-per-line
//! requests over TCP.
//!
//! Every request is one JSON object `{"method": "...", "params": {...}}`
//! and yields one JSON response line. The wire format is deliberately
//! transport-agnostic; an HTTP frontend can proxy onto it without the core
//! knowing.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use serde_json::{json, Value};
use tracing::{error, info};

use nodenet::net::FxIndexMap;
use nodenet::runtime::{crawl_nodenet_files, Runtime};
use nodenet::world::DictWorld;
use nodenet::NetResult;

#[derive(Debug, Parser)]
#[command(name = "nodenet-host", about = "Host process for nodenet agents")]
struct Args {
    /// The address to listen on.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// The port to listen on.
    #[arg(long, default_value_t = 6543)]
    port: u16,

    /// The directory agent files are stored below.
    #[arg(long, default_value = "resources")]
    resources: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let mut runtime = Runtime::new(&args.resources);
    runtime.register_world(
        "default",
        Arc::new(Mutex::new(DictWorld::new())),
    );
    for (uid, name, _) in crawl_nodenet_files(std::path::Path::new(&args.resources)) {
        info!(uid = %uid, name = %name, "found persisted agent");
    }
    let runtime = Arc::new(Mutex::new(runtime));

    let listener = match TcpListener::bind((args.host.as_str(), args.port)) {
        Ok(listener) => listener,
        Err(err) => {
            error!(host = %args.host, port = args.port, error = %err, "could not bind");
            return ExitCode::FAILURE;
        }
    };
    info!(host = %args.host, port = args.port, "listening");

    for stream in listener.incoming() {
        let Ok(stream) = stream else {
            continue;
        };
        let runtime = Arc::clone(&runtime);
        std::thread::spawn(move || {
            if let Err(err) = serve(&runtime, stream) {
                error!(error = %err, "connection failed");
            }
        });
    }
    ExitCode::SUCCESS
}

fn serve(runtime: &Arc<Mutex<Runtime>>, stream: TcpStream) -> std::io::Result<()> {
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Value>(&line) {
            Ok(request) => dispatch(runtime, &request),
            Err(err) => json!({ "status": "error", "error": format!("bad request: {err}") }),
        };
        writer.write_all(response.to_string().as_bytes())?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

fn dispatch(runtime: &Arc<Mutex<Runtime>>, request: &Value) -> Value {
    let method = request["method"].as_str().unwrap_or("");
    let params = &request["params"];
    let mut runtime = runtime.lock().expect("runtime lock poisoned");

    let result = handle(&mut runtime, method, params);
    match result {
        Ok(data) => json!({ "status": "ok", "data": data }),
        Err(err) => json!({ "status": "error", "error": err.to_string() }),
    }
}

#[allow(clippy::too_many_lines)]
fn handle(runtime: &mut Runtime, method: &str, params: &Value) -> NetResult<Value> {
    use nodenet::NetError::InvalidArgument;

    let str_param = |key: &str| -> NetResult<String> {
        params[key]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| InvalidArgument(format!("missing parameter '{key}'")))
    };
    let opt_str = |key: &str| params[key].as_str().map(str::to_string);
    let num = |key: &str, default: f64| params[key].as_f64().unwrap_or(default);
    let position = || {
        (
            params["position"][0].as_f64().unwrap_or(0.0),
            params["position"][1].as_f64().unwrap_or(0.0),
        )
    };
    let map_param = |key: &str| -> FxIndexMap<String, Value> {
        params[key]
            .as_object()
            .map(|object| {
                object
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    };

    match method {
        "new_nodenet" => {
            let uid = runtime.new_nodenet(
                &str_param("name")?,
                opt_str("owner").as_deref().unwrap_or(""),
                opt_str("world").as_deref(),
                opt_str("worldadapter").as_deref(),
            )?;
            Ok(json!(uid))
        }
        "delete_nodenet" => {
            runtime.delete_nodenet(&str_param("nodenet")?)?;
            Ok(Value::Null)
        }
        "save_nodenet" => {
            runtime.save_nodenet(&str_param("nodenet")?)?;
            Ok(Value::Null)
        }
        "load_nodenet" => {
            runtime.load_nodenet(&str_param("nodenet")?)?;
            Ok(Value::Null)
        }
        "revert_nodenet" => {
            runtime.revert_nodenet(&str_param("nodenet")?)?;
            Ok(Value::Null)
        }
        "export_nodenet" => {
            let json = runtime.export_nodenet(&str_param("nodenet")?)?;
            Ok(json!(json))
        }
        "import_nodenet" => {
            let uid = runtime.import_nodenet(&str_param("data")?)?;
            Ok(json!(uid))
        }
        "merge_nodenet" => {
            runtime.merge_nodenet(&str_param("nodenet")?, &str_param("data")?)?;
            Ok(Value::Null)
        }
        "get_available_nodenets" => {
            let nets: Vec<Value> = runtime
                .available_nodenets()
                .into_iter()
                .map(|(uid, name)| json!({ "uid": uid, "name": name }))
                .collect();
            Ok(json!(nets))
        }
        "start_nodenetrunner" => {
            runtime.start_nodenetrunner(&str_param("nodenet")?)?;
            Ok(Value::Null)
        }
        "stop_nodenetrunner" => {
            runtime.stop_nodenetrunner(&str_param("nodenet")?)?;
            Ok(Value::Null)
        }
        "step_nodenet" => {
            let report = runtime.step_nodenet(&str_param("nodenet")?)?;
            Ok(json!({
                "current_step": report.current_step,
                "user_prompt": report.user_prompt.map(|prompt| json!({
                    "node": prompt.node_uid,
                    "msg": prompt.msg,
                    "options": prompt.options,
                })),
            }))
        }
        "set_runner_timestep" => {
            let Some(timestep) = params["timestep"].as_u64() else {
                return Err(InvalidArgument("missing parameter 'timestep'".to_string()));
            };
            runtime.set_runner_timestep(timestep);
            Ok(Value::Null)
        }
        "get_runner_timestep" => Ok(json!(runtime.get_runner_timestep())),
        "add_node" => {
            let uid = runtime.add_node(
                &str_param("nodenet")?,
                &str_param("type")?,
                position(),
                opt_str("nodespace").as_deref().unwrap_or("Root"),
                opt_str("name").as_deref().unwrap_or(""),
            )?;
            Ok(json!(uid))
        }
        "add_nodespace" => {
            let uid = runtime.add_nodespace(
                &str_param("nodenet")?,
                position(),
                opt_str("nodespace").as_deref().unwrap_or("Root"),
                opt_str("name").as_deref().unwrap_or(""),
            )?;
            Ok(json!(uid))
        }
        "delete_node" => {
            runtime.delete_node(&str_param("nodenet")?, &str_param("node")?)?;
            Ok(Value::Null)
        }
        "set_node_position" => {
            runtime.set_node_position(&str_param("nodenet")?, &str_param("node")?, position())?;
            Ok(Value::Null)
        }
        "set_node_name" => {
            runtime.set_node_name(
                &str_param("nodenet")?,
                &str_param("node")?,
                &str_param("name")?,
            )?;
            Ok(Value::Null)
        }
        "set_node_activation" => {
            runtime.set_node_activation(
                &str_param("nodenet")?,
                &str_param("node")?,
                num("activation", 0.0),
            )?;
            Ok(Value::Null)
        }
        "set_node_parameters" => {
            runtime.set_node_parameters(
                &str_param("nodenet")?,
                &str_param("node")?,
                map_param("parameters"),
            )?;
            Ok(Value::Null)
        }
        "set_gate_parameters" => {
            runtime.set_gate_parameters(
                &str_param("nodenet")?,
                &str_param("node")?,
                &str_param("gate")?,
                map_param("parameters"),
            )?;
            Ok(Value::Null)
        }
        "add_link" => {
            let uid = runtime.add_link(
                &str_param("nodenet")?,
                &str_param("source_node")?,
                &str_param("gate")?,
                &str_param("target_node")?,
                &str_param("slot")?,
                num("weight", 1.0),
                num("certainty", 1.0),
            )?;
            Ok(json!(uid))
        }
        "delete_link" => {
            runtime.delete_link(
                &str_param("nodenet")?,
                &str_param("source_node")?,
                &str_param("gate")?,
                &str_param("target_node")?,
                &str_param("slot")?,
            )?;
            Ok(Value::Null)
        }
        "add_gate_monitor" => {
            let uid = runtime.add_gate_monitor(
                &str_param("nodenet")?,
                &str_param("node")?,
                &str_param("gate")?,
                opt_str("sheaf").as_deref(),
            )?;
            Ok(json!(uid))
        }
        "add_slot_monitor" => {
            let uid = runtime.add_slot_monitor(
                &str_param("nodenet")?,
                &str_param("node")?,
                &str_param("slot")?,
                opt_str("sheaf").as_deref(),
            )?;
            Ok(json!(uid))
        }
        "remove_monitor" => {
            runtime.remove_monitor(&str_param("nodenet")?, &str_param("monitor")?)?;
            Ok(Value::Null)
        }
        "clear_monitor" => {
            runtime.clear_monitor(&str_param("nodenet")?, &str_param("monitor")?)?;
            Ok(Value::Null)
        }
        "get_monitor_data" => {
            let monitors = runtime.get_monitor_data(&str_param("nodenet")?)?;
            Ok(serde_json::to_value(monitors)
                .expect("monitor serialization cannot fail"))
        }
        "get_available_recipes" => {
            let recipes: Vec<Value> = runtime
                .get_available_recipes()
                .into_iter()
                .map(|(name, parameters)| {
                    json!({
                        "name": name,
                        "parameters": serde_json::to_value(parameters)
                            .expect("recipe parameter serialization cannot fail"),
                    })
                })
                .collect();
            Ok(json!(recipes))
        }
        "run_recipe" => {
            let result = runtime.run_recipe(
                &str_param("nodenet")?,
                &str_param("recipe")?,
                map_param("parameters"),
            )?;
            Ok(result)
        }
        _ => Err(InvalidArgument(format!("unknown method '{method}'"))),
    }
}

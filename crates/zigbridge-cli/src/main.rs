//! Command-line tools for inspecting the ZigBridge translation tables.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use zigbridge_core::logging::{init_logging, LogFormat};
use zigbridge_core::{EngineConfig, EventBus, Value};
use zigbridge_devices::{
    CapabilityMappingTable, CapabilityStore, DataPointFrame, DeviceFingerprint, DeviceProfile,
    FingerprintMatch, InboundDispatcher, ProfileRegistry,
};

/// ZigBridge - Zigbee capability translation tables.
#[derive(Parser, Debug)]
#[command(name = "zigbridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Print JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// List built-in device profiles and the fingerprints that select them.
    Profiles,
    /// Show the profile a device fingerprint resolves to.
    Inspect {
        /// genBasic manufacturerName.
        #[arg(long)]
        manufacturer: String,
        /// genBasic modelId.
        #[arg(long)]
        model: String,
    },
    /// Decode a hex DataPoint frame and translate it for a device.
    DecodeFrame {
        /// Frame bytes as hex, e.g. 0001010100010103020004000002ee.
        frame: String,
        /// genBasic manufacturerName.
        #[arg(long, default_value = "_TZE200_s8gkrkxk")]
        manufacturer: String,
        /// genBasic modelId.
        #[arg(long, default_value = "TS0601")]
        model: String,
    },
    /// List the standard ZCL capability mappings.
    Clusters,
    /// Print the effective engine configuration.
    Config {
        /// JSON configuration file; environment overrides still apply.
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(LogFormat::from_env(), args.verbose);

    match args.command {
        Command::Profiles => list_profiles(args.json),
        Command::Inspect {
            manufacturer,
            model,
        } => inspect(&DeviceFingerprint::new(manufacturer, model), args.json),
        Command::DecodeFrame {
            frame,
            manufacturer,
            model,
        } => decode_frame(&frame, &DeviceFingerprint::new(manufacturer, model), args.json).await,
        Command::Clusters => list_clusters(CapabilityMappingTable::standard(), args.json),
        Command::Config { file } => show_config(file, args.json),
    }
}

fn describe_rule(rule: &FingerprintMatch) -> String {
    match rule {
        FingerprintMatch::Exact {
            manufacturer,
            model,
        } => format!("{} / {}", manufacturer, model),
        FingerprintMatch::ManufacturerPrefix { prefix, model } => {
            format!("{}* / {}", prefix, model.unwrap_or("*"))
        }
        FingerprintMatch::Model(model) => format!("* / {}", model),
    }
}

fn list_profiles(as_json: bool) -> Result<()> {
    let registry = ProfileRegistry::builtin();

    if as_json {
        let rules: Vec<_> = registry
            .rules()
            .map(|(rule, profile)| json!({ "match": describe_rule(rule), "profile": profile.name }))
            .collect();
        let profiles: Vec<_> = registry
            .profiles()
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "zcl_entries": p.zcl.len(),
                    "datapoints": p.datapoints.len(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "profiles": profiles, "rules": rules }))?
        );
        return Ok(());
    }

    println!("Profiles");
    println!("========\n");
    for profile in registry.profiles() {
        println!(
            "  {:<14} {:>3} ZCL entries, {:>3} DataPoints",
            profile.name,
            profile.zcl.len(),
            profile.datapoints.len()
        );
    }

    println!("\nFingerprint rules");
    println!("=================\n");
    for (rule, profile) in registry.rules() {
        println!("  {:<36} -> {}", describe_rule(rule), profile.name);
    }
    Ok(())
}

fn inspect(fingerprint: &DeviceFingerprint, as_json: bool) -> Result<()> {
    let profile = ProfileRegistry::builtin().resolve(fingerprint);
    tracing::debug!(%fingerprint, profile = profile.name, "Resolved profile");

    if as_json {
        let datapoints: Vec<_> = profile
            .datapoints
            .iter()
            .map(|e| {
                json!({
                    "dp": e.dp,
                    "capability": e.capability,
                    "setting": e.internal_key,
                    "type": format!("{:?}", e.dp_type),
                    "divisor": e.divisor,
                    "writable": e.writable,
                })
            })
            .collect();
        let out = json!({
            "fingerprint": fingerprint.to_string(),
            "profile": profile.name,
            "ias_zone": profile.quirks.ias_zone.map(|z| z.zone_id),
            "query_datapoints_on_bind": profile.quirks.query_datapoints_on_bind,
            "primary_endpoint": profile.quirks.primary_endpoint,
            "datapoints": datapoints,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{} -> {}\n", fingerprint, profile.name);
    print_quirks(&profile);

    if profile.has_datapoints() {
        println!("\nDataPoints");
        println!("----------");
        for entry in profile.datapoints.iter() {
            let target = entry
                .capability
                .map(str::to_string)
                .or_else(|| entry.internal_key.map(|k| format!("[{}]", k)))
                .unwrap_or_default();
            println!(
                "  {:>3}  {:<8} {:<24} {:<10} {}",
                entry.dp,
                format!("{:?}", entry.dp_type),
                target,
                entry.divisor.map(|d| format!("/{}", d)).unwrap_or_default(),
                if entry.writable { "rw" } else { "r" }
            );
        }
    }

    println!();
    list_clusters(&profile.zcl, false)
}

fn print_quirks(profile: &DeviceProfile) {
    let quirks = &profile.quirks;
    if let Some(zone) = quirks.ias_zone {
        println!("  IAS zone enrollment, zone id {}", zone.zone_id);
    }
    if quirks.query_datapoints_on_bind {
        println!("  Queries DataPoints after binding");
    }
    if let Some(endpoint) = quirks.primary_endpoint {
        println!("  Pinned to endpoint {}", endpoint);
    }
}

fn list_clusters(table: &CapabilityMappingTable, as_json: bool) -> Result<()> {
    if as_json {
        let entries: Vec<_> = table
            .iter()
            .map(|e| {
                json!({
                    "cluster": e.source.cluster.name(),
                    "attribute": e.attribute_name,
                    "capability": e.capability,
                    "setting": e.internal_key,
                    "unit": e.unit,
                    "reporting": e.reporting,
                    "writable": e.write.is_some(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("ZCL mappings");
    println!("------------");
    for entry in table.iter() {
        let target = entry
            .capability
            .map(str::to_string)
            .or_else(|| entry.internal_key.map(|k| format!("[{}]", k)))
            .unwrap_or_default();
        let reporting = entry
            .reporting
            .map(|r| format!("{}s..{}s", r.min_interval, r.max_interval))
            .unwrap_or_else(|| "read".to_string());
        println!(
            "  {:<26} {:<30} {:<24} {:<14} {}",
            entry.source.cluster.name(),
            entry.attribute_name,
            target,
            reporting,
            if entry.write.is_some() { "rw" } else { "r" }
        );
    }
    Ok(())
}

/// Run a frame through a throwaway dispatcher so the output matches what a
/// session would store.
async fn decode_frame(frame: &str, fingerprint: &DeviceFingerprint, as_json: bool) -> Result<()> {
    let cleaned: String = frame.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(&cleaned).context("frame is not valid hex")?;
    let frame = DataPointFrame::decode(&bytes).context("failed to decode frame")?;

    let profile = ProfileRegistry::builtin().resolve(fingerprint);
    tracing::info!(
        seq = frame.seq,
        records = frame.datapoints.len(),
        profile = profile.name,
        "Decoding DataPoint frame"
    );
    let config = EngineConfig::from_env();
    let dispatcher = InboundDispatcher::new(
        "cli",
        profile.clone(),
        Arc::new(CapabilityStore::new()),
        Arc::new(EventBus::from_config(&config)),
    );

    let mut rows = Vec::new();
    for dp in &frame.datapoints {
        let outcome: Vec<(String, std::result::Result<Value, String>)> = match dispatcher.dispatch_data_point(dp).await {
            Ok(applied) => applied
                .into_iter()
                .map(|a| (a.slot.name().to_string(), Ok(a.value)))
                .collect(),
            Err(e) => vec![(String::new(), Err(e.to_string()))],
        };
        rows.push((dp, outcome));
    }

    if as_json {
        let out: Vec<_> = rows
            .iter()
            .map(|(dp, outcome)| {
                let results: Vec<_> = outcome
                    .iter()
                    .map(|(slot, result)| match result {
                        Ok(value) => json!({ "slot": slot, "value": value }),
                        Err(e) => json!({ "error": e }),
                    })
                    .collect();
                json!({
                    "dp": dp.dp,
                    "type": format!("{:?}", dp.dp_type),
                    "data": hex::encode(&dp.data),
                    "results": results,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "seq": frame.seq, "datapoints": out }))?
        );
        return Ok(());
    }

    println!("Frame seq {} ({} records), profile {}\n", frame.seq, frame.datapoints.len(), profile.name);
    for (dp, outcome) in rows {
        for (slot, result) in outcome {
            match result {
                Ok(value) => println!(
                    "  dp {:>3} {:<8} {:<16} -> {} = {}",
                    dp.dp,
                    format!("{:?}", dp.dp_type),
                    hex::encode(&dp.data),
                    slot,
                    value
                ),
                Err(e) => println!(
                    "  dp {:>3} {:<8} {:<16} !! {}",
                    dp.dp,
                    format!("{:?}", dp.dp_type),
                    hex::encode(&dp.data),
                    e
                ),
            }
        }
    }
    Ok(())
}

fn show_config(file: Option<PathBuf>, as_json: bool) -> Result<()> {
    let config = match file {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading configuration file");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            EngineConfig::from_json_str(&text)
                .with_context(|| format!("invalid configuration in {}", path.display()))?
                .with_env_overrides()
        }
        None => EngineConfig::from_env(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("command_timeout_ms         {}", config.command_timeout_ms);
    println!("read_timeout_ms            {}", config.read_timeout_ms);
    println!("subscription_retries       {}", config.subscription_retries);
    println!("enrollment_max_attempts    {}", config.enrollment_max_attempts);
    println!("enrollment_retry_delay_ms  {}", config.enrollment_retry_delay_ms);
    println!("session_queue_capacity     {}", config.session_queue_capacity);
    println!("event_channel_capacity     {}", config.event_channel_capacity);
    println!(
        "default_reporting          {}s..{}s, min change {}",
        config.default_reporting.min_interval,
        config.default_reporting.max_interval,
        config.default_reporting.min_change
    );
    Ok(())
}

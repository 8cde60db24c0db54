//! Diagnostic runner for the hark compatibility layer.
//!
//! Exercises a full adapter lifecycle against the in-process simulated
//! driver: probe, load/start, event delivery, capture displacement, forced
//! events, parameters and a death drill, then emits the whole run as a JSON
//! report.

mod report;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use uuid::Uuid;

use hark_core::hal::wire;
use hark_core::sim::{SimCaptureNotifier, SimDriver};
use hark_core::types::{recognition_mode, Phrase};
use hark_core::{
    CompatAdapter, DriverRevision, HarkError, ModelKind, PhraseSoundModel, RecognitionConfig,
    SoundModel,
};

use report::{
    CaptureReport, CountingDeathSink, CountingGlobalSink, CountingModelSink, DeathReport,
    EventReport, ModelReport, ParameterReport, ProbeReport, ScenarioReport,
};

#[derive(Debug)]
struct Args {
    revision: DriverRevision,
    models: usize,
    concurrent_capture: bool,
    json: bool,
    output: Option<PathBuf>,
}

fn parse_revision(value: &str) -> anyhow::Result<DriverRevision> {
    let revision = match value {
        "v0" | "0" => DriverRevision::V0,
        "v1" | "1" => DriverRevision::V1,
        "v2" | "2" => DriverRevision::V2,
        "v3" | "3" => DriverRevision::V3,
        other => bail!("unknown revision: {other} (expected v0..v3)"),
    };
    Ok(revision)
}

fn parse_args() -> anyhow::Result<Args> {
    let mut revision = DriverRevision::V3;
    let mut models: usize = 3;
    let mut concurrent_capture = false;
    let mut json = false;
    let mut output: Option<PathBuf> = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--revision" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --revision");
                };
                revision = parse_revision(&v)?;
            }
            "--models" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --models");
                };
                models = v
                    .parse::<usize>()
                    .map_err(|_| anyhow::anyhow!("invalid value for --models"))?
                    .clamp(1, 8);
            }
            "--concurrent-capture" => {
                concurrent_capture = true;
            }
            "--json" => {
                json = true;
            }
            "--output" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --output");
                };
                output = Some(PathBuf::from(v));
            }
            "--help" | "-h" => {
                println!(
                    "Usage: hark [--revision <v0..v3>] [--models <1-8>] \\
  [--concurrent-capture] [--json] [--output <file.json>]\n\n\
Exercises the sound-trigger compatibility adapter against a simulated\n\
driver. --json prints the run report to stdout; --output writes it to a\n\
file."
                );
                std::process::exit(0);
            }
            other => {
                bail!("unknown argument: {other}");
            }
        }
    }

    Ok(Args {
        revision,
        models,
        concurrent_capture,
        json,
        output,
    })
}

fn generic_model() -> SoundModel {
    SoundModel {
        kind: ModelKind::Generic,
        uuid: Uuid::new_v4(),
        vendor_uuid: Uuid::new_v4(),
        data: b"hark".to_vec(),
    }
}

fn phrase_model(index: usize) -> PhraseSoundModel {
    PhraseSoundModel {
        common: SoundModel {
            kind: ModelKind::Keyphrase,
            uuid: Uuid::new_v4(),
            vendor_uuid: Uuid::new_v4(),
            data: b"hark".to_vec(),
        },
        phrases: vec![Phrase {
            id: index as i32,
            users: vec![0],
            locale: "en-US".to_owned(),
            text: format!("phrase {index}"),
            recognition_modes: recognition_mode::VOICE_TRIGGER,
        }],
    }
}

fn recognition_config() -> RecognitionConfig {
    RecognitionConfig {
        capture_requested: false,
        phrase_extras: Vec::new(),
        data: Vec::new(),
        audio_capabilities: 0,
    }
}

fn success_event(model: i32) -> wire::RecognitionEventV0 {
    wire::RecognitionEventV0 {
        status: wire::recognition_status::SUCCESS,
        model_type: wire::model_type::GENERIC,
        model,
        ..wire::RecognitionEventV0::default()
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("hark failed: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hark=info".parse().unwrap()),
        )
        .init();

    let args = parse_args()?;
    println!(
        "Running hark diagnostic against a simulated {} driver (models={})",
        args.revision, args.models
    );

    let sim = Arc::new(SimDriver::new(args.revision));
    sim.set_concurrent_capture(args.concurrent_capture);
    let notifier = Arc::new(SimCaptureNotifier::new(false));
    let adapter = CompatAdapter::create(
        sim.clone(),
        notifier.clone(),
        Box::new(|| tracing::warn!("simulated driver has no real restart; recovery is a no-op")),
    )?;

    let probe = ProbeReport {
        requested_revision: args.revision.to_string(),
        bound_revision: adapter.revision().to_string(),
        interface_descriptor: adapter.interface_descriptor()?,
        properties: adapter.get_properties(),
    };

    let sink = Arc::new(CountingModelSink::default());
    let global = Arc::new(CountingGlobalSink::default());
    adapter.register_callback(global.clone());

    // Load and start an alternating mix of generic and phrase models.
    let mut models = Vec::new();
    for index in 0..args.models {
        let kind = if index % 2 == 0 {
            ModelKind::Generic
        } else {
            ModelKind::Keyphrase
        };
        let handle = match kind {
            ModelKind::Generic => adapter.load_sound_model(&generic_model(), sink.clone())?,
            ModelKind::Keyphrase => {
                adapter.load_phrase_sound_model(&phrase_model(index), sink.clone())?
            }
        };
        adapter.start_recognition(handle, 1, 100 + index as i32, &recognition_config())?;
        println!("model {index}: loaded and recognizing (handle={handle})");
        models.push(ModelReport {
            index,
            kind,
            handle,
            started: true,
        });
    }
    let first_handle = models[0].handle;

    // One injected recognition; the terminal event ends that recognition, so
    // restart it to keep every model active for the conflict drill.
    sim.fire_recognition(success_event(first_handle));
    adapter.flush_callbacks();
    let events = EventReport {
        injected: 1,
        delivered: sink.events(),
        delivered_phrase: sink.phrase_events(),
    };
    adapter.start_recognition(first_handle, 1, 100, &recognition_config())?;

    let capture = if args.concurrent_capture {
        CaptureReport {
            arbitration_enabled: false,
            aborted_on_conflict: 0,
            start_rejected_during_conflict: false,
            resources_available_after_release: 0,
        }
    } else {
        let aborted_before = sink.aborted();
        notifier.set_state(true);
        let start_rejected = adapter
            .start_recognition(first_handle, 1, 100, &recognition_config())
            .is_err();
        adapter.flush_callbacks();
        let available_before = global.available();
        notifier.set_state(false);
        adapter.flush_callbacks();
        CaptureReport {
            arbitration_enabled: true,
            aborted_on_conflict: sink.aborted() - aborted_before,
            start_rejected_during_conflict: start_rejected,
            resources_available_after_release: global.available() - available_before,
        }
    };

    let force_event_supported = match adapter.force_recognition_event(first_handle) {
        Ok(()) => true,
        Err(HarkError::NotSupported { .. }) => false,
        Err(err) => return Err(err.into()),
    };

    let parameters = if adapter.revision() >= DriverRevision::V3 {
        sim.set_parameter_value(42);
        sim.set_query_range(Some(wire::ModelParameterRangeV3 { start: 0, end: 100 }));
        let value = adapter.get_model_parameter(first_handle, 0)?;
        adapter.set_model_parameter(first_handle, 0, value)?;
        let range = adapter.query_parameter(first_handle, 0)?;
        ParameterReport {
            supported: true,
            value_round_trip: Some(value),
            range,
        }
    } else {
        ParameterReport {
            supported: false,
            value_round_trip: None,
            range: adapter.query_parameter(first_handle, 0)?,
        }
    };

    let death_sink = Arc::new(CountingDeathSink::default());
    adapter.link_to_death(death_sink.clone())?;
    sim.die();
    adapter.flush_callbacks();
    let death = DeathReport {
        linked: true,
        delivered: death_sink.died(),
    };

    for model in &models {
        adapter.stop_recognition(model.handle)?;
        adapter.unload_sound_model(model.handle)?;
    }
    adapter.detach();

    let scenario = ScenarioReport {
        probe,
        models,
        events,
        capture,
        force_event_supported,
        parameters,
        death,
    };
    println!(
        "Done. revision={} delivered={} aborted={} deathDelivered={}",
        scenario.probe.bound_revision,
        scenario.events.delivered,
        scenario.capture.aborted_on_conflict,
        scenario.death.delivered
    );

    if args.json || args.output.is_some() {
        let rendered = serde_json::to_string_pretty(&scenario)?;
        if let Some(path) = &args.output {
            std::fs::write(path, &rendered)?;
            println!("Wrote diagnostic report: {}", path.display());
        }
        if args.json {
            println!("{rendered}");
        }
    }

    Ok(())
}

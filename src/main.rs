//! lamco-input-replay - Input driver scenario replay
//!
//! Drives the input driver core against virtual devices described in a TOML
//! scenario and prints every consumer event and property result as JSON lines.

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lamco_input_driver::device::RawEventKind;
use lamco_input_driver::{
    ConsumerEvent, DeviceControl, DeviceId, Driver, DriverConfig, OptionMap, PropertyValue,
    ReadinessHost, VirtualBackend, VirtualDeviceSpec,
};

/// Command-line arguments for lamco-input-replay
#[derive(Parser, Debug)]
#[command(name = "lamco-input-replay")]
#[command(version, about = "Replay input scenarios through the input driver core", long_about = None)]
pub struct Args {
    /// Scenario file path
    #[arg(short, long, env = "LAMCO_INPUT_SCENARIO")]
    pub scenario: PathBuf,

    /// Configuration file path
    #[arg(short, long, env = "LAMCO_INPUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Write logs to file (in addition to stderr)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Built-in virtual device shapes
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum Preset {
    Touchpad,
    Mouse,
    Touchscreen,
    AbsolutePointer,
    Keyboard,
}

/// One device of a scenario
#[derive(Debug, Deserialize)]
struct ScenarioDevice {
    path: PathBuf,
    #[serde(default)]
    preset: Option<Preset>,
    #[serde(default)]
    spec: Option<VirtualDeviceSpec>,
    #[serde(default)]
    options: OptionMap,
    #[serde(default)]
    server_fd: Option<RawFd>,
}

impl ScenarioDevice {
    fn virtual_spec(&self) -> VirtualDeviceSpec {
        let mut spec = match (&self.spec, self.preset) {
            (Some(spec), _) => spec.clone(),
            (None, Some(Preset::Touchpad)) => VirtualDeviceSpec::touchpad(&self.path),
            (None, Some(Preset::Mouse)) | (None, None) => VirtualDeviceSpec::mouse(&self.path),
            (None, Some(Preset::Touchscreen)) => VirtualDeviceSpec::touchscreen(&self.path),
            (None, Some(Preset::AbsolutePointer)) => {
                VirtualDeviceSpec::absolute_pointer(&self.path)
            }
            (None, Some(Preset::Keyboard)) => VirtualDeviceSpec::keyboard(&self.path),
        };
        spec.path = self.path.clone();
        spec
    }

    fn option_map(&self) -> OptionMap {
        let mut options = self.options.clone();
        if options.device_path().is_none() {
            options.insert("Device", self.path.to_string_lossy());
        }
        options
    }
}

/// One scripted action
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
enum Step {
    Control {
        device: PathBuf,
        control: DeviceControl,
    },
    SetProperty {
        device: PathBuf,
        name: String,
        value: PropertyValue,
        #[serde(default)]
        check_only: bool,
    },
    GetProperty {
        device: PathBuf,
        name: String,
    },
    Event {
        device: PathBuf,
        event: RawEventKind,
    },
    Read,
    Uninit {
        device: PathBuf,
    },
}

/// Scenario file
#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    devices: Vec<ScenarioDevice>,
    #[serde(default)]
    steps: Vec<Step>,
}

impl Scenario {
    fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read scenario file: {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse scenario file")
    }
}

/// Output record, one JSON line each
#[derive(Debug, Serialize)]
#[serde(tag = "record", rename_all = "kebab-case")]
enum Record<'a> {
    Device {
        info: lamco_input_driver::DeviceInfo,
    },
    Event {
        device: DeviceId,
        event: &'a ConsumerEvent,
    },
    Property {
        device: DeviceId,
        name: &'a str,
        value: Option<PropertyValue>,
    },
    Write {
        device: DeviceId,
        name: &'a str,
        status: String,
    },
    Error {
        step: usize,
        message: String,
    },
    Stats {
        processed: u64,
        dropped: u64,
    },
}

/// Readiness host that logs registration changes
#[derive(Debug, Default)]
struct LoggingHost {
    watched: BTreeSet<RawFd>,
}

impl ReadinessHost for LoggingHost {
    fn add_enabled_device(&mut self, fd: RawFd) {
        info!("Watching shared event descriptor {}", fd);
        self.watched.insert(fd);
    }

    fn remove_enabled_device(&mut self, fd: RawFd) {
        info!("No longer watching shared event descriptor {}", fd);
        self.watched.remove(&fd);
    }
}

fn emit(out: &mut impl Write, record: &Record<'_>) -> Result<()> {
    serde_json::to_writer(&mut *out, record)?;
    writeln!(out)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DriverConfig::load(path)?,
        None => DriverConfig::default(),
    };
    let config = config.with_overrides(args.log_format.clone(), args.log_file.as_deref());

    init_logging(&args, &config)?;

    info!("lamco-input-replay v{}", env!("CARGO_PKG_VERSION"));
    debug!("Config: {:?}", config);

    let scenario = Scenario::load(&args.scenario)?;
    info!(
        "Loaded scenario with {} devices and {} steps",
        scenario.devices.len(),
        scenario.steps.len()
    );

    run(&scenario, &config, &mut std::io::stdout().lock())
}

fn run(scenario: &Scenario, config: &DriverConfig, out: &mut impl Write) -> Result<()> {
    let backend = VirtualBackend::new(scenario.devices.iter().map(ScenarioDevice::virtual_spec));
    let source = backend.clone();
    let mut driver = Driver::with_config(move || Ok(source.clone()), LoggingHost::default(), config);

    let mut ids: HashMap<PathBuf, DeviceId> = HashMap::new();
    for device in &scenario.devices {
        let id = driver
            .pre_init(&device.option_map(), device.server_fd)
            .context(format!("Failed to open {}", device.path.display()))?;
        ids.insert(device.path.clone(), id);
        emit(
            out,
            &Record::Device {
                info: driver.device_info(id)?,
            },
        )?;
    }

    for (index, step) in scenario.steps.iter().enumerate() {
        if let Err(e) = run_step(&mut driver, &backend, &mut ids, step, out) {
            emit(
                out,
                &Record::Error {
                    step: index,
                    message: format!("{:#}", e),
                },
            )?;
        }
    }

    for id in driver.device_ids() {
        driver.uninit(id)?;
    }

    let (processed, dropped) = driver.event_stats();
    emit(out, &Record::Stats { processed, dropped })?;
    out.flush()?;
    Ok(())
}

fn run_step(
    driver: &mut Driver<VirtualBackend, LoggingHost>,
    backend: &VirtualBackend,
    ids: &mut HashMap<PathBuf, DeviceId>,
    step: &Step,
    out: &mut impl Write,
) -> Result<()> {
    let lookup = |ids: &HashMap<PathBuf, DeviceId>, path: &Path| {
        ids.get(path)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Unknown device {}", path.display()))
    };

    match step {
        Step::Control { device, control } => {
            driver.device_control(lookup(ids, device)?, *control)?;
        }
        Step::SetProperty {
            device,
            name,
            value,
            check_only,
        } => {
            let id = lookup(ids, device)?;
            let status = match driver.set_property(id, name, value, *check_only) {
                Ok(status) => format!("{:?}", status),
                Err(e) => format!("{:?}: {}", e.status(), e),
            };
            emit(out, &Record::Write { device: id, name, status })?;
        }
        Step::GetProperty { device, name } => {
            let id = lookup(ids, device)?;
            let value = driver.get_property(id, name);
            emit(out, &Record::Property { device: id, name, value })?;
        }
        Step::Event { device, event } => {
            if !backend.push_event(device, event.clone()) {
                warn!("No virtual device at {}", device.display());
            }
        }
        Step::Read => {
            let mut sink = Vec::new();
            if let Err(e) = driver.read_input(&mut sink) {
                warn!("Read failed: {}", e);
            }
            for (device, event) in &sink {
                emit(out, &Record::Event { device: *device, event })?;
            }
        }
        Step::Uninit { device } => {
            let id = lookup(ids, device)?;
            driver.uninit(id)?;
            ids.remove(device);
        }
    }
    Ok(())
}

fn init_logging(args: &Args, config: &DriverConfig) -> Result<()> {
    use std::fs::File;

    let log_level = match args.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "lamco_input_driver={level},lamco_input_replay={level},warn",
            level = log_level
        ))
    });

    // Stdout carries the JSON-lines output, logs go to stderr
    if let Some(log_file_path) = &config.logging.file {
        let file = File::create(log_file_path)?;

        match config.logging.format.as_str() {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
        }
        info!("Logging to file: {}", log_file_path.display());
    } else {
        match config.logging.format.as_str() {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
        }
    }

    Ok(())
}

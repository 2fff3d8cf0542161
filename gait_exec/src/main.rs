//! Main biped gait executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Read back the actuator positions to seed the starting pose
//!     - Main loop, once every 10 ms:
//!         - Tuning console key processing
//!         - IMU sensing
//!         - Gait control processing
//!         - Output stage and actuator demands
//!         - Archiving
//!
//! # Modules
//!
//! All modules (e.g. `gait_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.
//!

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use comms_if::eqpt::{joint::JointDems, servo_bus::ServoBus};
use gait_lib::{
    actuator::{self, Actuator, BusActuator, SimActuator},
    data_store::DataStore,
    dispatch::Dispatcher,
    joints::JointAngleSet,
    params::GaitExecParams,
    sensor::{OrientationSensor, SampleHold, SimImu, UartImu},
    tuning::TuningConsole,
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, error, info, warn};
use std::fs::OpenOptions;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use util::{
    archive::Archived,
    host,
    logger::{logger_init, parse_level},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Biped gait executable
#[derive(Debug, StructOpt)]
#[structopt(name = "gait_exec")]
struct Opt {
    /// Use simulated actuators and IMU instead of the hardware
    #[structopt(long)]
    sim: bool,

    /// Replay raw IMU samples from this csv file (implies simulated equipment)
    #[structopt(long, parse(from_os_str))]
    imu_script: Option<PathBuf>,

    /// Stop after this many cycles
    #[structopt(long)]
    max_cycles: Option<u128>,

    /// Minimum log level (info, debug or trace)
    #[structopt(long, default_value = "info")]
    log_level: String,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("gait_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let log_level = parse_level(&opt.log_level)
        .ok_or_else(|| eyre!("Unknown log level \"{}\"", opt.log_level))?;
    logger_init(log_level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Biped Gait Executable\n");
    info!("Running on: {}", host::get_host_info());
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let exec_params: GaitExecParams =
        util::params::load("gait_exec.toml").wrap_err("Could not load exec params")?;

    let cycle_period = Duration::from_secs_f64(exec_params.cycle_period_s);
    let cycle_frequency_hz = 1.0 / exec_params.cycle_period_s;

    info!("Exec parameters loaded");
    debug!(
        "Exec parameters: {}",
        serde_json::to_string_pretty(&exec_params).wrap_err("Could not serialise exec params")?
    );

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    // ---- INITIALISE MODULES ----

    ds.gait_ctrl
        .init("gait_ctrl.toml", &session)
        .wrap_err("Failed to initialise GaitCtrl")?;
    info!("GaitCtrl init complete");

    ds.dispatcher = Dispatcher::new(ds.gait_ctrl.params().dispatch.clone());

    info!("Module initialisation complete\n");

    // ---- INITIALISE EQUIPMENT ----

    let simulated = opt.sim || opt.imu_script.is_some();

    let mut actuator: Box<dyn Actuator> = if simulated {
        let mut sim = SimActuator::default();
        for entry in ds.gait_ctrl.params().initial_pose.iter() {
            sim.positions.insert(entry.joint, entry.ticks);
        }
        info!("Using simulated actuators");
        Box::new(sim)
    } else {
        let port = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&exec_params.servo_bus.device)
            .wrap_err_with(|| {
                format!("Failed to open the servo bus on {}", exec_params.servo_bus.device)
            })?;
        info!("Servo bus opened on {}", exec_params.servo_bus.device);
        Box::new(BusActuator::new(ServoBus::new(port), &exec_params.servo_bus))
    };

    let sensor: Box<dyn OrientationSensor> = match opt.imu_script {
        Some(ref path) => {
            let sim = SimImu::from_script(path)
                .wrap_err_with(|| format!("Failed to load the IMU script {:?}", path))?;
            info!("Replaying {} IMU samples from {:?}", sim.remaining(), path);
            Box::new(sim)
        }
        None if simulated => {
            info!("Using a simulated level IMU");
            Box::new(SimImu::level())
        }
        None => {
            let imu = UartImu::open(&exec_params.imu.device)
                .wrap_err_with(|| format!("Failed to open the IMU on {}", exec_params.imu.device))?;
            info!("IMU opened on {}", exec_params.imu.device);
            Box::new(imu)
        }
    };
    let mut imu = SampleHold::new(sensor);

    // ---- SEED STARTING POSE ----

    let (pose, errors) = actuator::read_pose(actuator.as_mut());
    if errors.is_empty() {
        ds.gait_ctrl.set_initial_pose(JointAngleSet::from_dems(&pose));
        ds.dispatcher.seed(&pose);
        info!("Starting pose read back from the actuators");
    } else {
        warn!(
            "Could not read back {} joint positions, assuming the default starting pose",
            errors.len()
        );
        let mut dems = JointDems::default();
        for entry in ds.gait_ctrl.params().initial_pose.iter() {
            dems.pos_ticks.insert(entry.joint, entry.ticks);
        }
        ds.dispatcher.seed(&dems);
    }

    // ---- TUNING CONSOLE ----

    let keys = spawn_console_reader();
    let mut console = TuningConsole::new();

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        if let Some(max) = opt.max_cycles {
            if ds.num_cycles >= max {
                info!("Maximum number of cycles ({}) reached, stopping", max);
                break;
            }
        }

        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(cycle_frequency_hz);

        // ---- TUNING CONSOLE ----

        while let Ok(key) = keys.try_recv() {
            if let Some(echo) = console.process(key, &mut ds.gait_ctrl) {
                info!("{}\n{}", key, echo);
            }
        }

        // ---- DATA INPUT ----

        ds.raw_orientation = imu.read();
        ds.gait_ctrl_input.raw = ds.raw_orientation;

        // ---- CONTROL ALGORITHM PROCESSING ----

        match ds.gait_ctrl.proc(&ds.gait_ctrl_input) {
            Ok((o, r)) => {
                ds.gait_ctrl_output = Some(o);
                ds.gait_ctrl_status_rpt = r;
            }
            Err(e) => {
                // The previous pose is kept, nothing is sent this cycle
                ds.num_gait_ctrl_errors += 1;
                warn!("Error during GaitCtrl processing: {}", e)
            }
        };

        if ds.gait_ctrl_status_rpt.calibration_complete {
            session.save("tilt_offsets.json", ds.gait_ctrl.offsets());
        }

        // ---- OUTPUT STAGE ----

        if let Some(output) = ds.gait_ctrl_output {
            if !ds.torque_released {
                let (dems, rpt) = ds.dispatcher.process(&output);

                let errors = actuator::send_dems(actuator.as_mut(), &dems);
                ds.record_actuator_errors(errors.len());

                ds.joint_dems = Some(dems);
                ds.dispatch_rpt = rpt;

                if output.release_torque {
                    let errors = actuator::release_torque(actuator.as_mut());
                    ds.record_actuator_errors(errors.len());
                    ds.torque_released = true;
                    error!("Joint torque released, the robot must be reset by hand");
                }
            }
        }

        // ---- WRITE ARCHIVES ----

        if let Err(e) = ds.gait_ctrl.write() {
            warn!("Could not write the GaitCtrl archive: {}", e);
        }

        if ds.is_1_hz_cycle {
            debug!(
                "Mode {}, {} actuator errors, {} IMU errors",
                ds.gait_ctrl.mode(),
                ds.num_actuator_errors,
                imu.num_errors
            );
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                ds.num_consec_cycle_overruns += 1;

                let overrun_s = cycle_dur.as_secs_f64() - cycle_period.as_secs_f64();
                if ds.num_consec_cycle_overruns > exec_params.max_consec_overruns {
                    error!(
                        "Cycle overran by {:.06} s ({} consecutive overruns)",
                        overrun_s, ds.num_consec_cycle_overruns
                    );
                } else {
                    warn!("Cycle overran by {:.06} s", overrun_s);
                }
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    info!(
        "{} cycles run, {} actuator errors, {} IMU errors",
        ds.num_cycles, ds.num_actuator_errors, imu.num_errors
    );

    session.exit();

    info!("End of execution");

    Ok(())
}

/// Start a thread forwarding console keys to the control loop.
fn spawn_console_reader() -> Receiver<char> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let stdin = io::stdin();

        for byte in stdin.lock().bytes() {
            match byte {
                Ok(b'\n') | Ok(b'\r') => (),
                Ok(b) => {
                    if tx.send(b as char).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Console read error, tuning disabled: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

use std::env;

use cytotable_xy_stage::{Axis, StageConfigBuilder, XyStage};
use embedded_hal::delay::DelayNs;
use inquire::Select;
use serialport::SerialPort;

// Configuration constants - adjust these for your setup
const BAUD_RATE: u32 = 9600;
// Same as the controller's answer timeout. Homing is waited for separately.
const SERIAL_TIMEOUT_MS: u64 = 500;
const STEP_SIZE_UM: f64 = 0.1;
const SPEED_UM_S: f64 = 2500.0;
const MOVE_DISTANCE_UM: f64 = 500.0;

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            // serialport reports an expired read timeout as either of these.
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                embedded_io::ErrorKind::TimedOut
            }
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            std::io::ErrorKind::OutOfMemory => embedded_io::ErrorKind::OutOfMemory,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::ReadReady for PortWrapper {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        self.0
            .bytes_to_read()
            .map(|count| count > 0)
            .map_err(|e| IoError(e.into()))
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

/// Blocking delay backed by the OS scheduler.
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}

fn main() {
    env_logger::init();

    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        // List available serial ports
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        // Interactive selection
        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    println!("Using port: {}", port_name);

    // Open serial port
    let port = serialport::new(&port_name, BAUD_RATE)
        .flow_control(serialport::FlowControl::None)
        .stop_bits(serialport::StopBits::One)
        .timeout(std::time::Duration::from_millis(SERIAL_TIMEOUT_MS))
        .open()
        .expect("Failed to open serial port");

    let config = StageConfigBuilder::new()
        .with_step_sizes(STEP_SIZE_UM, STEP_SIZE_UM)
        .build()
        .expect("Invalid stage configuration");

    // Create a stage object
    let mut stage: XyStage<PortWrapper, StdDelay> =
        XyStage::new(PortWrapper(port), StdDelay, config);
    stage.initialize().unwrap();

    let applied = stage.set_speed(SPEED_UM_S).unwrap();
    println!("Speed set to {applied} um/s");

    println!("Homing...");
    stage.home().unwrap();

    stage.set_origin().unwrap();
    println!("Origin recorded at {:?} um", stage.origin_um());

    stage
        .set_relative_position_um(MOVE_DISTANCE_UM, MOVE_DISTANCE_UM)
        .unwrap();
    while stage.busy() {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    let (x, y) = stage.query_position().unwrap();
    println!("Position: {x}, {y} steps");
    let (x_um, y_um) = stage.position_um().unwrap();
    println!("Position: {x_um:.1}, {y_um:.1} um");

    println!(
        "X axis busy: {}",
        stage.is_axis_busy(Axis::X).unwrap_or(false)
    );

    stage.stop().unwrap();
    stage.shutdown();
}

// Host-side closed-loop demo: runs the regulator against a simulated
// first-order thermal plant and writes one CSV row per control cycle to
// stdout for plotting.
//
// Timeline: 5 s of manual heater drive, bumpless engagement, then a
// setpoint step down at 90 s. Total run 180 s of simulated time.

use std::cell::Cell;

use pidloop_algo::{Direction, Mode, PidController, ProportionalOn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Heater -> temperature plant with exponential lag toward ambient.
struct ThermalPlant {
    temp: f64,
    ambient: f64,
    tau_s: f64,
    heater_gain: f64,
}

impl ThermalPlant {
    fn new(ambient: f64) -> Self {
        Self {
            temp: ambient,
            ambient,
            tau_s: 30.0,
            heater_gain: 0.05,
        }
    }

    /// Advances the plant by one integration step of `dt_s` seconds
    fn step(&mut self, power: f64, dt_s: f64) {
        let rate = (self.ambient - self.temp) / self.tau_s + self.heater_gain * power;
        self.temp += rate * dt_s;
    }
}

/// Simulation tick, finer than the 100 ms control period so the
/// regulator's own time gating is exercised
const TICK_MS: u32 = 10;
const TICK_S: f64 = 0.01;

const RUN_MS: u32 = 180_000;
const ENGAGE_MS: u32 = 5_000;
const STEP_MS: u32 = 90_000;

const MANUAL_POWER: f64 = 20.0;
const SETPOINT_HIGH: f64 = 60.0;
const SETPOINT_LOW: f64 = 45.0;

fn main() {
    let mut plant = ThermalPlant::new(20.0);
    let mut rng = StdRng::seed_from_u64(42);

    let input = Cell::new(plant.temp);
    let output = Cell::new(MANUAL_POWER);
    let setpoint = Cell::new(SETPOINT_HIGH);

    let mut pid = PidController::new(
        &input,
        &output,
        &setpoint,
        8.0,
        2.0,
        0.5,
        ProportionalOn::Error,
        Direction::Direct,
        0,
    );

    println!("time_s,setpoint,plant_temp,measured,power,mode");

    let mut now_ms = 0u32;
    while now_ms < RUN_MS {
        if now_ms == ENGAGE_MS {
            pid.set_mode(Mode::Automatic);
        }
        if now_ms == STEP_MS {
            setpoint.set(SETPOINT_LOW);
        }

        // Sensor read with measurement noise
        let measured = plant.temp + rng.gen_range(-0.15..0.15);
        input.set(measured);

        if pid.compute(now_ms) || (pid.mode() == Mode::Manual && now_ms % 100 == 0) {
            println!(
                "{:.1},{:.2},{:.3},{:.3},{:.3},{}",
                now_ms as f64 / 1000.0,
                setpoint.get(),
                plant.temp,
                measured,
                output.get(),
                match pid.mode() {
                    Mode::Manual => "manual",
                    Mode::Automatic => "auto",
                }
            );
        }

        plant.step(output.get(), TICK_S);
        now_ms += TICK_MS;
    }
}

//! Closed-loop tests driving the regulator against a simulated
//! first-order thermal plant.

use std::cell::Cell;

use pidloop_algo::{Direction, Mode, PidController, ProportionalOn};

/// Heater -> temperature plant with exponential lag toward ambient.
struct FirstOrderPlant {
    temp: f64,
    ambient: f64,
    tau_s: f64,
    heater_gain: f64,
}

impl FirstOrderPlant {
    fn new(ambient: f64) -> Self {
        Self {
            temp: ambient,
            ambient,
            tau_s: 30.0,
            heater_gain: 0.05,
        }
    }

    fn step(&mut self, power: f64, dt_s: f64) {
        let rate = (self.ambient - self.temp) / self.tau_s + self.heater_gain * power;
        self.temp += rate * dt_s;
    }
}

const TICK_MS: u32 = 10;
const TICK_S: f64 = 0.01;

#[test]
fn pi_loop_converges_on_first_order_plant() {
    let mut plant = FirstOrderPlant::new(20.0);

    let input = Cell::new(plant.temp);
    let output = Cell::new(0.0);
    let setpoint = Cell::new(60.0);

    let mut pid = PidController::new(
        &input,
        &output,
        &setpoint,
        8.0,
        2.0,
        0.0,
        ProportionalOn::Error,
        Direction::Direct,
        0,
    );
    pid.set_mode(Mode::Automatic);

    let mut accepted = 0u32;
    let mut now_ms = 0u32;
    while now_ms < 120_000 {
        input.set(plant.temp);
        if pid.compute(now_ms) {
            accepted += 1;
        }
        plant.step(output.get(), TICK_S);
        now_ms += TICK_MS;
    }

    // One accepted cycle per 100 ms sample period despite 10 ms ticks
    assert_eq!(accepted, 1200, "time gating should accept one cycle per period");
    assert!(
        (plant.temp - setpoint.get()).abs() < 0.5,
        "loop should settle on the setpoint, ended at {}",
        plant.temp
    );
}

#[test]
fn bumpless_engagement_avoids_output_step() {
    let mut plant = FirstOrderPlant::new(20.0);

    let input = Cell::new(plant.temp);
    let output = Cell::new(0.0);
    let setpoint = Cell::new(20.0);

    let mut pid = PidController::new(
        &input,
        &output,
        &setpoint,
        8.0,
        2.0,
        0.0,
        ProportionalOn::Error,
        Direction::Direct,
        0,
    );

    // Operator drives the heater by hand for 30 s
    let mut now_ms = 0u32;
    output.set(30.0);
    while now_ms < 30_000 {
        input.set(plant.temp);
        assert!(!pid.compute(now_ms), "manual mode must never compute");
        plant.step(output.get(), TICK_S);
        now_ms += TICK_MS;
    }
    assert_eq!(output.get(), 30.0);

    // Hand over at the current operating point
    setpoint.set(plant.temp);
    pid.set_mode(Mode::Automatic);

    let mut first_auto_output = None;
    while now_ms < 40_000 {
        input.set(plant.temp);
        if pid.compute(now_ms) && first_auto_output.is_none() {
            first_auto_output = Some(output.get());
        }
        plant.step(output.get(), TICK_S);
        now_ms += TICK_MS;
    }

    let first = first_auto_output.expect("automatic mode should have computed");
    assert!(
        (first - 30.0).abs() < 2.0,
        "engagement should resume near the manual command, got {}",
        first
    );
}

#[test]
fn saturation_then_limit_narrowing_stays_bounded() {
    let mut plant = FirstOrderPlant::new(20.0);

    let input = Cell::new(plant.temp);
    let output = Cell::new(0.0);
    // Unreachable setpoint keeps the loop saturated
    let setpoint = Cell::new(500.0);

    let mut pid = PidController::new(
        &input,
        &output,
        &setpoint,
        8.0,
        2.0,
        0.0,
        ProportionalOn::Error,
        Direction::Direct,
        0,
    );
    pid.set_mode(Mode::Automatic);

    let mut now_ms = 0u32;
    while now_ms < 5_000 {
        input.set(plant.temp);
        pid.compute(now_ms);
        plant.step(output.get(), TICK_S);
        now_ms += TICK_MS;
    }
    assert_eq!(output.get(), 255.0, "loop should be saturated at the limit");

    // Narrowing the limits clamps the live command at once
    assert!(pid.set_output_limits(0.0, 100.0));
    assert_eq!(output.get(), 100.0);

    while now_ms < 10_000 {
        input.set(plant.temp);
        if pid.compute(now_ms) {
            assert!(
                output.get() <= 100.0,
                "command must stay inside the narrowed limits"
            );
        }
        plant.step(output.get(), TICK_S);
        now_ms += TICK_MS;
    }
}

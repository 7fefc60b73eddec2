// Implements the PidController module, a discrete-time PID regulator that
// turns a measured process variable and a setpoint into a bounded actuator
// command.

// Key Features:
// - Time-gated sampling: call compute() as often as you like, math runs
//   once per sample period
// - Incremental-sum integral with anti-windup clamping
// - Proportional on error or on measurement (no derivative kick on
//   setpoint changes)
// - Bumpless manual -> automatic transfer
// - Gain re-derivation on sample-time and direction changes

// Detailed Operation:
// The controller binds three caller-owned numeric cells: input (process
// variable), output (actuator command) and setpoint. Each accepted cycle it
// reads input and setpoint, advances the integral accumulator, derives the
// proportional and derivative terms and writes the clamped result to the
// output cell. Integral and derivative gains are pre-scaled by the sample
// period at tuning time so compute() stays multiply-add only. Invalid
// reconfiguration requests (negative gains, inverted limits, zero sample
// time) are rejected and leave the last-known-good configuration in place.

// Licensed under the Apache License, Version 2.0

use core::cell::Cell;

/// Operating mode of the regulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Output is driven externally; compute() is a no-op
    Manual,
    /// Controller actively computes the output every sample period
    Automatic,
}

/// Sign convention between output and input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// More output drives the process variable up
    Direct,
    /// More output drives the process variable down
    Reverse,
}

/// Selects what the proportional term multiplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProportionalOn {
    /// Proportional acts on the instantaneous error
    Error,
    /// Proportional acts on the measurement delta and folds into the
    /// integral accumulator
    Measurement,
}

/// Discrete-time PID regulator bound to caller-owned I/O cells.
///
/// The caller must keep the three cells alive for the controller's entire
/// lifetime; the controller never owns their storage.
pub struct PidController<'a> {
    /// Live process variable, written by measurement logic outside this core
    input: &'a Cell<f64>,
    /// Actuator command destination, read by the actuator driver
    output: &'a Cell<f64>,
    /// Desired value, written by upstream logic or operator input
    setpoint: &'a Cell<f64>,

    /// Active proportional gain (sign-flipped under Reverse)
    kp: f64,
    /// Active integral gain, pre-scaled by the sample period
    ki: f64,
    /// Active derivative gain, pre-scaled by the sample period
    kd: f64,

    /// User-facing gains as originally supplied, for introspection
    disp_kp: f64,
    disp_ki: f64,
    disp_kd: f64,

    /// Proportional-on-error vs. proportional-on-measurement selection
    p_on: ProportionalOn,
    /// Sign convention between output and input
    direction: Direction,

    /// Integral accumulator, persists across cycles
    output_sum: f64,
    /// Process variable at the previous accepted sample
    last_input: f64,
    /// Timestamp of the previous accepted sample (wrapping milliseconds)
    last_time: u32,

    /// Minimum interval between accepted computations
    sample_time_ms: u32,
    /// Clamp bounds for both the accumulator and the final output
    out_min: f64,
    out_max: f64,

    /// Whether the controller is actively computing
    in_auto: bool,
}

impl<'a> PidController<'a> {
    /// Default clamp range, matching an 8-bit PWM command
    const DEFAULT_LIMITS: (f64, f64) = (0.0, 255.0);

    /// Default sample period in milliseconds
    const DEFAULT_SAMPLE_TIME_MS: u32 = 100;

    /// Binds the I/O cells and applies the initial configuration.
    ///
    /// # Arguments
    /// * `input` / `output` / `setpoint` - caller-owned I/O cells
    /// * `kp` / `ki` / `kd` - initial gains, must be finite and >= 0
    /// * `p_on` - proportional mode selection
    /// * `direction` - process sign convention
    /// * `now_ms` - current monotonic milliseconds from the host scheduler
    ///
    /// # Returns
    /// A controller in Manual mode with [0, 255] output limits and a 100 ms
    /// sample period, backdated so the very first compute() call is due.
    /// Invalid initial gains are rejected the same way `set_tunings` rejects
    /// them, leaving all gains at zero.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        input: &'a Cell<f64>,
        output: &'a Cell<f64>,
        setpoint: &'a Cell<f64>,
        kp: f64,
        ki: f64,
        kd: f64,
        p_on: ProportionalOn,
        direction: Direction,
        now_ms: u32,
    ) -> Self {
        let mut pid = Self {
            input,
            output,
            setpoint,
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            disp_kp: 0.0,
            disp_ki: 0.0,
            disp_kd: 0.0,
            p_on,
            direction: Direction::Direct,
            output_sum: 0.0,
            last_input: 0.0,
            last_time: 0,
            sample_time_ms: Self::DEFAULT_SAMPLE_TIME_MS,
            out_min: 0.0,
            out_max: 0.0,
            in_auto: false,
        };

        pid.set_output_limits(Self::DEFAULT_LIMITS.0, Self::DEFAULT_LIMITS.1);

        // Direction first so the tuning sign flip lands consistently
        pid.set_direction(direction);
        pid.set_tunings_with(kp, ki, kd, p_on);

        // Backdate so the first compute() is immediately eligible
        pid.last_time = now_ms.wrapping_sub(pid.sample_time_ms);
        pid
    }

    /// Runs one regulation step if one is due.
    ///
    /// # Arguments
    /// * `now_ms` - current monotonic milliseconds from the host scheduler;
    ///   successive values must never move backward, wrap-around is handled
    ///
    /// # Returns
    /// `true` when a new output was computed and written to the output
    /// cell, `false` when the controller is in Manual mode or the sample
    /// period has not elapsed yet (no state change in either case).
    ///
    /// Never panics. Non-finite input or setpoint values propagate through
    /// the cycle's output; the accumulator was clamped on every prior
    /// finite cycle, so the next finite sample recovers.
    pub fn compute(&mut self, now_ms: u32) -> bool {
        if !self.in_auto {
            return false;
        }

        let elapsed = now_ms.wrapping_sub(self.last_time);
        if elapsed < self.sample_time_ms {
            return false;
        }

        let input = self.input.get();
        let error = self.setpoint.get() - input;
        let d_input = input - self.last_input;

        // Incremental-sum integral term
        self.output_sum += self.ki * error;

        // Proportional on measurement folds into the accumulator
        if self.p_on == ProportionalOn::Measurement {
            self.output_sum -= self.kp * d_input;
        }

        // Anti-windup: the accumulator never leaves the output range
        self.output_sum = clamp(self.output_sum, self.out_min, self.out_max);

        let mut output = match self.p_on {
            ProportionalOn::Error => self.kp * error,
            ProportionalOn::Measurement => 0.0,
        };

        // Derivative on measurement, not on error
        output += self.output_sum - self.kd * d_input;
        output = clamp(output, self.out_min, self.out_max);
        self.output.set(output);

        // Remember state for the next accepted sample
        self.last_input = input;
        self.last_time = now_ms;
        true
    }

    /// Sets new gains using the last-remembered proportional mode.
    ///
    /// # Returns
    /// `true` when applied, `false` when rejected (state unchanged).
    pub fn set_tunings(&mut self, kp: f64, ki: f64, kd: f64) -> bool {
        self.set_tunings_with(kp, ki, kd, self.p_on)
    }

    /// Sets new gains and the proportional mode.
    ///
    /// Gains are supplied on a per-second basis; the integral and
    /// derivative gains are pre-scaled by the sample period here so that
    /// compute() needs no division. Under Reverse direction all three
    /// active gains are negated while the displayed gains stay as supplied.
    ///
    /// # Returns
    /// `true` when applied, `false` when any gain is negative or
    /// non-finite (state unchanged).
    pub fn set_tunings_with(
        &mut self,
        kp: f64,
        ki: f64,
        kd: f64,
        p_on: ProportionalOn,
    ) -> bool {
        let valid = |g: f64| g.is_finite() && g >= 0.0;
        if !valid(kp) || !valid(ki) || !valid(kd) {
            #[cfg(feature = "defmt")]
            defmt::warn!("PID: tunings rejected, gains must be finite and >= 0");
            return false;
        }

        self.p_on = p_on;

        self.disp_kp = kp;
        self.disp_ki = ki;
        self.disp_kd = kd;

        let sample_time_s = self.sample_time_ms as f64 / 1000.0;
        self.kp = kp;
        self.ki = ki * sample_time_s;
        self.kd = kd / sample_time_s;

        if self.direction == Direction::Reverse {
            self.kp = -self.kp;
            self.ki = -self.ki;
            self.kd = -self.kd;
        }
        true
    }

    /// Sets the period, in milliseconds, at which compute() accepts a cycle.
    ///
    /// The active integral and derivative gains are rescaled by the period
    /// ratio so the effective per-second action is preserved without
    /// resupplying the raw gains.
    ///
    /// # Returns
    /// `true` when applied, `false` for a zero period (state unchanged).
    pub fn set_sample_time(&mut self, new_sample_time_ms: u32) -> bool {
        if new_sample_time_ms == 0 {
            #[cfg(feature = "defmt")]
            defmt::warn!("PID: sample time 0 ms rejected");
            return false;
        }

        let ratio = new_sample_time_ms as f64 / self.sample_time_ms as f64;
        self.ki *= ratio;
        self.kd /= ratio;
        self.sample_time_ms = new_sample_time_ms;
        true
    }

    /// Sets the clamp bounds for the accumulator and the output.
    ///
    /// When the controller is in Automatic mode the live output cell and
    /// the accumulator are clamped into the new bounds immediately, so a
    /// stale out-of-range value cannot persist after narrowing the limits.
    ///
    /// # Returns
    /// `true` when applied, `false` when `min < max` does not hold (NaN
    /// bounds fail that comparison and are rejected too; state unchanged).
    pub fn set_output_limits(&mut self, min: f64, max: f64) -> bool {
        if !(min < max) {
            #[cfg(feature = "defmt")]
            defmt::warn!("PID: output limits rejected, min must be below max");
            return false;
        }

        self.out_min = min;
        self.out_max = max;

        if self.in_auto {
            self.output.set(clamp(self.output.get(), min, max));
            self.output_sum = clamp(self.output_sum, min, max);
        }
        true
    }

    /// Switches between Manual and Automatic mode.
    ///
    /// The Manual -> Automatic transition re-seeds the controller from the
    /// live cells (bumpless transfer); repeating the current mode is a
    /// no-op beyond the flag assignment.
    pub fn set_mode(&mut self, mode: Mode) {
        let new_auto = mode == Mode::Automatic;
        if new_auto && !self.in_auto {
            self.initialize();
            #[cfg(feature = "defmt")]
            defmt::debug!("PID: manual -> automatic");
        }
        self.in_auto = new_auto;
    }

    /// Seeds the accumulator from the live output and the remembered input
    /// from the live input, so the integrator resumes from the actuator's
    /// last real value instead of zero.
    fn initialize(&mut self) {
        self.output_sum = clamp(self.output.get(), self.out_min, self.out_max);
        self.last_input = self.input.get();
    }

    /// Sets the process sign convention.
    ///
    /// When the direction actually changes while in Automatic mode the
    /// three active gains are negated in place; the displayed gains are
    /// never touched. The new direction is stored unconditionally.
    pub fn set_direction(&mut self, direction: Direction) {
        if self.in_auto && direction != self.direction {
            self.kp = -self.kp;
            self.ki = -self.ki;
            self.kd = -self.kd;
            #[cfg(feature = "defmt")]
            defmt::debug!("PID: direction flipped while automatic");
        }
        self.direction = direction;
    }

    /// Getter for the proportional gain as supplied by the user
    pub fn kp(&self) -> f64 {
        self.disp_kp
    }

    /// Getter for the integral gain as supplied by the user
    pub fn ki(&self) -> f64 {
        self.disp_ki
    }

    /// Getter for the derivative gain as supplied by the user
    pub fn kd(&self) -> f64 {
        self.disp_kd
    }

    /// Getter for the current operating mode
    pub fn mode(&self) -> Mode {
        if self.in_auto {
            Mode::Automatic
        } else {
            Mode::Manual
        }
    }

    /// Getter for the current direction
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Getter for the current sample period in milliseconds
    pub fn sample_time_ms(&self) -> u32 {
        self.sample_time_ms
    }

    /// Getter for the current output clamp bounds as (min, max)
    pub fn output_limits(&self) -> (f64, f64) {
        (self.out_min, self.out_max)
    }
}

/// Clamp with explicit comparisons; a NaN value fails both comparisons and
/// passes through unchanged.
#[inline]
fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value > max {
        max
    } else if value < min {
        min
    } else {
        value
    }
}

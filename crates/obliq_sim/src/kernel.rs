//! The fixed-step, two-phase simulation engine: an algebraic pass in
//! topological order, followed by classical RK4 integration of every
//! stateful `transfer_function`'s continuous state.

use std::collections::HashMap;

use obliq_blocks::{step, CompiledExpr, Realization, Recorder, StepOutcome, Value};
use obliq_common::{Ident, InternalError, XResult};
use obliq_diagnostics::{codes, Diagnostic, DiagnosticSink};
use obliq_flatten::FlattenedModel;
use obliq_ir::{BlockId, BlockKind, PortAddr, SignalType};
use obliq_source::Span;

use crate::config::SimConfig;
use crate::error::SimError;
use crate::log::{Phase, PhaseExecutionLogEntry};
use crate::schedule::build_schedule;

/// Everything produced by a completed run.
pub struct SimResult {
    /// The simulation time reached when the run finished.
    pub simulation_time: f64,
    /// Every `output_port`'s final value, keyed by its declared port name.
    pub outputs: HashMap<Ident, Value>,
    /// Every `signal_display`/`signal_logger`'s recorded samples, keyed by
    /// the block's own name (`RecorderParams` carries no name of its own).
    pub recordings: HashMap<Ident, Vec<Value>>,
    /// Every block's execution, in order, across every step.
    pub phase_log: Vec<PhaseExecutionLogEntry>,
    /// Diagnostics accumulated during the run (algebraic-loop warnings,
    /// non-finite-derivative warnings, and the like).
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds a zero-valued placeholder of `shape`'s declared dimensions, used
/// where a value's real contents are never read, only its element count.
pub fn zero_value(shape: &SignalType) -> Value {
    match shape {
        SignalType::Scalar { .. } => Value::Scalar(0.0),
        SignalType::Vector { size, .. } => Value::Vector(vec![0.0; *size as usize]),
        SignalType::Matrix { rows, cols, .. } => {
            Value::Matrix { rows: *rows as usize, cols: *cols as usize, data: vec![0.0; (*rows * *cols) as usize] }
        }
    }
}

fn offset_state(
    base: &HashMap<BlockId, Vec<Vec<f64>>>,
    k: &HashMap<BlockId, Vec<Vec<f64>>>,
    scale: f64,
) -> HashMap<BlockId, Vec<Vec<f64>>> {
    base.iter()
        .map(|(id, elements)| {
            let k_elements = &k[id];
            let offset = elements
                .iter()
                .zip(k_elements.iter())
                .map(|(e, ke)| e.iter().zip(ke.iter()).map(|(x, d)| x + d * scale).collect())
                .collect();
            (*id, offset)
        })
        .collect()
}

fn combine_rk4(
    base: &HashMap<BlockId, Vec<Vec<f64>>>,
    k1: &HashMap<BlockId, Vec<Vec<f64>>>,
    k2: &HashMap<BlockId, Vec<Vec<f64>>>,
    k3: &HashMap<BlockId, Vec<Vec<f64>>>,
    k4: &HashMap<BlockId, Vec<Vec<f64>>>,
    dt: f64,
) -> HashMap<BlockId, Vec<Vec<f64>>> {
    base.iter()
        .map(|(id, elements)| {
            let updated = elements
                .iter()
                .enumerate()
                .map(|(e, x)| {
                    x.iter()
                        .enumerate()
                        .map(|(i, &xi)| {
                            xi + dt / 6.0 * (k1[id][e][i] + 2.0 * k2[id][e][i] + 2.0 * k3[id][e][i] + k4[id][e][i])
                        })
                        .collect()
                })
                .collect();
            (*id, updated)
        })
        .collect()
}

/// Runs a flattened model's fixed-step simulation.
pub struct SimKernel<'m> {
    flattened: &'m FlattenedModel,
    schedule: Vec<BlockId>,
    dt: f64,
    duration: f64,
    inputs: crate::config::ExternalInputs,
    state: HashMap<BlockId, Vec<Vec<f64>>>,
    outputs: HashMap<BlockId, Vec<Value>>,
    expressions: HashMap<BlockId, CompiledExpr>,
    recorders: HashMap<BlockId, Recorder>,
    external_outputs: HashMap<Ident, Value>,
    phase_log: Vec<PhaseExecutionLogEntry>,
    sink: DiagnosticSink,
    time: f64,
    steps_run: u64,
}

impl<'m> SimKernel<'m> {
    /// Builds a kernel for `flattened`, overriding its `global_settings`
    /// with anything set in `config`.
    pub fn new(flattened: &'m FlattenedModel, config: SimConfig) -> Result<Self, SimError> {
        let sheet = flattened.model.main();
        if sheet.blocks.is_empty() {
            return Err(SimError::EmptyModel);
        }

        let dt = config.time_step.unwrap_or(flattened.model.global_settings.simulation_time_step);
        if !(dt > 0.0) {
            return Err(SimError::NonPositiveTimeStep(dt));
        }
        let duration = config.duration.unwrap_or(flattened.model.global_settings.simulation_duration);
        if duration < 0.0 {
            return Err(SimError::NegativeDuration(duration));
        }

        let sink = DiagnosticSink::new();
        let schedule = build_schedule(sheet, &sink);

        let mut state = HashMap::new();
        let mut expressions = HashMap::new();
        let mut recorders = HashMap::new();
        for (block_id, block) in sheet.blocks.iter() {
            match &block.kind {
                BlockKind::TransferFunction(p) if p.order() >= 1 => {
                    let elements = p.signal_type.element_count();
                    state.insert(block_id, vec![vec![0.0; p.order()]; elements]);
                }
                BlockKind::Evaluate(p) => {
                    let compiled = CompiledExpr::compile(p).map_err(SimError::from)?;
                    expressions.insert(block_id, compiled);
                }
                BlockKind::SignalDisplay(p) | BlockKind::SignalLogger(p) => {
                    recorders.insert(block_id, Recorder::new(p.buffer));
                }
                _ => {}
            }
        }

        Ok(Self {
            flattened,
            schedule,
            dt,
            duration,
            inputs: config.inputs,
            state,
            outputs: HashMap::new(),
            expressions,
            recorders,
            external_outputs: HashMap::new(),
            phase_log: Vec::new(),
            sink,
            time: 0.0,
            steps_run: 0,
        })
    }

    fn gather_inputs(&self, block_id: BlockId, outputs: &HashMap<BlockId, Vec<Value>>) -> XResult<Vec<Value>> {
        let sheet = self.flattened.model.main();
        let block = sheet
            .block(block_id)
            .ok_or_else(|| InternalError::new("scheduled block missing from sheet"))?;
        let counts = obliq_ir::port_counts(&block.kind);
        let mut inputs = Vec::with_capacity(counts.inputs as usize);
        for index in 0..counts.inputs as i32 {
            let port = PortAddr::new(block_id, index);
            let wire = sheet
                .wires_into(port)
                .next()
                .ok_or_else(|| InternalError::new(format!("input port {port:?} has no driving wire")))?;
            let source_outputs = outputs
                .get(&wire.source_port.block)
                .ok_or_else(|| InternalError::new("driving block has not produced output yet"))?;
            let value = source_outputs
                .get(wire.source_port.index as usize)
                .ok_or_else(|| InternalError::new("driving port index out of range"))?;
            inputs.push(value.clone());
        }
        Ok(inputs)
    }

    fn evaluate_enable_chain(&self, block_id: BlockId, outputs: &HashMap<BlockId, Vec<Value>>) -> XResult<bool> {
        let Some(chain) = self.flattened.enable_chains.get(&block_id) else {
            return Ok(true);
        };
        for gate in chain {
            let produced = outputs
                .get(&gate.condition.block)
                .ok_or_else(|| InternalError::new("enable condition block has not produced output yet"))?;
            let value = produced
                .get(gate.condition.index as usize)
                .ok_or_else(|| InternalError::new("enable condition port index out of range"))?;
            if !value.is_truthy()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    fn algebraic_pass(
        &self,
        time: f64,
        state_override: Option<&HashMap<BlockId, Vec<Vec<f64>>>>,
        enabled_override: Option<&HashMap<BlockId, bool>>,
        force_enabled: bool,
        record_log: bool,
    ) -> XResult<(HashMap<BlockId, Vec<Value>>, HashMap<BlockId, bool>, Vec<PhaseExecutionLogEntry>, Vec<(BlockId, Value)>)>
    {
        let sheet = self.flattened.model.main();
        let mut outputs: HashMap<BlockId, Vec<Value>> = HashMap::with_capacity(self.schedule.len());
        let mut enabled: HashMap<BlockId, bool> = HashMap::with_capacity(self.schedule.len());
        let mut log = Vec::new();
        let mut recordings = Vec::new();

        for &block_id in &self.schedule {
            let block = sheet
                .block(block_id)
                .ok_or_else(|| InternalError::new("scheduled block missing from sheet"))?;

            let is_enabled = if force_enabled {
                true
            } else if let Some(value) = enabled_override.and_then(|m| m.get(&block_id)) {
                *value
            } else {
                self.evaluate_enable_chain(block_id, &outputs)?
            };
            enabled.insert(block_id, is_enabled);

            if !is_enabled {
                if let Some(held) = self.outputs.get(&block_id) {
                    outputs.insert(block_id, held.clone());
                }
                continue;
            }

            if record_log {
                log.push(PhaseExecutionLogEntry::new(Phase::Algebraic, time, block_id));
            }

            match &block.kind {
                BlockKind::InputPort(p) => {
                    // Flattening rewrites a subsystem's exterior input wire to
                    // terminate directly at its interior `input_port` block
                    // (§4.3: "inside a subsystem they are replaced ... by
                    // through-wires"). Only a top-level `input_port` with no
                    // driving wire actually samples the external record.
                    let value = match sheet.wires_into(PortAddr::new(block_id, 0)).next() {
                        Some(wire) => {
                            let source_outputs = outputs.get(&wire.source_port.block).ok_or_else(|| {
                                InternalError::new("driving block has not produced output yet")
                            })?;
                            source_outputs
                                .get(wire.source_port.index as usize)
                                .cloned()
                                .ok_or_else(|| InternalError::new("driving port index out of range"))?
                        }
                        None => self.inputs.sample(p.port_name, time),
                    };
                    outputs.insert(block_id, vec![value]);
                }
                BlockKind::TransferFunction(p) if p.order() >= 1 => {
                    let placeholder = zero_value(&p.signal_type);
                    let states = state_override.unwrap_or(&self.state).get(&block_id).ok_or_else(|| {
                        InternalError::new("stateful transfer_function missing its continuous state")
                    })?;
                    let outcome = step(&block.kind, &[placeholder], time, None, Some(states.as_slice()))?;
                    outputs.insert(block_id, single_to_vec(outcome)?);
                }
                BlockKind::SignalDisplay(_) | BlockKind::SignalLogger(_) => {
                    let inputs = self.gather_inputs(block_id, &outputs)?;
                    if record_log {
                        if let Some(sample) = inputs.first() {
                            recordings.push((block_id, sample.clone()));
                        }
                    }
                    outputs.insert(block_id, Vec::new());
                }
                _ => {
                    let inputs = self.gather_inputs(block_id, &outputs)?;
                    let expr = self.expressions.get(&block_id);
                    let outcome = step(&block.kind, &inputs, time, expr, None)?;
                    outputs.insert(block_id, single_to_vec(outcome)?);
                }
            }
        }

        Ok((outputs, enabled, log, recordings))
    }

    fn derivative_all(
        &self,
        trial_states: &HashMap<BlockId, Vec<Vec<f64>>>,
        time: f64,
        enabled: &HashMap<BlockId, bool>,
    ) -> XResult<Option<HashMap<BlockId, Vec<Vec<f64>>>>> {
        let (outputs, _, _, _) = self.algebraic_pass(time, Some(trial_states), Some(enabled), false, false)?;
        let sheet = self.flattened.model.main();

        let mut derivatives = HashMap::with_capacity(trial_states.len());
        for (&block_id, elements) in trial_states {
            if !enabled.get(&block_id).copied().unwrap_or(false) {
                derivatives.insert(block_id, elements.iter().map(|e| vec![0.0; e.len()]).collect());
                continue;
            }
            let block = sheet
                .block(block_id)
                .ok_or_else(|| InternalError::new("stateful block missing from sheet"))?;
            let BlockKind::TransferFunction(p) = &block.kind else {
                return Err(InternalError::new("non-transfer_function block found in continuous state"));
            };
            let realization = Realization::new(p)?;
            let inputs = self.gather_inputs(block_id, &outputs)?;
            let driver = inputs.first().ok_or_else(|| InternalError::new("stateful transfer_function has no input"))?;
            let driver_elements = driver.elements();
            if driver_elements.len() != elements.len() {
                return Err(InternalError::new("transfer_function: state/input element count mismatch"));
            }

            let mut per_element = Vec::with_capacity(elements.len());
            for (element_state, &u) in elements.iter().zip(driver_elements.iter()) {
                let dx = realization.derivative(element_state, u);
                for &d in &dx {
                    if !d.is_finite() || d.abs() > 1e10 {
                        return Ok(None);
                    }
                }
                per_element.push(dx);
            }
            derivatives.insert(block_id, per_element);
        }
        Ok(Some(derivatives))
    }

    fn integration_phase(&mut self, enabled: &HashMap<BlockId, bool>) -> XResult<Vec<BlockId>> {
        let active: HashMap<BlockId, Vec<Vec<f64>>> = self
            .state
            .iter()
            .filter(|(id, _)| enabled.get(id).copied().unwrap_or(false))
            .map(|(id, s)| (*id, s.clone()))
            .collect();
        if active.is_empty() {
            return Ok(Vec::new());
        }

        let t = self.time;
        let dt = self.dt;

        let k1 = match self.derivative_all(&active, t, enabled)? {
            Some(k) => k,
            None => return self.abort_integration(),
        };
        let mid_state = offset_state(&active, &k1, dt / 2.0);
        let k2 = match self.derivative_all(&mid_state, t + dt / 2.0, enabled)? {
            Some(k) => k,
            None => return self.abort_integration(),
        };
        let mid_state2 = offset_state(&active, &k2, dt / 2.0);
        let k3 = match self.derivative_all(&mid_state2, t + dt / 2.0, enabled)? {
            Some(k) => k,
            None => return self.abort_integration(),
        };
        let end_state = offset_state(&active, &k3, dt);
        let k4 = match self.derivative_all(&end_state, t + dt, enabled)? {
            Some(k) => k,
            None => return self.abort_integration(),
        };

        let updated = combine_rk4(&active, &k1, &k2, &k3, &k4, dt);
        let integrated: Vec<BlockId> = updated.keys().copied().collect();
        for (id, new_state) in updated {
            self.state.insert(id, new_state);
        }
        Ok(integrated)
    }

    fn abort_integration(&self) -> XResult<Vec<BlockId>> {
        self.sink.emit(Diagnostic::warning(
            codes::NON_FINITE_DERIVATIVE,
            "a stateful transfer_function's derivative diverged this step; its state was held",
            Span::DUMMY,
        ));
        Ok(Vec::new())
    }

    /// Advances the simulation by one `dt`.
    pub fn step(&mut self) -> Result<(), SimError> {
        let force_enabled = self.steps_run == 0;
        let (outputs, enabled, mut log, recordings) =
            self.algebraic_pass(self.time, None, None, force_enabled, true).map_err(SimError::from)?;

        for (block_id, sample) in recordings {
            if let Some(recorder) = self.recorders.get_mut(&block_id) {
                recorder.record(sample);
            }
        }

        let sheet = self.flattened.model.main();
        for (&block_id, block_outputs) in &outputs {
            if let Some(block) = sheet.block(block_id) {
                if let BlockKind::OutputPort(p) = &block.kind {
                    if let Some(value) = block_outputs.first() {
                        self.external_outputs.insert(p.port_name, value.clone());
                    }
                }
            }
        }

        self.outputs = outputs;
        self.phase_log.append(&mut log);

        let integrated = self.integration_phase(&enabled).map_err(SimError::from)?;
        for block_id in integrated {
            self.phase_log.push(PhaseExecutionLogEntry::new(Phase::Integration, self.time, block_id));
        }

        self.time += self.dt;
        self.steps_run += 1;
        Ok(())
    }

    /// Runs every step for the configured duration.
    pub fn run(&mut self) -> Result<(), SimError> {
        let total_steps = (self.duration / self.dt).floor() as u64;
        for _ in 0..total_steps {
            self.step()?;
        }
        Ok(())
    }

    /// Consumes the kernel, producing the run's final result.
    pub fn finish(self) -> SimResult {
        let recordings = self
            .recorders
            .into_iter()
            .map(|(block_id, recorder)| {
                let name = self.flattened.model.main().block(block_id).map(|b| b.name).unwrap_or(Ident::from_raw(0));
                (name, recorder.samples().cloned().collect())
            })
            .collect();

        SimResult {
            simulation_time: self.time,
            outputs: self.external_outputs,
            recordings,
            phase_log: self.phase_log,
            diagnostics: self.sink.take_all(),
        }
    }
}

fn single_to_vec(outcome: StepOutcome) -> XResult<Vec<Value>> {
    match outcome {
        StepOutcome::Single(v) => Ok(vec![v]),
        StepOutcome::Multi(vs) => Ok(vs),
        StepOutcome::None => Ok(Vec::new()),
    }
}

//! Effect reflection and parameter model.
//!
//! Backends compile effect bytecode and describe the result as an
//! [`EffectData`]: named techniques made of ordered passes, plus the
//! effect's float parameters. Clones of an effect share the compiled program
//! but own their parameter values.

use crate::error::{GraphicsError, GraphicsResult};
use crate::state::RenderStateChange;

/// One rendering stage of a technique.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectPass {
    pub name: String,
    /// State the pass sets when applied.
    pub state_changes: Vec<RenderStateChange>,
    /// Fragment sampler slots the pass overrides.
    pub sampler_slots: Vec<u32>,
}

impl EffectPass {
    /// A pass that changes no fixed-function state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state_changes: Vec::new(),
            sampler_slots: Vec::new(),
        }
    }

    pub fn with_state_change(mut self, change: RenderStateChange) -> Self {
        self.state_changes.push(change);
        self
    }

    pub fn with_sampler_slot(mut self, slot: u32) -> Self {
        self.sampler_slots.push(slot);
        self
    }
}

/// An alternative implementation of an effect.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectTechnique {
    pub name: String,
    pub passes: Vec<EffectPass>,
}

/// A float parameter (scalar, vector or matrix, flattened).
#[derive(Debug, Clone, PartialEq)]
pub struct EffectParameter {
    pub name: String,
    pub values: Vec<f32>,
}

/// Reflection data and parameter values of an effect.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EffectData {
    pub techniques: Vec<EffectTechnique>,
    pub parameters: Vec<EffectParameter>,
}

impl EffectData {
    /// Look up a technique index by name.
    pub fn technique_index(&self, name: &str) -> Option<usize> {
        self.techniques.iter().position(|t| t.name == name)
    }

    /// Look up a pass, failing with `OutOfRange` for a bad index.
    pub fn pass(&self, technique: usize, pass: usize) -> GraphicsResult<&EffectPass> {
        let tech = self.techniques.get(technique).ok_or_else(|| {
            GraphicsError::OutOfRange(format!(
                "technique {} (effect has {})",
                technique,
                self.techniques.len()
            ))
        })?;
        tech.passes.get(pass).ok_or_else(|| {
            GraphicsError::OutOfRange(format!(
                "pass {} of technique '{}' (has {})",
                pass,
                tech.name,
                tech.passes.len()
            ))
        })
    }

    pub fn parameter(&self, name: &str) -> Option<&EffectParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Overwrite the leading values of parameter `name`.
    pub fn set_parameter(&mut self, name: &str, values: &[f32]) -> GraphicsResult<()> {
        let param = self
            .parameters
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| {
                GraphicsError::PreconditionViolation(format!("unknown effect parameter '{name}'"))
            })?;
        if values.len() > param.values.len() {
            return Err(GraphicsError::OutOfRange(format!(
                "{} values for parameter '{}' of {} floats",
                values.len(),
                name,
                param.values.len()
            )));
        }
        param.values[..values.len()].copy_from_slice(values);
        Ok(())
    }
}

/// State an effect application touched, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EffectStateChanges {
    pub render_state_changes: Vec<RenderStateChange>,
    pub sampler_slots: Vec<u32>,
}

impl EffectStateChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.render_state_changes.clear();
        self.sampler_slots.clear();
    }

    /// Replace the contents with what `pass` sets.
    pub fn record(&mut self, pass: &EffectPass) {
        self.clear();
        self.render_state_changes
            .extend_from_slice(&pass.state_changes);
        self.sampler_slots.extend_from_slice(&pass.sampler_slots);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CullMode;

    fn data() -> EffectData {
        EffectData {
            techniques: vec![EffectTechnique {
                name: "Main".into(),
                passes: vec![
                    EffectPass::new("P0"),
                    EffectPass::new("P1")
                        .with_state_change(RenderStateChange::CullMode(CullMode::None)),
                ],
            }],
            parameters: vec![EffectParameter {
                name: "Tint".into(),
                values: vec![1.0; 4],
            }],
        }
    }

    #[test]
    fn test_pass_lookup() {
        let data = data();
        assert_eq!(data.technique_index("Main"), Some(0));
        assert_eq!(data.pass(0, 1).unwrap().name, "P1");
        assert!(matches!(data.pass(0, 2), Err(GraphicsError::OutOfRange(_))));
        assert!(data.pass(1, 0).is_err());
    }

    #[test]
    fn test_set_parameter() {
        let mut data = data();
        data.set_parameter("Tint", &[0.5, 0.25]).unwrap();
        assert_eq!(data.parameter("Tint").unwrap().values, vec![0.5, 0.25, 1.0, 1.0]);
        assert!(data.set_parameter("Tint", &[0.0; 5]).is_err());
        assert!(data.set_parameter("Missing", &[0.0]).is_err());
    }

    #[test]
    fn test_record_state_changes() {
        let data = data();
        let mut changes = EffectStateChanges::new();
        changes.record(data.pass(0, 1).unwrap());
        assert_eq!(changes.render_state_changes.len(), 1);
        changes.record(data.pass(0, 0).unwrap());
        assert!(changes.render_state_changes.is_empty());
    }
}

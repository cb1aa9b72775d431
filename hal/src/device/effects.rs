//! Effect creation, application and pass-restore.

use crate::effect::{EffectData, EffectStateChanges};
use crate::error::{GraphicsError, GraphicsResult};
use crate::handle::EffectHandle;
use crate::registry::EffectRecord;
use crate::state::SamplerSlot;

use super::Device;

impl Device {
    /// Compile `bytecode` into an effect.
    pub fn create_effect(&mut self, bytecode: &[u8]) -> GraphicsResult<EffectHandle> {
        let (raw, data) = self.backend.create_effect(bytecode)?;
        let techniques = data.techniques.len();
        let handle = self.registry.effects.insert(EffectRecord::new(raw, data));
        log::trace!(
            "Device: created effect {:?} ({} bytes, {} techniques)",
            handle,
            bytecode.len(),
            techniques
        );
        Ok(handle)
    }

    /// Clone an effect. The clone shares the compiled program and starts
    /// with a copy of the parameter values.
    pub fn clone_effect(&mut self, effect: EffectHandle) -> GraphicsResult<EffectHandle> {
        let clone = self.registry.effects.get(effect)?.share();
        let handle = self.registry.effects.insert(clone);
        log::trace!("Device: cloned effect {:?} into {:?}", effect, handle);
        Ok(handle)
    }

    /// Reflection data and current parameter values of an effect.
    pub fn effect_data(&self, effect: EffectHandle) -> GraphicsResult<&EffectData> {
        Ok(&self.registry.effects.get(effect)?.data)
    }

    /// Overwrite the leading values of a float parameter.
    pub fn set_effect_parameter(
        &mut self,
        effect: EffectHandle,
        name: &str,
        values: &[f32],
    ) -> GraphicsResult<()> {
        self.registry
            .effects
            .get_mut(effect)?
            .data
            .set_parameter(name, values)
    }

    /// Bind pass `pass` of technique `technique`.
    ///
    /// The pass's fixed-function state goes straight to the backend and the
    /// cache forgets what it knew about the touched categories and sampler
    /// slots. `changes` receives what the pass set.
    pub fn apply_effect(
        &mut self,
        effect: EffectHandle,
        technique: usize,
        pass: usize,
        changes: &mut EffectStateChanges,
    ) -> GraphicsResult<()> {
        let record = self.registry.effects.get(effect)?;
        let pass_desc = record.data.pass(technique, pass)?;
        self.backend
            .apply_effect(record.program.raw, technique, pass, &record.data)?;
        changes.record(pass_desc);

        if !changes.render_state_changes.is_empty() {
            self.backend.apply_render_state(&changes.render_state_changes);
        }
        for change in &changes.render_state_changes {
            self.state.invalidate(change.category());
        }
        for &slot in &changes.sampler_slots {
            self.state.invalidate_sampler(SamplerSlot::Pixel(slot));
        }
        self.registry.effects.touch(effect, self.serial);
        log::trace!(
            "Device: applied effect {:?} technique {} pass {} ({} state changes)",
            effect,
            technique,
            pass,
            changes.render_state_changes.len()
        );
        Ok(())
    }

    /// Save the current render state before applying passes of `effect`.
    ///
    /// Every call must be matched by [`Device::end_pass_restore`] on the same
    /// effect; calls nest and must close innermost first.
    pub fn begin_pass_restore(
        &mut self,
        effect: EffectHandle,
        changes: &mut EffectStateChanges,
    ) -> GraphicsResult<()> {
        self.registry.effects.get(effect)?;
        changes.clear();
        self.state.push_snapshot(effect);
        log::trace!(
            "Device: begin pass restore on {:?} (depth {})",
            effect,
            self.state.snapshot_depth()
        );
        Ok(())
    }

    /// Restore the render state saved by the matching
    /// [`Device::begin_pass_restore`], re-applying only what differs.
    ///
    /// # Errors
    ///
    /// `PreconditionViolation` unless the innermost open pass restore was
    /// begun on `effect`.
    pub fn end_pass_restore(&mut self, effect: EffectHandle) -> GraphicsResult<()> {
        self.registry.effects.get(effect)?;
        match self.state.snapshot_owner() {
            Some(owner) if owner == effect => {}
            Some(owner) => {
                return Err(GraphicsError::PreconditionViolation(format!(
                    "end_pass_restore on {effect:?} while {owner:?} is innermost"
                )));
            }
            None => {
                return Err(GraphicsError::PreconditionViolation(format!(
                    "end_pass_restore on {effect:?} without a matching begin"
                )));
            }
        }

        let samplers = self.state.pop_snapshot(&mut self.changes).ok_or_else(|| {
            GraphicsError::PreconditionViolation("pass restore stack is empty".into())
        })?;
        self.apply_changes();
        for (slot, binding) in samplers {
            let raw = binding
                .texture
                .and_then(|t| self.registry.textures.get(t).ok())
                .map(|r| r.raw);
            self.backend.set_sampler(slot, raw, &binding.state);
        }
        Ok(())
    }
}

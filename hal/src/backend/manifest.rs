//! Effect manifests understood by the dummy backend.
//!
//! The dummy backend cannot compile shader bytecode, so it treats effect
//! bytes as an optional UTF-8 manifest describing the reflection data:
//!
//! ```text
//! # comment
//! technique Main
//! pass P0 cull=none fill=wireframe depth_write=off scissor=on sampler=0
//! param Tint 4
//! ```
//!
//! Bytes that are not UTF-8, or text without any `technique` line, produce a
//! single `Default` technique with one pass.

use crate::effect::{EffectData, EffectParameter, EffectPass, EffectTechnique};
use crate::state::RenderStateChange;
use crate::types::{CullMode, FillMode};

use super::{BackendError, BackendResult};

fn fallback(parameters: Vec<EffectParameter>) -> EffectData {
    EffectData {
        techniques: vec![EffectTechnique {
            name: "Default".into(),
            passes: vec![EffectPass::new("P0")],
        }],
        parameters,
    }
}

fn invalid(line: usize, message: impl std::fmt::Display) -> BackendError {
    BackendError::ResourceCreationFailed(format!("effect manifest line {}: {}", line + 1, message))
}

fn parse_pass_token(pass: &mut EffectPass, token: &str, line: usize) -> BackendResult<()> {
    let (key, value) = token
        .split_once('=')
        .ok_or_else(|| invalid(line, format!("expected key=value, got '{token}'")))?;
    let on_off = |v: &str| match v {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(invalid(line, format!("expected on/off, got '{other}'"))),
    };
    match key {
        "cull" => {
            let mode = match value {
                "none" => CullMode::None,
                "cw" => CullMode::CullClockwiseFace,
                "ccw" => CullMode::CullCounterClockwiseFace,
                other => return Err(invalid(line, format!("unknown cull mode '{other}'"))),
            };
            pass.state_changes.push(RenderStateChange::CullMode(mode));
        }
        "fill" => {
            let mode = match value {
                "solid" => FillMode::Solid,
                "wireframe" => FillMode::Wireframe,
                other => return Err(invalid(line, format!("unknown fill mode '{other}'"))),
            };
            pass.state_changes.push(RenderStateChange::FillMode(mode));
        }
        "depth_write" => pass
            .state_changes
            .push(RenderStateChange::DepthWrite(on_off(value)?)),
        "scissor" => pass
            .state_changes
            .push(RenderStateChange::ScissorTest(on_off(value)?)),
        "sampler" => {
            let slot = value
                .parse()
                .map_err(|_| invalid(line, format!("bad sampler slot '{value}'")))?;
            pass.sampler_slots.push(slot);
        }
        other => return Err(invalid(line, format!("unknown pass state '{other}'"))),
    }
    Ok(())
}

/// Parse effect bytes into reflection data.
pub(crate) fn parse(bytecode: &[u8]) -> BackendResult<EffectData> {
    let Ok(text) = std::str::from_utf8(bytecode) else {
        return Ok(fallback(Vec::new()));
    };

    let mut techniques: Vec<EffectTechnique> = Vec::new();
    let mut parameters = Vec::new();
    for (line, raw) in text.lines().enumerate() {
        let content = raw.split('#').next().unwrap_or("").trim();
        let mut tokens = content.split_whitespace();
        let Some(directive) = tokens.next() else {
            continue;
        };
        match directive {
            "technique" => {
                let name = tokens
                    .next()
                    .ok_or_else(|| invalid(line, "technique needs a name"))?;
                techniques.push(EffectTechnique {
                    name: name.to_string(),
                    passes: Vec::new(),
                });
            }
            "pass" => {
                let name = tokens.next().ok_or_else(|| invalid(line, "pass needs a name"))?;
                let mut pass = EffectPass::new(name);
                for token in tokens {
                    parse_pass_token(&mut pass, token, line)?;
                }
                let technique = techniques
                    .last_mut()
                    .ok_or_else(|| invalid(line, "pass before any technique"))?;
                technique.passes.push(pass);
            }
            "param" => {
                let name = tokens.next().ok_or_else(|| invalid(line, "param needs a name"))?;
                let count: usize = tokens
                    .next()
                    .and_then(|c| c.parse().ok())
                    .ok_or_else(|| invalid(line, "param needs a float count"))?;
                parameters.push(EffectParameter {
                    name: name.to_string(),
                    values: vec![0.0; count],
                });
            }
            other => return Err(invalid(line, format!("unknown directive '{other}'"))),
        }
    }

    if techniques.is_empty() {
        return Ok(fallback(parameters));
    }
    if let Some(empty) = techniques.iter().find(|t| t.passes.is_empty()) {
        return Err(BackendError::ResourceCreationFailed(format!(
            "technique '{}' has no passes",
            empty.name
        )));
    }
    Ok(EffectData {
        techniques,
        parameters,
    })
}

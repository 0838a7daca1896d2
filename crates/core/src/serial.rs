//! Versioned binary form of a procedure.
//!
//! A stream is a `u32` format version followed by the module list
//! (registry tag, editor position, bincode-encoded parameter map, empty for
//! kinds without parameters) and the link list. Sinks are not stored: a
//! stream is always loaded against sinks supplied by the host, and a link
//! into sink `n` is written with target module `-(n + 1)`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::modules_builtin::builtin_kind_from_name;
use crate::params::{NodeParams, ParamError};
use crate::procedure::{apply_params, GraphError, Link, LinkTarget, OutputModule, Procedure};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SerialError {
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),
    #[error("unknown module kind '{0}'")]
    UnknownModule(String),
    #[error("malformed stream: {0}")]
    Decode(#[from] bincode::Error),
    #[error("module {index} ({kind}): {source}")]
    Param {
        index: usize,
        kind: String,
        #[source]
        source: ParamError,
    },
    #[error("bad link: {0}")]
    Link(#[from] GraphError),
    #[error("stream wires a feedback loop")]
    Feedback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SerialModule {
    kind: String,
    position: [i32; 2],
    params: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct SerialLink {
    from_module: u32,
    from_output: u32,
    /// Module index, or `-(sink + 1)` for a sink.
    to_module: i32,
    to_input: u32,
}

impl SerialLink {
    fn from_link(link: Link) -> Self {
        let (to_module, to_input) = match link.to {
            LinkTarget::Input { module, input } => (module as i32, input as u32),
            LinkTarget::Output(sink) => (-(sink as i32) - 1, 0),
        };
        Self {
            from_module: link.from.module as u32,
            from_output: link.from.output as u32,
            to_module,
            to_input,
        }
    }

    fn to_link(self) -> Link {
        let (from_module, from_output) = (self.from_module as usize, self.from_output as usize);
        if self.to_module < 0 {
            let sink = (-(i64::from(self.to_module)) - 1) as usize;
            Link::to_output(from_module, from_output, sink)
        } else {
            Link::to_input(
                from_module,
                from_output,
                self.to_module as usize,
                self.to_input as usize,
            )
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SerialBody {
    modules: Vec<SerialModule>,
    links: Vec<SerialLink>,
}

impl SerialBody {
    fn encode(&self) -> Result<Vec<u8>, SerialError> {
        let mut bytes = bincode::serialize(&FORMAT_VERSION)?;
        bincode::serialize_into(&mut bytes, self)?;
        Ok(bytes)
    }
}

impl Procedure {
    /// Encodes modules, their parameters and positions, and every link.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerialError> {
        let mut body = SerialBody::default();
        for slot in self.slots() {
            let params = slot.module().params();
            let params = if params.is_empty() {
                Vec::new()
            } else {
                bincode::serialize(&params)?
            };
            body.modules.push(SerialModule {
                kind: slot.module().kind().name().to_string(),
                position: slot.position(),
                params,
            });
        }
        body.links = self.links().map(SerialLink::from_link).collect();
        body.encode()
    }

    /// Builds a procedure with the given sinks from a stream.
    pub fn from_bytes(outputs: Vec<OutputModule>, bytes: &[u8]) -> Result<Procedure, SerialError> {
        let mut reader = bytes;
        let version: u32 = bincode::deserialize_from(&mut reader)?;
        if version != FORMAT_VERSION {
            return Err(SerialError::UnsupportedVersion(version));
        }
        let body: SerialBody = bincode::deserialize_from(&mut reader)?;

        let mut procedure = Procedure::new(outputs);
        for (index, entry) in body.modules.into_iter().enumerate() {
            let kind = builtin_kind_from_name(&entry.kind)
                .ok_or_else(|| SerialError::UnknownModule(entry.kind.clone()))?;
            let mut module = kind.create();
            if !entry.params.is_empty() {
                let params: NodeParams = bincode::deserialize(&entry.params)?;
                apply_params(module.as_mut(), params).map_err(|source| SerialError::Param {
                    index,
                    kind: entry.kind.clone(),
                    source,
                })?;
            }
            procedure.add_module(module, entry.position);
        }
        for link in &body.links {
            procedure.connect_unchecked(link.to_link())?;
        }
        if procedure.check_feedback() {
            return Err(SerialError::Feedback);
        }
        tracing::debug!(
            "loaded procedure: {} modules, {} links",
            procedure.module_count(),
            body.links.len()
        );
        Ok(procedure)
    }

    /// Replaces this procedure's modules and links with a stream's, keeping
    /// the sinks. On error the procedure is left untouched.
    pub fn read_bytes(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        let outputs = self.outputs().iter().map(OutputModule::unlinked).collect();
        let loaded = Procedure::from_bytes(outputs, bytes)?;
        *self = loaded;
        Ok(())
    }
}

//! JSON-lines export: one serialized model per line.

use serde::Serialize;

use super::{Sink, Writer};
use crate::error::OutputError;

pub struct JsonLinesSink {
    writer: Box<dyn Writer>,
}

impl JsonLinesSink {
    pub fn new(writer: impl Writer + 'static) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }
}

impl<M: Serialize> Sink<M> for JsonLinesSink {
    fn deliver(&mut self, model: &M) -> Result<(), OutputError> {
        let mut line = serde_json::to_vec(model)?;
        line.push(b'\n');
        self.writer.write(&line)
    }
}

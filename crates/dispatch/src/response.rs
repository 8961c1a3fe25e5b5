use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use session::{PageInstance, Session};
use shared::error::DispatchError;

use crate::{context::RequestContext, registry::ResultMapping};

#[derive(Debug, Default)]
pub struct ResponseWriter {
    buffer: String,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, text: &str) -> &mut Self {
        self.buffer.push_str(text);
        self
    }

    pub fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self, DispatchError> {
        let text = serde_json::to_string(value)
            .map_err(|err| DispatchError::Generation(format!("json encoding failed: {err}")))?;
        self.buffer.push_str(&text);
        Ok(self)
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Reusable response writers. A writer goes back to the pool when its guard drops.
#[derive(Debug, Clone)]
pub struct WriterPool {
    idle: Arc<Mutex<Vec<ResponseWriter>>>,
    capacity: usize,
}

impl WriterPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            idle: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn acquire(&self) -> PooledWriter {
        let writer = self.idle.lock().pop().unwrap_or_default();
        PooledWriter {
            writer,
            pool: self.clone(),
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    fn restore(&self, mut writer: ResponseWriter) {
        writer.clear();
        let mut idle = self.idle.lock();
        if idle.len() < self.capacity {
            idle.push(writer);
        }
    }
}

pub struct PooledWriter {
    writer: ResponseWriter,
    pool: WriterPool,
}

impl Deref for PooledWriter {
    type Target = ResponseWriter;

    fn deref(&self) -> &Self::Target {
        &self.writer
    }
}

impl DerefMut for PooledWriter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.writer
    }
}

impl Drop for PooledWriter {
    fn drop(&mut self) {
        let writer = std::mem::take(&mut self.writer);
        self.pool.restore(writer);
    }
}

/// What a response generator may look at while writing.
pub struct GenerateContext<'a> {
    pub page: &'a PageInstance,
    pub request: &'a mut RequestContext,
    pub session: &'a Session,
}

pub trait ResponseGenerator: Send + Sync {
    fn name(&self) -> &str;

    fn generate(
        &self,
        writer: &mut ResponseWriter,
        ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError>;
}

/// Writes every generator of `mapping` once, in declared order. Data-exchange
/// output is wrapped in the `jsonResp` envelope; markup is concatenated.
pub fn assemble(
    writer: &mut ResponseWriter,
    mapping: &ResultMapping,
    ctx: &mut GenerateContext<'_>,
) -> Result<(), DispatchError> {
    if !mapping.content_kind().is_data_exchange() {
        for generator in mapping.generators() {
            generator.generate(writer, ctx)?;
        }
        return Ok(());
    }

    writer.write("{\"jsonResp\":[");
    for (position, generator) in mapping.generators().iter().enumerate() {
        if position > 0 {
            writer.write(",");
        }
        generator.generate(writer, ctx)?;
    }
    writer.write("]");

    let always_push = ctx.page.components().always_push_closure();
    if !always_push.is_empty() {
        writer.write(",\"allPush\":");
        writer.write_json(&always_push)?;
    }
    if let Some(view) = ctx.request.remote_viewer() {
        writer.write(",\"remoteView\":");
        writer.write_json(&json!({ "view": view }))?;
    }
    if ctx.request.is_scroll_reset() {
        writer.write(",\"scrollReset\":true");
    }
    writer.write("}");
    Ok(())
}

#[cfg(test)]
#[path = "tests/response_tests.rs"]
mod tests;

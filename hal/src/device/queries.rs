//! Occlusion queries.

use crate::error::GraphicsResult;
use crate::handle::QueryHandle;
use crate::query::OcclusionQuery;
use crate::registry::QueryRecord;

use super::Device;

impl Device {
    pub fn create_query(&mut self) -> GraphicsResult<QueryHandle> {
        let raw = self.backend.create_query()?;
        let handle = self.registry.queries.insert(QueryRecord {
            raw,
            query: OcclusionQuery::new(),
        });
        log::trace!("Device: created query {:?}", handle);
        Ok(handle)
    }

    /// Start counting samples that pass depth and stencil testing.
    ///
    /// # Errors
    ///
    /// `PreconditionViolation` if the query is already pending.
    pub fn query_begin(&mut self, query: QueryHandle) -> GraphicsResult<()> {
        let record = self.registry.queries.get_mut(query)?;
        record.query.begin()?;
        let raw = record.raw;
        self.backend.query_begin(raw);
        self.registry.queries.touch(query, self.serial);
        Ok(())
    }

    /// Stop counting.
    ///
    /// # Errors
    ///
    /// `PreconditionViolation` unless the query is pending.
    pub fn query_end(&mut self, query: QueryHandle) -> GraphicsResult<()> {
        let record = self.registry.queries.get_mut(query)?;
        record.query.end()?;
        let raw = record.raw;
        self.backend.query_end(raw);
        self.registry.queries.touch(query, self.serial);
        Ok(())
    }

    /// Poll whether the query's result is available. Never blocks.
    pub fn query_complete(&mut self, query: QueryHandle) -> GraphicsResult<bool> {
        let record = self.registry.queries.get_mut(query)?;
        let result = if record.query.awaiting_result() {
            self.backend.query_result(record.raw)
        } else {
            None
        };
        Ok(record.query.observe(result))
    }

    /// Samples counted by a completed query.
    ///
    /// # Errors
    ///
    /// `PreconditionViolation` unless [`Device::query_complete`] has returned
    /// true since the last begin.
    pub fn query_pixel_count(&self, query: QueryHandle) -> GraphicsResult<u64> {
        self.registry.queries.get(query)?.query.pixel_count()
    }
}

use dbforge_engine::Engine;

/// Closes the engine's connections when an operation ends.
///
/// The normal path awaits [`ConnectionGuard::close`]. If the operation future
/// is dropped first, `Drop` releases the connections synchronously.
pub(crate) struct ConnectionGuard<'a> {
    engine: &'a dyn Engine,
    armed: bool,
}

impl<'a> ConnectionGuard<'a> {
    pub(crate) fn new(engine: &'a dyn Engine) -> Self {
        Self {
            engine,
            armed: true,
        }
    }

    pub(crate) async fn close(mut self) {
        self.engine.close().await;
        self.armed = false;
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.engine.release();
            tracing::debug!(event = "connection_released_on_drop", engine = self.engine.engine());
        }
    }
}

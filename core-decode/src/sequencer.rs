//! # Lifecycle Sequencer
//!
//! Builds a [`Pipeline`] in a fixed order, short-circuiting on the first
//! failure:
//!
//! 1. Validate the source path
//! 2. Run the media kind's pre-check
//! 3. Open the sample source and read its format
//! 4. Derive duration and end position; read kind parameters
//! 5. Construct the renderer
//! 6. Create and configure the engine (a recoverable failure defers
//!    configuration to the worker)
//! 7. Start the engine and capture its buffer pools
//!
//! A failure is reported once through [`StateListener::on_error`] and returned.
//! Resources acquired before the failing step are released; no worker thread
//! is started.

use crate::config::{PipelineConfig, PipelineId};
use crate::error::InitError;
use crate::kind::MediaKind;
use crate::listener::StateListener;
use crate::pipeline::{Pipeline, WorkerParts};
use crate::pump::BufferPump;
use bridge_traits::{DecodingEngine, FormatDescriptor, Renderer, SampleSource};
use core_runtime::config::CoreConfig;
use core_runtime::logging::strip_path;
use std::sync::Arc;
use tracing::{debug, debug_span, error, info, warn};

/// Initialize a pipeline decoding `config.path` with the given media kind.
///
/// # Errors
///
/// Returns the [`InitError`] of the first failing step after notifying
/// `listener.on_error` exactly once.
pub fn initialize<K>(
    config: PipelineConfig,
    kind: K,
    core: &CoreConfig,
    listener: Arc<dyn StateListener>,
) -> Result<Pipeline, InitError>
where
    K: MediaKind + 'static,
{
    let id = PipelineId::new();
    let span = debug_span!(
        "initialize",
        pipeline_id = %id,
        file = %strip_path(&config.path),
        track = kind.track_kind().as_str()
    );
    let _entered = span.enter();

    match prepare(id, config, Box::new(kind), core, &listener) {
        Ok(pipeline) => {
            info!(
                mime = %pipeline.format().mime,
                duration_ms = pipeline.config().duration.as_millis() as u64,
                deferred = pipeline.is_configuration_deferred(),
                "Pipeline initialized"
            );
            Ok(pipeline)
        }
        Err(e) => {
            error!(kind = %e.kind(), error = %e, "Pipeline initialization failed");
            listener.on_error(id, &e);
            Err(e)
        }
    }
}

fn prepare(
    id: PipelineId,
    mut config: PipelineConfig,
    mut kind: Box<dyn MediaKind>,
    core: &CoreConfig,
    listener: &Arc<dyn StateListener>,
) -> Result<Pipeline, InitError> {
    if config.path.trim().is_empty() {
        return Err(InitError::InvalidInput("source path is empty".to_string()));
    }
    if !core.source_opener.exists(&config.path) {
        return Err(InitError::InvalidInput(format!(
            "{} does not exist",
            strip_path(&config.path)
        )));
    }
    debug!("Source path resolved");

    kind.check().map_err(InitError::UnsupportedSource)?;

    let mut source = core
        .source_opener
        .open(&config.path, kind.track_kind())
        .map_err(|e| InitError::SourceOpen(e.to_string()))?;
    debug!("Sample source opened");

    match assemble(&mut config, kind.as_mut(), source.as_mut(), core) {
        Ok(assembled) => {
            let parts = WorkerParts::new(
                kind,
                source,
                assembled.engine,
                assembled.renderer,
                assembled.pump,
                assembled.format,
                assembled.configured,
            );
            Ok(Pipeline::new(
                id,
                config,
                core.settings.clone(),
                Arc::clone(&core.clock),
                Arc::clone(listener),
                parts,
            ))
        }
        Err(e) => {
            kind.finish();
            source.stop();
            Err(e)
        }
    }
}

struct Assembled {
    format: FormatDescriptor,
    renderer: Box<dyn Renderer>,
    engine: Box<dyn DecodingEngine>,
    pump: BufferPump,
    configured: bool,
}

fn assemble(
    config: &mut PipelineConfig,
    kind: &mut dyn MediaKind,
    source: &mut dyn SampleSource,
    core: &CoreConfig,
) -> Result<Assembled, InitError> {
    let format = source
        .format()
        .cloned()
        .ok_or_else(|| InitError::SourceOpen("source reports no track format".to_string()))?;

    let start_us = config.start_position_us();
    if start_us > 0 {
        source.set_start_position(start_us);
        debug!(start_us, "Start position applied");
    }

    config.apply_source_duration(format.duration_us);
    if format.duration_us.is_none() {
        debug!("Source duration unknown, end position unbounded");
    }
    kind.init_params(&format)
        .map_err(InitError::UnsupportedSource)?;
    debug!(
        duration_ms = config.duration.as_millis() as u64,
        end_us = ?config.end_position_us(),
        "Parameters derived"
    );

    let mut renderer = kind.create_renderer().map_err(InitError::RenderInit)?;
    debug!("Renderer created");

    let mut engine = match core.engine_factory.create_decoder(&format.mime) {
        Ok(engine) => engine,
        Err(e) => {
            renderer.release();
            return Err(InitError::CodecCreate(e));
        }
    };
    debug!(mime = %format.mime, "Engine created");

    let configured = match kind.configure_engine(engine.as_mut(), &format) {
        Ok(()) => true,
        Err(e) if e.is_recoverable() => {
            warn!(reason = %e, "Engine configuration deferred");
            false
        }
        Err(e) => {
            renderer.release();
            engine.release();
            return Err(InitError::CodecConfig(e));
        }
    };

    let settings = &core.settings;
    let mut pump = BufferPump::new(
        settings.input_dequeue_timeout,
        settings.output_dequeue_timeout,
    );
    if configured {
        if let Err(e) = engine.start() {
            renderer.release();
            engine.release();
            return Err(InitError::CodecConfig(e));
        }
        pump.attach(engine.as_ref());
        debug!("Engine started");
    }

    Ok(Assembled {
        format,
        renderer,
        engine,
        pump,
        configured,
    })
}

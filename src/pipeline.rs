//! The lazy task pipeline.
//!
//! Builder calls append typed [`Task`]s to a queue and return the pipeline
//! for chaining; nothing runs until [`Pipeline::flush`] (directly or through
//! an export call). A flush drains the queue in order, threading one surface
//! through every stage:
//!
//! ```text
//! load_blob ─► resize ─► grayscale ─► draw_text ─► save_as_blob
//!   Loader     Manip.     Filter       Draw         flush + export
//! ```
//!
//! ## Surfaces
//!
//! | Slot | Set by | Lifetime |
//! |---|---|---|
//! | loaded | each Loader task | until the next Loader |
//! | working | each non-Loader task | cleared at the start of every flush |
//! | last | a flush that produced a working surface | sticky across flushes |
//!
//! A non-Loader task reads the working surface if there is one, else the
//! loaded surface. Exports read the working surface, else the last one.
//! A flush that produces no working surface (an empty queue, or a queue of
//! only Loader tasks) leaves the last surface as it was.
//!
//! ## Failure
//!
//! The first failing task aborts the flush. The queue is already drained by
//! then, so the remaining tasks are discarded and the error is returned.

use std::fmt;
use std::future::{Future, ready};
use std::mem;
use std::pin::Pin;

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::config::PipelineConfig;
use crate::exporter::{
    Blob, BlobExporter, CanvasExporter, DataUriExporter, ExportError, ExportOptions, Exporter,
};
use crate::imaging::{
    CenterOptions, CircleOptions, DrawDefaults, Exif, GrayscaleOptions, ImagingError, LineStyle,
    Points, ResizeMode, ResizeOptions, RotateOptions, ShapeStyle, Surface, TextStyle, draw,
    filter, perspective, text, transform,
};
use crate::loader::{LoadOptions, Loaded, LoaderError, Source};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Pipeline not loaded: queue a loader (e.g. load_blob) before other operations")]
    NotLoaded,
    #[error(transparent)]
    Imaging(#[from] ImagingError),
    #[error("Loader failed: {0}")]
    LoaderFailure(#[from] LoaderError),
    #[error("Exporter failed: {0}")]
    ExporterFailure(#[from] ExportError),
}

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Deferred loader: no input, yields a surface plus optional metadata.
pub type LoadOp = Box<dyn FnOnce() -> BoxFuture<'static, Result<Loaded, LoaderError>> + Send>;

/// Deferred stage: consumes the current surface, yields the next one.
pub type SurfaceOp =
    Box<dyn FnOnce(Surface) -> BoxFuture<'static, Result<Surface, PipelineError>> + Send>;

/// The four task kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Loader,
    Manipulation,
    Filter,
    Draw,
}

/// One queued, deferred operation. Identity is its queue position.
pub enum Task {
    Loader(LoadOp),
    Manipulation(SurfaceOp),
    Filter(SurfaceOp),
    Draw(SurfaceOp),
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Loader(_) => TaskKind::Loader,
            Task::Manipulation(_) => TaskKind::Manipulation,
            Task::Filter(_) => TaskKind::Filter,
            Task::Draw(_) => TaskKind::Draw,
        }
    }

    /// Loader task from a future, awaited when the task runs.
    pub fn loader<F>(future: F) -> Self
    where
        F: Future<Output = Result<Loaded, LoaderError>> + Send + 'static,
    {
        Task::Loader(Box::new(move || Box::pin(future)))
    }

    /// Loader task from a synchronous closure.
    pub fn loader_fn<F>(load: F) -> Self
    where
        F: FnOnce() -> Result<Loaded, LoaderError> + Send + 'static,
    {
        Task::Loader(Box::new(move || Box::pin(ready(load()))))
    }

    pub fn manipulation<F>(op: F) -> Self
    where
        F: FnOnce(Surface) -> Result<Surface, ImagingError> + Send + 'static,
    {
        Task::Manipulation(sync_op(op))
    }

    pub fn filter<F>(op: F) -> Self
    where
        F: FnOnce(Surface) -> Result<Surface, ImagingError> + Send + 'static,
    {
        Task::Filter(sync_op(op))
    }

    pub fn draw<F>(op: F) -> Self
    where
        F: FnOnce(Surface) -> Result<Surface, ImagingError> + Send + 'static,
    {
        Task::Draw(sync_op(op))
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Task").field(&self.kind()).finish()
    }
}

fn sync_op<F>(op: F) -> SurfaceOp
where
    F: FnOnce(Surface) -> Result<Surface, ImagingError> + Send + 'static,
{
    Box::new(move |surface| Box::pin(ready(op(surface).map_err(PipelineError::from))))
}

/// Build a [`SurfaceOp`] from an async closure, for suspending stages.
pub fn async_op<F, Fut>(op: F) -> SurfaceOp
where
    F: FnOnce(Surface) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Surface, PipelineError>> + Send + 'static,
{
    Box::new(move |surface| Box::pin(op(surface)))
}

/// A fluent, lazily evaluated image pipeline.
///
/// ```no_run
/// use pixchain::imaging::{GrayscaleOptions, ResizeMode};
/// use pixchain::pipeline::Pipeline;
///
/// # fn main() -> Result<(), pixchain::pipeline::PipelineError> {
/// let bytes = std::fs::read("photo.jpg").unwrap_or_default();
/// let mut pipeline = Pipeline::new();
/// pipeline
///     .load_blob(bytes)
///     .resize(200, 100, ResizeMode::To)
///     .grayscale(GrayscaleOptions::default());
/// let blob = pollster::block_on(pipeline.save_as_blob(Some("image/png"), None))?;
/// # let _ = blob;
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    draw_defaults: DrawDefaults,
    tasks: Vec<Task>,
    loaded: Option<Surface>,
    working: Option<Surface>,
    last: Option<Surface>,
    file_name: String,
    exif: Exif,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::with_config(PipelineConfig::default())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("tasks", &self.tasks)
            .field("loaded", &self.loaded.as_ref().map(Surface::dimensions))
            .field("working", &self.working.as_ref().map(Surface::dimensions))
            .field("last", &self.last.as_ref().map(Surface::dimensions))
            .field("file_name", &self.file_name)
            .field("exif_tags", &self.exif.len())
            .finish()
    }
}

impl Pipeline {
    /// An empty pipeline with stock defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty pipeline whose unset parameters fall back to `config`.
    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            draw_defaults: config.draw.to_defaults(),
            file_name: config.file_name.clone(),
            config,
            tasks: Vec::new(),
            loaded: None,
            working: None,
            last: None,
            exif: Exif::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Append a task to the queue.
    pub fn enqueue(&mut self, task: Task) -> &mut Self {
        self.tasks.push(task);
        self
    }

    /// Kinds of the queued tasks, in execution order.
    pub fn pending(&self) -> Vec<TaskKind> {
        self.tasks.iter().map(Task::kind).collect()
    }

    // =========================================================================
    // Loaders
    // =========================================================================

    /// Queue a loader for any [`Source`], with the configured load flags.
    pub fn load(&mut self, source: Source) -> &mut Self {
        self.load_with_options(source, self.config.loader)
    }

    pub fn load_with_options(&mut self, source: Source, options: LoadOptions) -> &mut Self {
        self.enqueue(Task::loader_fn(move || source.load(options)))
    }

    /// Queue decoding of encoded bytes.
    pub fn load_blob(&mut self, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.load(Source::Blob {
            bytes: bytes.into(),
            file_name: None,
        })
    }

    /// Queue reading and decoding a file; its name becomes the filename.
    pub fn load_file(&mut self, path: impl Into<std::path::PathBuf>) -> &mut Self {
        self.load(Source::File(path.into()))
    }

    /// Queue adoption of an existing surface.
    pub fn load_surface(&mut self, surface: Surface) -> &mut Self {
        self.load(Source::Surface(surface))
    }

    pub fn load_image(&mut self, image: image::DynamicImage) -> &mut Self {
        self.load(Source::Image(image))
    }

    /// Queue a caller-supplied asynchronous loader.
    pub fn load_with<F>(&mut self, future: F) -> &mut Self
    where
        F: Future<Output = Result<Loaded, LoaderError>> + Send + 'static,
    {
        self.enqueue(Task::loader(future))
    }

    // =========================================================================
    // Manipulations
    // =========================================================================

    pub fn resize(&mut self, max_width: u32, max_height: u32, mode: ResizeMode) -> &mut Self {
        self.resize_with(max_width, max_height, mode, ResizeOptions::default())
    }

    pub fn resize_with(
        &mut self,
        max_width: u32,
        max_height: u32,
        mode: ResizeMode,
        options: ResizeOptions,
    ) -> &mut Self {
        self.enqueue(Task::manipulation(move |s| {
            transform::resize(s, max_width, max_height, mode, &options)
        }))
    }

    /// Crop to `width x height`; omitted offsets center the crop.
    pub fn crop(
        &mut self,
        width: u32,
        height: u32,
        offset_x: Option<u32>,
        offset_y: Option<u32>,
    ) -> &mut Self {
        self.enqueue(Task::manipulation(move |s| {
            transform::crop(s, width, height, offset_x, offset_y)
        }))
    }

    pub fn rotate(&mut self, degrees: f64) -> &mut Self {
        self.rotate_with(degrees, RotateOptions::default())
    }

    pub fn rotate_with(&mut self, degrees: f64, options: RotateOptions) -> &mut Self {
        self.enqueue(Task::manipulation(move |s| {
            transform::rotate(s, degrees, &options)
        }))
    }

    /// Fit inside `width x height` on both edges, then center on a canvas of
    /// exactly that size. Queues two tasks.
    pub fn center_in_rectangle(
        &mut self,
        width: u32,
        height: u32,
        options: CenterOptions,
    ) -> &mut Self {
        let resize = ResizeOptions {
            upscale: options.upscale,
            ..ResizeOptions::default()
        };
        let background = options.background;
        self.enqueue(Task::manipulation(move |s| {
            transform::contain(s, width, height, &resize)
        }))
        .enqueue(Task::manipulation(move |s| {
            transform::pad(s, width, height, background.as_deref())
        }))
    }

    /// Square-resize to `diameter`, then mask outside the inscribed circle.
    /// Queues two tasks.
    pub fn to_circle(&mut self, diameter: u32, options: CircleOptions) -> &mut Self {
        self.resize(diameter, diameter, ResizeMode::Square)
            .enqueue(Task::manipulation(move |s| {
                transform::circle_mask(s, diameter, &options)
            }))
    }

    /// Warp so the corners land on `points` (top-left, top-right,
    /// bottom-right, bottom-left).
    pub fn perspective(&mut self, points: impl Into<Points>) -> &mut Self {
        let points = points.into();
        self.enqueue(Task::manipulation(move |s| {
            perspective::perspective(s, &points)
        }))
    }

    // =========================================================================
    // Filters
    // =========================================================================

    pub fn grayscale(&mut self, options: GrayscaleOptions) -> &mut Self {
        self.enqueue(Task::filter(move |s| filter::grayscale(s, &options)))
    }

    /// Mosaic; `None` uses the configured threshold.
    pub fn pixelize(&mut self, threshold: Option<f32>) -> &mut Self {
        let threshold = threshold.unwrap_or(self.config.filters.pixelize_threshold);
        self.enqueue(Task::filter(move |s| filter::pixelize(s, threshold)))
    }

    pub fn gaussian_blur(&mut self, radius: f32) -> &mut Self {
        self.enqueue(Task::filter(move |s| filter::gaussian_blur(s, radius)))
    }

    // =========================================================================
    // Draw
    // =========================================================================

    pub fn draw_line(&mut self, points: impl Into<Points>, style: LineStyle) -> &mut Self {
        let (points, defaults) = (points.into(), self.draw_defaults.clone());
        self.enqueue(Task::draw(move |s| {
            draw::draw_line(s, &points, &style, &defaults)
        }))
    }

    pub fn draw_polygon(&mut self, points: impl Into<Points>, style: ShapeStyle) -> &mut Self {
        let (points, defaults) = (points.into(), self.draw_defaults.clone());
        self.enqueue(Task::draw(move |s| {
            draw::draw_polygon(s, &points, &style, &defaults)
        }))
    }

    /// `points` are two opposite corners: `[left, bottom, right, top]`.
    pub fn draw_rectangle(&mut self, points: impl Into<Points>, style: ShapeStyle) -> &mut Self {
        let (points, defaults) = (points.into(), self.draw_defaults.clone());
        self.enqueue(Task::draw(move |s| {
            draw::draw_rectangle(s, &points, &style, &defaults)
        }))
    }

    /// Render `content` with its baseline starting at `xy`.
    pub fn draw_text(
        &mut self,
        xy: [f64; 2],
        content: impl Into<String>,
        style: TextStyle,
    ) -> &mut Self {
        let (content, defaults) = (content.into(), self.draw_defaults.clone());
        self.enqueue(Task::draw(move |s| {
            text::draw_text(s, xy, &content, &style, &defaults)
        }))
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Run every queued task in order and clear the queue.
    #[tracing::instrument(level = "debug", skip(self), fields(tasks = self.tasks.len()))]
    pub async fn flush(&mut self) -> Result<(), PipelineError> {
        self.working = None;
        let tasks = mem::take(&mut self.tasks);

        for (index, task) in tasks.into_iter().enumerate() {
            let kind = task.kind();
            trace!(index, ?kind, "running task");
            if let Err(err) = self.run(task).await {
                self.working = None;
                warn!(index, ?kind, error = %err, "task failed, discarding the rest of the queue");
                return Err(err);
            }
        }

        if let Some(surface) = self.working.take() {
            debug!(
                width = surface.width(),
                height = surface.height(),
                "flush produced a surface"
            );
            self.last = Some(surface);
        }
        Ok(())
    }

    async fn run(&mut self, task: Task) -> Result<(), PipelineError> {
        let op = match task {
            Task::Loader(load) => {
                let Loaded {
                    surface,
                    file_name,
                    exif,
                } = load().await?;
                self.loaded = Some(surface);
                if let Some(name) = file_name {
                    self.file_name = name;
                }
                if let Some(exif) = exif {
                    self.exif = exif;
                }
                return Ok(());
            }
            Task::Manipulation(op) | Task::Filter(op) | Task::Draw(op) => op,
        };

        let input = match self.working.take() {
            Some(surface) => surface,
            None => self.loaded.clone().ok_or(PipelineError::NotLoaded)?,
        };
        self.working = Some(op(input).await?);
        Ok(())
    }

    /// The surface exports consume: the working surface, else the last one.
    pub fn canvas(&self) -> Option<&Surface> {
        self.working.as_ref().or(self.last.as_ref())
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Flush, then hand the export surface to `exporter`.
    pub async fn export<E: Exporter>(
        &mut self,
        exporter: &E,
        options: &ExportOptions,
    ) -> Result<E::Output, PipelineError> {
        self.flush().await?;
        let surface = self.canvas().ok_or(ExportError::EmptySurface)?;
        Ok(exporter.export(surface, &self.file_name, options)?)
    }

    /// Export options with configured defaults for anything omitted.
    pub fn export_options(&self, mime: Option<&str>, quality: Option<&str>) -> ExportOptions {
        ExportOptions {
            mime: mime.unwrap_or(&self.config.export.mime).to_string(),
            quality: quality.unwrap_or(&self.config.export.quality).to_string(),
        }
    }

    pub async fn save_as_blob(
        &mut self,
        mime: Option<&str>,
        quality: Option<&str>,
    ) -> Result<Blob, PipelineError> {
        let options = self.export_options(mime, quality);
        self.export(&BlobExporter, &options).await
    }

    pub async fn save_as_canvas(&mut self) -> Result<Surface, PipelineError> {
        let options = self.export_options(None, None);
        self.export(&CanvasExporter, &options).await
    }

    /// Export as a `data:` URI.
    pub async fn save_as_image(
        &mut self,
        mime: Option<&str>,
        quality: Option<&str>,
    ) -> Result<String, PipelineError> {
        let options = self.export_options(mime, quality);
        self.export(&DataUriExporter, &options).await
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn set_file_name(&mut self, file_name: impl Into<String>) -> &mut Self {
        self.file_name = file_name.into();
        self
    }

    pub fn exif(&self) -> &Exif {
        &self.exif
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{gradient_surface, solid_surface};
    use pollster::block_on;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn loaded(surface: Surface) -> Pipeline {
        let mut p = Pipeline::new();
        p.load_surface(surface);
        p
    }

    // =========================================================================
    // Queue and dispatch
    // =========================================================================

    #[test]
    fn builders_enqueue_without_running() {
        let mut p = Pipeline::new();
        p.load_surface(gradient_surface(10, 10))
            .resize(5, 5, ResizeMode::Square)
            .grayscale(GrayscaleOptions::default())
            .draw_line([0.0, 0.0, 4.0, 4.0], LineStyle::default());
        assert_eq!(
            p.pending(),
            vec![
                TaskKind::Loader,
                TaskKind::Manipulation,
                TaskKind::Filter,
                TaskKind::Draw
            ]
        );
        assert!(p.canvas().is_none());
    }

    #[test]
    fn composite_builders_enqueue_two_tasks() {
        let mut p = Pipeline::new();
        p.center_in_rectangle(10, 10, CenterOptions::default());
        assert_eq!(p.pending().len(), 2);
        p.to_circle(10, CircleOptions::default());
        assert_eq!(p.pending().len(), 4);
    }

    #[test]
    fn operation_before_loader_fails_not_loaded() {
        let mut p = Pipeline::new();
        p.grayscale(GrayscaleOptions::default());
        let err = block_on(p.flush()).unwrap_err();
        assert!(matches!(err, PipelineError::NotLoaded));
        assert!(p.pending().is_empty());
    }

    #[test]
    fn tasks_run_in_enqueue_order() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut p = loaded(solid_surface(2, 2, [0, 0, 0, 255]));
        for i in 0..5 {
            let log = Arc::clone(&log);
            p.enqueue(Task::Filter(async_op(move |s| async move {
                log.lock().unwrap().push(i);
                Ok(s)
            })));
        }
        block_on(p.flush()).unwrap();
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn failure_discards_remaining_tasks() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let mut p = loaded(gradient_surface(10, 10));
        p.crop(50, 50, None, None).enqueue(Task::filter(move |s| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(s)
        }));

        let err = block_on(p.flush()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Imaging(ImagingError::CropOutOfBounds { .. })
        ));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(p.pending().is_empty());
        assert!(p.canvas().is_none());
    }

    // =========================================================================
    // Surface slots
    // =========================================================================

    #[test]
    fn second_flush_without_tasks_reuses_cache() {
        let mut p = loaded(gradient_surface(20, 20));
        p.gaussian_blur(1.0);
        block_on(p.flush()).unwrap();
        let first = p.canvas().cloned().unwrap();
        block_on(p.flush()).unwrap();
        assert_eq!(p.canvas(), Some(&first));
    }

    #[test]
    fn loader_only_flush_keeps_last_surface() {
        let mut p = loaded(solid_surface(4, 4, [1, 1, 1, 255]));
        p.resize(2, 2, ResizeMode::Square);
        block_on(p.flush()).unwrap();
        let last = p.canvas().cloned().unwrap();

        p.load_surface(solid_surface(9, 9, [9, 9, 9, 255]));
        block_on(p.flush()).unwrap();
        assert_eq!(p.canvas(), Some(&last));
    }

    #[test]
    fn later_flush_starts_from_loaded_surface() {
        let mut p = loaded(gradient_surface(40, 40));
        p.resize(20, 20, ResizeMode::Square);
        block_on(p.flush()).unwrap();
        p.crop(30, 30, None, None);
        block_on(p.flush()).unwrap();
        assert_eq!(p.canvas().unwrap().dimensions(), (30, 30));
    }

    #[test]
    fn loader_metadata_overwrites_only_when_present() {
        let mut p = Pipeline::new();
        assert_eq!(p.file_name(), "image");

        let mut exif = Exif::new();
        exif.insert("Make".into(), "Acme".into());
        let with_meta = Loaded {
            surface: gradient_surface(3, 3),
            file_name: Some("cam.jpg".into()),
            exif: Some(exif.clone()),
        };
        p.load_with(async move { Ok(with_meta) });
        block_on(p.flush()).unwrap();
        assert_eq!(p.file_name(), "cam.jpg");
        assert_eq!(p.exif(), &exif);

        p.load_surface(gradient_surface(3, 3));
        block_on(p.flush()).unwrap();
        assert_eq!(p.file_name(), "cam.jpg");
        assert_eq!(p.exif(), &exif);

        p.set_file_name("renamed.png");
        assert_eq!(p.file_name(), "renamed.png");
    }

    #[test]
    fn loader_failure_surfaces_as_loader_failure() {
        let mut p = Pipeline::new();
        p.load_blob(b"garbage".to_vec()).grayscale(GrayscaleOptions::default());
        let err = block_on(p.flush()).unwrap_err();
        assert!(matches!(err, PipelineError::LoaderFailure(LoaderError::Decode(_))));
    }

    // =========================================================================
    // Export
    // =========================================================================

    #[test]
    fn export_without_surface_is_exporter_failure() {
        let mut p = Pipeline::new();
        let err = block_on(p.save_as_canvas()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ExporterFailure(ExportError::EmptySurface)
        ));
    }

    #[test]
    fn save_as_blob_uses_config_defaults() {
        let mut p = loaded(gradient_surface(8, 8));
        p.grayscale(GrayscaleOptions::default());
        let blob = block_on(p.save_as_blob(None, None)).unwrap();
        assert_eq!(blob.mime, "image/jpeg");
        assert_eq!(blob.file_name, "image.jpg");
    }

    #[test]
    fn pixelize_none_uses_configured_threshold() {
        let mut config = PipelineConfig::default();
        config.filters.pixelize_threshold = 1.0;
        let mut p = Pipeline::with_config(config);
        p.load_surface(gradient_surface(10, 10)).pixelize(None);
        let out = block_on(p.save_as_canvas()).unwrap();
        let first = out.pixel(0, 0);
        assert!(out.as_rgba().pixels().all(|px| *px == first));
    }
}

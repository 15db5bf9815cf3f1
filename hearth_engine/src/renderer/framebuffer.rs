/// Framebuffer trait

use std::any::Any;
use std::sync::Arc;
use crate::renderer::{Extent2D, RenderPass};

/// Set of image views bound to a render pass
///
/// The render context owns one framebuffer per presentation image and
/// recreates them on resize; `create_framebuffer` builds extra ones.
pub trait Framebuffer: Send + Sync {
    fn extent(&self) -> Extent2D;

    /// Render pass the framebuffer was created against
    fn render_pass(&self) -> &Arc<dyn RenderPass>;

    /// Backend downcast
    fn as_any(&self) -> &dyn Any;
}

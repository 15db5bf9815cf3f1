/// Window collaborator used to size the presentation chain.
///
/// Backends that create a native surface additionally require the raw
/// window and display handles (`HasWindowHandle + HasDisplayHandle`);
/// the backend-independent protocol only needs the client-area size.

use crate::renderer::Extent2D;

/// Client-area query of a platform window
pub trait SurfaceWindow {
    /// Current client-area size in physical pixels
    fn client_extent(&self) -> Extent2D;
}

impl SurfaceWindow for winit::window::Window {
    fn client_extent(&self) -> Extent2D {
        let size = self.inner_size();
        Extent2D::new(size.width, size.height)
    }
}

impl<W: SurfaceWindow + ?Sized> SurfaceWindow for &W {
    fn client_extent(&self) -> Extent2D {
        (**self).client_extent()
    }
}

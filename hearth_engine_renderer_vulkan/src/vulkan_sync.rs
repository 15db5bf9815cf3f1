/// Fences and semaphores of the frame protocol

use ash::vk;
use hearth_engine::hearth::Result;
use hearth_engine::engine_err;
use hearth_engine::hearth::utils::ResizableSequence;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::vulkan_context::DeviceContext;

const SOURCE: &str = "hearth::vulkan";

/// Fence owned by one command buffer
///
/// Shared through `Arc` with the per-image in-flight tracking, so a tracked
/// fence stays valid until its command buffer and every tracker let go.
pub struct Fence {
    ctx: Arc<DeviceContext>,
    fence: vk::Fence,
    /// Reset, but the submission meant to signal it was rejected
    stranded: AtomicBool,
}

impl Fence {
    /// Create a fence, signaled so the first wait returns at once
    pub fn new(ctx: Arc<DeviceContext>) -> Result<Self> {
        let create_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        let fence = unsafe {
            ctx.device
                .create_fence(&create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create fence: {:?}", e))?
        };
        Ok(Self {
            ctx,
            fence,
            stranded: AtomicBool::new(false),
        })
    }

    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Wait until signaled, bounded by `timeout_ns`
    ///
    /// Returns at once for a stranded fence: no work is pending on it.
    pub fn wait(&self, timeout_ns: u64) -> Result<()> {
        if self.is_stranded() {
            return Ok(());
        }
        self.ctx.wait_for_fence(self.fence, timeout_ns, "command buffer")
    }

    pub fn is_stranded(&self) -> bool {
        self.stranded.load(Ordering::Acquire)
    }

    /// Reset the fence and hand it to `submit`
    ///
    /// When `submit` fails the fence stays unsignaled with nothing queued to
    /// signal it; it is then marked stranded until the next accepted submission.
    pub fn submit_with(&self, submit: impl FnOnce(vk::Fence) -> Result<()>) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .reset_fences(&[self.fence])
                .map_err(|e| engine_err!(SOURCE, "Failed to reset fence: {:?}", e))?;
        }
        let submitted = submit(self.fence);
        self.stranded.store(submitted.is_err(), Ordering::Release);
        submitted
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_fence(self.fence, None);
        }
    }
}

fn create_semaphores(ctx: &DeviceContext, count: u32) -> Result<ResizableSequence<vk::Semaphore>> {
    let create_info = vk::SemaphoreCreateInfo::default();
    let mut semaphores = ResizableSequence::with_capacity(count as usize);
    for _ in 0..count {
        let semaphore = unsafe { ctx.device.create_semaphore(&create_info, None) };
        match semaphore {
            Ok(semaphore) => semaphores.add(semaphore),
            Err(e) => {
                destroy_semaphores(ctx, &mut semaphores);
                return Err(engine_err!(SOURCE, "Failed to create semaphore: {:?}", e));
            }
        }
    }
    Ok(semaphores)
}

fn destroy_semaphores(ctx: &DeviceContext, semaphores: &mut ResizableSequence<vk::Semaphore>) {
    for semaphore in semaphores.drain_all() {
        unsafe {
            ctx.device.destroy_semaphore(semaphore, None);
        }
    }
}

/// Semaphores of the frame protocol
///
/// - `image_available`: one per acquire slot, signaled by acquire
/// - `render_finished`: one per image, signaled by the graphics submission
/// - `ownership_finished`: one per image, signaled by the queue-family
///   transfer submission; empty when one family does both
pub struct FrameSync {
    ctx: Arc<DeviceContext>,
    image_available: ResizableSequence<vk::Semaphore>,
    render_finished: ResizableSequence<vk::Semaphore>,
    ownership_finished: ResizableSequence<vk::Semaphore>,
}

impl FrameSync {
    pub fn new(ctx: Arc<DeviceContext>, image_count: u32) -> Result<Self> {
        let mut sync = Self {
            ctx,
            image_available: ResizableSequence::new(),
            render_finished: ResizableSequence::new(),
            ownership_finished: ResizableSequence::new(),
        };
        sync.recreate(image_count)?;
        Ok(sync)
    }

    /// Destroy every semaphore and create fresh ones for `image_count` images
    ///
    /// The device must be idle.
    pub fn recreate(&mut self, image_count: u32) -> Result<()> {
        self.destroy_all();
        self.image_available = create_semaphores(&self.ctx, image_count)?;
        self.render_finished = create_semaphores(&self.ctx, image_count)?;
        if self.ctx.families_differ() {
            self.ownership_finished = create_semaphores(&self.ctx, image_count)?;
        }
        Ok(())
    }

    pub fn image_available(&self, slot: usize) -> Result<vk::Semaphore> {
        lookup(&self.image_available, slot, "image-available")
    }

    pub fn render_finished(&self, image: u32) -> Result<vk::Semaphore> {
        lookup(&self.render_finished, image as usize, "render-finished")
    }

    pub fn ownership_finished(&self, image: u32) -> Result<vk::Semaphore> {
        lookup(&self.ownership_finished, image as usize, "ownership-transfer")
    }

    fn destroy_all(&mut self) {
        destroy_semaphores(&self.ctx, &mut self.image_available);
        destroy_semaphores(&self.ctx, &mut self.render_finished);
        destroy_semaphores(&self.ctx, &mut self.ownership_finished);
    }
}

fn lookup(semaphores: &ResizableSequence<vk::Semaphore>, index: usize, what: &str) -> Result<vk::Semaphore> {
    semaphores
        .get(index)
        .copied()
        .ok_or_else(|| engine_err!(SOURCE, "No {} semaphore at index {}", what, index))
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

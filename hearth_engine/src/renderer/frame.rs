/// Frame protocol state machine and per-image in-flight tracking
///
/// A frame walks `Idle -> Begun -> Submitted -> Presented -> Idle`:
/// `begin_frame`, `submit_command_buffer`, `present`, `end_frame`.
/// Any other order is a contract violation.

use crate::error::Result;
use crate::engine_contract;
use crate::utils::ResizableSequence;

const SOURCE: &str = "hearth::RenderContext";

/// Step of the frame protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePhase {
    /// No frame in progress
    #[default]
    Idle,
    /// Image acquired, recording
    Begun,
    /// Command buffer submitted
    Submitted,
    /// Image scheduled for presentation
    Presented,
}

/// Frame protocol bookkeeping
#[derive(Debug, Clone, Default)]
pub struct FrameState {
    phase: FramePhase,
    image: Option<u32>,
    submitted: Option<usize>,
}

impl FrameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Image acquired by the frame in progress
    pub fn current_image(&self) -> Option<u32> {
        self.image
    }

    /// Check that a frame can begin
    pub fn check_begin(&self) -> Result<()> {
        if self.phase != FramePhase::Idle {
            engine_contract!(SOURCE, "begin_frame while a frame is {:?}", self.phase);
        }
        Ok(())
    }

    /// Record the acquired image
    pub fn begin(&mut self, image: u32) -> Result<()> {
        self.check_begin()?;
        self.phase = FramePhase::Begun;
        self.image = Some(image);
        self.submitted = None;
        Ok(())
    }

    /// Check that `command_buffer` can be submitted now
    pub fn check_submit(&self) -> Result<()> {
        if self.phase != FramePhase::Begun {
            engine_contract!(SOURCE, "submit_command_buffer while the frame is {:?}", self.phase);
        }
        Ok(())
    }

    pub fn submit(&mut self, command_buffer: usize) -> Result<()> {
        self.check_submit()?;
        self.phase = FramePhase::Submitted;
        self.submitted = Some(command_buffer);
        Ok(())
    }

    /// Check that `command_buffer` is the one submitted this frame
    pub fn check_present(&self, command_buffer: usize) -> Result<()> {
        if self.phase != FramePhase::Submitted {
            engine_contract!(SOURCE, "present while the frame is {:?}", self.phase);
        }
        if self.submitted != Some(command_buffer) {
            engine_contract!(SOURCE, "present with a command buffer not submitted this frame");
        }
        Ok(())
    }

    /// Mark the image scheduled; also used when presentation reports out-of-date
    pub fn present(&mut self, command_buffer: usize) -> Result<()> {
        self.check_present(command_buffer)?;
        self.phase = FramePhase::Presented;
        Ok(())
    }

    pub fn end(&mut self) -> Result<()> {
        if self.phase != FramePhase::Presented {
            engine_contract!(SOURCE, "end_frame while the frame is {:?}", self.phase);
        }
        *self = Self::default();
        Ok(())
    }
}

/// Per-image in-flight tracking
///
/// `F` is the backend's fence handle. Each presentation image remembers the
/// fence of the last command buffer submitted against it; each acquire slot
/// (frame counter modulo image count) remembers the fence of the last frame
/// that used its acquire signal.
#[derive(Debug, Clone)]
pub struct FrameSlots<F: Clone> {
    images_in_flight: ResizableSequence<Option<F>>,
    slots_in_flight: ResizableSequence<Option<F>>,
    frame_counter: u64,
}

impl<F: Clone> FrameSlots<F> {
    pub fn new(image_count: u32) -> Self {
        let mut slots = Self {
            images_in_flight: ResizableSequence::new(),
            slots_in_flight: ResizableSequence::new(),
            frame_counter: 0,
        };
        slots.resize(image_count);
        slots
    }

    /// Forget every fence and size for `image_count` images
    pub fn resize(&mut self, image_count: u32) {
        self.images_in_flight.clear();
        self.slots_in_flight.clear();
        for _ in 0..image_count {
            self.images_in_flight.add(None);
            self.slots_in_flight.add(None);
        }
    }

    pub fn image_count(&self) -> usize {
        self.images_in_flight.size()
    }

    /// Frames completed so far
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Slot whose acquire signal the next frame uses
    pub fn acquire_slot(&self) -> usize {
        match self.image_count() {
            0 => 0,
            count => (self.frame_counter % count as u64) as usize,
        }
    }

    /// Fence guarding `image`, if a submission used it
    pub fn image_fence(&self, image: u32) -> Option<F> {
        self.images_in_flight.get(image as usize).cloned().flatten()
    }

    /// Fence guarding the current acquire slot
    pub fn slot_fence(&self) -> Option<F> {
        self.slots_in_flight.get(self.acquire_slot()).cloned().flatten()
    }

    /// Remember the fence of the submission rendering `image`
    pub fn set_in_flight(&mut self, image: u32, fence: F) {
        let slot = self.acquire_slot();
        if let Some(entry) = self.images_in_flight.get_mut(image as usize) {
            *entry = Some(fence.clone());
        }
        if let Some(entry) = self.slots_in_flight.get_mut(slot) {
            *entry = Some(fence);
        }
    }

    /// Close the frame
    pub fn advance(&mut self) {
        self.frame_counter += 1;
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;

/// DeviceContext - instance, device, queues and allocator shared by every Vulkan object
///
/// Every GPU object of this crate holds an `Arc<DeviceContext>`, so the
/// device is destroyed only after the last object created from it. The
/// context also owns the window surface and, when validation is compiled
/// in, the debug messenger.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use hearth_engine::hearth::{Error, Result};
use hearth_engine::hearth::render::{Config, ImageFormat};
use hearth_engine::{engine_debug, engine_err, engine_error, engine_info, engine_warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::sync::Mutex;

use crate::vulkan_format::image_format_to_vk;

const SOURCE: &str = "hearth::vulkan";

/// Log an initialization failure and build `Error::InitializationFailed`
pub(crate) fn init_failed(what: &str, e: impl std::fmt::Debug) -> Error {
    engine_error!(SOURCE, "{}: {:?}", what, e);
    Error::InitializationFailed(format!("{}: {:?}", what, e))
}

/// Destroy actions for a partially built context, run newest first on drop
///
/// `commit` hands ownership of the objects to the finished context.
pub(crate) struct Rollback {
    actions: Vec<Box<dyn FnOnce()>>,
}

impl Rollback {
    pub(crate) fn new() -> Self {
        Self { actions: Vec::new() }
    }

    pub(crate) fn push(&mut self, action: impl FnOnce() + 'static) {
        self.actions.push(Box::new(action));
    }

    pub(crate) fn commit(mut self) {
        self.actions.clear();
    }
}

impl Drop for Rollback {
    fn drop(&mut self) {
        while let Some(action) = self.actions.pop() {
            action();
        }
    }
}

/// Optional device features the render context adapts to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFeatures {
    /// Wireframe pipeline variants can be built
    pub fill_mode_non_solid: bool,
    /// Geometry stages can be built
    pub geometry_shader: bool,
}

/// Shared device context
pub struct DeviceContext {
    /// Keeps the Vulkan loader alive
    _entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: ash::Device,

    pub(crate) graphics_queue: vk::Queue,
    pub(crate) graphics_family: u32,
    /// May alias the graphics queue
    pub(crate) present_queue: vk::Queue,
    pub(crate) present_family: u32,

    /// Dropped before the device is destroyed
    pub(crate) allocator: ManuallyDrop<Mutex<Allocator>>,

    pub(crate) surface: vk::SurfaceKHR,
    pub(crate) surface_loader: ash::khr::surface::Instance,
    pub(crate) swapchain_loader: ash::khr::swapchain::Device,

    pub(crate) features: DeviceFeatures,

    #[cfg(feature = "vulkan-validation")]
    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl DeviceContext {
    /// Create instance, surface, device and allocator for `window`
    ///
    /// The first physical device exposing a graphics queue and a queue able
    /// to present to the window's surface is used. There is no fallback.
    ///
    /// # Errors
    ///
    /// `InitializationFailed` when any step fails. Objects created before
    /// the failing step are destroyed.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &Config) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| init_failed("Failed to load Vulkan library", e))?;

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|e| init_failed("Invalid application name", e))?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Hearth")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window.display_handle()
                .map_err(|e| init_failed("Failed to get display handle", e))?;
            let window_handle = window.window_handle()
                .map_err(|e| init_failed("Failed to get window handle", e))?;

            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| init_failed("Failed to get required extensions", e))?
                .to_vec();

            let enable_validation = config.enable_validation && cfg!(feature = "vulkan-validation");
            if config.enable_validation && !enable_validation {
                engine_warn!(SOURCE, "Validation requested but the vulkan-validation feature is not compiled in");
            }

            let mut layer_names = Vec::new();
            if enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(c"VK_LAYER_KHRONOS_validation".as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_failed("Failed to create Vulkan instance", e))?;
            let mut rollback = Rollback::new();
            let owned = instance.clone();
            rollback.push(move || owned.destroy_instance(None));

            #[cfg(feature = "vulkan-validation")]
            let debug_messenger = if enable_validation {
                let (debug_utils, messenger) =
                    crate::debug::create_debug_messenger(&entry, &instance, config.debug_severity)?;
                let owned = debug_utils.clone();
                rollback.push(move || {
                    crate::debug::cleanup_debug_config();
                    owned.destroy_debug_utils_messenger(messenger, None);
                });
                Some((debug_utils, messenger))
            } else {
                None
            };

            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| init_failed("Failed to create surface", e))?;

            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
            let owned = surface_loader.clone();
            rollback.push(move || owned.destroy_surface(surface, None));

            let (physical_device, graphics_family, present_family) =
                Self::pick_physical_device(&instance, &surface_loader, surface)?;

            let properties = instance.get_physical_device_properties(physical_device);
            if properties.api_version < vk::API_VERSION_1_3 {
                return Err(init_failed(
                    "Vulkan 1.3 is required for dynamic cull mode, device reports",
                    (vk::api_version_major(properties.api_version), vk::api_version_minor(properties.api_version)),
                ));
            }

            let supported = instance.get_physical_device_features(physical_device);
            let features = DeviceFeatures {
                fill_mode_non_solid: supported.fill_mode_non_solid == vk::TRUE,
                geometry_shader: supported.geometry_shader == vk::TRUE,
            };

            let queue_priorities = [1.0];
            let mut queue_create_infos = vec![
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(graphics_family)
                    .queue_priorities(&queue_priorities),
            ];
            if present_family != graphics_family {
                queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(present_family)
                        .queue_priorities(&queue_priorities),
                );
            }

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let device_features = vk::PhysicalDeviceFeatures::default()
                .fill_mode_non_solid(features.fill_mode_non_solid)
                .geometry_shader(features.geometry_shader);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| init_failed("Failed to create logical device", e))?;
            let owned = device.clone();
            rollback.push(move || owned.destroy_device(None));

            let graphics_queue = device.get_device_queue(graphics_family, 0);
            let present_queue = device.get_device_queue(present_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_failed("Failed to create GPU allocator", e))?;
            rollback.commit();

            let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

            let device_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string());
            engine_info!(SOURCE, "Using GPU '{}' (graphics family {}, present family {})",
                device_name, graphics_family, present_family);
            engine_debug!(SOURCE, "Device features: {:?}", features);

            Ok(Self {
                _entry: entry,
                instance,
                physical_device,
                device,
                graphics_queue,
                graphics_family,
                present_queue,
                present_family,
                allocator: ManuallyDrop::new(Mutex::new(allocator)),
                surface,
                surface_loader,
                swapchain_loader,
                features,
                #[cfg(feature = "vulkan-validation")]
                debug_messenger,
            })
        }
    }

    /// First device with a graphics family and a family presenting to `surface`
    ///
    /// A family doing both is preferred over two separate families.
    fn pick_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::PhysicalDevice, u32, u32)> {
        unsafe {
            let physical_devices = instance
                .enumerate_physical_devices()
                .map_err(|e| init_failed("Failed to enumerate physical devices", e))?;

            for physical_device in physical_devices {
                let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
                let presents = |family: u32| {
                    surface_loader
                        .get_physical_device_surface_support(physical_device, family, surface)
                        .unwrap_or(false)
                };

                let graphics_families: Vec<u32> = queue_families
                    .iter()
                    .enumerate()
                    .filter(|(_, qf)| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                    .map(|(i, _)| i as u32)
                    .collect();

                if let Some(&family) = graphics_families.iter().find(|&&family| presents(family)) {
                    return Ok((physical_device, family, family));
                }

                let graphics_family = graphics_families.first().copied();
                let present_family = (0..queue_families.len() as u32).find(|&family| presents(family));
                if let (Some(graphics_family), Some(present_family)) = (graphics_family, present_family) {
                    return Ok((physical_device, graphics_family, present_family));
                }
            }

            engine_error!(SOURCE, "No Vulkan device can render and present to this window");
            Err(Error::InitializationFailed("No Vulkan device can render and present to this window".to_string()))
        }
    }

    /// Whether graphics and presentation run on different queue families
    pub fn families_differ(&self) -> bool {
        self.graphics_family != self.present_family
    }

    /// Whether `format` can back a depth/stencil attachment with optimal tiling
    pub fn supports_depth_format(&self, format: ImageFormat) -> bool {
        let properties = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, image_format_to_vk(format))
        };
        properties
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    }

    /// Wait for `fence` for at most `timeout_ns` nanoseconds
    ///
    /// # Errors
    ///
    /// - `Timeout` when the wait expires
    /// - `BackendError` when the wait fails
    pub fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64, what: &str) -> Result<()> {
        match unsafe { self.device.wait_for_fences(&[fence], true, timeout_ns) } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => {
                engine_warn!(SOURCE, "Timed out waiting for the {} fence", what);
                Err(Error::Timeout(format!("{} fence not signaled after {} ns", what, timeout_ns)))
            }
            Err(e) => Err(engine_err!(SOURCE, "Failed to wait for the {} fence: {:?}", what, e)),
        }
    }

    /// Block until the device finished all submitted work
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device
                .device_wait_idle()
                .map_err(|e| engine_err!(SOURCE, "Failed to wait idle: {:?}", e))
        }
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // Frees the allocator's memory blocks while the device is alive
            ManuallyDrop::drop(&mut self.allocator);

            #[cfg(feature = "vulkan-validation")]
            if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                crate::debug::cleanup_debug_config();
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_context_tests.rs"]
mod tests;

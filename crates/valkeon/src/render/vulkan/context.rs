//! Vulkan context management
//!
//! Owns the instance, the optional validation messenger, the window surface,
//! the selected physical device, the logical device with its queues, and the
//! command pool shared by the demos. Everything else borrows from here.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use std::ffi::{c_char, CStr, CString};
use std::mem::ManuallyDrop;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::config::RendererConfig;
use crate::render::vulkan::commands::CommandPool;
use crate::render::vulkan::window::Window;

const VALIDATION_LAYER: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };
const ENGINE_NAME: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"No Engine\0") };

/// Depth formats tried in order by [`VulkanContext::find_depth_format`]
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No physical device offers graphics, presentation and swapchain support
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// None of the candidate formats supports the requested features
    #[error("No supported format among the candidates")]
    UnsupportedFormat,

    /// A file needed by the renderer could not be read
    #[error("Failed to read {path:?}: {source}")]
    Io {
        /// File that failed to load
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Shader bytecode is not valid SPIR-V
    #[error("Invalid SPIR-V: {0}")]
    InvalidSpirv(String),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create the instance with the extensions GLFW needs, plus debug utils
    /// and the Khronos validation layer when validation is requested
    pub fn new(window: &Window, config: &RendererConfig) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e}")))?;

        let mut enable_validation = config.validation_enabled();
        if enable_validation && !validation_layer_available(&entry)? {
            log::warn!("Validation requested but VK_LAYER_KHRONOS_validation is not installed; continuing without it");
            enable_validation = false;
        }

        let app_name = CString::new(config.application_name.as_str())
            .map_err(|_| VulkanError::InitializationFailed("Application name contains a NUL byte".to_string()))?;
        let (major, minor, patch) = config.application_version;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(ENGINE_NAME)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_3);

        let required = window
            .required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get required extensions: {e}")))?;
        let extension_names = required
            .into_iter()
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VulkanError::InitializationFailed("Extension name contains a NUL byte".to_string()))?;

        let mut extensions: Vec<*const c_char> = extension_names.iter().map(|ext| ext.as_ptr()).collect();
        let mut layers: Vec<*const c_char> = Vec::new();
        if enable_validation {
            extensions.push(DebugUtils::name().as_ptr());
            layers.push(VALIDATION_LAYER.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let debug = if enable_validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::info!(
            "Vulkan instance created (validation {})",
            if enable_validation { "on" } else { "off" }
        );

        Ok(Self { entry, instance, debug })
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Whether the validation messenger is installed
    pub fn validation_enabled(&self) -> bool {
        self.debug.is_some()
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn validation_layer_available(entry: &Entry) -> VulkanResult<bool> {
    let layers = entry
        .enumerate_instance_layer_properties()
        .map_err(VulkanError::Api)?;
    Ok(layers
        .iter()
        .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER))
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types, cached for allocation
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Pick the first device that can render and present to `surface`
    pub fn select_suitable_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        for device in devices {
            match Self::evaluate_device(instance, device, surface, surface_loader)? {
                Some(info) => {
                    log::info!("Selected GPU: {}", info.name());
                    return Ok(info);
                }
                None => continue,
            }
        }

        Err(VulkanError::NoSuitableDevice)
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Option<Self>> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut present_support = Vec::with_capacity(queue_families.len());
        for index in 0..queue_families.len() as u32 {
            let supported = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .map_err(VulkanError::Api)?
            };
            present_support.push(supported);
        }

        let Some((graphics_family, present_family)) = find_queue_families(&queue_families, &present_support) else {
            return Ok(None);
        };

        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        let has_swapchain = extensions
            .iter()
            .any(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) } == SwapchainLoader::name());
        if !has_swapchain {
            return Ok(None);
        }

        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device, surface)
                .map_err(VulkanError::Api)?
        };
        if formats.is_empty() || present_modes.is_empty() {
            return Ok(None);
        }

        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

        Ok(Some(Self {
            device,
            properties,
            memory_properties,
            graphics_family,
            present_family,
        }))
    }

    /// Device name reported by the driver
    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

/// Graphics and present family indices; the first graphics family wins, and
/// the same family is preferred for presentation when it can present
pub fn find_queue_families(
    families: &[vk::QueueFamilyProperties],
    present_support: &[bool],
) -> Option<(u32, u32)> {
    let graphics = families
        .iter()
        .position(|f| f.queue_count > 0 && f.queue_flags.contains(vk::QueueFlags::GRAPHICS))?;

    let present = if present_support.get(graphics).copied().unwrap_or(false) {
        graphics
    } else {
        present_support.iter().position(|&supported| supported)?
    };

    Some((graphics as u32, present as u32))
}

/// First memory type allowed by `type_filter` whose flags contain `properties`
pub fn select_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&i| {
        (type_filter & (1 << i)) != 0
            && memory_properties.memory_types[i as usize]
                .property_flags
                .contains(properties)
    })
}

/// First format whose properties, as reported by `query`, carry `features`
/// for the given tiling
pub fn select_supported_format(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    query: impl Fn(vk::Format) -> vk::FormatProperties,
) -> Option<vk::Format> {
    candidates.iter().copied().find(|&format| {
        let props = query(format);
        match tiling {
            vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
            vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
            _ => false,
        }
    })
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
}

impl LogicalDevice {
    /// Create the device with one queue per unique family and the swapchain extension
    pub fn new(instance: &Instance, physical_device: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let mut families = vec![physical_device.graphics_family];
        if physical_device.present_family != physical_device.graphics_family {
            families.push(physical_device.present_family);
        }

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extensions = [SwapchainLoader::name().as_ptr()];
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .create_device(physical_device.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue = unsafe { device.get_device_queue(physical_device.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical_device.present_family, 0) };

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Main Vulkan context that owns all core Vulkan resources
///
/// Teardown runs command pool, device, surface, then the debug messenger and
/// instance. The pool and device are released by hand in [`Drop`] because the
/// surface has to outlive the device.
pub struct VulkanContext {
    command_pool: ManuallyDrop<CommandPool>,
    device: ManuallyDrop<LogicalDevice>,
    physical_device: PhysicalDeviceInfo,
    surface: vk::SurfaceKHR,
    surface_loader: Surface,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Create instance, surface, physical and logical device, and command pool
    pub fn new(window: &Window, config: &RendererConfig) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, config)?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window
            .create_surface(instance.instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {e}")))?;
        log::info!("Window surface created");

        let physical_device =
            match PhysicalDeviceInfo::select_suitable_device(&instance.instance, surface, &surface_loader) {
                Ok(info) => info,
                Err(e) => {
                    unsafe { surface_loader.destroy_surface(surface, None) };
                    return Err(e);
                }
            };

        let device = match LogicalDevice::new(&instance.instance, &physical_device) {
            Ok(device) => device,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };
        log::info!("Logical device created");

        let command_pool = match CommandPool::new(device.device.clone(), physical_device.graphics_family) {
            Ok(pool) => pool,
            Err(e) => {
                drop(device);
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };
        log::info!("Command pool created");

        Ok(Self {
            command_pool: ManuallyDrop::new(command_pool),
            device: ManuallyDrop::new(device),
            physical_device,
            surface,
            surface_loader,
            instance,
        })
    }

    /// Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Whether validation layers are active
    pub fn validation_enabled(&self) -> bool {
        self.instance.validation_enabled()
    }

    /// Logical device handle
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// Physical device information
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Window surface
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension loader
    pub fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// Graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Graphics queue family index
    pub fn graphics_family(&self) -> u32 {
        self.physical_device.graphics_family
    }

    /// Present queue family index
    pub fn present_family(&self) -> u32 {
        self.physical_device.present_family
    }

    /// Command pool on the graphics family
    pub fn command_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    /// Index of a memory type matching `type_filter` and `properties`
    pub fn find_memory_type(&self, type_filter: u32, properties: vk::MemoryPropertyFlags) -> VulkanResult<u32> {
        select_memory_type(&self.physical_device.memory_properties, type_filter, properties)
            .ok_or(VulkanError::NoSuitableMemoryType)
    }

    /// First of `candidates` supporting `features` with `tiling`
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> VulkanResult<vk::Format> {
        let instance = self.instance();
        let physical = self.physical_device.device;
        select_supported_format(candidates, tiling, features, |format| unsafe {
            instance.get_physical_device_format_properties(physical, format)
        })
        .ok_or(VulkanError::UnsupportedFormat)
    }

    /// Preferred depth attachment format
    pub fn find_depth_format(&self) -> VulkanResult<vk::Format> {
        self.find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device.device_wait_idle().map_err(VulkanError::Api) }
    }
}

/// Release the command pool, then the device, then the surface
///
/// # Safety
/// `pool` and `device` must not be touched again.
unsafe fn release_device_objects<P, D>(
    pool: &mut ManuallyDrop<P>,
    device: &mut ManuallyDrop<D>,
    destroy_surface: impl FnOnce(),
) {
    ManuallyDrop::drop(pool);
    ManuallyDrop::drop(device);
    destroy_surface();
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device.device_wait_idle();
            let surface_loader = &self.surface_loader;
            let surface = self.surface;
            release_device_objects(&mut self.command_pool, &mut self.device, || {
                surface_loader.destroy_surface(surface, None)
            });
        }
        // The instance field drops after this, taking the messenger with it
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (i, flags) in types.iter().enumerate() {
            props.memory_types[i].property_flags = *flags;
        }
        props
    }

    #[test]
    fn test_queue_families_prefer_shared_family() {
        let families = [family(vk::QueueFlags::TRANSFER), family(vk::QueueFlags::GRAPHICS)];
        assert_eq!(find_queue_families(&families, &[true, true]), Some((1, 1)));
    }

    #[test]
    fn test_queue_families_split_present() {
        let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::COMPUTE)];
        assert_eq!(find_queue_families(&families, &[false, true]), Some((0, 1)));
    }

    #[test]
    fn test_queue_families_missing_graphics_or_present() {
        let families = [family(vk::QueueFlags::COMPUTE)];
        assert_eq!(find_queue_families(&families, &[true]), None);

        let families = [family(vk::QueueFlags::GRAPHICS)];
        assert_eq!(find_queue_families(&families, &[false]), None);
    }

    #[test]
    fn test_memory_type_respects_filter_and_flags() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL, host, host]);

        assert_eq!(select_memory_type(&props, 0b111, host), Some(1));
        // Type 1 is masked out by the filter, so the next match wins
        assert_eq!(select_memory_type(&props, 0b101, host), Some(2));
        assert_eq!(
            select_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Some(0)
        );
        assert_eq!(select_memory_type(&props, 0b001, host), None);
    }

    #[test]
    fn test_depth_format_preference_order() {
        let supported = |format: vk::Format| {
            let features = if format == vk::Format::D24_UNORM_S8_UINT || format == vk::Format::D32_SFLOAT_S8_UINT {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::FormatFeatureFlags::empty()
            };
            vk::FormatProperties {
                optimal_tiling_features: features,
                ..Default::default()
            }
        };

        let format = select_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            supported,
        );
        assert_eq!(format, Some(vk::Format::D32_SFLOAT_S8_UINT));

        let linear_only = select_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::LINEAR,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            supported,
        );
        assert_eq!(linear_only, None);
    }

    struct Recorded(&'static str, Rc<RefCell<Vec<&'static str>>>);

    impl Drop for Recorded {
        fn drop(&mut self) {
            self.1.borrow_mut().push(self.0);
        }
    }

    #[test]
    fn test_device_objects_released_before_surface() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pool = ManuallyDrop::new(Recorded("command pool", log.clone()));
        let mut device = ManuallyDrop::new(Recorded("device", log.clone()));

        let surface_log = log.clone();
        unsafe {
            release_device_objects(&mut pool, &mut device, || surface_log.borrow_mut().push("surface"));
        }

        assert_eq!(*log.borrow(), vec!["command pool", "device", "surface"]);
    }
}

mod bounding_box;
pub use self::bounding_box::BoundingBox;

pub mod task_scheduling;
pub mod thread_dispatcher;

// Private:
pub(crate) mod locks;

pub mod ids;
pub mod transform;

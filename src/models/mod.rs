pub mod solar;

pub mod fragment;
pub mod position;
pub mod space;

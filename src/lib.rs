pub mod config;
pub mod docx;
pub mod equation;
pub mod ffi;
pub mod pipeline;
pub mod progress;
pub mod render;
pub mod textutil;

pub mod config;
pub mod editor;
pub mod gemini_adapter;
pub mod native_audio;
pub mod prompt_loader;
